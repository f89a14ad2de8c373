// src/services/tiles/download.rs

//! Offline tile bundle downloader.
//!
//! Fills `{tiles_dir}/{z}/{x}/{y}.png` for the configured bounding box and
//! zoom range. Existing tiles are never re-downloaded.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use serde::Serialize;

use crate::error::{AppError, Result};
use crate::models::{DownloadConfig, TileCoord, TileRange, expand_template};
use crate::services::tiles::TileFetcher;
use crate::storage::LocalStorage;

/// Highest zoom any public tile server offers.
const MAX_ZOOM: u8 = 19;

/// Progress is logged every this many tiles.
const PROGRESS_EVERY: usize = 50;

#[derive(Debug, Clone, Copy, Default)]
pub struct DownloadOptions {
    /// Scan first and only queue absent tiles
    pub missing_only: bool,
    /// Restrict to one zoom level
    pub zoom: Option<u8>,
}

/// Per-zoom download counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ZoomStats {
    pub zoom: u8,
    pub total: usize,
    pub existing: usize,
    pub downloaded: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DownloadReport {
    pub zooms: Vec<ZoomStats>,
}

impl DownloadReport {
    pub fn total(&self) -> usize {
        self.zooms.iter().map(|z| z.total).sum()
    }

    pub fn downloaded(&self) -> usize {
        self.zooms.iter().map(|z| z.downloaded).sum()
    }

    pub fn failed(&self) -> usize {
        self.zooms.iter().map(|z| z.failed).sum()
    }

    pub fn existing(&self) -> usize {
        self.zooms.iter().map(|z| z.existing).sum()
    }
}

/// Bundle coverage for one zoom level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ZoomCoverage {
    pub zoom: u8,
    pub present: usize,
    pub total: usize,
    pub x_min: u32,
    pub x_max: u32,
    pub y_min: u32,
    pub y_max: u32,
}

impl ZoomCoverage {
    /// Whole-number percentage, rounded down.
    pub fn percent(&self) -> usize {
        if self.total == 0 {
            0
        } else {
            self.present * 100 / self.total
        }
    }

    pub fn is_complete(&self) -> bool {
        self.present == self.total
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TileOutcome {
    Existing,
    Downloaded,
    Failed,
}

/// Downloads tiles into a local bundle.
pub struct TileDownloader {
    config: DownloadConfig,
    bundle: LocalStorage,
    fetcher: Arc<dyn TileFetcher>,
}

impl TileDownloader {
    /// `bundle` is rooted at the tiles directory.
    pub fn new(config: DownloadConfig, bundle: LocalStorage, fetcher: Arc<dyn TileFetcher>) -> Self {
        Self {
            config,
            bundle,
            fetcher,
        }
    }

    /// Tile ranges to cover, one per zoom level.
    pub fn plan(&self, zoom: Option<u8>) -> Result<Vec<TileRange>> {
        let zooms = match zoom {
            Some(z) if z > MAX_ZOOM => {
                return Err(AppError::validation(format!(
                    "zoom {z} is above the maximum of {MAX_ZOOM}"
                )));
            }
            Some(z) => z..=z,
            None => self.config.min_zoom..=self.config.max_zoom,
        };
        Ok(zooms
            .map(|z| TileRange::covering(&self.config.bounds, z))
            .collect())
    }

    /// Count bundle tiles present per zoom level.
    pub async fn coverage(&self, zoom: Option<u8>) -> Result<Vec<ZoomCoverage>> {
        let mut coverage = Vec::new();
        for range in self.plan(zoom)? {
            let mut present = 0;
            for coord in range.iter() {
                if self.bundle.exists(&coord.path()).await {
                    present += 1;
                }
            }
            coverage.push(ZoomCoverage {
                zoom: range.z,
                present,
                total: range.count(),
                x_min: range.x_min,
                x_max: range.x_max,
                y_min: range.y_min,
                y_max: range.y_max,
            });
        }
        Ok(coverage)
    }

    /// Download every planned tile not already in the bundle.
    pub async fn download(&self, options: DownloadOptions) -> Result<DownloadReport> {
        let delay = Duration::from_millis(self.config.request_delay_ms);
        let concurrency = self.config.max_concurrent.max(1);
        let mut report = DownloadReport::default();

        for range in self.plan(options.zoom)? {
            let mut stats = ZoomStats {
                zoom: range.z,
                total: range.count(),
                ..ZoomStats::default()
            };

            let jobs: Vec<TileCoord> = if options.missing_only {
                let mut missing = Vec::new();
                for coord in range.iter() {
                    if self.bundle.exists(&coord.path()).await {
                        stats.existing += 1;
                    } else {
                        missing.push(coord);
                    }
                }
                log::info!(
                    "Zoom {}: {}/{} present, {} missing",
                    range.z,
                    stats.existing,
                    stats.total,
                    missing.len()
                );
                missing
            } else {
                log::info!(
                    "Zoom {}: X({}-{}) Y({}-{}), {} tiles",
                    range.z,
                    range.x_min,
                    range.x_max,
                    range.y_min,
                    range.y_max,
                    stats.total
                );
                range.iter().collect()
            };

            let job_count = jobs.len();
            let mut results = stream::iter(jobs)
                .map(|coord| async move { self.download_tile(coord).await })
                .buffer_unordered(concurrency);

            let mut done = 0;
            while let Some(outcome) = results.next().await {
                match outcome {
                    TileOutcome::Existing => stats.existing += 1,
                    TileOutcome::Downloaded => stats.downloaded += 1,
                    TileOutcome::Failed => stats.failed += 1,
                }
                done += 1;
                if done % PROGRESS_EVERY == 0 || done == job_count {
                    log::info!(
                        "Zoom {} progress: {}/{} | downloaded {} | failed {}",
                        range.z,
                        done,
                        job_count,
                        stats.downloaded,
                        stats.failed
                    );
                }

                if outcome != TileOutcome::Existing && delay.as_millis() > 0 {
                    tokio::time::sleep(delay).await;
                }
            }

            report.zooms.push(stats);
        }

        Ok(report)
    }

    async fn download_tile(&self, coord: TileCoord) -> TileOutcome {
        let key = coord.path();
        if self.bundle.exists(&key).await {
            return TileOutcome::Existing;
        }

        let url = expand_template(&self.config.url_template, "", coord);
        let bytes = match self.fetcher.fetch(&url).await {
            Ok(bytes) => bytes,
            Err(error) => {
                log::warn!("Failed to download tile {}: {}", coord, error);
                return TileOutcome::Failed;
            }
        };
        match self.bundle.write_bytes(&key, &bytes).await {
            Ok(()) => TileOutcome::Downloaded,
            Err(error) => {
                log::warn!("Failed to store tile {}: {}", coord, error);
                TileOutcome::Failed
            }
        }
    }
}
