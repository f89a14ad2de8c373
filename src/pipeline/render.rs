// src/pipeline/render.rs

//! Static page rendering pipeline.

use std::path::PathBuf;

use serde::Serialize;

use crate::error::Result;
use crate::models::{Config, TripData};
use crate::services::DualClock;
use crate::services::engagement::Counters;
use crate::services::map::{HeadlessMap, MapContext, Scene};
use crate::services::view::{self, HostPage, PageState, ScheduleState};
use crate::storage::LocalStorage;

pub const INDEX_FILE: &str = "index.html";
pub const SCENE_FILE: &str = "scene.json";
pub const DATA_FILE: &str = "trip.json";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderSummary {
    pub output_dir: PathBuf,
    pub fragments: usize,
    pub injected: usize,
    /// False when the map failed to initialise and shows an error instead
    pub map_ready: bool,
    pub fingerprint: String,
}

/// Build the initial map scene, or the message to show in its place.
pub async fn build_scene(trip: &TripData, config: &Config) -> std::result::Result<Scene, String> {
    let surface = HeadlessMap::new(&config.map);
    match MapContext::new(trip, config.map.clone(), surface).await {
        Ok(context) => Ok(context.scene(&config.tiles)),
        Err(e) => Err(e.to_string()),
    }
}

/// Render every panel into `host` and write the site to `output`.
pub async fn run_render(
    trip: &TripData,
    config: &Config,
    mut host: HostPage,
    output: &LocalStorage,
    counts: Option<Counters>,
) -> Result<RenderSummary> {
    log::info!("Rendering trip {} into {}", trip.info.tour_no, output.root().display());

    let fingerprint = trip.fingerprint()?;
    let scene = build_scene(trip, config).await;
    let map_html = match &scene {
        Ok(scene) => view::render_map_payload(&serde_json::to_string(scene)?),
        Err(message) => {
            log::error!("Map initialisation failed: {}", message);
            view::render_map_error(message)
        }
    };

    let clock = match DualClock::from_config(&config.clock) {
        Ok(clock) => Some(clock.now()),
        Err(e) => {
            log::warn!("Clock disabled: {}", e);
            None
        }
    };

    let state = PageState {
        selected_day: None,
        schedule: ScheduleState::new(),
        counts,
        clock,
        fingerprint: Some(&fingerprint),
        map_html: Some(map_html),
    };
    let fragments = view::render_panels(trip, &state);
    let injected = host.inject_all(&fragments)?;
    if injected < fragments.len() {
        log::warn!(
            "{} of {} panels have no mount point in the host page",
            fragments.len() - injected,
            fragments.len()
        );
    }

    output.write_text(INDEX_FILE, host.as_str()).await?;
    if let Ok(scene) = &scene {
        output.write_json(SCENE_FILE, scene).await?;
    }
    match trip.to_json() {
        Ok(json) => output.write_text(DATA_FILE, &json).await?,
        Err(e) => log::warn!("Skipping {}: {}", DATA_FILE, e),
    }

    log::info!("Wrote {} ({} panels)", output.path(INDEX_FILE).display(), injected);
    Ok(RenderSummary {
        output_dir: output.root().to_path_buf(),
        fragments: fragments.len(),
        injected,
        map_ready: scene.is_ok(),
        fingerprint,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_render_writes_site() {
        let tmp = tempfile::TempDir::new().unwrap();
        let output = LocalStorage::new(tmp.path());
        let trip = TripData::builtin().unwrap();
        let config = Config::default();
        let counts = Counters { views: 1288, likes: 66 };

        let summary = run_render(&trip, &config, HostPage::builtin(), &output, Some(counts))
            .await
            .unwrap();
        assert!(summary.map_ready);
        assert_eq!(summary.injected, summary.fragments);

        let index = std::fs::read_to_string(tmp.path().join(INDEX_FILE)).unwrap();
        assert!(index.contains(r#"id="sceneData""#));
        assert!(index.contains("CZ6077"));
        assert!(index.contains(r#"<span id="likeCount">66</span>"#));
        assert!(!index.contains("加载中..."));

        let scene: serde_json::Value = output.read_json(SCENE_FILE).await.unwrap().unwrap();
        assert_eq!(scene["routes"].as_array().unwrap().len(), 3);

        let copy = std::fs::read_to_string(tmp.path().join(DATA_FILE)).unwrap();
        assert_eq!(TripData::from_json(&copy).unwrap(), trip);
    }

    #[tokio::test]
    async fn test_map_failure_renders_in_place() {
        let tmp = tempfile::TempDir::new().unwrap();
        let output = LocalStorage::new(tmp.path());
        let mut trip = TripData::builtin().unwrap();
        trip.hotels[0].lng = f64::INFINITY;

        let summary = run_render(&trip, &Config::default(), HostPage::builtin(), &output, None)
            .await
            .unwrap();
        assert!(!summary.map_ready);

        let index = std::fs::read_to_string(tmp.path().join(INDEX_FILE)).unwrap();
        assert!(index.contains("初始化失败"));
        assert!(index.contains("tipsList"));
        assert!(!output.exists(SCENE_FILE).await);
        assert!(!output.exists(DATA_FILE).await);
    }

    #[tokio::test]
    async fn test_page_handlers_are_defined() {
        let tmp = tempfile::TempDir::new().unwrap();
        let output = LocalStorage::new(tmp.path());
        let trip = TripData::builtin().unwrap();
        let counts = Counters { views: 1288, likes: 66 };
        run_render(&trip, &Config::default(), HostPage::builtin(), &output, Some(counts))
            .await
            .unwrap();

        let index = std::fs::read_to_string(tmp.path().join(INDEX_FILE)).unwrap();
        let handler = regex::Regex::new(r#"\son[a-z]+="([A-Za-z_]\w*)\("#).unwrap();
        let called: std::collections::BTreeSet<&str> = handler
            .captures_iter(&index)
            .filter_map(|c| c.get(1).map(|m| m.as_str()))
            .collect();
        for name in ["showRoute", "focusLocation", "toggleRoutes", "likeTrip", "toggleDaySchedule"] {
            assert!(called.contains(name), "{name} is never wired");
        }
        for name in called {
            assert!(index.contains(&format!("function {name}(")), "{name} is not defined");
        }

        // Clock faces carry their zone so the page can keep them ticking
        assert!(index.contains(r#"<span id="originTime"><time data-zone="Asia/Shanghai">"#));
        assert!(index.contains(r#"<span id="destinationTime"><time data-zone="Asia/Ho_Chi_Minh">"#));
        assert!(index.contains("setInterval(tickClocks, 1000)"));
    }
}
