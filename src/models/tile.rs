//! Tile provider descriptors and URL template expansion.

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::geo::TileCoord;

/// A tile-serving endpoint plus its constraints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileProvider {
    /// Short name used in log lines
    pub name: String,

    /// URL template with `{s}`, `{z}`, `{x}`, `{y}` placeholders
    pub url_template: String,

    /// Attribution HTML shown in the map corner
    #[serde(default)]
    pub attribution: String,

    #[serde(default)]
    pub min_zoom: u8,

    #[serde(default = "default_max_zoom")]
    pub max_zoom: u8,

    /// Values substituted for `{s}`
    #[serde(default)]
    pub subdomains: Vec<String>,
}

fn default_max_zoom() -> u8 {
    19
}

impl TileProvider {
    /// Expand the template for one tile.
    ///
    /// The subdomain is picked from `(x + y) % n` so neighbouring tiles
    /// spread across hosts.
    pub fn url_for(&self, coord: TileCoord) -> String {
        let subdomain = if self.subdomains.is_empty() {
            ""
        } else {
            let index = (coord.x as usize + coord.y as usize) % self.subdomains.len();
            self.subdomains[index].as_str()
        };
        expand_template(&self.url_template, subdomain, coord)
    }

    pub fn supports_zoom(&self, zoom: u8) -> bool {
        zoom >= self.min_zoom && zoom <= self.max_zoom
    }

    /// Whether the template points at a bundled local tile set.
    pub fn is_local(&self) -> bool {
        !self.url_template.contains("://")
    }

    /// Check that the template expands to something usable.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(AppError::validation("tile provider name is empty"));
        }
        for placeholder in ["{z}", "{x}", "{y}"] {
            if !self.url_template.contains(placeholder) {
                return Err(AppError::validation(format!(
                    "tile provider '{}' template lacks {}",
                    self.name, placeholder
                )));
            }
        }
        if self.url_template.contains("{s}") && self.subdomains.is_empty() {
            return Err(AppError::validation(format!(
                "tile provider '{}' uses {{s}} but defines no subdomains",
                self.name
            )));
        }
        if self.min_zoom > self.max_zoom {
            return Err(AppError::validation(format!(
                "tile provider '{}' has min_zoom > max_zoom",
                self.name
            )));
        }
        if !self.is_local() {
            url::Url::parse(&self.url_for(TileCoord::new(0, 0, 0)))?;
        }
        Ok(())
    }
}

/// Substitute `{s}`, `{z}`, `{x}`, `{y}` in a template.
pub fn expand_template(template: &str, subdomain: &str, coord: TileCoord) -> String {
    template
        .replace("{s}", subdomain)
        .replace("{z}", &coord.z.to_string())
        .replace("{x}", &coord.x.to_string())
        .replace("{y}", &coord.y.to_string())
}
