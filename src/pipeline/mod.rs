//! Pipeline entry points for the CLI.
//!
//! - `run_render`: Render the host page, map scene and data copy
//! - `validate_trip`: Data quality report over a trip data set

pub mod render;
pub mod validate;

pub use render::{RenderSummary, build_scene, run_render};
pub use validate::{ValidationReport, validate_trip};
