//! Service layer for the itinerary renderer.
//!
//! This module contains the business logic for:
//! - Basemap tile resolution and bundling (`tiles`)
//! - Markers, routes and viewport control (`map`)
//! - Panel view-models and the host page (`view`)
//! - The dual-timezone clock (`clock`)
//! - View and like counters (`engagement`)

pub mod clock;
pub mod engagement;
pub mod map;
pub mod tiles;
pub mod view;

pub use clock::{ClockReading, DualClock};
pub use engagement::{Counters, EngagementCounter, ParticleBurst};
pub use map::{HeadlessMap, MapContext, MapSurface, Scene};
pub use tiles::{ResolverState, TileDownloader, TileEffect, TileLoader, TileStrategy};
pub use view::{Fragment, HostPage, Mount, PageState};
