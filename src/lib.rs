// src/lib.rs

//! tourmap: single-trip itinerary renderer with a resilient tile map.

pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;
