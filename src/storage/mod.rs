//! Storage abstractions for the engagement counters and rendered output.
//!
//! Counters are plain string key/value pairs holding decimal integers:
//!
//! ```text
//! storage/
//! ├── config.toml           # Application configuration
//! ├── counters.json         # {"tourmap.views": "1289", "tourmap.likes": "66"}
//! ├── host.html             # Host page with mount points
//! ├── tiles/                # Offline tile bundle
//! │   └── {z}/{x}/{y}.png
//! └── dist/                 # Rendered page
//! ```

pub mod local;
pub mod memory;

use async_trait::async_trait;

use crate::error::Result;

// Re-export for convenience
pub use local::LocalStorage;
pub use memory::MemoryStore;

/// Per-profile key/value store backing the view and like counters.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Read a value, `None` when the key was never written.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write a value, replacing any previous one.
    async fn set(&self, key: &str, value: &str) -> Result<()>;
}
