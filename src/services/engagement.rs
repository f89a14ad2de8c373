// src/services/engagement.rs

//! View and like counters.
//!
//! Counters are seeded from baseline values the first time a profile is
//! seen, persisted after every change and never fail the caller: store
//! errors are logged and the in-memory values are kept.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::models::EngagementConfig;
use crate::storage::CounterStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Counters {
    pub views: u64,
    pub likes: u64,
}

/// One star of the like animation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Particle {
    /// Launch delay from the click
    pub delay: Duration,
    /// Flight direction in degrees
    pub angle: f64,
    pub glyph: &'static str,
}

/// Cosmetic burst returned by [`EngagementCounter::like`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParticleBurst {
    pub particles: Vec<Particle>,
}

impl ParticleBurst {
    pub fn new(count: usize, stagger: Duration) -> Self {
        let particles = (0..count)
            .map(|i| Particle {
                delay: stagger * i as u32,
                angle: 360.0 * i as f64 / count as f64,
                glyph: "⭐",
            })
            .collect();
        Self { particles }
    }

    /// Emit each particle at its launch delay.
    pub async fn play<F>(&self, mut on_spawn: F)
    where
        F: FnMut(&Particle),
    {
        let start = tokio::time::Instant::now();
        for particle in &self.particles {
            tokio::time::sleep_until(start + particle.delay).await;
            on_spawn(particle);
        }
    }
}

pub struct EngagementCounter {
    store: Arc<dyn CounterStore>,
    config: EngagementConfig,
    counts: Counters,
}

impl EngagementCounter {
    /// Read counters for this session, counting the visit.
    ///
    /// Absent keys are seeded with the baselines; a present view count is
    /// incremented by one.
    pub async fn load(store: Arc<dyn CounterStore>, config: EngagementConfig) -> Self {
        Self::open_with(store, config, true).await
    }

    /// Read counters without counting a visit. Absent keys are still seeded.
    pub async fn open(store: Arc<dyn CounterStore>, config: EngagementConfig) -> Self {
        Self::open_with(store, config, false).await
    }

    async fn open_with(store: Arc<dyn CounterStore>, config: EngagementConfig, visit: bool) -> Self {
        let views = match read(store.as_ref(), &config.views_key).await {
            Some(views) if visit => views.saturating_add(1),
            Some(views) => views,
            None => config.baseline_views,
        };
        let likes = read(store.as_ref(), &config.likes_key)
            .await
            .unwrap_or(config.baseline_likes);

        let counter = Self {
            store,
            config,
            counts: Counters { views, likes },
        };
        counter.persist(&counter.config.views_key, views).await;
        counter.persist(&counter.config.likes_key, likes).await;
        log::debug!("Engagement loaded: {} views, {} likes", views, likes);
        counter
    }

    pub fn counts(&self) -> Counters {
        self.counts
    }

    /// Count one like and return the celebration burst.
    pub async fn like(&mut self) -> ParticleBurst {
        self.counts.likes = self.counts.likes.saturating_add(1);
        self.persist(&self.config.likes_key, self.counts.likes).await;
        ParticleBurst::new(
            self.config.particles,
            Duration::from_millis(self.config.stagger_ms),
        )
    }

    async fn persist(&self, key: &str, value: u64) {
        if let Err(e) = self.store.set(key, &value.to_string()).await {
            log::warn!("Could not persist {}={}: {}", key, value, e);
        }
    }
}

/// Read a counter; unreadable or malformed values count as absent.
async fn read(store: &dyn CounterStore, key: &str) -> Option<u64> {
    match store.get(key).await {
        Ok(Some(raw)) => match raw.trim().parse() {
            Ok(value) => Some(value),
            Err(_) => {
                log::warn!("Ignoring malformed counter {}={:?}", key, raw);
                None
            }
        },
        Ok(None) => None,
        Err(e) => {
            log::warn!("Counter store unavailable for {}: {}", key, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AppError, Result};
    use crate::storage::{LocalStorage, MemoryStore};
    use async_trait::async_trait;

    struct BrokenStore;

    #[async_trait]
    impl CounterStore for BrokenStore {
        async fn get(&self, _key: &str) -> Result<Option<String>> {
            Err(AppError::storage("storage disabled"))
        }

        async fn set(&self, _key: &str, _value: &str) -> Result<()> {
            Err(AppError::storage("storage disabled"))
        }
    }

    fn config() -> EngagementConfig {
        EngagementConfig::default()
    }

    #[tokio::test]
    async fn test_first_load_seeds_baselines() {
        let store = Arc::new(MemoryStore::new());
        let counter = EngagementCounter::load(store.clone(), config()).await;
        assert_eq!(counter.counts(), Counters { views: 1288, likes: 66 });
        assert_eq!(
            store.get("tourmap.views").await.unwrap().as_deref(),
            Some("1288")
        );
        assert_eq!(store.get("tourmap.likes").await.unwrap().as_deref(), Some("66"));
    }

    #[tokio::test]
    async fn test_second_load_increments_views_only() {
        let store = Arc::new(MemoryStore::new());
        EngagementCounter::load(store.clone(), config()).await;
        let counter = EngagementCounter::load(store.clone(), config()).await;
        assert_eq!(counter.counts(), Counters { views: 1289, likes: 66 });
    }

    #[tokio::test]
    async fn test_like_increments_by_one() {
        let store = Arc::new(MemoryStore::new());
        let mut counter = EngagementCounter::load(store.clone(), config()).await;
        let burst = counter.like().await;
        assert_eq!(counter.counts().likes, 67);
        assert_eq!(counter.counts().views, 1288);
        assert_eq!(store.get("tourmap.likes").await.unwrap().as_deref(), Some("67"));
        assert_eq!(burst.particles.len(), 12);
        assert_eq!(burst.particles[11].delay, Duration::from_millis(550));
    }

    #[tokio::test]
    async fn test_broken_store_degrades_to_memory() {
        let mut counter = EngagementCounter::load(Arc::new(BrokenStore), config()).await;
        assert_eq!(counter.counts(), Counters { views: 1288, likes: 66 });
        counter.like().await;
        assert_eq!(counter.counts().likes, 67);
    }

    #[tokio::test]
    async fn test_malformed_value_is_reseeded() {
        let store = Arc::new(MemoryStore::with_value("tourmap.views", "many"));
        let counter = EngagementCounter::load(store, config()).await;
        assert_eq!(counter.counts().views, 1288);
    }

    #[tokio::test]
    async fn test_counts_survive_file_store_reopen() {
        let tmp = tempfile::TempDir::new().unwrap();
        let store = Arc::new(LocalStorage::new(tmp.path()));
        let mut counter = EngagementCounter::load(store, config()).await;
        counter.like().await;

        let reopened = Arc::new(LocalStorage::new(tmp.path()));
        let counter = EngagementCounter::load(reopened, config()).await;
        assert_eq!(counter.counts(), Counters { views: 1289, likes: 67 });
    }

    #[tokio::test]
    async fn test_saturated_counts_do_not_wrap() {
        let store = Arc::new(MemoryStore::new());
        store.set("tourmap.views", &u64::MAX.to_string()).await.unwrap();
        store.set("tourmap.likes", &u64::MAX.to_string()).await.unwrap();

        let mut counter = EngagementCounter::load(store.clone(), config()).await;
        counter.like().await;
        assert_eq!(counter.counts(), Counters { views: u64::MAX, likes: u64::MAX });
        assert_eq!(
            store.get("tourmap.views").await.unwrap(),
            Some(u64::MAX.to_string())
        );
    }

    #[tokio::test]
    async fn test_open_then_like_leaves_views() {
        let store = Arc::new(MemoryStore::new());
        EngagementCounter::load(store.clone(), config()).await;

        let mut counter = EngagementCounter::open(store.clone(), config()).await;
        counter.like().await;
        assert_eq!(counter.counts(), Counters { views: 1288, likes: 67 });
        assert_eq!(store.get("tourmap.views").await.unwrap().as_deref(), Some("1288"));
    }

    #[tokio::test]
    async fn test_open_seeds_empty_store() {
        let store = Arc::new(MemoryStore::new());
        let counter = EngagementCounter::open(store.clone(), config()).await;
        assert_eq!(counter.counts(), Counters { views: 1288, likes: 66 });
        assert_eq!(store.get("tourmap.likes").await.unwrap().as_deref(), Some("66"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_plays_with_stagger() {
        let burst = ParticleBurst::new(12, Duration::from_millis(50));
        let start = tokio::time::Instant::now();
        let mut spawned = 0;
        burst.play(|_| spawned += 1).await;
        assert_eq!(spawned, 12);
        assert_eq!(start.elapsed(), Duration::from_millis(550));
    }
}
