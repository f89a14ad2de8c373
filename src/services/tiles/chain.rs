//! Provider-level fallback across remote tile CDNs.

use std::time::Duration;

use crate::models::{TileConfig, TileProvider};
use crate::services::tiles::{ALL_FAILED_MESSAGE, ResolverState, TileEffect};

/// Remote provider chain.
///
/// Tile errors are counted per provider. Once the count exceeds the
/// threshold the provider is marked failed and a single switch is
/// scheduled. A watchdog switches immediately when nothing rendered at all.
#[derive(Debug, Clone)]
pub struct RemoteChain {
    providers: Vec<TileProvider>,
    error_threshold: u32,
    switch_delay: Duration,
    watchdog: Duration,
    overlay: Duration,
    state: ResolverState,
    errors: u32,
    rendered: u32,
}

impl RemoteChain {
    pub fn new(providers: Vec<TileProvider>, error_threshold: u32) -> Self {
        Self {
            providers,
            error_threshold,
            switch_delay: Duration::from_secs(1),
            watchdog: Duration::from_secs(10),
            overlay: Duration::from_secs(15),
            state: ResolverState::Idle,
            errors: 0,
            rendered: 0,
        }
    }

    pub fn from_config(config: &TileConfig) -> Self {
        Self::new(config.providers.clone(), config.error_threshold)
            .with_timers(
                Duration::from_millis(config.switch_delay_ms),
                Duration::from_secs(config.watchdog_secs),
            )
            .with_overlay(Duration::from_secs(config.overlay_remote_secs))
    }

    pub fn with_timers(mut self, switch_delay: Duration, watchdog: Duration) -> Self {
        self.switch_delay = switch_delay;
        self.watchdog = watchdog;
        self
    }

    pub fn with_overlay(mut self, overlay: Duration) -> Self {
        self.overlay = overlay;
        self
    }

    pub fn providers(&self) -> &[TileProvider] {
        &self.providers
    }

    pub fn state(&self) -> ResolverState {
        self.state
    }

    /// Errors counted against the active provider.
    pub fn error_count(&self) -> u32 {
        self.errors
    }

    pub fn start(&mut self) -> Vec<TileEffect> {
        if self.state != ResolverState::Idle {
            log::debug!("Tile resolver already started ({})", self.state);
            return Vec::new();
        }
        let mut effects = vec![TileEffect::ShowOverlay {
            dismiss_after: self.overlay,
        }];
        if self.providers.is_empty() {
            effects.extend(self.exhausted());
        } else {
            effects.extend(self.activate(0));
        }
        effects
    }

    pub fn tile_loaded(&mut self, provider: usize) -> Vec<TileEffect> {
        if self.state == ResolverState::Loading(provider) {
            self.rendered += 1;
        }
        Vec::new()
    }

    pub fn tile_error(&mut self, provider: usize) -> Vec<TileEffect> {
        // Superseded providers and settled states no longer count
        if self.state != ResolverState::Loading(provider) {
            return Vec::new();
        }
        self.errors += 1;
        if self.errors <= self.error_threshold {
            return Vec::new();
        }
        if self.has_next(provider) {
            log::warn!(
                "Tile provider '{}' exceeded {} errors, switching in {:?}",
                self.name(provider),
                self.error_threshold,
                self.switch_delay
            );
            self.state = ResolverState::Failed(provider);
            vec![TileEffect::ScheduleSwitch {
                provider,
                after: self.switch_delay,
            }]
        } else {
            log::error!(
                "Last tile provider '{}' exceeded {} errors",
                self.name(provider),
                self.error_threshold
            );
            self.exhausted()
        }
    }

    pub fn all_loaded(&mut self, provider: usize) -> Vec<TileEffect> {
        if self.state != ResolverState::Loading(provider) {
            return Vec::new();
        }
        log::info!(
            "Tile provider '{}' loaded ({} tiles, {} errors)",
            self.name(provider),
            self.rendered,
            self.errors
        );
        self.state = ResolverState::Succeeded(provider);
        Vec::new()
    }

    pub fn watchdog_fired(&mut self, provider: usize, rendered: u32) -> Vec<TileEffect> {
        if self.state != ResolverState::Loading(provider) || rendered > 0 {
            return Vec::new();
        }
        if self.has_next(provider) {
            log::warn!(
                "Tile provider '{}' rendered nothing within {:?}, switching now",
                self.name(provider),
                self.watchdog
            );
            self.activate(provider + 1)
        } else {
            log::error!(
                "Last tile provider '{}' rendered nothing within {:?}",
                self.name(provider),
                self.watchdog
            );
            self.exhausted()
        }
    }

    pub fn switch_due(&mut self, provider: usize) -> Vec<TileEffect> {
        if self.state != ResolverState::Failed(provider) {
            return Vec::new();
        }
        self.activate(provider + 1)
    }

    fn activate(&mut self, provider: usize) -> Vec<TileEffect> {
        log::info!(
            "Loading tiles from provider {} of {}: '{}'",
            provider + 1,
            self.providers.len(),
            self.name(provider)
        );
        self.state = ResolverState::Loading(provider);
        self.errors = 0;
        self.rendered = 0;
        vec![
            TileEffect::ActivateLayer { provider },
            TileEffect::ScheduleWatchdog {
                provider,
                after: self.watchdog,
            },
        ]
    }

    fn exhausted(&mut self) -> Vec<TileEffect> {
        self.state = ResolverState::AllFailed;
        vec![TileEffect::ShowErrorPanel {
            message: ALL_FAILED_MESSAGE.to_string(),
        }]
    }

    fn has_next(&self, provider: usize) -> bool {
        provider + 1 < self.providers.len()
    }

    fn name(&self, provider: usize) -> &str {
        self.providers
            .get(provider)
            .map(|p| p.name.as_str())
            .unwrap_or("?")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TileConfig;

    fn chain() -> RemoteChain {
        RemoteChain::from_config(&TileConfig::default())
    }

    fn started() -> RemoteChain {
        let mut chain = chain();
        chain.start();
        chain
    }

    #[test]
    fn test_start_activates_first_provider() {
        let mut chain = chain();
        let effects = chain.start();
        assert_eq!(
            effects,
            vec![
                TileEffect::ShowOverlay {
                    dismiss_after: Duration::from_secs(15)
                },
                TileEffect::ActivateLayer { provider: 0 },
                TileEffect::ScheduleWatchdog {
                    provider: 0,
                    after: Duration::from_secs(10)
                },
            ]
        );
        assert_eq!(chain.state(), ResolverState::Loading(0));
        assert!(chain.start().is_empty());
    }

    #[test]
    fn test_switch_scheduled_after_threshold() {
        let mut chain = started();
        for _ in 0..5 {
            assert!(chain.tile_error(0).is_empty());
        }
        let effects = chain.tile_error(0);
        assert_eq!(
            effects,
            vec![TileEffect::ScheduleSwitch {
                provider: 0,
                after: Duration::from_secs(1)
            }]
        );
        assert_eq!(chain.state(), ResolverState::Failed(0));

        // Only one switch may be pending
        assert!(chain.tile_error(0).is_empty());

        let effects = chain.switch_due(0);
        assert_eq!(effects[0], TileEffect::ActivateLayer { provider: 1 });
        assert_eq!(chain.state(), ResolverState::Loading(1));
        assert_eq!(chain.error_count(), 0);
    }

    #[test]
    fn test_watchdog_switches_when_nothing_rendered() {
        let mut chain = started();
        let effects = chain.watchdog_fired(0, 0);
        assert_eq!(effects[0], TileEffect::ActivateLayer { provider: 1 });
        assert_eq!(chain.state(), ResolverState::Loading(1));
    }

    #[test]
    fn test_watchdog_ignored_once_tiles_render() {
        let mut chain = started();
        chain.tile_loaded(0);
        assert!(chain.watchdog_fired(0, 1).is_empty());
        assert_eq!(chain.state(), ResolverState::Loading(0));
    }

    #[test]
    fn test_stale_events_are_ignored() {
        let mut chain = started();
        chain.watchdog_fired(0, 0);
        assert_eq!(chain.state(), ResolverState::Loading(1));

        for _ in 0..10 {
            assert!(chain.tile_error(0).is_empty());
        }
        assert!(chain.all_loaded(0).is_empty());
        assert!(chain.switch_due(0).is_empty());
        assert!(chain.watchdog_fired(0, 0).is_empty());
        assert_eq!(chain.state(), ResolverState::Loading(1));
        assert_eq!(chain.error_count(), 0);
    }

    #[test]
    fn test_success_stops_switching() {
        let mut chain = started();
        chain.tile_loaded(0);
        chain.all_loaded(0);
        assert_eq!(chain.state(), ResolverState::Succeeded(0));
        for _ in 0..10 {
            assert!(chain.tile_error(0).is_empty());
        }
        assert!(chain.watchdog_fired(0, 0).is_empty());
        assert_eq!(chain.state(), ResolverState::Succeeded(0));
    }

    #[test]
    fn test_exhausting_last_provider_shows_error_panel() {
        let mut chain = started();
        chain.watchdog_fired(0, 0);
        chain.watchdog_fired(1, 0);
        assert_eq!(chain.state(), ResolverState::Loading(2));

        for _ in 0..5 {
            chain.tile_error(2);
        }
        let effects = chain.tile_error(2);
        assert_eq!(
            effects,
            vec![TileEffect::ShowErrorPanel {
                message: ALL_FAILED_MESSAGE.to_string()
            }]
        );
        assert_eq!(chain.state(), ResolverState::AllFailed);
    }

    #[test]
    fn test_empty_chain_fails_immediately() {
        let mut chain = RemoteChain::new(Vec::new(), 5);
        let effects = chain.start();
        assert!(matches!(effects.last(), Some(TileEffect::ShowErrorPanel { .. })));
        assert_eq!(chain.state(), ResolverState::AllFailed);
    }
}
