/**
 * Settings for watching one `ConfigMap`
 */
use std::time::Duration;

/// Consecutive failed subscriptions tolerated before the watch is abandoned
pub const MAX_WATCH_RESTARTS: u32 = 50;

/// Ceiling for the delay between failed subscriptions
pub const MAX_BACKOFF_SECONDS: u64 = 60;

/// Delay after the first failure; it doubles on every further failure
pub const INITIAL_BACKOFF_SECONDS: u64 = 1;

/// Server-side lifetime of one watch request. kube refuses values of 295 or more.
pub const WATCH_TIMEOUT_SECONDS: u32 = 294;

/// How long the program runs before it stops watching
pub const DEFAULT_RUN_SECONDS: u64 = 6000;

/// Namespace watched when none is given
pub const DEFAULT_NAMESPACE: &str = "l7cplane";

/// `ConfigMap` watched when none is given
pub const DEFAULT_CONFIGMAP_NAME: &str = "anjana-test-configmap";

/// Data key reported on every add/modify
pub const DEFAULT_WATCH_KEY: &str = "version";

/// What to watch and how hard to retry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchConfig {
    pub namespace: String,
    pub name: String,
    /// Data key printed when the object is added or modified
    pub key: String,
    pub max_restarts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub timeout_secs: u32,
}

impl WatchConfig {
    #[must_use]
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    #[must_use]
    pub const fn max_restarts(mut self, max_restarts: u32) -> Self {
        self.max_restarts = max_restarts;
        self
    }

    /// Field selector limiting a watch to this single object
    #[must_use]
    pub fn field_selector(&self) -> String {
        format!("metadata.name={}", self.name)
    }

    #[must_use]
    pub const fn backoff(&self) -> Backoff {
        Backoff::new(self.initial_backoff, self.max_backoff)
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            name: DEFAULT_CONFIGMAP_NAME.to_string(),
            key: DEFAULT_WATCH_KEY.to_string(),
            max_restarts: MAX_WATCH_RESTARTS,
            initial_backoff: Duration::from_secs(INITIAL_BACKOFF_SECONDS),
            max_backoff: Duration::from_secs(MAX_BACKOFF_SECONDS),
            timeout_secs: WATCH_TIMEOUT_SECONDS,
        }
    }
}

/// Doubling delay between failed attempts, capped at `max`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    #[must_use]
    pub const fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max,
            current: initial,
        }
    }

    /// Delay to wait now; the following call returns twice as much
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current * 2).min(self.max);
        delay
    }

    /// Back to the initial delay after a successful run
    pub const fn reset(&mut self) {
        self.current = self.initial;
    }
}

const _: () = {
    assert!(MAX_WATCH_RESTARTS >= 1);
    assert!(INITIAL_BACKOFF_SECONDS >= 1 && INITIAL_BACKOFF_SECONDS <= MAX_BACKOFF_SECONDS);
    assert!(WATCH_TIMEOUT_SECONDS < 295);
};
