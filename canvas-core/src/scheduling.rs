//! Compose request scheduling.
//!
//! A drag produces a transform update per pointer move. Callers feed those
//! into a [`Debouncer`] and only send a compose request once the pointer has
//! been quiet for the configured window. Each request carries a
//! [`RequestToken`] from a [`ComposeSequencer`]; a response is applied only
//! if its token is still the latest issued, so a slow response can never
//! overwrite a newer render.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Monotonically increasing identifier for one compose request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestToken(u64);

impl RequestToken {
    /// Wrap a raw token value, e.g. one echoed back in a response header.
    #[must_use]
    pub const fn from_raw(value: u64) -> Self {
        Self(value)
    }

    /// The raw value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for RequestToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for RequestToken {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}

/// Issues request tokens and decides which completions are still current.
///
/// Shared by reference between the code issuing requests and the code
/// handling their completions; all operations take `&self`.
#[derive(Debug, Default)]
pub struct ComposeSequencer {
    latest: AtomicU64,
}

impl ComposeSequencer {
    /// Create a sequencer that has issued nothing.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a token newer than every token issued before.
    #[must_use]
    pub fn issue(&self) -> RequestToken {
        RequestToken(self.latest.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Whether `token` is the most recently issued one.
    #[must_use]
    pub fn is_current(&self, token: RequestToken) -> bool {
        self.latest.load(Ordering::SeqCst) == token.0
    }

    /// Decide whether a completed request may be applied.
    ///
    /// Returns `false` for superseded requests, whose results must be
    /// dropped.
    #[must_use]
    pub fn accept(&self, token: RequestToken) -> bool {
        let current = self.is_current(token);
        if !current {
            tracing::debug!(%token, latest = self.latest.load(Ordering::SeqCst), "stale compose result dropped");
        }
        current
    }
}

/// Quiet window for [`Debouncer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebounceConfig {
    /// Milliseconds without updates before a compose is triggered.
    pub window_ms: u64,
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self { window_ms: 250 }
    }
}

/// Coalesces bursts of updates into one trigger.
///
/// Time is supplied by the caller so the policy is independent of any clock.
#[derive(Debug, Clone, Default)]
pub struct Debouncer {
    config: DebounceConfig,
    last_update_ms: Option<u64>,
}

impl Debouncer {
    /// Create a debouncer with nothing pending.
    #[must_use]
    pub fn new(config: DebounceConfig) -> Self {
        Self {
            config,
            last_update_ms: None,
        }
    }

    /// Note an update at `now_ms`, restarting the quiet window.
    pub fn record(&mut self, now_ms: u64) {
        self.last_update_ms = Some(now_ms);
    }

    /// Whether an update is waiting for its window to elapse.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.last_update_ms.is_some()
    }

    /// Returns `true` exactly once per burst, when the window has elapsed
    /// since the last recorded update.
    pub fn ready(&mut self, now_ms: u64) -> bool {
        match self.last_update_ms {
            Some(last) if now_ms.saturating_sub(last) >= self.config.window_ms => {
                self.last_update_ms = None;
                true
            }
            _ => false,
        }
    }

    /// Drop any pending update.
    pub fn clear(&mut self) {
        self.last_update_ms = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_latest_token_is_accepted() {
        let seq = ComposeSequencer::new();
        let first = seq.issue();
        let second = seq.issue();
        assert!(second > first);

        assert!(!seq.accept(first));
        assert!(seq.accept(second));

        let third = seq.issue();
        assert!(!seq.accept(second));
        assert!(seq.is_current(third));
    }

    #[test]
    fn token_parses_from_header_value() {
        let token: RequestToken = " 42 ".parse().expect("parse");
        assert_eq!(token, RequestToken::from_raw(42));
        assert_eq!(token.to_string(), "42");
        assert!("abc".parse::<RequestToken>().is_err());
    }

    #[test]
    fn debouncer_fires_once_after_quiet_window() {
        let mut debounce = Debouncer::new(DebounceConfig { window_ms: 100 });
        assert!(!debounce.ready(0));

        debounce.record(0);
        debounce.record(40);
        debounce.record(80);
        assert!(!debounce.ready(150));
        assert!(debounce.ready(180));
        assert!(!debounce.ready(400));
        assert!(!debounce.is_pending());
    }

    #[test]
    fn clear_drops_pending_update() {
        let mut debounce = Debouncer::default();
        debounce.record(10);
        debounce.clear();
        assert!(!debounce.ready(10_000));
    }
}
