// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Runtime configuration shared by every demo.
//!
//! This module holds the knobs that are not part of a graph description:
//! how long the lifecycle controller waits on the pipeline, and which
//! environment variables the display sink needs to reach the compositor.

use std::time::Duration;

use tracing::debug;

/// Default bound for the state query made inside the interrupt handler.
pub const DEFAULT_STATE_QUERY_TIMEOUT: Duration = Duration::from_secs(2);

/// Default time to wait for EOS to reach every sink after an interrupt.
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Longest accepted drain timeout, in seconds (one day).
pub const MAX_DRAIN_TIMEOUT_SECS: u64 = 86_400;

/// Longest accepted state query timeout, in milliseconds.
pub const MAX_STATE_QUERY_TIMEOUT_MS: u64 = 60_000;

/// Default Wayland runtime directory on the target platform.
pub const DEFAULT_XDG_RUNTIME_DIR: &str = "/dev/socket/weston";

/// Default Wayland display name on the target platform.
pub const DEFAULT_WAYLAND_DISPLAY: &str = "wayland-1";

/// Timing parameters of the [`crate::Controller`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecycleConfig {
    /// Upper bound for the blocking "is the pipeline playing?" query.
    pub state_query_timeout: Duration,

    /// Upper bound for the Draining state. `None` waits forever.
    pub drain_timeout: Option<Duration>,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        LifecycleConfig {
            state_query_timeout: DEFAULT_STATE_QUERY_TIMEOUT,
            drain_timeout: Some(DEFAULT_DRAIN_TIMEOUT),
        }
    }
}

impl LifecycleConfig {
    /// Builds a configuration from command-line style values.
    ///
    /// A drain timeout of zero seconds disables the timeout. Values above
    /// [`MAX_DRAIN_TIMEOUT_SECS`] and [`MAX_STATE_QUERY_TIMEOUT_MS`] are
    /// clamped.
    pub fn from_cli(state_timeout_ms: u64, drain_timeout_secs: u64) -> Self {
        LifecycleConfig {
            state_query_timeout: Duration::from_millis(state_timeout_ms),
            drain_timeout: (drain_timeout_secs > 0).then(|| Duration::from_secs(drain_timeout_secs)),
        }
        .bounded()
    }

    /// Copy with both timeouts clamped to their maximum.
    pub fn bounded(self) -> Self {
        LifecycleConfig {
            state_query_timeout: self
                .state_query_timeout
                .min(Duration::from_millis(MAX_STATE_QUERY_TIMEOUT_MS)),
            drain_timeout: self
                .drain_timeout
                .map(|timeout| timeout.min(Duration::from_secs(MAX_DRAIN_TIMEOUT_SECS))),
        }
    }
}

/// Environment the display sink needs to find the compositor socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayEnvironment {
    /// Value for `XDG_RUNTIME_DIR`.
    pub xdg_runtime_dir: String,

    /// Value for `WAYLAND_DISPLAY`.
    pub wayland_display: String,
}

impl Default for DisplayEnvironment {
    fn default() -> Self {
        DisplayEnvironment {
            xdg_runtime_dir: DEFAULT_XDG_RUNTIME_DIR.to_owned(),
            wayland_display: DEFAULT_WAYLAND_DISPLAY.to_owned(),
        }
    }
}

impl DisplayEnvironment {
    /// Returns the `(name, value)` pairs that are not yet present in the
    /// process environment.
    pub fn missing_vars(&self) -> Vec<(&'static str, &str)> {
        [
            ("XDG_RUNTIME_DIR", self.xdg_runtime_dir.as_str()),
            ("WAYLAND_DISPLAY", self.wayland_display.as_str()),
        ]
        .into_iter()
        .filter(|(name, _)| std::env::var_os(name).is_none())
        .collect()
    }

    /// Exports the variables that are not set already. Values inherited from
    /// the caller's environment win.
    ///
    /// Must be called before any thread is spawned (in practice: first thing
    /// in `main`, before the media runtime is initialized).
    pub fn apply(&self) {
        for (name, value) in self.missing_vars() {
            debug!("Setting {}={}", name, value);
            // SAFETY: called from the main thread before the runtime or any
            // other thread exists.
            unsafe { std::env::set_var(name, value) };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_drain_timeout_disables_it() {
        let config = LifecycleConfig::from_cli(500, 0);
        assert_eq!(config.state_query_timeout, Duration::from_millis(500));
        assert_eq!(config.drain_timeout, None);

        let config = LifecycleConfig::from_cli(500, 3);
        assert_eq!(config.drain_timeout, Some(Duration::from_secs(3)));
    }

    #[test]
    fn huge_timeouts_are_clamped() {
        let config = LifecycleConfig::from_cli(u64::MAX, 4_294_968);
        assert_eq!(
            config.state_query_timeout,
            Duration::from_millis(MAX_STATE_QUERY_TIMEOUT_MS)
        );
        assert_eq!(
            config.drain_timeout,
            Some(Duration::from_secs(MAX_DRAIN_TIMEOUT_SECS))
        );
        assert!(MAX_DRAIN_TIMEOUT_SECS * 1_000 < u64::from(u32::MAX));

        let config = LifecycleConfig {
            state_query_timeout: Duration::MAX,
            drain_timeout: Some(Duration::MAX),
        }
        .bounded();
        assert_eq!(config, LifecycleConfig::from_cli(u64::MAX, u64::MAX));
    }

    #[test]
    fn defaults_are_bounded() {
        let config = LifecycleConfig::default();
        assert!(config.state_query_timeout > Duration::ZERO);
        assert_eq!(config.drain_timeout, Some(DEFAULT_DRAIN_TIMEOUT));
    }
}
