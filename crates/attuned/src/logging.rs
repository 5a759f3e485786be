//! Logging setup for attuned
//!
//! The subscriber goes in before the config is read so config load
//! warnings are not lost. It starts from RUST_LOG, or `info` when unset.
//! Once the config is known its `log_level` replaces the startup filter,
//! unless RUST_LOG was given.

use tracing::{debug, warn, Subscriber};
use tracing_subscriber::fmt::{self, MakeWriter};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{reload, EnvFilter, Registry};

/// Filter used until the config has been read
pub const STARTUP_FILTER: &str = "info";

/// Swaps the active filter after startup
pub struct LogHandle {
    handle: reload::Handle<EnvFilter, Registry>,
    from_env: bool,
}

impl LogHandle {
    /// Apply the configured level. Returns false when RUST_LOG takes
    /// precedence or the level does not parse.
    pub fn apply_level(&self, level: &str) -> bool {
        if self.from_env {
            debug!("RUST_LOG set, ignoring configured log level {}", level);
            return false;
        }
        let filter = match EnvFilter::try_new(level) {
            Ok(filter) => filter,
            Err(e) => {
                warn!("Invalid log_level '{}' ({}), keeping {}", level, e, STARTUP_FILTER);
                return false;
            }
        };
        match self.handle.reload(filter) {
            Ok(()) => true,
            Err(e) => {
                warn!("Could not apply log_level '{}': {}", level, e);
                false
            }
        }
    }
}

/// Build the subscriber without installing it.
///
/// `env_filter` is the RUST_LOG filter if one was set.
pub fn subscriber<W>(
    env_filter: Option<EnvFilter>,
    writer: W,
) -> (impl Subscriber + Send + Sync + 'static, LogHandle)
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let from_env = env_filter.is_some();
    let (filter, handle) =
        reload::Layer::new(env_filter.unwrap_or_else(|| EnvFilter::new(STARTUP_FILTER)));
    let subscriber = Registry::default()
        .with(filter)
        .with(fmt::layer().with_writer(writer));
    (subscriber, LogHandle { handle, from_env })
}

/// Install the global subscriber writing to stdout.
pub fn init() -> LogHandle {
    let (subscriber, handle) = subscriber(EnvFilter::try_from_default_env().ok(), std::io::stdout);
    subscriber.init();
    handle
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use std::io;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<u8>>>);

    impl Capture {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl io::Write for Capture {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for Capture {
        type Writer = Capture;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[test]
    fn test_config_fallback_is_logged() {
        let capture = Capture::default();
        let (subscriber, _handle) = subscriber(None, capture.clone());
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.toml");

        let config = tracing::subscriber::with_default(subscriber, || {
            Config::load_from_candidates(
                Some(missing.display().to_string()),
                &[missing.as_path()],
            )
        });

        assert_eq!(config.daemon.bind_addr, Config::default().daemon.bind_addr);
        let out = capture.contents();
        assert!(out.contains("unreadable"), "{}", out);
        assert!(out.contains("using defaults"), "{}", out);
    }

    #[test]
    fn test_configured_level_narrows_filter() {
        let capture = Capture::default();
        let (subscriber, handle) = subscriber(None, capture.clone());

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!("visible at startup");
            assert!(handle.apply_level("warn"));
            tracing::info!("hidden after narrowing");
            tracing::warn!("warnings still pass");
        });

        let out = capture.contents();
        assert!(out.contains("visible at startup"));
        assert!(!out.contains("hidden after narrowing"));
        assert!(out.contains("warnings still pass"));
    }

    #[test]
    fn test_rust_log_wins_over_config() {
        let (_subscriber, handle) = subscriber(Some(EnvFilter::new("debug")), Capture::default());
        assert!(!handle.apply_level("warn"));
    }
}
