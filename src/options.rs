use std::time::Duration;

const DEFAULT_MAX_RETRIES: usize = 3;
const DEFAULT_MAX_JITTER_MS: u64 = 10;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// How the attempt loop treats a successful response.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum LoopMode {
    /// Stop on the first successful response.
    #[default]
    FirstSuccess,
    /// Keep issuing requests until the attempt budget is spent and return the
    /// response of the last attempt. Superseded responses are drained.
    Exhaust,
}

/// Configures timeout, retry and connection pooling behavior.
///
/// Values are plain data; use [`ClientOptions::sanitized`] to replace
/// out-of-range values with the defaults before handing them to a client.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ClientOptions {
    /// Attempt budget for a retried call. Must be at least 1.
    pub max_retries: usize,
    /// Upper bound (exclusive) of the random jitter factor in milliseconds.
    /// Zero disables jitter.
    pub max_jitter_ms: u64,
    /// Per-attempt transport timeout, also the default call deadline.
    pub timeout: Duration,
    /// Maximum idle pooled connections kept per host.
    pub max_idle_connections_per_host: Option<usize>,
    /// How long an idle pooled connection is kept.
    pub idle_connection_timeout: Option<Duration>,
    /// Maximum number of redirects followed; `Some(0)` disables redirects.
    pub redirect_limit: Option<usize>,
    /// Optional ceiling for a single backoff wait. `None` leaves the
    /// exponential growth uncapped.
    pub max_backoff: Option<Duration>,
    /// Attempt loop behavior after a successful response.
    pub loop_mode: LoopMode,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            max_jitter_ms: DEFAULT_MAX_JITTER_MS,
            timeout: DEFAULT_TIMEOUT,
            max_idle_connections_per_host: None,
            idle_connection_timeout: None,
            redirect_limit: None,
            max_backoff: None,
            loop_mode: LoopMode::FirstSuccess,
        }
    }
}

impl ClientOptions {
    /// Reads options from `RESILIENT_HTTP_*` environment variables.
    ///
    /// Recognized variables:
    /// - `RESILIENT_HTTP_MAX_RETRIES`
    /// - `RESILIENT_HTTP_MAX_JITTER_MS`
    /// - `RESILIENT_HTTP_TIMEOUT_MS`
    /// - `RESILIENT_HTTP_MAX_IDLE_PER_HOST`
    /// - `RESILIENT_HTTP_IDLE_TIMEOUT_MS`
    ///
    /// Missing variables keep their default. A present but unparsable value
    /// is an error.
    pub fn from_env() -> std::result::Result<Self, String> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> std::result::Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let parse = |key: &str| -> std::result::Result<Option<u64>, String> {
            match lookup(key) {
                None => Ok(None),
                Some(raw) => raw
                    .trim()
                    .parse::<u64>()
                    .map(Some)
                    .map_err(|err| format!("invalid {key} value '{raw}': {err}")),
            }
        };

        let mut options = Self::default();
        if let Some(value) = parse("RESILIENT_HTTP_MAX_RETRIES")? {
            options.max_retries = value as usize;
        }
        if let Some(value) = parse("RESILIENT_HTTP_MAX_JITTER_MS")? {
            options.max_jitter_ms = value;
        }
        if let Some(value) = parse("RESILIENT_HTTP_TIMEOUT_MS")? {
            options.timeout = Duration::from_millis(value);
        }
        if let Some(value) = parse("RESILIENT_HTTP_MAX_IDLE_PER_HOST")? {
            options.max_idle_connections_per_host = Some(value as usize);
        }
        if let Some(value) = parse("RESILIENT_HTTP_IDLE_TIMEOUT_MS")? {
            options.idle_connection_timeout = Some(Duration::from_millis(value));
        }
        Ok(options.sanitized())
    }

    /// Replaces a zero attempt budget and a zero timeout with the defaults.
    pub fn sanitized(mut self) -> Self {
        if self.max_retries == 0 {
            self.max_retries = DEFAULT_MAX_RETRIES;
        }
        if self.timeout.is_zero() {
            self.timeout = DEFAULT_TIMEOUT;
        }
        self
    }

    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_max_jitter_ms(mut self, max_jitter_ms: u64) -> Self {
        self.max_jitter_ms = max_jitter_ms;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_idle_connections_per_host(mut self, max_idle: usize) -> Self {
        self.max_idle_connections_per_host = Some(max_idle);
        self
    }

    pub fn with_idle_connection_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_connection_timeout = Some(idle_timeout);
        self
    }

    pub fn with_redirect_limit(mut self, limit: usize) -> Self {
        self.redirect_limit = Some(limit);
        self
    }

    pub fn with_max_backoff(mut self, max_backoff: Duration) -> Self {
        self.max_backoff = Some(max_backoff);
        self
    }

    pub fn with_loop_mode(mut self, loop_mode: LoopMode) -> Self {
        self.loop_mode = loop_mode;
        self
    }

    /// Whether any pooling knob was set explicitly.
    pub fn has_pool_overrides(&self) -> bool {
        self.max_idle_connections_per_host.is_some() || self.idle_connection_timeout.is_some()
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::HashMap, time::Duration};

    use super::{ClientOptions, LoopMode};

    #[test]
    fn defaults_match_documented_values() {
        let options = ClientOptions::default();
        assert_eq!(options.max_retries, 3);
        assert_eq!(options.max_jitter_ms, 10);
        assert_eq!(options.timeout, Duration::from_secs(30));
        assert_eq!(options.loop_mode, LoopMode::FirstSuccess);
        assert!(options.max_backoff.is_none());
        assert!(!options.has_pool_overrides());
    }

    #[test]
    fn sanitized_restores_zero_budget_and_timeout() {
        let options = ClientOptions::default()
            .with_max_retries(0)
            .with_timeout(Duration::ZERO)
            .sanitized();
        assert_eq!(options.max_retries, 3);
        assert_eq!(options.timeout, Duration::from_secs(30));
    }

    #[test]
    fn sanitized_keeps_zero_jitter() {
        let options = ClientOptions::default().with_max_jitter_ms(0).sanitized();
        assert_eq!(options.max_jitter_ms, 0);
    }

    #[test]
    fn lookup_overrides_defaults() {
        let vars: HashMap<&str, &str> = [
            ("RESILIENT_HTTP_MAX_RETRIES", "5"),
            ("RESILIENT_HTTP_TIMEOUT_MS", "1500"),
            ("RESILIENT_HTTP_MAX_IDLE_PER_HOST", "20"),
        ]
        .into_iter()
        .collect();

        let options =
            ClientOptions::from_lookup(|key| vars.get(key).map(|value| value.to_string()))
                .expect("must parse");
        assert_eq!(options.max_retries, 5);
        assert_eq!(options.timeout, Duration::from_millis(1500));
        assert_eq!(options.max_idle_connections_per_host, Some(20));
        assert!(options.has_pool_overrides());
    }

    #[test]
    fn lookup_rejects_garbage() {
        let err = ClientOptions::from_lookup(|key| {
            (key == "RESILIENT_HTTP_MAX_JITTER_MS").then(|| "ten".to_owned())
        })
        .expect_err("must fail");
        assert!(err.contains("RESILIENT_HTTP_MAX_JITTER_MS"));
    }
}
