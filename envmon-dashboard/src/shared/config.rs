/// Dashboard configuration
///
/// Defaults target a backend on localhost; every field can be overridden
/// from the environment (see [`DashboardConfig::from_env`]).

use std::time::Duration;

use super::history::DEFAULT_HISTORY_CAPACITY;
use super::websocket::FeedConfig;

pub const DEFAULT_API_URL: &str = "http://localhost:8080/api";
pub const DEFAULT_HISTORY_LIMIT: usize = 30;

#[derive(Debug, Clone)]
pub struct DashboardConfig {
    /// REST API root
    pub api_url: String,
    /// Number of samples requested from the history endpoint
    pub history_limit: usize,
    /// Maximum samples kept for the chart
    pub history_capacity: usize,
    /// Live feed settings
    pub feed: FeedConfig,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            history_limit: DEFAULT_HISTORY_LIMIT,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            feed: FeedConfig::default(),
        }
    }
}

impl DashboardConfig {
    /// Defaults overridden by `ENVMON_*` environment variables.
    ///
    /// - `ENVMON_API_URL`: REST API root
    /// - `ENVMON_WS_URL`: STOMP WebSocket endpoint
    /// - `ENVMON_TOPIC`: topic carrying live samples
    /// - `ENVMON_HISTORY_LIMIT`: samples requested at startup
    /// - `ENVMON_HISTORY_CAPACITY`: chart window size
    /// - `ENVMON_RECONNECT_SECS`: delay between reconnection attempts
    ///
    /// Unparseable numbers fall back to the default, as does a zero
    /// reconnect delay.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`DashboardConfig::from_env`] with a custom variable source
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let number = |key: &str| lookup(key).and_then(|v| v.trim().parse::<u64>().ok());

        let mut feed = defaults.feed;
        if let Some(url) = lookup("ENVMON_WS_URL") {
            feed.url = url;
        }
        if let Some(topic) = lookup("ENVMON_TOPIC") {
            feed.topic = topic;
        }
        if let Some(secs) = number("ENVMON_RECONNECT_SECS").filter(|secs| *secs > 0) {
            feed.reconnect_delay = Duration::from_secs(secs);
        }

        Self {
            api_url: lookup("ENVMON_API_URL").unwrap_or(defaults.api_url),
            history_limit: number("ENVMON_HISTORY_LIMIT")
                .map(|n| n as usize)
                .unwrap_or(defaults.history_limit),
            history_capacity: number("ENVMON_HISTORY_CAPACITY")
                .map(|n| n as usize)
                .unwrap_or(defaults.history_capacity),
            feed,
        }
    }

    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    pub fn with_history_capacity(mut self, capacity: usize) -> Self {
        self.history_capacity = capacity;
        self
    }

    pub fn with_feed(mut self, feed: FeedConfig) -> Self {
        self.feed = feed;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = DashboardConfig::from_lookup(lookup(&[]));
        assert_eq!(config.api_url, "http://localhost:8080/api");
        assert_eq!(config.history_limit, 30);
        assert_eq!(config.history_capacity, 30);
        assert_eq!(config.feed.url, "ws://localhost:8080/ws/websocket");
        assert_eq!(config.feed.topic, "/topic/environment");
        assert_eq!(config.feed.reconnect_delay, Duration::from_secs(5));
    }

    #[test]
    fn test_env_overrides() {
        let config = DashboardConfig::from_lookup(lookup(&[
            ("ENVMON_API_URL", "http://pi.local:9000/api"),
            ("ENVMON_WS_URL", "ws://pi.local:9000/ws/websocket"),
            ("ENVMON_TOPIC", "/topic/greenhouse"),
            ("ENVMON_HISTORY_LIMIT", "100"),
            ("ENVMON_HISTORY_CAPACITY", " 60 "),
            ("ENVMON_RECONNECT_SECS", "2"),
        ]));

        assert_eq!(config.api_url, "http://pi.local:9000/api");
        assert_eq!(config.feed.url, "ws://pi.local:9000/ws/websocket");
        assert_eq!(config.feed.topic, "/topic/greenhouse");
        assert_eq!(config.history_limit, 100);
        assert_eq!(config.history_capacity, 60);
        assert_eq!(config.feed.reconnect_delay, Duration::from_secs(2));
    }

    #[test]
    fn test_bad_numbers_fall_back() {
        let config = DashboardConfig::from_lookup(lookup(&[
            ("ENVMON_HISTORY_LIMIT", "lots"),
            ("ENVMON_RECONNECT_SECS", "-1"),
        ]));
        assert_eq!(config.history_limit, DEFAULT_HISTORY_LIMIT);
        assert_eq!(config.feed.reconnect_delay, Duration::from_secs(5));

        let config = DashboardConfig::from_lookup(lookup(&[("ENVMON_RECONNECT_SECS", "0")]));
        assert_eq!(config.feed.reconnect_delay, Duration::from_secs(5));
    }
}
