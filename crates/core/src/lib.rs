pub mod display;
pub mod domain;
pub mod identity;
pub mod ingest;
pub mod store;

pub mod config {
    use anyhow::Context;

    const DEFAULT_TIMEOUT_SECS: u64 = 30;
    const DEFAULT_PAGE_SIZE: u32 = 100;
    const DEFAULT_FRESHNESS_MINS: i64 = 30;
    const MAX_FRESHNESS_MINS: i64 = 60 * 24 * 365;

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub predictions_api_base_url: Option<String>,
        pub predictions_api_token: Option<String>,
        pub predictions_api_timeout_secs: u64,
        pub page_size: u32,
        pub freshness_mins: i64,
        pub sentry_dsn: Option<String>,
    }

    impl Default for Settings {
        fn default() -> Self {
            Self {
                predictions_api_base_url: None,
                predictions_api_token: None,
                predictions_api_timeout_secs: DEFAULT_TIMEOUT_SECS,
                page_size: DEFAULT_PAGE_SIZE,
                freshness_mins: DEFAULT_FRESHNESS_MINS,
                sentry_dsn: None,
            }
        }
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            let page_size = parse_env("PREDICTIONS_PAGE_SIZE")?.unwrap_or(DEFAULT_PAGE_SIZE);
            anyhow::ensure!(page_size >= 1, "PREDICTIONS_PAGE_SIZE must be >= 1");

            let freshness_mins =
                parse_env("PREDICTIONS_FRESHNESS_MINS")?.unwrap_or(DEFAULT_FRESHNESS_MINS);
            anyhow::ensure!(
                (0..=MAX_FRESHNESS_MINS).contains(&freshness_mins),
                "PREDICTIONS_FRESHNESS_MINS must be between 0 and {MAX_FRESHNESS_MINS} (got {freshness_mins})"
            );

            Ok(Self {
                predictions_api_base_url: non_empty_var("PREDICTIONS_API_BASE_URL"),
                predictions_api_token: non_empty_var("PREDICTIONS_API_TOKEN"),
                predictions_api_timeout_secs: parse_env("PREDICTIONS_API_TIMEOUT_SECS")?
                    .unwrap_or(DEFAULT_TIMEOUT_SECS),
                page_size,
                freshness_mins,
                sentry_dsn: non_empty_var("SENTRY_DSN"),
            })
        }

        pub fn require_predictions_api_base_url(&self) -> anyhow::Result<&str> {
            self.predictions_api_base_url
                .as_deref()
                .context("PREDICTIONS_API_BASE_URL is required")
        }

        pub fn freshness_window(&self) -> chrono::Duration {
            chrono::Duration::minutes(self.freshness_mins.clamp(0, MAX_FRESHNESS_MINS))
        }
    }

    fn non_empty_var(key: &str) -> Option<String> {
        std::env::var(key).ok().filter(|s| !s.trim().is_empty())
    }

    fn parse_env<T>(key: &str) -> anyhow::Result<Option<T>>
    where
        T: std::str::FromStr,
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        match non_empty_var(key) {
            Some(raw) => raw
                .trim()
                .parse::<T>()
                .map(Some)
                .with_context(|| format!("{key} is not a valid number: {raw}")),
            None => Ok(None),
        }
    }

}
