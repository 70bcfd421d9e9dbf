use crate::config::Settings;
use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::StatusCode;
use serde_json::Value;
use std::fmt;
use std::time::Duration;

const DEFAULT_RETRIES: u32 = 2;
const MAX_DETAIL_CHARS: usize = 200;

const DEFAULT_SCOPED_ANNUAL_PATH: &str = "/predictions/annual";
const DEFAULT_SCOPED_QUARTERLY_PATH: &str = "/predictions/quarterly";
const DEFAULT_PLATFORM_ANNUAL_PATH: &str = "/predictions/annual/system";
const DEFAULT_PLATFORM_QUARTERLY_PATH: &str = "/predictions/quarterly/system";

#[async_trait::async_trait]
pub trait PredictionEndpoints: Send + Sync {
    async fn get_scoped_annual(&self, page: u32, size: u32) -> Result<Value>;

    async fn get_scoped_quarterly(&self, page: u32, size: u32) -> Result<Value>;

    async fn get_platform_annual(&self, page: u32, size: u32) -> Result<Value>;

    async fn get_platform_quarterly(&self, page: u32, size: u32) -> Result<Value>;
}

#[derive(Debug, Clone)]
pub struct EndpointError {
    pub endpoint: String,
    pub status: Option<u16>,
    pub detail: String,
}

impl EndpointError {
    pub fn is_unauthorized(&self) -> bool {
        self.status == Some(StatusCode::UNAUTHORIZED.as_u16())
    }
}

impl fmt::Display for EndpointError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(
                f,
                "prediction endpoint error (endpoint={}, status={status}): {}",
                self.endpoint, self.detail
            ),
            None => write!(
                f,
                "prediction endpoint error (endpoint={}): {}",
                self.endpoint, self.detail
            ),
        }
    }
}

impl std::error::Error for EndpointError {}

#[derive(Debug, Clone)]
struct EndpointPaths {
    scoped_annual: String,
    scoped_quarterly: String,
    platform_annual: String,
    platform_quarterly: String,
}

impl EndpointPaths {
    fn from_env() -> Self {
        Self {
            scoped_annual: path_from_env(
                "PREDICTIONS_SCOPED_ANNUAL_PATH",
                DEFAULT_SCOPED_ANNUAL_PATH,
            ),
            scoped_quarterly: path_from_env(
                "PREDICTIONS_SCOPED_QUARTERLY_PATH",
                DEFAULT_SCOPED_QUARTERLY_PATH,
            ),
            platform_annual: path_from_env(
                "PREDICTIONS_PLATFORM_ANNUAL_PATH",
                DEFAULT_PLATFORM_ANNUAL_PATH,
            ),
            platform_quarterly: path_from_env(
                "PREDICTIONS_PLATFORM_QUARTERLY_PATH",
                DEFAULT_PLATFORM_QUARTERLY_PATH,
            ),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpPredictionEndpoints {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
    paths: EndpointPaths,
    retries: u32,
}

impl HttpPredictionEndpoints {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let base_url = settings.require_predictions_api_base_url()?.to_string();
        let token = settings.predictions_api_token.clone();

        let retries = std::env::var("PREDICTIONS_API_RETRIES")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(DEFAULT_RETRIES)
            .max(1);

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.predictions_api_timeout_secs))
            .build()
            .context("failed to build predictions http client")?;

        Ok(Self {
            http,
            base_url,
            token,
            paths: EndpointPaths::from_env(),
            retries,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        if let Some(token) = &self.token {
            headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {token}"))?);
        }
        Ok(headers)
    }

    async fn fetch_once(&self, path: &str, page: u32, size: u32) -> Result<Value> {
        let res = self
            .http
            .get(self.url(path))
            .headers(self.headers()?)
            .query(&[("page", page), ("size", size)])
            .send()
            .await
            .with_context(|| format!("predictions request failed (endpoint={path})"))?;

        let status = res.status();
        let text = res
            .text()
            .await
            .with_context(|| format!("failed to read predictions response (endpoint={path})"))?;

        if !status.is_success() {
            return Err(EndpointError {
                endpoint: path.to_string(),
                status: Some(status.as_u16()),
                detail: body_excerpt(&text),
            }
            .into());
        }

        serde_json::from_str::<Value>(&text).with_context(|| {
            format!(
                "predictions response is not valid JSON (endpoint={path}, bytes={})",
                text.len()
            )
        })
    }

    async fn fetch_page(&self, path: &str, page: u32, size: u32) -> Result<Value> {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match self.fetch_once(path, page, size).await {
                Ok(body) => return Ok(body),
                Err(err) => {
                    if attempt >= self.retries || !is_retryable(&err) {
                        return Err(err);
                    }
                    let backoff = Duration::from_millis(250 << (attempt - 1));
                    tracing::warn!(
                        attempt,
                        endpoint = path,
                        ?backoff,
                        error = %err,
                        "predictions fetch failed; retrying"
                    );
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }
}

#[async_trait::async_trait]
impl PredictionEndpoints for HttpPredictionEndpoints {
    async fn get_scoped_annual(&self, page: u32, size: u32) -> Result<Value> {
        self.fetch_page(&self.paths.scoped_annual, page, size).await
    }

    async fn get_scoped_quarterly(&self, page: u32, size: u32) -> Result<Value> {
        self.fetch_page(&self.paths.scoped_quarterly, page, size).await
    }

    async fn get_platform_annual(&self, page: u32, size: u32) -> Result<Value> {
        self.fetch_page(&self.paths.platform_annual, page, size).await
    }

    async fn get_platform_quarterly(&self, page: u32, size: u32) -> Result<Value> {
        self.fetch_page(&self.paths.platform_quarterly, page, size).await
    }
}

fn is_retryable(err: &anyhow::Error) -> bool {
    match err.downcast_ref::<EndpointError>() {
        Some(e) => !matches!(e.status, Some(s) if (400..500).contains(&s)),
        None => true,
    }
}

fn body_excerpt(text: &str) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    match collapsed.char_indices().nth(MAX_DETAIL_CHARS) {
        Some((cut, _)) => format!("{}...", &collapsed[..cut]),
        None => collapsed,
    }
}

fn path_from_env(key: &str, default: &str) -> String {
    let path = std::env::var(key)
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| default.to_string());
    if path.starts_with('/') {
        path
    } else {
        format!("/{path}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint_error(status: Option<u16>) -> anyhow::Error {
        EndpointError {
            endpoint: "/predictions/annual".to_string(),
            status,
            detail: "nope".to_string(),
        }
        .into()
    }

    #[test]
    fn client_errors_are_not_retried() {
        assert!(!is_retryable(&endpoint_error(Some(401))));
        assert!(!is_retryable(&endpoint_error(Some(404))));
        assert!(is_retryable(&endpoint_error(Some(503))));
        assert!(is_retryable(&anyhow::anyhow!("connection reset")));
    }

    #[test]
    fn display_includes_endpoint_and_status() {
        let err = EndpointError {
            endpoint: "/predictions/quarterly".to_string(),
            status: Some(401),
            detail: "token expired".to_string(),
        };
        assert!(err.is_unauthorized());
        assert_eq!(
            err.to_string(),
            "prediction endpoint error (endpoint=/predictions/quarterly, status=401): token expired"
        );
    }

    #[test]
    fn error_detail_is_a_short_single_line_excerpt() {
        let page = format!("<html>\n<body>{}</body>\n</html>", "Bad Gateway ".repeat(100));
        let excerpt = body_excerpt(&page);
        assert!(!excerpt.contains('\n'));
        assert!(excerpt.starts_with("<html> <body>Bad Gateway"));
        assert_eq!(excerpt.chars().count(), MAX_DETAIL_CHARS + 3);
        assert!(excerpt.ends_with("..."));

        assert_eq!(body_excerpt("  token   expired "), "token expired");
    }

    #[test]
    fn url_joins_base_and_path() {
        let settings = Settings {
            predictions_api_base_url: Some("https://api.example.com/v1/".to_string()),
            ..Settings::default()
        };
        let client = HttpPredictionEndpoints::from_settings(&settings).unwrap();
        assert_eq!(
            client.url("/predictions/annual"),
            "https://api.example.com/v1/predictions/annual"
        );
    }

    #[test]
    fn from_settings_requires_base_url() {
        assert!(HttpPredictionEndpoints::from_settings(&Settings::default()).is_err());
    }
}
