use std::fmt;

const NOT_AUTHENTICATED: &str = "User not authenticated";
const FALLBACK_FETCH_MESSAGE: &str = "Failed to fetch predictions";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    NotAuthenticated,
    FetchFailed(String),
}

impl FetchError {
    pub fn fetch_failed(message: impl Into<String>) -> Self {
        let message = message.into();
        if message.trim().is_empty() {
            FetchError::FetchFailed(FALLBACK_FETCH_MESSAGE.to_string())
        } else {
            FetchError::FetchFailed(message)
        }
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::NotAuthenticated => f.write_str(NOT_AUTHENTICATED),
            FetchError::FetchFailed(message) => f.write_str(message),
        }
    }
}

impl std::error::Error for FetchError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_authenticated_message_is_stable() {
        assert_eq!(FetchError::NotAuthenticated.to_string(), "User not authenticated");
    }

    #[test]
    fn empty_failure_message_gets_fallback() {
        assert_eq!(
            FetchError::fetch_failed("  ").to_string(),
            "Failed to fetch predictions"
        );
        assert_eq!(FetchError::fetch_failed("boom").to_string(), "boom");
    }
}
