// src/utils/http.rs

//! HTTP client utilities.

use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue};

use crate::error::{AppError, Result};
use crate::models::GithubConfig;

const API_VERSION_HEADER: &str = "x-github-api-version";
const API_VERSION: &str = "2022-11-28";

/// Create a configured asynchronous HTTP client for the search API.
pub fn create_async_client(config: &GithubConfig) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(&config.user_agent)
        .timeout(config.timeout())
        .default_headers(default_headers(config.token.as_deref())?)
        .build()?;
    Ok(client)
}

/// Headers sent with every API request.
pub fn default_headers(token: Option<&str>) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("application/vnd.github+json"),
    );
    headers.insert(API_VERSION_HEADER, HeaderValue::from_static(API_VERSION));

    if let Some(token) = token.map(str::trim).filter(|t| !t.is_empty()) {
        let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|_| AppError::config("github.token contains invalid characters"))?;
        value.set_sensitive(true);
        headers.insert(AUTHORIZATION, value);
    }

    Ok(headers)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headers_without_token() {
        let headers = default_headers(None).unwrap();
        assert!(headers.get(AUTHORIZATION).is_none());
        assert_eq!(headers[API_VERSION_HEADER], API_VERSION);
    }

    #[test]
    fn test_headers_with_token() {
        let headers = default_headers(Some(" ghp_abc ")).unwrap();
        assert_eq!(headers[AUTHORIZATION], "Bearer ghp_abc");
        assert!(headers[AUTHORIZATION].is_sensitive());
    }

    #[test]
    fn test_blank_token_is_ignored() {
        let headers = default_headers(Some("  ")).unwrap();
        assert!(headers.get(AUTHORIZATION).is_none());
    }

    #[test]
    fn test_invalid_token_is_config_error() {
        assert!(matches!(
            default_headers(Some("bad\ntoken")),
            Err(AppError::Config(_))
        ));
    }
}
