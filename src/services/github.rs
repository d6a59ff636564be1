//! GitHub search client.
//!
//! Runs one query against the repository or code search endpoint and yields
//! its results lazily, one page per request, until the API reports no
//! further pages or the configured page bound is reached.

use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use futures::stream::{self, StreamExt, TryStreamExt};
use regex::Regex;
use reqwest::header::{HeaderMap, LINK};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use url::Url;

use crate::error::{Result, SearchError};
use crate::models::{GithubConfig, RepoStatus, ResultRecord, SearchKind};
use crate::services::rate_limit::{DEFAULT_RETRY_AFTER, RateLimitSnapshot, RateLimiter};
use crate::services::{RecordStream, RepoStatusApi, SearchApi};
use crate::utils::http::create_async_client;

static NEXT_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<([^>]+)>\s*;\s*rel="next""#).expect("next-link pattern is valid")
});

/// Search client bound to one endpoint and page policy.
#[derive(Clone)]
pub struct GitHubClient {
    client: Client,
    config: Arc<GithubConfig>,
    limiter: Arc<RateLimiter>,
}

impl GitHubClient {
    /// Create a client from configuration.
    pub fn new(config: GithubConfig) -> Result<Self> {
        let client = create_async_client(&config)?;
        Ok(Self::with_client(client, config))
    }

    /// Create a client around an existing HTTP client.
    pub fn with_client(client: Client, config: GithubConfig) -> Self {
        let limiter = Arc::new(RateLimiter::new(config.rate_limit_reserve));
        Self {
            client,
            config: Arc::new(config),
            limiter,
        }
    }

    /// Latest quota reported by the API.
    pub fn rate_limit(&self) -> RateLimitSnapshot {
        self.limiter.snapshot()
    }

    /// Build the URL of the first page for a query.
    pub fn first_page_url(
        &self,
        query: &str,
        since: Option<DateTime<Utc>>,
    ) -> std::result::Result<Url, SearchError> {
        let base = format!(
            "{}/search/{}",
            self.config.api_url.trim_end_matches('/'),
            self.config.kind.endpoint()
        );

        let q = match (self.config.kind, since) {
            (SearchKind::Repositories, Some(since)) if self.config.use_since => format!(
                "{query} pushed:>={}",
                since.to_rfc3339_opts(SecondsFormat::Secs, true)
            ),
            _ => query.to_string(),
        };

        let per_page = self.config.per_page.to_string();
        let mut params = vec![("q", q.as_str()), ("per_page", per_page.as_str())];
        if self.config.kind == SearchKind::Repositories {
            params.push(("sort", "updated"));
            params.push(("order", "desc"));
        }
        params.push(("page", "1"));

        Url::parse_with_params(&base, &params)
            .map_err(|e| SearchError::fatal(format!("cannot build search URL: {e}")))
    }

    /// Issue one GET after consulting the quota tracker.
    async fn get(&self, url: &Url) -> std::result::Result<RawResponse, SearchError> {
        self.limiter.check(Utc::now())?;

        log::debug!("GET {url}");
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(classify_transport)?;

        let status = response.status();
        let headers = response.headers().clone();
        let quota = RateLimitSnapshot::from_headers(&headers);
        self.limiter.observe(quota, Utc::now());

        let body = response.bytes().await.map_err(classify_transport)?;
        Ok(RawResponse {
            status,
            headers,
            quota,
            body: body.to_vec(),
        })
    }

    /// Fetch one page and decode its items.
    async fn fetch_page(
        &self,
        url: &Url,
        query: &str,
    ) -> std::result::Result<Page, SearchError> {
        let raw = self.get(url).await?;
        if let Some(error) = classify_status(raw.status, &raw.quota, &raw.body, Utc::now()) {
            return Err(error);
        }

        let discovered_at = Utc::now();
        let records: Vec<ResultRecord> = match self.config.kind {
            SearchKind::Repositories => decode_items::<RepositoryItem>(&raw.body)?
                .into_iter()
                .map(|item| item.into_record(query, discovered_at))
                .collect(),
            SearchKind::Code => decode_items::<CodeItem>(&raw.body)?
                .into_iter()
                .map(|item| item.into_record(query, discovered_at))
                .collect(),
        };

        Ok(Page {
            records,
            next: next_page_url(&raw.headers),
        })
    }

    /// URL of the repository resource for `owner/repo`.
    pub fn repo_url(&self, repo: &str) -> std::result::Result<Url, SearchError> {
        let base = format!("{}/repos/", self.config.api_url.trim_end_matches('/'));
        Url::parse(&base)
            .and_then(|base| base.join(repo))
            .map_err(|e| SearchError::fatal(format!("cannot build repository URL: {e}")))
    }

    /// Fetch the page at `cursor` and compute where the sequence continues.
    async fn next_page(
        &self,
        query: &str,
        cursor: Option<(Url, u32)>,
    ) -> std::result::Result<Option<(Vec<ResultRecord>, Option<(Url, u32)>)>, SearchError> {
        let Some((url, page_no)) = cursor else {
            return Ok(None);
        };

        let page = self.fetch_page(&url, query).await?;
        log::debug!(
            "Query '{}' page {}: {} results",
            query,
            page_no,
            page.records.len()
        );

        let short_page = page.records.len() < self.config.per_page as usize;
        let next = match page.next {
            Some(next) if !short_page && page_no < self.config.max_pages_per_query => {
                Some((next, page_no + 1))
            }
            _ => None,
        };

        Ok(Some((page.records, next)))
    }
}

impl SearchApi for GitHubClient {
    fn search<'a>(&'a self, query: &'a str, since: Option<DateTime<Utc>>) -> RecordStream<'a> {
        let first = match self.first_page_url(query, since) {
            Ok(url) => url,
            Err(e) => return stream::once(async move { Err(e) }).boxed(),
        };

        stream::try_unfold(Some((first, 1u32)), move |cursor| {
            self.next_page(query, cursor)
        })
        .map_ok(|records| stream::iter(records.into_iter().map(Ok::<_, SearchError>)))
        .try_flatten()
        .boxed()
    }
}

#[async_trait]
impl RepoStatusApi for GitHubClient {
    async fn repo_status(&self, repo: &str) -> std::result::Result<RepoStatus, SearchError> {
        let url = self.repo_url(repo)?;
        let raw = self.get(&url).await?;

        match raw.status {
            status if status.is_success() => Ok(RepoStatus::Active),
            StatusCode::NOT_FOUND | StatusCode::GONE | StatusCode::UNAVAILABLE_FOR_LEGAL_REASONS => {
                Ok(RepoStatus::Removed)
            }
            status => Err(classify_status(status, &raw.quota, &raw.body, Utc::now())
                .unwrap_or_else(|| SearchError::fatal(format!("HTTP {status}")))),
        }
    }
}

/// Status, headers and body of one response.
struct RawResponse {
    status: StatusCode,
    headers: HeaderMap,
    quota: RateLimitSnapshot,
    body: Vec<u8>,
}

/// One decoded page.
struct Page {
    records: Vec<ResultRecord>,
    next: Option<Url>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse<T> {
    #[serde(default)]
    incomplete_results: bool,
    items: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct RepositoryItem {
    id: u64,
    full_name: String,
    html_url: String,
}

impl RepositoryItem {
    fn into_record(self, query: &str, discovered_at: DateTime<Utc>) -> ResultRecord {
        ResultRecord {
            id: format!("repo:{}", self.id),
            url: self.html_url,
            label: self.full_name,
            query: query.to_string(),
            discovered_at,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CodeItem {
    path: String,
    sha: String,
    html_url: String,
    repository: CodeRepository,
}

#[derive(Debug, Deserialize)]
struct CodeRepository {
    id: u64,
    full_name: String,
}

impl CodeItem {
    fn into_record(self, query: &str, discovered_at: DateTime<Utc>) -> ResultRecord {
        ResultRecord {
            id: format!("code:{}:{}@{}", self.repository.id, self.path, self.sha),
            url: self.html_url,
            label: format!("{}:{}", self.repository.full_name, self.path),
            query: query.to_string(),
            discovered_at,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    message: String,
}

fn decode_items<T: DeserializeOwned>(body: &[u8]) -> std::result::Result<Vec<T>, SearchError> {
    let response: SearchResponse<T> = serde_json::from_slice(body)
        .map_err(|e| SearchError::transient(format!("undecodable search page: {e}")))?;
    if response.incomplete_results {
        log::warn!("Search API returned incomplete results for this page");
    }
    Ok(response.items)
}

/// Extract the `rel="next"` target from a `Link` header.
pub fn next_page_url(headers: &HeaderMap) -> Option<Url> {
    let link = headers.get(LINK)?.to_str().ok()?;
    let caps = NEXT_LINK.captures(link)?;
    Url::parse(caps.get(1)?.as_str()).ok()
}

/// Map an HTTP status to a search failure, or `None` on success.
pub fn classify_status(
    status: StatusCode,
    quota: &RateLimitSnapshot,
    body: &[u8],
    now: DateTime<Utc>,
) -> Option<SearchError> {
    if status.is_success() {
        return None;
    }

    let message = serde_json::from_slice::<ApiMessage>(body)
        .map(|m| m.message)
        .unwrap_or_else(|_| String::from_utf8_lossy(body).chars().take(200).collect());

    let throttle_status =
        status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::FORBIDDEN;
    // Secondary limits come as a 403 with a message and often no quota headers.
    let secondary = message.to_ascii_lowercase().contains("rate limit");

    if throttle_status && quota.is_exhausted() {
        Some(SearchError::rate_limited(quota.wait_time(now)))
    } else if status == StatusCode::TOO_MANY_REQUESTS || (throttle_status && secondary) {
        Some(SearchError::rate_limited(
            quota.retry_after.unwrap_or(DEFAULT_RETRY_AFTER),
        ))
    } else if status.is_server_error() || status == StatusCode::REQUEST_TIMEOUT {
        Some(SearchError::transient(format!("HTTP {status}: {message}")))
    } else {
        Some(SearchError::fatal(format!("HTTP {status}: {message}")))
    }
}

/// Map a transport failure to a search failure.
pub fn classify_transport(error: reqwest::Error) -> SearchError {
    if error.is_builder() {
        SearchError::fatal(error)
    } else {
        SearchError::transient(error)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::TimeZone;
    use reqwest::header::HeaderValue;

    use super::*;

    fn client(kind: SearchKind) -> GitHubClient {
        let config = GithubConfig {
            kind,
            per_page: 50,
            ..GithubConfig::default()
        };
        GitHubClient::with_client(Client::new(), config)
    }

    fn now() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    #[test]
    fn test_repository_url_with_since() {
        let since = Utc.with_ymd_and_hms(2026, 1, 30, 12, 0, 0).unwrap();
        let url = client(SearchKind::Repositories)
            .first_page_url("epstein files", Some(since))
            .unwrap();

        assert_eq!(url.path(), "/search/repositories");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&(
            "q".into(),
            "epstein files pushed:>=2026-01-30T12:00:00Z".into()
        )));
        assert!(pairs.contains(&("per_page".into(), "50".into())));
        assert!(pairs.contains(&("sort".into(), "updated".into())));
    }

    #[test]
    fn test_code_url_ignores_since() {
        let since = Utc.with_ymd_and_hms(2026, 1, 30, 12, 0, 0).unwrap();
        let url = client(SearchKind::Code)
            .first_page_url("filename:flight_logs.csv", Some(since))
            .unwrap();

        assert_eq!(url.path(), "/search/code");
        let q = url
            .query_pairs()
            .find(|(k, _)| k == "q")
            .map(|(_, v)| v.into_owned());
        assert_eq!(q.as_deref(), Some("filename:flight_logs.csv"));
    }

    #[test]
    fn test_next_link_parsing() {
        let mut headers = HeaderMap::new();
        headers.insert(
            LINK,
            HeaderValue::from_static(
                r#"<https://api.github.com/search/code?q=x&page=2>; rel="next", <https://api.github.com/search/code?q=x&page=10>; rel="last""#,
            ),
        );
        let next = next_page_url(&headers).unwrap();
        assert_eq!(next.as_str(), "https://api.github.com/search/code?q=x&page=2");
    }

    #[test]
    fn test_last_page_has_no_next_link() {
        let mut headers = HeaderMap::new();
        headers.insert(
            LINK,
            HeaderValue::from_static(
                r#"<https://api.github.com/search/code?q=x&page=1>; rel="prev", <https://api.github.com/search/code?q=x&page=1>; rel="first""#,
            ),
        );
        assert!(next_page_url(&headers).is_none());
        assert!(next_page_url(&HeaderMap::new()).is_none());
    }

    #[test]
    fn test_classify_rate_limit() {
        let quota = RateLimitSnapshot {
            remaining: Some(0),
            reset_at: Some(now() + chrono::Duration::seconds(40)),
            ..RateLimitSnapshot::default()
        };
        let err = classify_status(StatusCode::FORBIDDEN, &quota, b"{}", now()).unwrap();
        assert_eq!(err, SearchError::rate_limited(Duration::from_secs(40)));

        let err = classify_status(
            StatusCode::TOO_MANY_REQUESTS,
            &RateLimitSnapshot::default(),
            b"",
            now(),
        )
        .unwrap();
        assert!(matches!(err, SearchError::RateLimited { .. }));
    }

    #[test]
    fn test_classify_secondary_rate_limit() {
        let quota = RateLimitSnapshot {
            limit: Some(30),
            remaining: Some(25),
            reset_at: Some(now() + chrono::Duration::seconds(1800)),
            retry_after: None,
        };
        let body = br#"{"message":"You have exceeded a secondary rate limit. Please wait a few minutes before you try again."}"#;

        let err = classify_status(StatusCode::FORBIDDEN, &quota, body, now()).unwrap();
        assert_eq!(err, SearchError::rate_limited(DEFAULT_RETRY_AFTER));

        let with_retry = RateLimitSnapshot {
            retry_after: Some(Duration::from_secs(15)),
            ..RateLimitSnapshot::default()
        };
        let err = classify_status(StatusCode::TOO_MANY_REQUESTS, &with_retry, body, now()).unwrap();
        assert_eq!(err, SearchError::rate_limited(Duration::from_secs(15)));
    }

    #[test]
    fn test_classify_transient_and_fatal() {
        let quota = RateLimitSnapshot::default();
        assert!(matches!(
            classify_status(StatusCode::BAD_GATEWAY, &quota, b"", now()),
            Some(SearchError::Transient(_))
        ));
        assert!(matches!(
            classify_status(StatusCode::UNAUTHORIZED, &quota, br#"{"message":"Bad credentials"}"#, now()),
            Some(SearchError::Fatal(m)) if m.contains("Bad credentials")
        ));
        assert!(matches!(
            classify_status(StatusCode::FORBIDDEN, &quota, b"", now()),
            Some(SearchError::Fatal(_))
        ));
        assert!(matches!(
            classify_status(StatusCode::UNPROCESSABLE_ENTITY, &quota, b"", now()),
            Some(SearchError::Fatal(_))
        ));
        assert!(classify_status(StatusCode::OK, &quota, b"", now()).is_none());
    }

    #[test]
    fn test_decode_repository_page() {
        let body = br#"{
            "total_count": 2,
            "incomplete_results": false,
            "items": [
                {"id": 7, "full_name": "octo/files", "html_url": "https://github.com/octo/files", "stargazers_count": 3},
                {"id": 9, "full_name": "octo/mirror", "html_url": "https://github.com/octo/mirror"}
            ]
        }"#;
        let items = decode_items::<RepositoryItem>(body).unwrap();
        let records: Vec<_> = items
            .into_iter()
            .map(|i| i.into_record("q", now()))
            .collect();

        assert_eq!(records[0].id, "repo:7");
        assert_eq!(records[1].label, "octo/mirror");
        assert_eq!(records[1].query, "q");
    }

    #[test]
    fn test_decode_code_page() {
        let body = br#"{
            "items": [{
                "name": "flights.csv",
                "path": "data/flights.csv",
                "sha": "abc123",
                "html_url": "https://github.com/octo/files/blob/main/data/flights.csv",
                "repository": {"id": 7, "full_name": "octo/files"}
            }]
        }"#;
        let record = decode_items::<CodeItem>(body)
            .unwrap()
            .pop()
            .unwrap()
            .into_record("flights", now());

        assert_eq!(record.id, "code:7:data/flights.csv@abc123");
        assert_eq!(record.label, "octo/files:data/flights.csv");
    }

    #[test]
    fn test_garbage_page_is_transient() {
        assert!(matches!(
            decode_items::<RepositoryItem>(b"<html>"),
            Err(SearchError::Transient(_))
        ));
    }

    /// Paging and status lookups against a scripted local HTTP responder.
    mod served {
        use std::sync::Mutex;

        use futures::StreamExt;
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        use tokio::net::TcpListener;

        use super::*;

        struct Reply {
            status: u16,
            headers: Vec<(String, String)>,
            body: String,
        }

        impl Reply {
            fn items(ids: &[u64]) -> Self {
                let items: Vec<String> = ids
                    .iter()
                    .map(|id| {
                        format!(
                            r#"{{"id":{id},"full_name":"octo/r{id}","html_url":"https://github.com/octo/r{id}"}}"#
                        )
                    })
                    .collect();
                Self {
                    status: 200,
                    headers: Vec::new(),
                    body: format!(r#"{{"incomplete_results":false,"items":[{}]}}"#, items.join(",")),
                }
            }

            fn status(status: u16) -> Self {
                Self {
                    status,
                    headers: Vec::new(),
                    body: r#"{"message":"scripted"}"#.to_string(),
                }
            }

            fn next(mut self, base: &str, page: u32) -> Self {
                self.headers.push((
                    "link".into(),
                    format!(r#"<{base}/search/repositories?q=leak&page={page}>; rel="next""#),
                ));
                self
            }

            fn header(mut self, name: &str, value: impl ToString) -> Self {
                self.headers.push((name.into(), value.to_string()));
                self
            }
        }

        /// Serve one scripted reply per connection; returns the base URL and
        /// the request targets seen so far.
        async fn serve<F>(script: F) -> (String, Arc<Mutex<Vec<String>>>)
        where
            F: FnOnce(&str) -> Vec<Reply>,
        {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let base = format!("http://{}", listener.local_addr().unwrap());
            let replies = script(&base);
            let targets = Arc::new(Mutex::new(Vec::new()));
            let seen = Arc::clone(&targets);

            tokio::spawn(async move {
                for reply in replies {
                    let Ok((mut socket, _)) = listener.accept().await else {
                        return;
                    };
                    let mut request = Vec::new();
                    let mut buf = [0u8; 1024];
                    while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                        let n = socket.read(&mut buf).await.unwrap();
                        if n == 0 {
                            break;
                        }
                        request.extend_from_slice(&buf[..n]);
                    }
                    let head = String::from_utf8_lossy(&request);
                    let target = head.split_whitespace().nth(1).unwrap_or_default();
                    seen.lock().unwrap().push(target.to_string());

                    let reason = StatusCode::from_u16(reply.status)
                        .ok()
                        .and_then(|s| s.canonical_reason())
                        .unwrap_or("Unknown");
                    let mut response = format!(
                        "HTTP/1.1 {} {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n",
                        reply.status,
                        reason,
                        reply.body.len()
                    );
                    for (name, value) in &reply.headers {
                        response.push_str(&format!("{name}: {value}\r\n"));
                    }
                    response.push_str("\r\n");
                    response.push_str(&reply.body);
                    socket.write_all(response.as_bytes()).await.unwrap();
                    let _ = socket.shutdown().await;
                }
            });

            (base, targets)
        }

        fn served_client(base: &str, max_pages: u32) -> GitHubClient {
            let config = GithubConfig {
                api_url: base.to_string(),
                per_page: 2,
                max_pages_per_query: max_pages,
                use_since: false,
                ..GithubConfig::default()
            };
            let http = Client::builder().no_proxy().build().unwrap();
            GitHubClient::with_client(http, config)
        }

        async fn run(client: &GitHubClient) -> Vec<std::result::Result<ResultRecord, SearchError>> {
            client.search("leak", None).collect().await
        }

        fn ids(results: &[std::result::Result<ResultRecord, SearchError>]) -> Vec<String> {
            results
                .iter()
                .filter_map(|r| r.as_ref().ok())
                .map(|r| r.id.clone())
                .collect()
        }

        #[tokio::test]
        async fn test_follows_next_link_until_short_page() {
            let (base, targets) = serve(|base| {
                vec![
                    Reply::items(&[1, 2]).next(base, 2),
                    Reply::items(&[3]).next(base, 3),
                ]
            })
            .await;

            let results = run(&served_client(&base, 10)).await;

            assert_eq!(ids(&results), vec!["repo:1", "repo:2", "repo:3"]);
            let targets = targets.lock().unwrap();
            assert_eq!(targets.len(), 2);
            assert!(targets[0].starts_with("/search/repositories?"));
            assert!(targets[0].contains("page=1"));
            assert!(targets[1].ends_with("page=2"));
        }

        #[tokio::test]
        async fn test_stops_at_page_bound() {
            let (base, targets) = serve(|base| {
                vec![
                    Reply::items(&[1, 2]).next(base, 2),
                    Reply::items(&[3, 4]).next(base, 3),
                    Reply::items(&[5, 6]).next(base, 4),
                ]
            })
            .await;

            let results = run(&served_client(&base, 2)).await;

            assert_eq!(ids(&results), vec!["repo:1", "repo:2", "repo:3", "repo:4"]);
            assert_eq!(targets.lock().unwrap().len(), 2);
        }

        #[tokio::test]
        async fn test_stops_on_empty_page() {
            let (base, targets) = serve(|base| {
                vec![
                    Reply::items(&[1, 2]).next(base, 2),
                    Reply::items(&[]).next(base, 3),
                    Reply::items(&[5, 6]),
                ]
            })
            .await;

            let results = run(&served_client(&base, 10)).await;

            assert_eq!(results.len(), 2);
            assert_eq!(targets.lock().unwrap().len(), 2);
        }

        #[tokio::test]
        async fn test_full_page_without_next_link_ends_sequence() {
            let (base, targets) = serve(|_| vec![Reply::items(&[1, 2]), Reply::items(&[3])]).await;

            let results = run(&served_client(&base, 10)).await;

            assert_eq!(ids(&results), vec!["repo:1", "repo:2"]);
            assert_eq!(targets.lock().unwrap().len(), 1);
        }

        #[tokio::test]
        async fn test_transient_page_after_delivered_items() {
            let (base, _) = serve(|base| {
                vec![
                    Reply::items(&[1, 2]).next(base, 2),
                    Reply::status(502),
                ]
            })
            .await;

            let results = run(&served_client(&base, 10)).await;

            assert_eq!(results.len(), 3);
            assert_eq!(ids(&results), vec!["repo:1", "repo:2"]);
            assert!(matches!(results[2], Err(SearchError::Transient(_))));
        }

        #[tokio::test]
        async fn test_spent_quota_refuses_next_page_without_request() {
            let reset = (Utc::now() + chrono::Duration::seconds(120)).timestamp();
            let (base, targets) = serve(|base| {
                vec![
                    Reply::items(&[1, 2])
                        .next(base, 2)
                        .header("x-ratelimit-limit", 30)
                        .header("x-ratelimit-remaining", 0)
                        .header("x-ratelimit-reset", reset),
                    Reply::items(&[3, 4]),
                ]
            })
            .await;

            let client = served_client(&base, 10);
            let results = run(&client).await;

            assert_eq!(ids(&results), vec!["repo:1", "repo:2"]);
            match &results[2] {
                Err(SearchError::RateLimited { retry_after }) => {
                    assert!(*retry_after > Duration::from_secs(60));
                    assert!(*retry_after <= Duration::from_secs(120));
                }
                other => panic!("expected RateLimited, got {other:?}"),
            }
            assert_eq!(results.len(), 3);
            assert_eq!(targets.lock().unwrap().len(), 1);
            assert_eq!(client.rate_limit().remaining, Some(0));
        }

        #[tokio::test]
        async fn test_repo_status_lookups() {
            let (base, targets) = serve(|_| {
                vec![
                    Reply::status(200),
                    Reply::status(404),
                    Reply::status(451),
                    Reply::status(500),
                ]
            })
            .await;
            let client = served_client(&base, 10);

            assert_eq!(client.repo_status("octo/files").await, Ok(RepoStatus::Active));
            assert_eq!(client.repo_status("octo/gone").await, Ok(RepoStatus::Removed));
            assert_eq!(client.repo_status("octo/withheld").await, Ok(RepoStatus::Removed));
            assert!(matches!(
                client.repo_status("octo/files").await,
                Err(SearchError::Transient(_))
            ));
            assert_eq!(targets.lock().unwrap()[1], "/repos/octo/gone");
        }
    }
}

