use serde::Serialize;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use webcloud_core::{Error, FetchBackend, FetchRequest, FetchResponse, Result};

pub mod config;
pub mod extract;
pub mod lexicon;
pub mod pipeline;
pub mod rank;
pub mod render;
pub mod tokenize;
pub mod weight;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Browser-like request headers. Accept-Encoding is left to reqwest so bodies stay decoded.
pub fn default_request_headers() -> BTreeMap<String, String> {
    let mut h = BTreeMap::new();
    h.insert(
        "Accept".to_string(),
        "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8".to_string(),
    );
    h.insert(
        "Accept-Language".to_string(),
        "ko-KR,ko;q=0.9,en;q=0.8".to_string(),
    );
    h.insert("Upgrade-Insecure-Requests".to_string(), "1".to_string());
    h
}

#[derive(Debug, Clone)]
pub struct LocalFetcher {
    client: reqwest::Client,
}

impl LocalFetcher {
    pub fn new(user_agent: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .redirect(reqwest::redirect::Policy::limited(10))
            // Per-request timeouts (FetchRequest.timeout_ms) override the overall cap.
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| Error::NetworkFailure(e.to_string()))?;
        Ok(Self { client })
    }

    pub fn with_default_user_agent() -> Result<Self> {
        Self::new(DEFAULT_USER_AGENT)
    }

    fn allow_unsafe_request_headers() -> bool {
        // Relays see every forwarded header, so secrets stay local unless explicitly allowed.
        matches!(
            std::env::var("WEBCLOUD_ALLOW_UNSAFE_HEADERS")
                .unwrap_or_default()
                .trim()
                .to_ascii_lowercase()
                .as_str(),
            "1" | "true" | "yes" | "on"
        )
    }

    fn is_sensitive_request_header(name: &reqwest::header::HeaderName) -> bool {
        // HeaderName::as_str() is canonical lower-case.
        matches!(
            name.as_str(),
            "authorization" | "cookie" | "proxy-authorization"
        )
    }

    fn apply_headers(
        &self,
        mut rb: reqwest::RequestBuilder,
        headers: &BTreeMap<String, String>,
    ) -> reqwest::RequestBuilder {
        let allow_unsafe = Self::allow_unsafe_request_headers();
        for (k, v) in headers {
            if let (Ok(name), Ok(value)) = (
                reqwest::header::HeaderName::from_bytes(k.as_bytes()),
                reqwest::header::HeaderValue::from_str(v),
            ) {
                if !allow_unsafe && Self::is_sensitive_request_header(&name) {
                    continue;
                }
                rb = rb.header(name, value);
            }
        }
        rb
    }
}

fn describe_reqwest_error(e: &reqwest::Error, timeout: Option<Duration>) -> String {
    if e.is_timeout() {
        match timeout {
            Some(t) => format!("timed out after {}ms", t.as_millis()),
            None => "timed out".to_string(),
        }
    } else if e.is_connect() {
        format!("connection failed: {e}")
    } else {
        e.to_string()
    }
}

#[async_trait::async_trait]
impl FetchBackend for LocalFetcher {
    async fn fetch(&self, req: &FetchRequest) -> Result<FetchResponse> {
        let mut timings_ms = BTreeMap::new();
        let t_req = Instant::now();
        let url = url::Url::parse(&req.url).map_err(|e| Error::InvalidUrl(e.to_string()))?;

        let mut rb = self.client.get(url);
        if let Some(to) = req.timeout() {
            rb = rb.timeout(to);
        }
        rb = self.apply_headers(rb, &req.headers);
        let resp = rb
            .send()
            .await
            .map_err(|e| Error::NetworkFailure(describe_reqwest_error(&e, req.timeout())))?;
        let final_url = resp.url().to_string();
        let status = resp.status().as_u16();
        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let max_bytes = req.max_bytes.unwrap_or(u64::MAX) as usize;
        let mut truncated = false;
        let mut bytes = Vec::new();
        let mut stream = resp.bytes_stream();
        use futures_util::StreamExt;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk
                .map_err(|e| Error::NetworkFailure(describe_reqwest_error(&e, req.timeout())))?;
            if bytes.len().saturating_add(chunk.len()) > max_bytes {
                let can_take = max_bytes.saturating_sub(bytes.len());
                bytes.extend_from_slice(&chunk[..can_take]);
                truncated = true;
                break;
            }
            bytes.extend_from_slice(&chunk);
        }

        timings_ms.insert("network_fetch".to_string(), t_req.elapsed().as_millis());
        Ok(FetchResponse {
            url: req.url.clone(),
            final_url,
            status,
            content_type,
            bytes,
            truncated,
            timings_ms,
        })
    }
}

/// How a target page is reached: directly, or through a relay that takes the target URL
/// as a query parameter (`https://relay.example/raw?url=<target>`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchRoute {
    Direct,
    Relay { endpoint: String, param: String },
}

impl FetchRoute {
    /// Parse a route spec: `direct`, or a relay URL. A query key with an empty value
    /// (`?url=`) names the target parameter; otherwise `url` is used.
    pub fn parse(spec: &str) -> Result<Self> {
        let spec = spec.trim();
        if spec.eq_ignore_ascii_case("direct") {
            return Ok(Self::Direct);
        }
        let mut endpoint = url::Url::parse(spec)
            .map_err(|e| Error::NotConfigured(format!("bad relay route {spec:?}: {e}")))?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(Error::NotConfigured(format!(
                "bad relay route {spec:?}: relay must be http(s)"
            )));
        }

        let pairs: Vec<(String, String)> = endpoint.query_pairs().into_owned().collect();
        let param = pairs
            .iter()
            .find(|(_, v)| v.is_empty())
            .map(|(k, _)| k.clone())
            .unwrap_or_else(|| "url".to_string());
        endpoint.set_query(None);
        if pairs.iter().any(|(k, _)| *k != param) {
            let mut q = endpoint.query_pairs_mut();
            for (k, v) in pairs.iter().filter(|(k, _)| *k != param) {
                q.append_pair(k, v);
            }
        }

        Ok(Self::Relay {
            endpoint: endpoint.to_string(),
            param,
        })
    }

    pub fn parse_list(specs: &str) -> Result<Vec<Self>> {
        specs
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(Self::parse)
            .collect()
    }

    pub fn request_url(&self, target: &url::Url) -> Result<String> {
        match self {
            Self::Direct => Ok(target.to_string()),
            Self::Relay { endpoint, param } => {
                let mut u = url::Url::parse(endpoint)
                    .map_err(|e| Error::NotConfigured(format!("bad relay route: {e}")))?;
                u.query_pairs_mut().append_pair(param, target.as_str());
                Ok(u.to_string())
            }
        }
    }

    pub fn label(&self) -> String {
        match self {
            Self::Direct => "direct".to_string(),
            Self::Relay { endpoint, .. } => match url::Url::parse(endpoint) {
                Ok(u) => format!("relay:{}", u.host_str().unwrap_or("?")),
                Err(_) => "relay".to_string(),
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub timeout_ms: u64,
    pub max_bytes: u64,
    pub headers: BTreeMap<String, String>,
    /// Bodies shorter than this (in chars, after trimming) count as a failed route.
    pub min_markup_chars: usize,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            timeout_ms: config::DEFAULT_TIMEOUT_MS,
            max_bytes: config::DEFAULT_MAX_BYTES,
            headers: default_request_headers(),
            min_markup_chars: config::DEFAULT_MIN_MARKUP_CHARS,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RouteAttempt {
    pub route: String,
    pub ok: bool,
    pub status: Option<u16>,
    pub error: Option<String>,
    pub elapsed_ms: u128,
}

#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub target: String,
    pub route: String,
    pub response: FetchResponse,
    pub markup: String,
    pub attempts: Vec<RouteAttempt>,
}

/// Try each route in order, stopping at the first one that yields a success status and
/// at least `min_markup_chars` of body. Attempts that exceed the timeout are dropped.
pub async fn fetch_with_fallback(
    backend: &dyn FetchBackend,
    routes: &[FetchRoute],
    target: &url::Url,
    opts: &FetchOptions,
) -> Result<FetchedPage> {
    if routes.is_empty() {
        return Err(Error::NotConfigured("no fetch routes configured".to_string()));
    }

    let timeout = Duration::from_millis(opts.timeout_ms);
    let mut attempts = Vec::with_capacity(routes.len());
    let mut last_error = String::new();

    for route in routes {
        let label = route.label();
        let t0 = Instant::now();
        let outcome = attempt_route(backend, route, target, opts, timeout).await;
        let elapsed_ms = t0.elapsed().as_millis();
        match outcome {
            Ok((response, markup)) => {
                info!(
                    route = %label,
                    status = response.status,
                    elapsed_ms = elapsed_ms as u64,
                    "fetched page"
                );
                attempts.push(RouteAttempt {
                    route: label.clone(),
                    ok: true,
                    status: Some(response.status),
                    error: None,
                    elapsed_ms,
                });
                return Ok(FetchedPage {
                    target: target.to_string(),
                    route: label,
                    response,
                    markup,
                    attempts,
                });
            }
            Err((status, e)) => {
                warn!(route = %label, error = %e, "fetch route failed");
                last_error = format!("{label}: {e}");
                attempts.push(RouteAttempt {
                    route: label,
                    ok: false,
                    status,
                    error: Some(e.to_string()),
                    elapsed_ms,
                });
            }
        }
    }

    debug!(attempts = attempts.len(), "all fetch routes exhausted");
    Err(Error::ExtractionFailed { last_error })
}

async fn attempt_route(
    backend: &dyn FetchBackend,
    route: &FetchRoute,
    target: &url::Url,
    opts: &FetchOptions,
    timeout: Duration,
) -> std::result::Result<(FetchResponse, String), (Option<u16>, Error)> {
    let req = FetchRequest {
        url: route.request_url(target).map_err(|e| (None, e))?,
        timeout_ms: Some(opts.timeout_ms),
        max_bytes: Some(opts.max_bytes),
        headers: opts.headers.clone(),
    };

    let response = match tokio::time::timeout(timeout, backend.fetch(&req)).await {
        Ok(r) => r.map_err(|e| (None, e))?,
        Err(_) => {
            return Err((
                None,
                Error::NetworkFailure(format!("timed out after {}ms", opts.timeout_ms)),
            ))
        }
    };

    if !response.is_success() {
        return Err((
            Some(response.status),
            Error::NetworkFailure(format!("HTTP {}", response.status)),
        ));
    }

    let markup = response.text_lossy();
    let chars = markup.trim().chars().count();
    if chars < opts.min_markup_chars {
        return Err((
            Some(response.status),
            Error::NetworkFailure(format!(
                "body too short ({chars} chars, need {})",
                opts.min_markup_chars
            )),
        ));
    }
    Ok((response, markup))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::Query, http::header, http::StatusCode, routing::get, Router};
    use std::net::SocketAddr;
    use std::sync::Mutex;

    // Env vars are process-global; serialize tests that mutate them.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    const PAGE: &str = "<html><body><article><p>A page body that is comfortably longer than the minimum markup length used by the fetch fallback tests.</p></article></body></html>";

    async fn spawn(app: Router) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    fn opts(timeout_ms: u64) -> FetchOptions {
        FetchOptions {
            timeout_ms,
            ..FetchOptions::default()
        }
    }

    #[test]
    fn route_parse_direct_and_relay_param() {
        assert_eq!(FetchRoute::parse("direct").unwrap(), FetchRoute::Direct);
        assert_eq!(FetchRoute::parse(" DIRECT ").unwrap(), FetchRoute::Direct);

        let r = FetchRoute::parse("https://relay.example/raw?url=").unwrap();
        let FetchRoute::Relay { endpoint, param } = &r else {
            panic!("expected relay, got {r:?}");
        };
        assert_eq!(param, "url");
        assert_eq!(endpoint, "https://relay.example/raw");

        let r = FetchRoute::parse("https://relay.example/get?key=abc&target=").unwrap();
        let target = url::Url::parse("https://news.example/a?b=1&c=2").unwrap();
        let u = url::Url::parse(&r.request_url(&target).unwrap()).unwrap();
        let pairs: Vec<(String, String)> = u.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("key".to_string(), "abc".to_string())));
        assert!(pairs.contains(&(
            "target".to_string(),
            "https://news.example/a?b=1&c=2".to_string()
        )));
        assert_eq!(r.label(), "relay:relay.example");
    }

    #[test]
    fn route_parse_rejects_garbage() {
        assert!(matches!(
            FetchRoute::parse("not a url"),
            Err(Error::NotConfigured(_))
        ));
        assert!(matches!(
            FetchRoute::parse("ftp://relay.example/x"),
            Err(Error::NotConfigured(_))
        ));
        let list = FetchRoute::parse_list("direct, https://r.example/?u=,").unwrap();
        assert_eq!(list.len(), 2);
    }

    #[tokio::test]
    async fn fallback_moves_past_failing_routes_to_relay() {
        let app = Router::new()
            .route("/broken", get(|| async { StatusCode::BAD_GATEWAY }))
            .route(
                "/relay",
                get(
                    |Query(q): Query<std::collections::HashMap<String, String>>| async move {
                        // The relay echoes which target it was asked for.
                        let target = q.get("url").cloned().unwrap_or_default();
                        let body = PAGE.replace("A page body", &format!("Relayed {target}"));
                        ([(header::CONTENT_TYPE, "text/html")], body)
                    },
                ),
            );
        let addr = spawn(app).await;

        let routes = vec![
            FetchRoute::parse(&format!("http://{addr}/broken?url=")).unwrap(),
            FetchRoute::parse(&format!("http://{addr}/relay?url=")).unwrap(),
        ];
        let target = url::Url::parse("https://example.com/article").unwrap();
        let fetcher = LocalFetcher::with_default_user_agent().unwrap();

        let page = fetch_with_fallback(&fetcher, &routes, &target, &opts(2_000))
            .await
            .unwrap();
        assert!(page.markup.contains("Relayed https://example.com/article"));
        assert_eq!(page.attempts.len(), 2);
        assert!(!page.attempts[0].ok);
        assert_eq!(page.attempts[0].status, Some(502));
        assert!(page.attempts[1].ok);
    }

    #[tokio::test]
    async fn timed_out_route_does_not_block_next_route() {
        let app = Router::new()
            .route(
                "/slow",
                get(|| async {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    PAGE
                }),
            )
            .route("/fast", get(|| async { PAGE }));
        let addr = spawn(app).await;

        let routes = vec![
            FetchRoute::parse(&format!("http://{addr}/slow?url=")).unwrap(),
            FetchRoute::parse(&format!("http://{addr}/fast?url=")).unwrap(),
        ];
        let target = url::Url::parse("https://example.com/").unwrap();
        let fetcher = LocalFetcher::with_default_user_agent().unwrap();

        let t0 = Instant::now();
        let page = fetch_with_fallback(&fetcher, &routes, &target, &opts(300))
            .await
            .unwrap();
        assert!(t0.elapsed() < Duration::from_secs(4));
        assert!(page.attempts[0]
            .error
            .as_deref()
            .unwrap_or("")
            .contains("timed out"));
        assert!(page.attempts[1].ok);
    }

    #[tokio::test]
    async fn exhausted_routes_surface_last_error() {
        let app = Router::new()
            .route("/short", get(|| async { "tiny" }))
            .route("/gone", get(|| async { StatusCode::NOT_FOUND }));
        let addr = spawn(app).await;

        let routes = vec![
            FetchRoute::parse(&format!("http://{addr}/short?url=")).unwrap(),
            FetchRoute::parse(&format!("http://{addr}/gone?url=")).unwrap(),
        ];
        let target = url::Url::parse("https://example.com/").unwrap();
        let fetcher = LocalFetcher::with_default_user_agent().unwrap();

        let err = fetch_with_fallback(&fetcher, &routes, &target, &opts(2_000))
            .await
            .unwrap_err();
        match err {
            Error::ExtractionFailed { last_error } => {
                assert!(last_error.contains("HTTP 404"), "got {last_error:?}")
            }
            other => panic!("expected ExtractionFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn no_routes_is_a_configuration_error() {
        let target = url::Url::parse("https://example.com/").unwrap();
        let fetcher = LocalFetcher::with_default_user_agent().unwrap();
        let err = fetch_with_fallback(&fetcher, &[], &target, &opts(1_000))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotConfigured(_)));
    }

    #[tokio::test]
    #[allow(clippy::await_holding_lock)]
    async fn local_fetcher_drops_sensitive_request_headers_by_default() {
        let _lock = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        std::env::remove_var("WEBCLOUD_ALLOW_UNSAFE_HEADERS");

        let app = Router::new().route(
            "/",
            get(|headers: axum::http::HeaderMap| async move {
                let leaked = headers.contains_key(header::AUTHORIZATION)
                    || headers.contains_key(header::COOKIE);
                let lang = headers
                    .get(header::ACCEPT_LANGUAGE)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("")
                    .to_string();
                format!("leaked={leaked} lang={lang}")
            }),
        );
        let addr = spawn(app).await;

        let fetcher = LocalFetcher::with_default_user_agent().unwrap();
        let mut headers = default_request_headers();
        headers.insert("Authorization".to_string(), "Bearer secret".to_string());
        headers.insert("Cookie".to_string(), "a=b".to_string());
        let req = FetchRequest {
            url: format!("http://{addr}/"),
            timeout_ms: Some(2_000),
            max_bytes: Some(10_000),
            headers,
        };
        let r = fetcher.fetch(&req).await.unwrap();
        let body = r.text_lossy();
        assert!(body.contains("leaked=false"), "body={body}");
        assert!(body.contains("lang=ko-KR"), "body={body}");
    }

    #[tokio::test]
    async fn local_fetcher_truncates_at_max_bytes() {
        let app = Router::new().route("/", get(|| async { "x".repeat(5_000) }));
        let addr = spawn(app).await;
        let fetcher = LocalFetcher::with_default_user_agent().unwrap();
        let req = FetchRequest {
            url: format!("http://{addr}/"),
            timeout_ms: Some(2_000),
            max_bytes: Some(1_000),
            headers: BTreeMap::new(),
        };
        let r = fetcher.fetch(&req).await.unwrap();
        assert_eq!(r.bytes.len(), 1_000);
        assert!(r.truncated);
        assert!(r.is_success());
    }
}
