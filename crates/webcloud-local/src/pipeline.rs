//! Request-scoped pipeline: fetch -> extract -> tokenize -> rank -> weights -> layout.
//!
//! Nothing here outlives a request; every call rebuilds its tables from scratch.

use crate::config::Config;
use crate::extract::{self, ExtractedText};
use crate::rank::{FrequencyTable, MAX_RANKED_TERMS};
use crate::tokenize::tokenize;
use crate::weight::map_weights;
use crate::{fetch_with_fallback, RouteAttempt};
use serde::Serialize;
use tracing::{info, warn};
use webcloud_core::{
    validate_target_url, Error, FetchBackend, RankedTerm, RenderConfig, Renderer, Result,
    SizeProfile, WeightedTerm,
};

#[derive(Debug, Clone, Serialize)]
pub struct Analysis {
    pub profile: SizeProfile,
    /// Tokens emitted by the tokenizer (before the top-N cut).
    pub token_count: u64,
    pub distinct_terms: usize,
    pub ranked: Vec<RankedTerm>,
    pub weighted: Vec<WeightedTerm>,
}

/// Tokenize, rank and weight plain text. An empty ranking is `InsufficientContent`.
pub fn analyze_text(text: &str, profile: SizeProfile, top_n: usize) -> Result<Analysis> {
    let table = FrequencyTable::from_tokens(tokenize(text));
    let token_count = table.total();
    let distinct_terms = table.len();
    let ranked = table.into_ranked(top_n.clamp(1, MAX_RANKED_TERMS));
    if ranked.is_empty() {
        return Err(Error::InsufficientContent(
            "no countable words left after filtering".to_string(),
        ));
    }
    let weighted = map_weights(&ranked, profile);
    Ok(Analysis {
        profile,
        token_count,
        distinct_terms,
        ranked,
        weighted,
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct PageText {
    pub url: String,
    pub final_url: String,
    pub route: String,
    pub attempts: Vec<RouteAttempt>,
    pub truncated: bool,
    pub extracted: ExtractedText,
}

/// Validate `url`, fetch it through the configured routes and extract its body text.
pub async fn fetch_and_extract(
    backend: &dyn FetchBackend,
    cfg: &Config,
    url: Option<&str>,
) -> Result<PageText> {
    let target = validate_target_url(url)?;
    let page = fetch_with_fallback(backend, &cfg.routes, &target, &cfg.fetch_options()).await?;
    let extracted = extract::extract(&page.markup)?;
    Ok(PageText {
        url: page.target,
        final_url: page.response.final_url,
        route: page.route,
        attempts: page.attempts,
        truncated: page.response.truncated,
        extracted,
    })
}

/// Where the text of a generation request comes from.
#[derive(Debug, Clone)]
pub enum Source {
    Url(String),
    /// Manually pasted text; skips fetching and extraction.
    Text(String),
}

#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub source: Source,
    pub profile: SizeProfile,
    pub top_n: usize,
    pub render: RenderConfig,
}

impl GenerateRequest {
    pub fn new(source: Source) -> Self {
        Self {
            source,
            profile: SizeProfile::default(),
            top_n: MAX_RANKED_TERMS,
            render: RenderConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct WordCloud {
    /// "url" or "text".
    pub source: &'static str,
    pub url: Option<String>,
    pub route: Option<String>,
    pub attempts: Vec<RouteAttempt>,
    pub text_chars: usize,
    #[serde(flatten)]
    pub analysis: Analysis,
    pub renderer: &'static str,
    /// Renderer output (wordcloud2 list + options); `None` when rendering failed.
    pub layout: Option<serde_json::Value>,
    pub omitted: Vec<String>,
    pub warnings: Vec<String>,
}

pub async fn generate(
    backend: &dyn FetchBackend,
    cfg: &Config,
    renderer: &dyn Renderer,
    req: &GenerateRequest,
) -> Result<WordCloud> {
    let (source, url, route, attempts, text) = match &req.source {
        Source::Url(u) => {
            let page = fetch_and_extract(backend, cfg, Some(u.as_str())).await?;
            (
                "url",
                Some(page.url),
                Some(page.route),
                page.attempts,
                page.extracted.text,
            )
        }
        Source::Text(t) => ("text", None, None, Vec::new(), t.trim().to_string()),
    };
    if text.is_empty() {
        return Err(Error::MissingParameter("text"));
    }

    let analysis = analyze_text(&text, req.profile, req.top_n)?;
    info!(
        source,
        tokens = analysis.token_count,
        terms = analysis.ranked.len(),
        "ranked terms"
    );

    let mut warnings = Vec::new();
    let (layout, omitted) = match renderer.render(&analysis.weighted, &req.render) {
        Ok(out) => {
            let layout = match serde_json::from_slice(&out.bytes) {
                Ok(v) => Some(v),
                Err(e) => {
                    warn!(renderer = renderer.name(), error = %e, "layout is not valid JSON");
                    warnings.push(format!("layout from {} is not valid JSON: {e}", out.engine));
                    None
                }
            };
            if !out.omitted.is_empty() {
                warnings.push(format!(
                    "{} term(s) shrunk or omitted to fit the canvas",
                    out.omitted.len()
                ));
            }
            (layout, out.omitted)
        }
        Err(e) => {
            warn!(error = %e, "render failed; returning ranked terms only");
            warnings.push(e.to_string());
            (None, Vec::new())
        }
    };

    Ok(WordCloud {
        source,
        url,
        route,
        attempts,
        text_chars: text.chars().count(),
        analysis,
        renderer: renderer.name(),
        layout,
        omitted,
        warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::Wordcloud2ListRenderer;
    use crate::{FetchRoute, LocalFetcher};
    use axum::{routing::get, Router};
    use webcloud_core::RenderOutput;

    const ARTICLE: &str = r#"<html><head><title>t</title><script>track()</script></head><body>
        <nav>메뉴 홈 로그인</nav>
        <article>
          <p>러스트 언어는 메모리 안전성을 보장합니다. 러스트 컴파일러는 빌림 검사기를 사용합니다.</p>
          <p>러스트 생태계에는 다양한 크레이트가 있습니다. Rust crates power many web services.</p>
          <p>워드 클라우드는 자주 등장하는 단어를 크게 보여줍니다. Rust forever.</p>
        </article>
        <footer>저작권 표시</footer></body></html>"#;

    async fn serve_article() -> String {
        let app = Router::new().route("/article", get(|| async { axum::response::Html(ARTICLE) }));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/article")
    }

    #[test]
    fn analyze_text_ranks_and_weights() {
        let a = analyze_text("테스트 테스트 테스트 예시", SizeProfile::MEDIUM, 50).unwrap();
        assert_eq!(a.token_count, 4);
        assert_eq!(a.distinct_terms, 2);
        assert_eq!(a.ranked[0].term, "테스트");
        assert_eq!(a.weighted[0].weight, 60.0);
        assert_eq!(a.weighted[1].weight, 16.0);
    }

    #[test]
    fn analyze_text_without_words_is_insufficient() {
        let err = analyze_text("a b . 1 !!", SizeProfile::MEDIUM, 50).unwrap_err();
        assert!(matches!(err, Error::InsufficientContent(_)));
    }

    #[test]
    fn analyze_text_honors_top_n() {
        let a = analyze_text("alpha beta gamma delta", SizeProfile::SMALL, 2).unwrap();
        assert_eq!(a.ranked.len(), 2);
        assert_eq!(a.distinct_terms, 4);
    }

    #[tokio::test]
    async fn generate_from_url_end_to_end() {
        let url = serve_article().await;
        let fetcher = LocalFetcher::with_default_user_agent().unwrap();
        let cfg = Config::default();
        let req = GenerateRequest::new(Source::Url(url.clone()));

        let cloud = generate(&fetcher, &cfg, &Wordcloud2ListRenderer, &req)
            .await
            .unwrap();
        assert_eq!(cloud.source, "url");
        assert_eq!(cloud.route.as_deref(), Some("direct"));
        assert_eq!(cloud.analysis.ranked[0].term, "러스트");
        assert!(cloud.analysis.ranked.iter().all(|r| r.term != "메뉴"));
        let layout = cloud.layout.unwrap();
        assert_eq!(layout["list"][0][0], "러스트");
        assert!(cloud.warnings.is_empty());
    }

    #[tokio::test]
    async fn generate_rejects_bad_urls_before_fetching() {
        let fetcher = LocalFetcher::with_default_user_agent().unwrap();
        let cfg = Config {
            routes: vec![FetchRoute::Direct],
            ..Config::default()
        };
        let req = GenerateRequest::new(Source::Url("   ".to_string()));
        let err = generate(&fetcher, &cfg, &Wordcloud2ListRenderer, &req)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MissingParameter("url")));

        let req = GenerateRequest::new(Source::Url("mailto:someone@example.com".to_string()));
        let err = generate(&fetcher, &cfg, &Wordcloud2ListRenderer, &req)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidUrl(_)));
    }

    #[tokio::test]
    async fn pasted_text_skips_fetching() {
        let fetcher = LocalFetcher::with_default_user_agent().unwrap();
        let cfg = Config {
            routes: Vec::new(),
            ..Config::default()
        };
        let req = GenerateRequest::new(Source::Text("Hello world hello".to_string()));
        let cloud = generate(&fetcher, &cfg, &Wordcloud2ListRenderer, &req)
            .await
            .unwrap();
        assert_eq!(cloud.source, "text");
        assert!(cloud.attempts.is_empty());
        let got: Vec<(&str, u64)> = cloud
            .analysis
            .ranked
            .iter()
            .map(|r| (r.term.as_str(), r.count))
            .collect();
        assert_eq!(got, [("hello", 2), ("world", 1)]);
    }

    #[tokio::test]
    async fn render_failure_degrades_to_ranked_terms() {
        let fetcher = LocalFetcher::with_default_user_agent().unwrap();
        let mut req = GenerateRequest::new(Source::Text("Hello world hello".to_string()));
        req.render.width = 0;
        let cloud = generate(&fetcher, &Config::default(), &Wordcloud2ListRenderer, &req)
            .await
            .unwrap();
        assert!(cloud.layout.is_none());
        assert_eq!(cloud.warnings.len(), 1);
        assert_eq!(cloud.analysis.ranked.len(), 2);
    }

    struct GarbledRenderer;

    impl Renderer for GarbledRenderer {
        fn name(&self) -> &'static str {
            "garbled"
        }

        fn render(&self, _terms: &[WeightedTerm], _cfg: &RenderConfig) -> Result<RenderOutput> {
            Ok(RenderOutput {
                engine: "garbled",
                content_type: "application/json",
                bytes: b"{\"list\": [".to_vec(),
                omitted: Vec::new(),
            })
        }
    }

    #[tokio::test]
    async fn undecodable_layout_is_reported_as_warning() {
        let fetcher = LocalFetcher::with_default_user_agent().unwrap();
        let req = GenerateRequest::new(Source::Text("Hello world hello".to_string()));
        let cloud = generate(&fetcher, &Config::default(), &GarbledRenderer, &req)
            .await
            .unwrap();
        assert!(cloud.layout.is_none());
        assert_eq!(cloud.warnings.len(), 1);
        assert!(cloud.warnings[0].contains("not valid JSON"), "{:?}", cloud.warnings);
        assert_eq!(cloud.renderer, "garbled");
    }
}
