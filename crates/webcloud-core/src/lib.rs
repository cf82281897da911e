use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

pub const MANUAL_PASTE_HINT: &str =
    "Copy the page text and pass it with --text/--file (manual paste) instead of a URL.";

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("missing parameter: {0}")]
    MissingParameter(&'static str),
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("network failure: {0}")]
    NetworkFailure(String),
    #[error("extraction failed: {last_error}")]
    ExtractionFailed { last_error: String },
    #[error("insufficient content: {0}")]
    InsufficientContent(String),
    #[error("render failed: {0}")]
    RenderFailure(String),
    #[error("not configured: {0}")]
    NotConfigured(String),
}

impl Error {
    /// Stable machine-readable code for JSON error objects.
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingParameter(_) => "missing_parameter",
            Self::InvalidUrl(_) => "invalid_url",
            Self::NetworkFailure(_) => "network_failure",
            Self::ExtractionFailed { .. } => "extraction_failed",
            Self::InsufficientContent(_) => "insufficient_content",
            Self::RenderFailure(_) => "render_failure",
            Self::NotConfigured(_) => "not_configured",
        }
    }

    /// Whether a caller may reasonably try the same request again unchanged.
    pub fn retryable(&self) -> bool {
        matches!(self, Self::NetworkFailure(_) | Self::ExtractionFailed { .. })
    }

    pub fn hint(&self) -> &'static str {
        match self {
            Self::MissingParameter(_) => "Pass a page URL.",
            Self::InvalidUrl(_) => "Use an absolute http(s) URL, e.g. https://example.com/article.",
            Self::NetworkFailure(_) | Self::ExtractionFailed { .. } => MANUAL_PASTE_HINT,
            Self::InsufficientContent(_) => {
                "The page was fetched but held too little readable text. Try a specific article URL or paste the text manually."
            }
            Self::RenderFailure(_) => "Reduce the number of terms or use a smaller size profile.",
            Self::NotConfigured(_) => "Configure at least one fetch route (WEBCLOUD_RELAYS=direct).",
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Validate a user-supplied page URL before any network work happens.
pub fn validate_target_url(raw: Option<&str>) -> Result<url::Url> {
    let raw = raw.map(str::trim).filter(|s| !s.is_empty());
    let Some(raw) = raw else {
        return Err(Error::MissingParameter("url"));
    };
    let url = url::Url::parse(raw).map_err(|e| Error::InvalidUrl(format!("{raw}: {e}")))?;
    match url.scheme() {
        "http" | "https" => {}
        other => {
            return Err(Error::InvalidUrl(format!(
                "{raw}: unsupported scheme {other:?}"
            )))
        }
    }
    if url.host_str().is_none() {
        return Err(Error::InvalidUrl(format!("{raw}: missing host")));
    }
    Ok(url)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchRequest {
    pub url: String,
    /// Timeout for the whole attempt (connect + body).
    pub timeout_ms: Option<u64>,
    /// Hard cap on bytes read from the response body.
    pub max_bytes: Option<u64>,
    pub headers: BTreeMap<String, String>,
}

impl FetchRequest {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchResponse {
    /// URL that was actually requested (the relay URL in relay mode).
    pub url: String,
    pub final_url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
    pub truncated: bool,
    pub timings_ms: BTreeMap<String, u128>,
}

impl FetchResponse {
    pub fn text_lossy(&self) -> String {
        String::from_utf8_lossy(&self.bytes).to_string()
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[async_trait::async_trait]
pub trait FetchBackend: Send + Sync {
    async fn fetch(&self, req: &FetchRequest) -> Result<FetchResponse>;
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Script {
    Korean,
    Latin,
    Numeric,
}

/// A normalized word unit. `text` is already lower-cased.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Token {
    pub text: String,
    pub script: Script,
}

impl AsRef<str> for Token {
    fn as_ref(&self) -> &str {
        &self.text
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RankedTerm {
    pub term: String,
    pub count: u64,
    /// 1-based position in the ranking.
    pub rank: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WeightedTerm {
    pub term: String,
    pub weight: f64,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct SizeProfile {
    pub name: &'static str,
    pub min: f64,
    pub max: f64,
}

impl SizeProfile {
    pub const SMALL: SizeProfile = SizeProfile {
        name: "small",
        min: 12.0,
        max: 40.0,
    };
    pub const MEDIUM: SizeProfile = SizeProfile {
        name: "medium",
        min: 16.0,
        max: 60.0,
    };
    pub const LARGE: SizeProfile = SizeProfile {
        name: "large",
        min: 20.0,
        max: 80.0,
    };
    pub const PRESETS: [SizeProfile; 3] = [Self::SMALL, Self::MEDIUM, Self::LARGE];

    /// Look up a preset by name; unknown names fall back to `medium`.
    pub fn from_name(name: &str) -> SizeProfile {
        let name = name.trim();
        Self::PRESETS
            .into_iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
            .unwrap_or_default()
    }

    pub fn custom(min: f64, max: f64) -> SizeProfile {
        SizeProfile {
            name: "custom",
            min,
            max,
        }
    }
}

impl Default for SizeProfile {
    fn default() -> Self {
        Self::MEDIUM
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    pub font_family: String,
    pub width: u32,
    pub height: u32,
    pub background_color: String,
    /// Probability that a term is drawn rotated.
    pub rotate_ratio: f64,
    pub rotation_steps: u32,
    /// Palette name; palette tables live with the renderer.
    pub palette: String,
    pub shuffle: bool,
    pub shrink_to_fit: bool,
    pub draw_out_of_bound: bool,
}

impl RenderConfig {
    pub fn grid_size(&self) -> u32 {
        (16.0 * f64::from(self.width) / 1024.0).round() as u32
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            font_family: "Noto Sans KR, sans-serif".to_string(),
            width: 800,
            height: 400,
            background_color: "#ffffff".to_string(),
            rotate_ratio: 0.3,
            rotation_steps: 2,
            palette: "default".to_string(),
            shuffle: true,
            shrink_to_fit: true,
            draw_out_of_bound: false,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RenderOutput {
    pub engine: &'static str,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
    /// Terms the layout could not place (dropped or shrunk), in input order.
    pub omitted: Vec<String>,
}

/// Layout/rendering collaborator. Implementations degrade by shrinking or omitting terms
/// and report `RenderFailure` only when nothing can be produced.
pub trait Renderer: Send + Sync {
    fn name(&self) -> &'static str;
    fn render(&self, terms: &[WeightedTerm], cfg: &RenderConfig) -> Result<RenderOutput>;
}
