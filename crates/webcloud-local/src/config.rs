//! Environment-driven configuration for fetching and weighting.
//!
//! Every knob has a default; CLI flags override what is read here.

use crate::{default_request_headers, FetchOptions, FetchRoute, DEFAULT_USER_AGENT};
use webcloud_core::{Result, SizeProfile};

pub const DEFAULT_TIMEOUT_MS: u64 = 15_000;
pub const DEFAULT_MAX_BYTES: u64 = 5_000_000;
pub const DEFAULT_MIN_MARKUP_CHARS: usize = 100;
const TIMEOUT_RANGE_MS: (u64, u64) = (500, 120_000);
const MIN_MAX_BYTES: u64 = 1_024;

/// Timeout knob value; malformed input keeps `fallback`, and the result is clamped.
pub fn parse_timeout_ms(raw: Option<&str>, fallback: u64) -> u64 {
    raw.and_then(|s| s.trim().parse::<u64>().ok())
        .unwrap_or(fallback)
        .clamp(TIMEOUT_RANGE_MS.0, TIMEOUT_RANGE_MS.1)
}

/// Body cap knob value; malformed input keeps `fallback`.
pub fn parse_max_bytes(raw: Option<&str>, fallback: u64) -> u64 {
    raw.and_then(|s| s.trim().parse::<u64>().ok())
        .unwrap_or(fallback)
        .max(MIN_MAX_BYTES)
}

#[derive(Debug, Clone)]
pub struct Config {
    pub timeout_ms: u64,
    pub max_bytes: u64,
    pub routes: Vec<FetchRoute>,
    pub min_markup_chars: usize,
    pub size_profile: SizeProfile,
    pub user_agent: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_TIMEOUT_MS,
            max_bytes: DEFAULT_MAX_BYTES,
            routes: vec![FetchRoute::Direct],
            min_markup_chars: DEFAULT_MIN_MARKUP_CHARS,
            size_profile: SizeProfile::default(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// Resolve configuration through an arbitrary key lookup (tests pass a map).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| {
            lookup(key)
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        };
        let d = Self::default();

        let routes = match get("WEBCLOUD_RELAYS") {
            Some(spec) => {
                let routes = FetchRoute::parse_list(&spec)?;
                if routes.is_empty() {
                    d.routes
                } else {
                    routes
                }
            }
            None => d.routes,
        };

        Ok(Self {
            timeout_ms: parse_timeout_ms(get("WEBCLOUD_TIMEOUT_MS").as_deref(), d.timeout_ms),
            max_bytes: parse_max_bytes(get("WEBCLOUD_MAX_BYTES").as_deref(), d.max_bytes),
            routes,
            min_markup_chars: get("WEBCLOUD_MIN_MARKUP_CHARS")
                .and_then(|s| s.parse::<usize>().ok())
                .unwrap_or(d.min_markup_chars),
            size_profile: get("WEBCLOUD_SIZE_PROFILE")
                .map(|s| SizeProfile::from_name(&s))
                .unwrap_or(d.size_profile),
            user_agent: get("WEBCLOUD_USER_AGENT").unwrap_or(d.user_agent),
        })
    }

    pub fn fetch_options(&self) -> FetchOptions {
        FetchOptions {
            timeout_ms: self.timeout_ms,
            max_bytes: self.max_bytes,
            headers: default_request_headers(),
            min_markup_chars: self.min_markup_chars,
        }
    }
}
