use html_scraper::{ElementRef, Html, Selector};
use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;
use tracing::{debug, info};
use webcloud_core::{Error, Result};

/// Non-content elements, removed before any content scan.
pub const REMOVAL_SELECTORS: &[&str] = &[
    "script",
    "style",
    "nav",
    "footer",
    "aside",
    "header",
    ".ads",
    ".advertisement",
    ".sidebar",
    ".menu",
    ".navigation",
    ".social",
    ".share",
    ".comment",
    ".related",
    ".popup",
    "iframe",
    "noscript",
    "form",
    "button",
    "input",
    "select",
    ".cookie",
    ".banner",
    ".modal",
    ".overlay",
    ".tooltip",
    "meta",
    "link",
    "title",
    "head",
];

/// Content regions, most specific first.
pub const INCLUSION_SELECTORS: &[&str] = &[
    "main",
    "article",
    ".content",
    ".post",
    ".entry",
    ".article-body",
    ".post-content",
    ".entry-content",
    ".main-content",
    ".page-content",
    ".story-content",
    "section",
    "div[role=\"main\"]",
    ".text-content",
    "p",
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
    "li",
    "td",
    "th",
];

pub const MIN_FRAGMENT_CHARS: usize = 10;
pub const DEDUP_PREFIX_CHARS: usize = 20;
pub const ENOUGH_TEXT_CHARS: usize = 500;
pub const FALLBACK_BELOW_CHARS: usize = 200;
pub const MIN_EXTRACTED_CHARS: usize = 50;

static WS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
// Hangul syllables + compatibility jamo, ASCII letters/digits, whitespace, basic punctuation.
static DISALLOWED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9\sㄱ-ㅎㅏ-ㅣ가-힣.,!?;:()\-]").unwrap());

#[derive(Debug, Clone, Serialize)]
pub struct ExtractedText {
    /// "selectors" when content regions were used, "body_fallback" otherwise.
    pub engine: &'static str,
    pub text: String,
    pub chars: usize,
    /// Inclusion selectors that contributed at least one fragment.
    pub matched_selectors: Vec<&'static str>,
    pub removed_elements: usize,
}

/// Extract readable text from page markup, failing when too little survives.
pub fn extract(raw_markup: &str) -> Result<ExtractedText> {
    let out = extract_unchecked(raw_markup);
    if out.chars < MIN_EXTRACTED_CHARS {
        return Err(Error::InsufficientContent(format!(
            "extracted {} chars of text; need at least {MIN_EXTRACTED_CHARS}",
            out.chars
        )));
    }
    info!(
        engine = out.engine,
        chars = out.chars,
        removed = out.removed_elements,
        "extracted page text"
    );
    Ok(out)
}

/// Same as [`extract`] without the minimum-length check.
pub fn extract_unchecked(raw_markup: &str) -> ExtractedText {
    let mut doc = Html::parse_document(raw_markup);
    let removed_elements = remove_noise(&mut doc);
    let harvest = harvest_content(&doc);

    let (engine, raw_text, matched_selectors) =
        if harvest.buffer.chars().count() < FALLBACK_BELOW_CHARS {
            debug!(
                harvested = harvest.buffer.chars().count(),
                "content regions too thin; using whole body text"
            );
            ("body_fallback", body_text(&doc), Vec::new())
        } else {
            ("selectors", harvest.buffer, harvest.selectors)
        };

    let text = normalize_text(&raw_text);
    let chars = text.chars().count();
    ExtractedText {
        engine,
        text,
        chars,
        matched_selectors,
        removed_elements,
    }
}

fn norm_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn element_text(el: &ElementRef) -> String {
    norm_ws(&el.text().collect::<Vec<_>>().join(" "))
}

fn remove_noise(doc: &mut Html) -> usize {
    let mut removed = 0usize;
    for raw in REMOVAL_SELECTORS {
        let sel = match Selector::parse(raw) {
            Ok(sel) => sel,
            Err(e) => {
                debug!(selector = raw, error = ?e, "skipping removal selector");
                continue;
            }
        };
        // Select from the root element: `Html::select` also walks already-detached nodes.
        let ids: Vec<_> = doc.root_element().select(&sel).map(|el| el.id()).collect();
        for id in ids {
            if let Some(mut node) = doc.tree.get_mut(id) {
                node.detach();
                removed += 1;
            }
        }
    }
    removed
}

struct Harvest {
    buffer: String,
    selectors: Vec<&'static str>,
}

fn harvest_content(doc: &Html) -> Harvest {
    let root = doc.root_element();
    let mut buffer = String::new();
    let mut accepted_chars = 0usize;
    let mut selectors = Vec::new();

    for raw in INCLUSION_SELECTORS {
        let Ok(sel) = Selector::parse(raw) else {
            debug!(selector = raw, "skipping inclusion selector");
            continue;
        };
        let mut hits = 0usize;
        for el in root.select(&sel) {
            let raw_text: String = el.text().collect();
            let fragment_chars = raw_text.trim().chars().count();
            if fragment_chars <= MIN_FRAGMENT_CHARS {
                continue;
            }
            let fragment = element_text(&el);
            let prefix: String = fragment.chars().take(DEDUP_PREFIX_CHARS).collect();
            if buffer.contains(&prefix) {
                continue;
            }
            buffer.push_str(&fragment);
            buffer.push(' ');
            accepted_chars += fragment_chars;
            hits += 1;
        }
        if hits > 0 {
            selectors.push(*raw);
        }
        if accepted_chars > ENOUGH_TEXT_CHARS {
            debug!(selector = raw, accepted_chars, "enough content text");
            break;
        }
    }

    Harvest { buffer, selectors }
}

fn body_text(doc: &Html) -> String {
    let root = doc.root_element();
    let body = Selector::parse("body")
        .ok()
        .and_then(|sel| root.select(&sel).next());
    match body {
        Some(el) => element_text(&el),
        None => element_text(&root),
    }
}

fn is_ascii_word(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Drop ASCII word characters that stand alone (`\b\w\b` with ASCII word semantics).
fn drop_isolated_ascii_chars(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut out = String::with_capacity(s.len());
    for (i, &c) in chars.iter().enumerate() {
        if is_ascii_word(c) {
            let before = i > 0 && is_ascii_word(chars[i - 1]);
            let after = chars.get(i + 1).copied().is_some_and(is_ascii_word);
            if !before && !after {
                continue;
            }
        }
        out.push(c);
    }
    out
}

/// Whitespace collapse, character whitelist, isolated-letter removal, trim.
pub fn normalize_text(s: &str) -> String {
    let s = WS_RE.replace_all(s, " ");
    let s = DISALLOWED_RE.replace_all(&s, " ");
    let s = drop_isolated_ascii_chars(&s);
    WS_RE.replace_all(&s, " ").trim().to_string()
}
