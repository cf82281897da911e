//! Suffix tables and stop-word sets used by the tokenizer.
//!
//! Tables are ordered: the first matching entry wins, so longer suffixes come before
//! the shorter ones they contain. Bump `RULESET_VERSION` whenever an entry changes;
//! ranked output is only reproducible against the same version.

use std::collections::HashSet;
use std::sync::LazyLock;

pub const RULESET_VERSION: u32 = 1;

/// Case, comitative, comparison and inclusion particles.
pub const KOREAN_PARTICLES: &[&str] = &[
    // compound / stacked
    "에서부터",
    "으로부터",
    "에게서는",
    "에게서",
    "한테서",
    "으로써",
    "으로서",
    "에서는",
    "에서도",
    "에게는",
    "에게도",
    "으로는",
    "으로도",
    "까지도",
    "부터는",
    "이라도",
    "이라고",
    "이랑은",
    // locative / dative
    "에서",
    "에게",
    "한테",
    "께서",
    "에는",
    "에도",
    // instrumental
    "으로",
    "로써",
    "로서",
    // inclusion / range
    "부터",
    "까지",
    "마저",
    "조차",
    "밖에",
    // comparison
    "처럼",
    "보다",
    "만큼",
    "같이",
    // comitative / alternative
    "이랑",
    "하고",
    "이나",
    "와",
    "과",
    "랑",
    // genitive, object, topic, subject
    "의",
    "을",
    "를",
    "은",
    "는",
    "이",
    "가",
    // locative, inclusion, instrumental
    "에",
    "도",
    "만",
    "로",
];

/// Sentence-final and connective endings.
pub const KOREAN_ENDINGS: &[&str] = &[
    // formal sentence-final
    "했습니다",
    "였습니다",
    "었습니다",
    "았습니다",
    "겠습니다",
    "습니다",
    "입니다",
    "합니다",
    "됩니다",
    "십시오",
    // informal sentence-final
    "이에요",
    "하세요",
    "세요",
    "해요",
    "어요",
    "아요",
    "에요",
    "예요",
    // plain / declarative
    "했다",
    "였다",
    "었다",
    "았다",
    "한다",
    "된다",
    "하다",
    "되다",
    "이다",
    "는다",
    "니다",
    // connective
    "하여",
    "해서",
    "하며",
    "하면",
    "지만",
    "는데",
    "으며",
    "으면",
    "면서",
    "려고",
    "도록",
    "다",
];

/// Conjunctions, demonstratives, numerals and generic nouns.
pub const KOREAN_STOP_WORDS: &[&str] = &[
    // conjunctions / adverbs
    "그리고",
    "그런데",
    "하지만",
    "그러나",
    "또한",
    "그래서",
    "따라서",
    "그러면",
    "그러므로",
    "혹은",
    "또는",
    "및",
    "즉",
    "예를",
    "들어",
    "그냥",
    "아주",
    "매우",
    "정말",
    "가장",
    "다시",
    // demonstratives / determiners
    "같은",
    "다른",
    "이런",
    "저런",
    "그런",
    "어떤",
    "이것",
    "그것",
    "저것",
    "이거",
    "그거",
    "저거",
    "여기",
    "거기",
    "저기",
    "이곳",
    "그곳",
    "우리",
    "저희",
    "이번",
    "지난",
    // numerals
    "하나",
    "여러",
    "모든",
    "첫째",
    "둘째",
    "셋째",
    // generic nouns / light verbs
    "경우",
    "정도",
    "때문",
    "위해",
    "통해",
    "대한",
    "대해",
    "관련",
    "있다",
    "없다",
    "있는",
    "없는",
    "오늘",
    "현재",
];

/// Closed-class English function words.
pub const ENGLISH_STOP_WORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "also", "am", "an", "and", "any",
    "are", "as", "at", "be", "because", "been", "before", "being", "below", "between", "both",
    "but", "by", "can", "could", "did", "do", "does", "doing", "down", "during", "each", "few",
    "for", "from", "further", "had", "has", "have", "having", "he", "her", "here", "hers",
    "herself", "him", "himself", "his", "how", "i", "if", "in", "into", "is", "it", "its",
    "itself", "just", "may", "me", "might", "more", "most", "must", "my", "myself", "no", "nor",
    "not", "now", "of", "off", "on", "once", "only", "or", "other", "our", "ours", "ourselves",
    "out", "over", "own", "same", "shall", "she", "should", "so", "some", "such", "than", "that",
    "the", "their", "theirs", "them", "themselves", "then", "there", "these", "they", "this",
    "those", "through", "to", "too", "under", "until", "up", "upon", "us", "very", "was", "we",
    "were", "what", "when", "where", "which", "while", "who", "whom", "why", "will", "with",
    "would", "you", "your", "yours", "yourself", "yourselves",
];

static KOREAN_STOP_SET: LazyLock<HashSet<&'static str>> =
    LazyLock::new(|| KOREAN_STOP_WORDS.iter().copied().collect());
static ENGLISH_STOP_SET: LazyLock<HashSet<&'static str>> =
    LazyLock::new(|| ENGLISH_STOP_WORDS.iter().copied().collect());

pub fn is_korean_stop_word(word: &str) -> bool {
    KOREAN_STOP_SET.contains(word)
}

/// `word` must already be lower-cased.
pub fn is_english_stop_word(word: &str) -> bool {
    ENGLISH_STOP_SET.contains(word)
}

/// True when `word` ends in a multi-syllable particle or ending, i.e. it looks like a
/// bare grammatical marker rather than a content word.
pub fn ends_with_marker(word: &str) -> bool {
    KOREAN_PARTICLES
        .iter()
        .chain(KOREAN_ENDINGS)
        .filter(|m| m.chars().count() >= 2)
        .any(|m| word.ends_with(m))
}

/// First entry of `table` that `word` ends with, removed. At most one strip.
pub fn strip_first<'a>(word: &'a str, table: &[&str]) -> &'a str {
    table
        .iter()
        .find_map(|suffix| word.strip_suffix(suffix))
        .unwrap_or(word)
}
