//! Mixed-script tokenizer: Korean suffix stripping, English stop-words, numeric admission.

use crate::lexicon::{
    ends_with_marker, is_english_stop_word, is_korean_stop_word, strip_first, KOREAN_ENDINGS,
    KOREAN_PARTICLES,
};
use webcloud_core::{Script, Token};

/// Raw words shorter than this are dropped before classification.
pub const MIN_TOKEN_CHARS: usize = 2;
/// A Korean word whose stem collapses below `MIN_TOKEN_CHARS` is kept whole only from this length.
const KOREAN_FALLBACK_MIN_CHARS: usize = 3;
const LATIN_MIN_CHARS: usize = 3;

type CharPredicate = fn(char) -> bool;

fn is_sentence_break(c: char) -> bool {
    matches!(c, '.' | '!' | '?' | '。' | '．' | '？' | '！')
}

pub(crate) fn is_hangul_syllable(c: char) -> bool {
    ('\u{AC00}'..='\u{D7A3}').contains(&c)
}

fn is_word_char(c: char) -> bool {
    is_hangul_syllable(c) || c.is_ascii_alphanumeric()
}

fn is_word_break(c: char) -> bool {
    !is_word_char(c)
}

/// Sentences of a text, split on terminal punctuation, trimmed, empties dropped.
pub struct Sentences<'a>(std::str::Split<'a, CharPredicate>);

pub fn sentences(text: &str) -> Sentences<'_> {
    Sentences(text.split(is_sentence_break as CharPredicate))
}

impl<'a> Iterator for Sentences<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        loop {
            let s = self.0.next()?.trim();
            if !s.is_empty() {
                return Some(s);
            }
        }
    }
}

/// Lazy token stream over a text. Consumed once; order is sentence order, then word order.
pub struct Tokens<'a> {
    sentences: Sentences<'a>,
    words: Option<std::str::Split<'a, CharPredicate>>,
}

pub fn tokenize(text: &str) -> Tokens<'_> {
    Tokens {
        sentences: sentences(text),
        words: None,
    }
}

impl Iterator for Tokens<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        loop {
            if let Some(words) = self.words.as_mut() {
                for raw in words.by_ref() {
                    if let Some(tok) = normalize_word(raw) {
                        return Some(tok);
                    }
                }
                self.words = None;
            }
            let sentence = self.sentences.next()?;
            self.words = Some(sentence.split(is_word_break as CharPredicate));
        }
    }
}

pub fn classify(word: &str) -> Script {
    if word.chars().any(is_hangul_syllable) {
        Script::Korean
    } else if word.chars().any(|c| c.is_ascii_alphabetic()) {
        Script::Latin
    } else {
        Script::Numeric
    }
}

/// Normalize one raw word; `None` means the word is dropped.
pub fn normalize_word(raw: &str) -> Option<Token> {
    if raw.chars().count() < MIN_TOKEN_CHARS {
        return None;
    }
    let script = classify(raw);
    let text = match script {
        Script::Korean => korean_stem(raw)?,
        Script::Latin => {
            let lower = raw.to_ascii_lowercase();
            if lower.chars().count() < LATIN_MIN_CHARS || is_english_stop_word(&lower) {
                return None;
            }
            lower
        }
        Script::Numeric => raw.to_string(),
    };
    Some(Token { text, script })
}

/// One particle, then one ending. Stems that collapse fall back to the whole word unless
/// it ends in a multi-syllable marker.
pub fn strip_korean_suffixes(word: &str) -> &str {
    strip_first(strip_first(word, KOREAN_PARTICLES), KOREAN_ENDINGS)
}

fn korean_stem(word: &str) -> Option<String> {
    if is_korean_stop_word(word) {
        return None;
    }
    let stem = strip_korean_suffixes(word);
    let kept = if stem.chars().count() >= MIN_TOKEN_CHARS {
        stem
    } else if word.chars().count() >= KOREAN_FALLBACK_MIN_CHARS && !ends_with_marker(word) {
        word
    } else {
        return None;
    };
    if is_korean_stop_word(kept) {
        return None;
    }
    Some(kept.to_lowercase())
}
