use std::collections::HashMap;
use webcloud_core::RankedTerm;

/// Default cap on the number of ranked terms.
pub const MAX_RANKED_TERMS: usize = 50;
const MIN_TERM_CHARS: usize = 2;

/// Term counts in first-seen order. Built once per request, then consumed by ranking.
#[derive(Debug, Default, Clone)]
pub struct FrequencyTable {
    index: HashMap<String, usize>,
    entries: Vec<(String, u64)>,
}

impl FrequencyTable {
    pub fn from_tokens<I>(tokens: I) -> Self
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let mut table = Self::default();
        for tok in tokens {
            table.add(tok.as_ref());
        }
        table
    }

    fn add(&mut self, term: &str) {
        let term = term.to_lowercase();
        if term.chars().count() < MIN_TERM_CHARS {
            return;
        }
        match self.index.get(&term) {
            Some(&i) => self.entries[i].1 += 1,
            None => {
                self.index.insert(term.clone(), self.entries.len());
                self.entries.push((term, 1));
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn count(&self, term: &str) -> u64 {
        self.index
            .get(term)
            .map(|&i| self.entries[i].1)
            .unwrap_or(0)
    }

    /// Total number of counted tokens.
    pub fn total(&self) -> u64 {
        self.entries.iter().map(|(_, c)| c).sum()
    }

    /// Descending by count; equal counts keep first-seen order.
    pub fn into_ranked(self, cap: usize) -> Vec<RankedTerm> {
        let mut entries = self.entries;
        // `sort_by` is stable.
        entries.sort_by(|a, b| b.1.cmp(&a.1));
        entries
            .into_iter()
            .take(cap)
            .enumerate()
            .map(|(i, (term, count))| RankedTerm {
                term,
                count,
                rank: i + 1,
            })
            .collect()
    }
}

/// Rank tokens by frequency, capped at [`MAX_RANKED_TERMS`]. Empty input gives an empty list.
pub fn rank<I>(tokens: I) -> Vec<RankedTerm>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    rank_top(tokens, MAX_RANKED_TERMS)
}

pub fn rank_top<I>(tokens: I, cap: usize) -> Vec<RankedTerm>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    FrequencyTable::from_tokens(tokens).into_ranked(cap)
}
