//! Approximate string matching by normalized edit distance.

use serde_json::Value;
use std::collections::HashMap;

use crate::config::SearchConfig;
use crate::error::{Error, Result};
use crate::record;

pub const DEFAULT_THRESHOLD: f64 = 0.6;

/// A search hit with its score and position in the searched collection.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredMatch {
    pub index: usize,
    pub score: f64,
    pub item: Value,
}

pub struct FuzzySearch {
    threshold: f64,
    case_sensitive: bool,
    memo: HashMap<(String, String), usize>,
}

impl Default for FuzzySearch {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            case_sensitive: false,
            memo: HashMap::new(),
        }
    }
}

impl FuzzySearch {
    pub fn new(threshold: f64, case_sensitive: bool) -> Result<Self> {
        if !(0.0..=1.0).contains(&threshold) {
            return Err(Error::InvalidThreshold(threshold));
        }
        Ok(Self {
            threshold,
            case_sensitive,
            memo: HashMap::new(),
        })
    }

    pub fn from_config(config: &SearchConfig) -> Result<Self> {
        Self::new(config.threshold, config.case_sensitive)
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Levenshtein distance between `a` and `b`, memoized per ordered pair.
    pub fn distance(&mut self, a: &str, b: &str) -> usize {
        let (a, b) = (self.fold(a), self.fold(b));
        self.folded_distance(a, b)
    }

    /// `1 - distance / max(len)`, or `1.0` when both strings are empty.
    /// Lengths are counted after case folding, so the result stays in `[0, 1]`.
    pub fn similarity(&mut self, a: &str, b: &str) -> f64 {
        let (a, b) = (self.fold(a), self.fold(b));
        let longest = a.chars().count().max(b.chars().count());
        if longest == 0 {
            return 1.0;
        }
        1.0 - self.folded_distance(a, b) as f64 / longest as f64
    }

    /// Returns the items scoring at least the threshold, best first.
    ///
    /// A blank query returns `items` unchanged.
    pub fn search(&mut self, query: &str, items: &[Value], fields: &[&str]) -> Vec<Value> {
        if query.trim().is_empty() {
            return items.to_vec();
        }
        self.search_scored(query, items, fields)
            .into_iter()
            .map(|hit| hit.item)
            .collect()
    }

    /// Like [`search`](Self::search) but keeps each hit's score and position.
    /// Equal scores keep their input order.
    pub fn search_scored(&mut self, query: &str, items: &[Value], fields: &[&str]) -> Vec<ScoredMatch> {
        if query.trim().is_empty() {
            return items
                .iter()
                .enumerate()
                .map(|(index, item)| ScoredMatch {
                    index,
                    score: 1.0,
                    item: item.clone(),
                })
                .collect();
        }

        let mut hits: Vec<ScoredMatch> = items
            .iter()
            .enumerate()
            .filter_map(|(index, item)| {
                let score = self.score(query, item, fields);
                (score >= self.threshold).then(|| ScoredMatch {
                    index,
                    score,
                    item: item.clone(),
                })
            })
            .collect();

        // Vec::sort_by is stable.
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits
    }

    pub fn clear_cache(&mut self) {
        self.memo.clear();
    }

    pub fn memo_len(&self) -> usize {
        self.memo.len()
    }

    fn score(&mut self, query: &str, item: &Value, fields: &[&str]) -> f64 {
        fields
            .iter()
            .filter_map(|field| match record::field(item, field) {
                Some(Value::String(text)) => Some(text.as_str()),
                _ => None,
            })
            .fold(0.0, |best, text| best.max(self.similarity(query, text)))
    }

    fn folded_distance(&mut self, a: String, b: String) -> usize {
        if let Some(&cached) = self.memo.get(&(a.clone(), b.clone())) {
            return cached;
        }

        let distance = levenshtein(&a, &b);
        self.memo.insert((a, b), distance);
        distance
    }

    fn fold(&self, s: &str) -> String {
        if self.case_sensitive {
            s.to_string()
        } else {
            s.to_lowercase()
        }
    }
}

/// Edit distance over a `(|b| + 1) x (|a| + 1)` table of chars.
fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    let mut table = vec![vec![0usize; a.len() + 1]; b.len() + 1];
    for (j, cell) in table[0].iter_mut().enumerate() {
        *cell = j;
    }
    for (i, row) in table.iter_mut().enumerate() {
        row[0] = i;
    }

    for i in 1..=b.len() {
        for j in 1..=a.len() {
            let substitution = if b[i - 1] == a[j - 1] { 0 } else { 1 };
            table[i][j] = (table[i - 1][j - 1] + substitution)
                .min(table[i][j - 1] + 1)
                .min(table[i - 1][j] + 1);
        }
    }

    table[b.len()][a.len()]
}
