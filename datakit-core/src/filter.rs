//! Per-field inverted indexes answering conjunctive filter queries.
//!
//! The filter owns the snapshot it indexed (`Arc<[Value]>`), so positions
//! can never drift from the data they point into. [`IndexedFilter::filter_dataset`]
//! rebuilds transparently when handed a different dataset.
//!
//! Results always come back in dataset order, including wildcard criteria
//! that match several index keys.

use regex::{Regex, RegexBuilder};
use serde_json::{Map, Value};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{trace, warn};

use crate::record;

/// Field name to filter value. Null and `""` values are ignored.
pub type Criteria = Map<String, Value>;

type Bucket = Vec<usize>;

#[derive(Default)]
pub struct IndexedFilter {
    data: Option<Arc<[Value]>>,
    fields: Vec<String>,
    indexes: HashMap<String, HashMap<String, Bucket>>,
}

impl IndexedFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces any previous snapshot and builds one index per field.
    ///
    /// Null and absent values are not indexed.
    pub fn build_indexes(&mut self, data: impl Into<Arc<[Value]>>, fields: &[&str]) {
        let data = data.into();
        self.indexes.clear();
        self.fields = fields.iter().map(|f| f.to_string()).collect();

        for field in fields {
            let mut index: HashMap<String, Bucket> = HashMap::new();
            for (position, item) in data.iter().enumerate() {
                if let Some(value) = record::field(item, field) {
                    index
                        .entry(record::stringify(value).to_lowercase())
                        .or_default()
                        .push(position);
                }
            }
            trace!(field, keys = index.len(), "built index");
            self.indexes.insert(field.to_string(), index);
        }

        self.data = Some(data);
    }

    /// Filters the indexed snapshot. Criteria on different fields are ANDed.
    pub fn filter(&self, criteria: &Criteria) -> Vec<Value> {
        let Some(data) = &self.data else {
            return Vec::new();
        };

        let mut selected: Option<BTreeSet<usize>> = None;

        for (field, value) in criteria {
            if record::is_blank(value) {
                continue;
            }

            let matches = match self.indexes.get(field) {
                Some(index) => lookup(index, value),
                None => scan(data, field, value),
            };
            trace!(field = %field, matched = matches.len(), "criterion applied");

            let narrowed = match selected {
                None => matches,
                Some(current) => current.intersection(&matches).copied().collect(),
            };
            if narrowed.is_empty() {
                return Vec::new();
            }
            selected = Some(narrowed);
        }

        match selected {
            None => data.to_vec(),
            Some(positions) => positions.into_iter().map(|p| data[p].clone()).collect(),
        }
    }

    /// Filters `data`, first rebuilding the indexes (same fields) if `data`
    /// is not the snapshot they were built from.
    pub fn filter_dataset(&mut self, data: &Arc<[Value]>, criteria: &Criteria) -> Vec<Value> {
        if !self.is_built_for(data) {
            let fields = std::mem::take(&mut self.fields);
            let fields: Vec<&str> = fields.iter().map(String::as_str).collect();
            self.build_indexes(Arc::clone(data), &fields);
        }
        self.filter(criteria)
    }

    pub fn is_built_for(&self, data: &Arc<[Value]>) -> bool {
        self.data.as_ref().is_some_and(|own| Arc::ptr_eq(own, data))
    }

    pub fn indexed_fields(&self) -> &[String] {
        &self.fields
    }

    /// Drops the snapshot and every index.
    pub fn clear(&mut self) {
        self.data = None;
        self.fields.clear();
        self.indexes.clear();
    }
}

fn lookup(index: &HashMap<String, Bucket>, value: &Value) -> BTreeSet<usize> {
    match value {
        Value::String(pattern) if pattern.contains('*') => match wildcard_regex(pattern) {
            Some(regex) => index
                .iter()
                .filter(|(key, _)| regex.is_match(key))
                .flat_map(|(_, bucket)| bucket.iter().copied())
                .collect(),
            None => BTreeSet::new(),
        },
        _ => index
            .get(&record::stringify(value).to_lowercase())
            .map(|bucket| bucket.iter().copied().collect())
            .unwrap_or_default(),
    }
}

fn scan(data: &[Value], field: &str, value: &Value) -> BTreeSet<usize> {
    let needle = match value {
        Value::String(s) => Some(s.to_lowercase()),
        _ => None,
    };

    data.iter()
        .enumerate()
        .filter(|(_, item)| match (record::field(item, field), &needle) {
            (None, _) => false,
            (Some(found), Some(needle)) => record::stringify(found).to_lowercase().contains(needle),
            (Some(found), None) => record::loose_eq(found, value),
        })
        .map(|(position, _)| position)
        .collect()
}

/// Case-insensitive regex for a wildcard value. `*` matches any run of
/// characters, everything else is literal, and a match may occur anywhere
/// in the key.
fn wildcard_regex(pattern: &str) -> Option<Regex> {
    let source = pattern
        .split('*')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".*");

    match RegexBuilder::new(&source)
        .case_insensitive(true)
        .dot_matches_new_line(true)
        .build()
    {
        Ok(regex) => Some(regex),
        Err(err) => {
            warn!(pattern, %err, "wildcard criterion matches nothing");
            None
        }
    }
}
