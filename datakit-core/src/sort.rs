//! Stable multi-criteria sorting with typed comparators and a result memo.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use nucleo::chars;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;

use crate::config::SortConfig;
use crate::error::{Error, Result};
use crate::fingerprint::Fingerprint;
use crate::memo::BoundedMemo;
use crate::record;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

/// How field values are compared.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortType {
    /// Natural, case- and accent-insensitive text ordering
    #[default]
    String,
    Number,
    /// Timestamps parsed from strings, or epoch milliseconds
    Date,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SortCriterion {
    pub field: String,
    #[serde(default)]
    pub direction: SortDirection,
    #[serde(default, rename = "type")]
    pub kind: SortType,
}

impl SortCriterion {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Asc,
            kind: SortType::String,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            direction: SortDirection::Desc,
            ..Self::asc(field)
        }
    }

    pub fn of_type(mut self, kind: SortType) -> Self {
        self.kind = kind;
        self
    }

    /// Decodes a JSON array of `{field, direction?, type?}` objects.
    pub fn parse_list(json: &str) -> Result<Vec<Self>> {
        Ok(serde_json::from_str(json)?)
    }
}

pub struct MultiSorter {
    cache: BoundedMemo<(Fingerprint, Vec<SortCriterion>), Vec<Value>>,
}

impl MultiSorter {
    pub fn new(cache_capacity: usize) -> Result<Self> {
        if cache_capacity == 0 {
            return Err(Error::InvalidCapacity);
        }
        Ok(Self {
            cache: BoundedMemo::new(cache_capacity),
        })
    }

    pub fn from_config(config: &SortConfig) -> Result<Self> {
        Self::new(config.cache_capacity)
    }

    /// Returns a sorted copy of `data`; the input is left untouched.
    ///
    /// Criteria apply in order and the first non-equal comparison decides.
    /// Items equal under every criterion keep their input order.
    pub fn sort(&mut self, data: &[Value], criteria: &[SortCriterion]) -> Vec<Value> {
        if criteria.is_empty() || data.len() < 2 {
            return data.to_vec();
        }

        let key = (Fingerprint::of(data), criteria.to_vec());
        if let Some(sorted) = self.cache.get(&key) {
            return sorted;
        }

        let sorted = sort_uncached(data, criteria);
        self.cache.insert(key, sorted.clone());
        sorted
    }

    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }
}

fn sort_uncached(data: &[Value], criteria: &[SortCriterion]) -> Vec<Value> {
    let mut positions: Vec<usize> = (0..data.len()).collect();
    // slice::sort_by is stable.
    positions.sort_by(|&a, &b| compare_items(&data[a], &data[b], criteria));
    positions.into_iter().map(|p| data[p].clone()).collect()
}

fn compare_items(a: &Value, b: &Value, criteria: &[SortCriterion]) -> Ordering {
    for criterion in criteria {
        let ordering = compare_values(
            record::field(a, &criterion.field),
            record::field(b, &criterion.field),
            criterion.kind,
        );
        let ordering = match criterion.direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

/// Total order over field values of one type.
///
/// Null/absent sorts first. For `Number` and `Date`, values that cannot be
/// interpreted as the type come next, ordered naturally by their text, and
/// interpretable values come last in numeric or chronological order.
pub fn compare_values(a: Option<&Value>, b: Option<&Value>, kind: SortType) -> Ordering {
    let (a, b) = match (a, b) {
        (None, None) => return Ordering::Equal,
        (None, Some(_)) => return Ordering::Less,
        (Some(_), None) => return Ordering::Greater,
        (Some(a), Some(b)) => (a, b),
    };

    match kind {
        SortType::Number => compare_coerced(a, b, record::to_number, f64::total_cmp),
        SortType::Date => compare_coerced(a, b, parse_timestamp, i64::cmp),
        SortType::String => natural_cmp(&record::stringify(a), &record::stringify(b)),
    }
}

fn compare_coerced<T>(
    a: &Value,
    b: &Value,
    coerce: impl Fn(&Value) -> Option<T>,
    cmp: impl Fn(&T, &T) -> Ordering,
) -> Ordering {
    match (coerce(a), coerce(b)) {
        (Some(x), Some(y)) => cmp(&x, &y),
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (None, None) => natural_cmp(&record::stringify(a), &record::stringify(b)),
    }
}

/// Epoch milliseconds from RFC 3339, common date(-time) layouts, or a number.
pub fn parse_timestamp(value: &Value) -> Option<i64> {
    const DATETIME_FORMATS: [&str; 4] = [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
    ];

    match value {
        Value::Number(n) => n.as_f64().filter(|f| f.is_finite()).map(|f| f as i64),
        Value::String(s) => {
            let s = s.trim();
            if let Ok(parsed) = DateTime::parse_from_rfc3339(s) {
                return Some(parsed.timestamp_millis());
            }
            for format in DATETIME_FORMATS {
                if let Ok(parsed) = NaiveDateTime::parse_from_str(s, format) {
                    return Some(parsed.and_utc().timestamp_millis());
                }
            }
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
                .map(|midnight| midnight.and_utc().timestamp_millis())
        }
        _ => None,
    }
}

enum Segment<'a> {
    Digits(&'a str),
    Char(char),
}

fn segments(s: &str) -> Vec<Segment<'_>> {
    let mut out = Vec::new();
    let mut iter = s.char_indices().peekable();
    while let Some((start, c)) = iter.next() {
        if c.is_ascii_digit() {
            let mut end = start + c.len_utf8();
            while let Some(&(i, next)) = iter.peek() {
                if !next.is_ascii_digit() {
                    break;
                }
                end = i + next.len_utf8();
                iter.next();
            }
            out.push(Segment::Digits(&s[start..end]));
        } else {
            out.push(Segment::Char(c));
        }
    }
    out
}

fn fold(c: char) -> char {
    chars::to_lower_case(chars::normalize(c))
}

/// Collation-style comparison: digit runs by numeric value, letters ignoring
/// case and accents, digits before letters.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let (a, b) = (segments(a), segments(b));

    for (x, y) in a.iter().zip(b.iter()) {
        let ordering = match (x, y) {
            (Segment::Digits(x), Segment::Digits(y)) => {
                let x = x.trim_start_matches('0');
                let y = y.trim_start_matches('0');
                x.len().cmp(&y.len()).then_with(|| x.cmp(y))
            }
            (Segment::Digits(_), Segment::Char(_)) => Ordering::Less,
            (Segment::Char(_), Segment::Digits(_)) => Ordering::Greater,
            (Segment::Char(x), Segment::Char(y)) => fold(*x).cmp(&fold(*y)),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }

    a.len().cmp(&b.len())
}
