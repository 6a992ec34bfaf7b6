//! Grouping and aggregation.
//!
//! This module partitions a dataset by field value(s) and computes running
//! aggregates per group:
//! - Generic aggregation functions (Sum, Avg, Min, Max, Count)
//! - Single-level grouping with [`GroupEngine::group_by`]
//! - Hierarchical grouping with [`GroupEngine::group_by_multiple`]
//!
//! Aggregate outputs are named `{field}_{function}`, e.g. `amount_avg`.
//! Groups keep the order in which their keys were first seen.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt::{Display, Formatter};

use crate::config::GroupConfig;
use crate::error::{Error, Result};
use crate::fingerprint::Fingerprint;
use crate::memo::BoundedMemo;
use crate::record;

/// Bucket name shared by null, absent and the literal string `"undefined"`.
pub const UNDEFINED_KEY: &str = "undefined";

/// Aggregation functions that can be applied to a group's members.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregateFunction {
    /// Count the members where the field is present
    Count,
    /// Sum all numeric values
    Sum,
    /// Calculate the average of numeric values
    Avg,
    /// Find the minimum numeric value
    Min,
    /// Find the maximum numeric value
    Max,
}

impl Display for AggregateFunction {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            AggregateFunction::Count => write!(f, "count"),
            AggregateFunction::Sum => write!(f, "sum"),
            AggregateFunction::Avg => write!(f, "avg"),
            AggregateFunction::Min => write!(f, "min"),
            AggregateFunction::Max => write!(f, "max"),
        }
    }
}

/// Field name to the set of functions computed over it.
pub type AggregationSpec = BTreeMap<String, BTreeSet<AggregateFunction>>;

/// Convenience constructor for an [`AggregationSpec`].
pub fn aggregation_spec<'a>(
    entries: impl IntoIterator<Item = (&'a str, &'a [AggregateFunction])>,
) -> AggregationSpec {
    let mut spec = AggregationSpec::new();
    for (field, functions) in entries {
        spec.entry(field.to_string())
            .or_default()
            .extend(functions.iter().copied());
    }
    spec
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Group {
    /// Stringified grouping value
    pub name: String,
    /// First grouping value seen for this bucket (`null` when absent)
    pub key: Value,
    pub items: Vec<Value>,
    pub count: usize,
    pub aggregates: BTreeMap<String, f64>,
    #[serde(rename = "subGroups", skip_serializing_if = "Option::is_none")]
    pub sub_groups: Option<Groups>,
}

/// One row of [`Groups::summary`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupSummary {
    pub name: String,
    pub count: usize,
    pub aggregates: BTreeMap<String, f64>,
}

/// Groups of one level, in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Groups {
    groups: Vec<Group>,
}

impl Groups {
    pub fn get(&self, name: &str) -> Option<&Group> {
        self.groups.iter().find(|group| group.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Group> {
        self.groups.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.groups.iter().map(|group| group.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Counts and aggregates of this level, without member items.
    pub fn summary(&self) -> Vec<GroupSummary> {
        self.groups
            .iter()
            .map(|group| GroupSummary {
                name: group.name.clone(),
                count: group.count,
                aggregates: group.aggregates.clone(),
            })
            .collect()
    }
}

impl IntoIterator for Groups {
    type Item = Group;
    type IntoIter = std::vec::IntoIter<Group>;

    fn into_iter(self) -> Self::IntoIter {
        self.groups.into_iter()
    }
}

/// Running state for one aggregated field within one group.
#[derive(Debug, Default)]
struct Accumulator {
    present: u64,
    numeric: u64,
    sum: f64,
    min: Option<f64>,
    max: Option<f64>,
}

impl Accumulator {
    fn observe(&mut self, value: Option<&Value>) {
        let Some(value) = value else {
            return;
        };
        self.present += 1;

        if let Some(number) = record::to_number(value) {
            self.numeric += 1;
            self.sum += number;
            self.min = Some(self.min.map_or(number, |m| m.min(number)));
            self.max = Some(self.max.map_or(number, |m| m.max(number)));
        }
    }

    fn finish(&self, function: AggregateFunction) -> f64 {
        match function {
            AggregateFunction::Count => self.present as f64,
            AggregateFunction::Sum => self.sum,
            AggregateFunction::Avg if self.numeric == 0 => 0.0,
            AggregateFunction::Avg => self.sum / self.numeric as f64,
            AggregateFunction::Min => self.min.unwrap_or(0.0),
            AggregateFunction::Max => self.max.unwrap_or(0.0),
        }
    }
}

struct Builder {
    group: Group,
    accumulators: BTreeMap<String, Accumulator>,
}

type GroupCacheKey = (Vec<String>, AggregationSpec, Fingerprint);

pub struct GroupEngine {
    cache: BoundedMemo<GroupCacheKey, Groups>,
}

impl GroupEngine {
    pub fn new(cache_capacity: usize) -> Result<Self> {
        if cache_capacity == 0 {
            return Err(Error::InvalidCapacity);
        }
        Ok(Self {
            cache: BoundedMemo::new(cache_capacity),
        })
    }

    pub fn from_config(config: &GroupConfig) -> Result<Self> {
        Self::new(config.cache_capacity)
    }

    /// Partitions `data` by `field`, computing `aggregations` per group.
    pub fn group_by(&mut self, data: &[Value], field: &str, aggregations: &AggregationSpec) -> Groups {
        self.group_by_multiple(data, &[field], aggregations)
    }

    /// Groups by the first field, then recursively groups each group's
    /// members by the remaining fields into `sub_groups`.
    pub fn group_by_multiple(
        &mut self,
        data: &[Value],
        fields: &[&str],
        aggregations: &AggregationSpec,
    ) -> Groups {
        if fields.is_empty() {
            return Groups::default();
        }

        let key = (
            fields.iter().map(|f| f.to_string()).collect(),
            aggregations.clone(),
            Fingerprint::of(data),
        );
        if let Some(groups) = self.cache.get(&key) {
            return groups;
        }

        let groups = build(data, fields, aggregations);
        self.cache.insert(key, groups.clone());
        groups
    }

    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }
}

/// Stringified grouping key; null and absent collapse to `"undefined"`.
pub fn group_key(value: Option<&Value>) -> String {
    match value {
        None => UNDEFINED_KEY.to_string(),
        Some(value) => record::stringify(value),
    }
}

fn build(data: &[Value], fields: &[&str], aggregations: &AggregationSpec) -> Groups {
    let Some((field, rest)) = fields.split_first() else {
        return Groups::default();
    };

    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut builders: Vec<Builder> = Vec::new();

    for item in data {
        let value = record::field(item, field);
        let name = group_key(value);

        let slot = *positions.entry(name.clone()).or_insert_with(|| {
            builders.push(Builder {
                group: Group {
                    name,
                    key: value.cloned().unwrap_or(Value::Null),
                    items: Vec::new(),
                    count: 0,
                    aggregates: BTreeMap::new(),
                    sub_groups: None,
                },
                accumulators: aggregations
                    .keys()
                    .map(|f| (f.clone(), Accumulator::default()))
                    .collect(),
            });
            builders.len() - 1
        });

        let builder = &mut builders[slot];
        builder.group.items.push(item.clone());
        builder.group.count += 1;
        for (agg_field, accumulator) in builder.accumulators.iter_mut() {
            accumulator.observe(record::field(item, agg_field));
        }
    }

    let groups = builders
        .into_iter()
        .map(|Builder { mut group, accumulators }| {
            for (agg_field, functions) in aggregations {
                if let Some(accumulator) = accumulators.get(agg_field) {
                    for function in functions {
                        group
                            .aggregates
                            .insert(format!("{}_{}", agg_field, function), accumulator.finish(*function));
                    }
                }
            }
            if !rest.is_empty() {
                group.sub_groups = Some(build(&group.items, rest, aggregations));
            }
            group
        })
        .collect();

    Groups { groups }
}
