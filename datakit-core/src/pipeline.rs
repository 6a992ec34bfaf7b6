//! Ordered, named transformation steps over a collection.
//!
//! Output is memoized per `(dataset fingerprint, step names)`. Step names
//! stand in for step behavior in that key, so two pipelines that register
//! different closures under the same names share cache entries. Built-in
//! steps with parameters put the parameter in their name (`chunk(3)`).

use serde_json::{Map, Value};
use std::collections::HashSet;

use crate::config::PipelineConfig;
use crate::error::{Error, Result};
use crate::fingerprint::Fingerprint;
use crate::memo::BoundedMemo;
use crate::record;

pub type StepFn = Box<dyn Fn(Vec<Value>) -> Vec<Value> + Send + Sync>;
pub type Extractor = Box<dyn Fn(&Value) -> Value + Send + Sync>;

struct Step {
    name: String,
    apply: StepFn,
}

/// Where a normalized field takes its value from.
pub enum FieldMapping {
    Source(String),
    Extract(Extractor),
}

impl FieldMapping {
    pub fn source(field: impl Into<String>) -> Self {
        FieldMapping::Source(field.into())
    }

    pub fn extract(f: impl Fn(&Value) -> Value + Send + Sync + 'static) -> Self {
        FieldMapping::Extract(Box::new(f))
    }
}

/// Target field name to mapping, applied in order.
pub type NormalizeSchema = Vec<(String, FieldMapping)>;

pub struct Pipeline {
    steps: Vec<Step>,
    cache: BoundedMemo<(Fingerprint, Vec<String>), Vec<Value>>,
    cache_enabled: bool,
}

impl Pipeline {
    pub fn new(cache_capacity: usize) -> Result<Self> {
        if cache_capacity == 0 {
            return Err(Error::InvalidCapacity);
        }
        Ok(Self {
            steps: Vec::new(),
            cache: BoundedMemo::new(cache_capacity),
            cache_enabled: true,
        })
    }

    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        let mut pipeline = Self::new(config.cache_capacity)?;
        pipeline.cache_enabled = config.cache_enabled;
        Ok(pipeline)
    }

    /// Appends a custom step.
    pub fn step(
        &mut self,
        name: impl Into<String>,
        apply: impl Fn(Vec<Value>) -> Vec<Value> + Send + Sync + 'static,
    ) -> &mut Self {
        self.steps.push(Step {
            name: name.into(),
            apply: Box::new(apply),
        });
        self
    }

    pub fn map(&mut self, f: impl Fn(&Value) -> Value + Send + Sync + 'static) -> &mut Self {
        self.step("map", move |data| data.iter().map(&f).collect())
    }

    pub fn filter(&mut self, predicate: impl Fn(&Value) -> bool + Send + Sync + 'static) -> &mut Self {
        self.step("filter", move |data| {
            data.into_iter().filter(|item| predicate(item)).collect()
        })
    }

    /// Splices array elements into the collection, one level deep.
    pub fn flatten(&mut self) -> &mut Self {
        self.step("flatten", |data| {
            data.into_iter()
                .flat_map(|item| match item {
                    Value::Array(inner) => inner,
                    other => vec![other],
                })
                .collect()
        })
    }

    /// Drops items whose `id` was already seen; the first occurrence wins.
    pub fn deduplicate(&mut self) -> &mut Self {
        self.deduplicate_by(|item| item.get("id").cloned().unwrap_or(Value::Null))
    }

    /// Drops items whose extracted key was already seen.
    pub fn deduplicate_by(&mut self, key: impl Fn(&Value) -> Value + Send + Sync + 'static) -> &mut Self {
        self.step("deduplicate", move |data| {
            let mut seen = HashSet::new();
            data.into_iter()
                .filter(|item| seen.insert(key(item).to_string()))
                .collect()
        })
    }

    /// Batches items into arrays of `size`; the last batch may be shorter.
    pub fn chunk(&mut self, size: usize) -> Result<&mut Self> {
        if size == 0 {
            return Err(Error::InvalidChunkSize);
        }
        Ok(self.step(format!("chunk({})", size), move |data| {
            data.chunks(size)
                .map(|batch| Value::Array(batch.to_vec()))
                .collect()
        }))
    }

    /// Sets `field` on every object item to a value derived from the item.
    pub fn add_computed_field(
        &mut self,
        field: impl Into<String>,
        compute: impl Fn(&Value) -> Value + Send + Sync + 'static,
    ) -> &mut Self {
        let field = field.into();
        let name = format!("addComputedField({})", field);
        self.step(name, move |data| {
            data.into_iter()
                .map(|mut item| {
                    let computed = compute(&item);
                    if let Value::Object(map) = &mut item {
                        map.insert(field.clone(), computed);
                    }
                    item
                })
                .collect()
        })
    }

    /// Projects each item into a new object shaped by `schema`.
    ///
    /// Source mappings whose field is null or absent are omitted.
    pub fn normalize(&mut self, schema: NormalizeSchema) -> &mut Self {
        self.step("normalize", move |data| {
            data.iter()
                .map(|item| {
                    let mut shaped = Map::new();
                    for (target, mapping) in &schema {
                        let value = match mapping {
                            FieldMapping::Source(source) => record::field(item, source).cloned(),
                            FieldMapping::Extract(extract) => Some(extract(item)),
                        };
                        if let Some(value) = value {
                            shaped.insert(target.clone(), value);
                        }
                    }
                    Value::Object(shaped)
                })
                .collect()
        })
    }

    /// Applies every step in registration order.
    pub fn transform(&mut self, data: Vec<Value>) -> Vec<Value> {
        if data.is_empty() {
            return data;
        }

        let key = self.cache_enabled.then(|| (Fingerprint::of(&data), self.step_names()));
        if let Some(cached) = key.as_ref().and_then(|key| self.cache.get(key)) {
            return cached;
        }

        let output = self
            .steps
            .iter()
            .fold(data, |current, step| (step.apply)(current));

        if let Some(key) = key {
            self.cache.insert(key, output.clone());
        }
        output
    }

    pub fn step_names(&self) -> Vec<String> {
        self.steps.iter().map(|step| step.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    /// Removes every step and cached output.
    pub fn reset(&mut self) {
        self.steps.clear();
        self.cache.clear();
    }
}
