/*!
# datakit-core: in-memory data engine for record collections

datakit-core holds the building blocks an application uses to shape collections of JSON records
after they have been fetched: remember expensive results for a while, narrow them down, order them,
partition them and reshape them.

## Components

### Expiring Cache ([`cache`])
- Deterministic keys from a namespace plus a parameter object (field order does not matter)
- Per-entry TTL with lazy eviction and a rate-limited opportunistic sweep
- Async memoization of fallible producers; failures are never cached
- Hit/miss statistics and namespace invalidation

### Fuzzy Search ([`fuzzy`])
- Levenshtein similarity over chosen string fields, best match first

### Indexed Filter ([`filter`])
- Per-field inverted indexes, exact and `*` glob lookups, conjunctive criteria

### Multi-criteria Sorter ([`sort`])
- Stable lexicographic ordering by string, number or date criteria with null handling

### Grouping Engine ([`group`])
- Single and nested grouping with count, sum, avg, min and max aggregates

### Transformation Pipeline ([`pipeline`])
- Named steps applied in order, with output memoized per dataset content

## Usage

```rust
use datakit_core::{IndexedFilter, MultiSorter, SortCriterion};
use serde_json::json;

let people = vec![
    json!({"name": "Bea", "team": "ops", "age": 41}),
    json!({"name": "Al", "team": "dev", "age": 29}),
    json!({"name": "Cy", "team": "ops", "age": 35}),
];

let mut filter = IndexedFilter::new();
filter.build_indexes(people, &["team"]);
let criteria = json!({"team": "OPS"}).as_object().cloned().unwrap_or_default();
let ops = filter.filter(&criteria);

let mut sorter = MultiSorter::new(16).unwrap();
let sorted = sorter.sort(&ops, &[SortCriterion::asc("name")]);
assert_eq!(sorted[0]["name"], "Bea");
```

Every component is configured through [`config::EngineSettings`], whose defaults are embedded
from `config/default.toml`.
*/

pub mod cache;
pub mod config;
pub mod error;
pub mod filter;
pub mod fingerprint;
pub mod fuzzy;
pub mod group;
pub mod pipeline;
pub mod record;
pub mod sort;

mod memo;

pub use cache::{cache_key, CacheStats, Cached, ExpiringCache};
pub use config::{EngineSettings, TtlPolicies};
pub use error::{Error, Result};
pub use filter::{Criteria, IndexedFilter};
pub use fingerprint::Fingerprint;
pub use fuzzy::{FuzzySearch, ScoredMatch};
pub use group::{aggregation_spec, AggregateFunction, AggregationSpec, Group, GroupEngine, Groups};
pub use pipeline::{FieldMapping, NormalizeSchema, Pipeline};
pub use sort::{MultiSorter, SortCriterion, SortDirection, SortType};
