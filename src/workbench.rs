use async_trait::async_trait;
use chrono::{DateTime, Utc};
use datakit_core::{
    cache_key, AggregationSpec, CacheStats, Criteria, ExpiringCache, FuzzySearch, GroupEngine,
    Groups, IndexedFilter, MultiSorter, Pipeline, SortCriterion, TtlPolicies,
};
use futures::stream::BoxStream;
use futures::TryStreamExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::config::AppSettings;
use crate::error::{BoxError, Error, Result};

/// Supplies raw records for a namespace, e.g. an API listing endpoint.
pub trait DataSource: Send + Sync {
    fn records(&self, namespace: &str, params: &Value) -> BoxStream<'static, std::result::Result<Value, BoxError>>;
}

/// What to fetch and how to shape it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ViewRequest {
    pub namespace: String,
    #[serde(default)]
    pub params: Value,
    /// TTL policy for the fetch; the configured default kind when absent
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub filters: Criteria,
    #[serde(default)]
    pub sort: Vec<SortCriterion>,
    #[serde(default)]
    pub group_by: Vec<String>,
    #[serde(default)]
    pub aggregations: AggregationSpec,
}

impl ViewRequest {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ViewResult {
    pub items: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub groups: Option<Groups>,
    /// Number of records fetched before selection
    pub fetched: usize,
    pub from_cache: bool,
    pub generated_at: DateTime<Utc>,
}

#[async_trait]
pub trait ViewProcessor {
    async fn view(&self, request: &ViewRequest) -> Result<ViewResult>;
    async fn transform(&self, request: &ViewRequest, pipeline: &mut Pipeline) -> Result<Vec<Value>>;
    async fn invalidate(&self, namespace: &str) -> usize;
    async fn cache_stats(&self) -> CacheStats;
}

struct Engines {
    cache: ExpiringCache<Arc<[Value]>>,
    fuzzy: FuzzySearch,
    filter: IndexedFilter,
    sorter: MultiSorter,
    grouper: GroupEngine,
}

/// Fetches records through an expiring cache, then runs selection,
/// ordering and partitioning over them.
pub struct Workbench {
    source: Box<dyn DataSource>,
    engines: Mutex<Engines>,
    policies: TtlPolicies,
    default_kind: String,
    search_fields: Vec<String>,
}

impl Workbench {
    pub fn new(source: Box<dyn DataSource>, settings: &AppSettings) -> Result<Self> {
        let engine = &settings.engine;
        let index_fields: Vec<&str> = settings.workbench.index_fields.iter().map(String::as_str).collect();

        // Index field list is kept; the first filtered view rebuilds against real data.
        let mut filter = IndexedFilter::new();
        filter.build_indexes(Vec::<Value>::new(), &index_fields);

        Ok(Self {
            source,
            engines: Mutex::new(Engines {
                cache: ExpiringCache::from_config(&engine.cache),
                fuzzy: FuzzySearch::from_config(&engine.search)?,
                filter,
                sorter: MultiSorter::from_config(&engine.sort)?,
                grouper: GroupEngine::from_config(&engine.group)?,
            }),
            policies: engine.cache.policies(),
            default_kind: settings.workbench.ttl_kind.clone(),
            search_fields: settings.workbench.search_fields.clone(),
        })
    }

    async fn fetch(&self, engines: &mut Engines, request: &ViewRequest) -> Result<(Arc<[Value]>, bool)> {
        let namespace = request.namespace.as_str();
        let kind = request.kind.as_deref().unwrap_or(&self.default_kind);
        let key = cache_key(namespace, &request.params);
        let source = &self.source;

        let cached = engines
            .cache
            .cached_call(
                &key,
                || async move {
                    info!(namespace, "fetching records");
                    let records: Vec<Value> = source.records(namespace, &request.params).try_collect().await?;
                    info!(namespace, count = records.len(), "fetched records");
                    Ok::<_, BoxError>(Arc::from(records))
                },
                Some(self.policies.ttl_for(kind)),
            )
            .await
            .map_err(|source| Error::Source {
                namespace: namespace.to_string(),
                source,
            })?;

        Ok((cached.value, cached.from_cache))
    }
}

#[async_trait]
impl ViewProcessor for Workbench {
    async fn view(&self, request: &ViewRequest) -> Result<ViewResult> {
        let mut engines = self.engines.lock().await;
        let (data, from_cache) = self.fetch(&mut engines, request).await?;

        let mut items = if request.filters.is_empty() {
            data.to_vec()
        } else {
            engines.filter.filter_dataset(&data, &request.filters)
        };

        if let Some(query) = request.search.as_deref() {
            let fields: Vec<&str> = self.search_fields.iter().map(String::as_str).collect();
            items = engines.fuzzy.search(query, &items, &fields);
        }

        if !request.sort.is_empty() {
            items = engines.sorter.sort(&items, &request.sort);
        }

        let groups = if request.group_by.is_empty() {
            None
        } else {
            let fields: Vec<&str> = request.group_by.iter().map(String::as_str).collect();
            Some(engines.grouper.group_by_multiple(&items, &fields, &request.aggregations))
        };

        debug!(namespace = %request.namespace, selected = items.len(), "view built");

        Ok(ViewResult {
            items,
            groups,
            fetched: data.len(),
            from_cache,
            generated_at: Utc::now(),
        })
    }

    async fn transform(&self, request: &ViewRequest, pipeline: &mut Pipeline) -> Result<Vec<Value>> {
        let mut engines = self.engines.lock().await;
        let (data, _) = self.fetch(&mut engines, request).await?;
        Ok(pipeline.transform(data.to_vec()))
    }

    async fn invalidate(&self, namespace: &str) -> usize {
        let removed = self.engines.lock().await.cache.invalidate_namespace(namespace);
        info!(namespace, removed, "invalidated cached records");
        removed
    }

    async fn cache_stats(&self) -> CacheStats {
        self.engines.lock().await.cache.stats()
    }
}
