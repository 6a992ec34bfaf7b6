use crate::config::AppSettings;
use crate::error::{BoxError, Error};
use crate::workbench::{DataSource, ViewProcessor, ViewRequest, Workbench};
use datakit_core::{aggregation_spec, AggregateFunction, Pipeline, SortCriterion, SortType};
use futures::stream::{self, BoxStream};
use mockall::*;
use serde_json::{json, Value};
use std::time::Duration;

mock! {
    pub Source {}
    impl DataSource for Source {
        fn records(&self, namespace: &str, params: &Value) -> BoxStream<'static, Result<Value, BoxError>>;
    }
}

fn catalog() -> Vec<Value> {
    vec![
        json!({"id": 1, "name": "Anvil", "status": "active", "category": "tools", "price": 40}),
        json!({"id": 2, "name": "Bolt", "status": "retired", "category": "hardware", "price": 1}),
        json!({"id": 3, "name": "Chisel", "status": "active", "category": "tools", "price": 15}),
        json!({"id": 4, "name": "Drill", "status": "ACTIVE", "category": "power", "price": 90}),
        json!({"id": 5, "name": "Nail", "status": "active", "category": "hardware", "price": 0.5}),
    ]
}

fn source_returning(records: Vec<Value>, times: usize) -> MockSource {
    let mut source = MockSource::new();
    source
        .expect_records()
        .times(times)
        .returning(move |_, _| Box::pin(stream::iter(records.clone().into_iter().map(Ok::<Value, BoxError>))));
    source
}

fn workbench(source: MockSource) -> Workbench {
    Workbench::new(Box::new(source), &AppSettings::default()).unwrap()
}

fn ids(items: &[Value]) -> Vec<i64> {
    items.iter().filter_map(|item| item["id"].as_i64()).collect()
}

#[tokio::test(start_paused = true)]
async fn test_fetches_once_per_ttl_window() {
    let workbench = workbench(source_returning(catalog(), 2));
    let request = ViewRequest::new("catalog");

    let first = workbench.view(&request).await.unwrap();
    assert!(!first.from_cache);
    assert_eq!(first.fetched, 5);

    tokio::time::advance(Duration::from_secs(299)).await;
    let second = workbench.view(&request).await.unwrap();
    assert!(second.from_cache);
    assert_eq!(second.items, first.items);

    // "list" views live for 300 seconds.
    tokio::time::advance(Duration::from_secs(2)).await;
    let third = workbench.view(&request).await.unwrap();
    assert!(!third.from_cache);
}

#[tokio::test(start_paused = true)]
async fn test_ttl_kind_selects_policy() {
    let workbench = workbench(source_returning(catalog(), 2));
    let mut request = ViewRequest::new("catalog");
    request.kind = Some("status".to_string());

    workbench.view(&request).await.unwrap();
    tokio::time::advance(Duration::from_secs(61)).await;
    let view = workbench.view(&request).await.unwrap();
    assert!(!view.from_cache);
}

#[tokio::test]
async fn test_failures_are_not_cached() {
    let mut source = MockSource::new();
    let mut seq = Sequence::new();

    source
        .expect_records()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Box::pin(stream::iter(vec![Err::<Value, BoxError>("source offline".into())])));
    source
        .expect_records()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Box::pin(stream::iter(vec![Ok::<Value, BoxError>(json!({"id": 1}))])));

    let workbench = workbench(source);
    let request = ViewRequest::new("catalog");

    let result = workbench.view(&request).await;
    assert!(matches!(result, Err(Error::Source { .. })));
    assert!(result.unwrap_err().to_string().contains("source offline"));

    let retried = workbench.view(&request).await.unwrap();
    assert!(!retried.from_cache);
    assert_eq!(ids(&retried.items), vec![1]);

    let cached = workbench.view(&request).await.unwrap();
    assert!(cached.from_cache);
}

#[tokio::test]
async fn test_partial_stream_failure_discards_records() {
    let mut source = MockSource::new();
    source.expect_records().times(1).returning(|_, _| {
        Box::pin(stream::iter(vec![
            Ok(json!({"id": 1})),
            Err::<Value, BoxError>("connection reset".into()),
        ]))
    });

    let workbench = workbench(source);
    assert!(workbench.view(&ViewRequest::new("catalog")).await.is_err());
    assert_eq!(workbench.cache_stats().await.hits, 0);
}

#[tokio::test]
async fn test_filter_sort_group_flow() {
    let workbench = workbench(source_returning(catalog(), 1));

    let mut request = ViewRequest::new("catalog");
    request.filters = json!({"status": "active"}).as_object().cloned().unwrap();
    request.sort = vec![SortCriterion::desc("price").of_type(SortType::Number)];
    request.group_by = vec!["category".to_string()];
    request.aggregations = aggregation_spec([("price", &[AggregateFunction::Sum, AggregateFunction::Count][..])]);

    let view = workbench.view(&request).await.unwrap();
    assert_eq!(ids(&view.items), vec![4, 1, 3, 5]);
    assert_eq!(view.fetched, 5);

    let groups = view.groups.unwrap();
    assert_eq!(groups.names(), vec!["power", "tools", "hardware"]);

    let tools = groups.get("tools").unwrap();
    assert_eq!(tools.count, 2);
    assert_eq!(tools.aggregates.get("price_sum"), Some(&55.0));
    assert_eq!(tools.aggregates.get("price_count"), Some(&2.0));
}

#[tokio::test]
async fn test_fuzzy_search_selection() {
    let workbench = workbench(source_returning(catalog(), 1));

    let mut request = ViewRequest::new("catalog");
    request.search = Some("chisle".to_string());

    let view = workbench.view(&request).await.unwrap();
    assert_eq!(ids(&view.items), vec![3]);
    assert!(view.groups.is_none());
}

#[tokio::test]
async fn test_params_produce_distinct_cache_entries() {
    let workbench = workbench(source_returning(catalog(), 2));

    let mut page_one = ViewRequest::new("catalog");
    page_one.params = json!({"page": 1, "size": 20});
    let mut page_two = ViewRequest::new("catalog");
    page_two.params = json!({"page": 2, "size": 20});
    let mut reordered = ViewRequest::new("catalog");
    reordered.params = json!({"size": 20, "page": 1});

    assert!(!workbench.view(&page_one).await.unwrap().from_cache);
    assert!(!workbench.view(&page_two).await.unwrap().from_cache);
    assert!(workbench.view(&reordered).await.unwrap().from_cache);
}

#[tokio::test]
async fn test_invalidate_namespace_forces_refetch() {
    let workbench = workbench(source_returning(catalog(), 2));
    let request = ViewRequest::new("catalog");

    workbench.view(&request).await.unwrap();
    assert_eq!(workbench.invalidate("catalog").await, 1);
    assert_eq!(workbench.invalidate("catalog").await, 0);

    let view = workbench.view(&request).await.unwrap();
    assert!(!view.from_cache);
}

#[tokio::test]
async fn test_cache_stats() {
    let workbench = workbench(source_returning(catalog(), 1));
    let request = ViewRequest::new("catalog");

    workbench.view(&request).await.unwrap();
    workbench.view(&request).await.unwrap();

    let stats = workbench.cache_stats().await;
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.total, 2);
    assert_eq!(stats.hit_rate, 50.0);
}

#[tokio::test]
async fn test_transform_runs_pipeline_over_fetched_records() {
    let workbench = workbench(source_returning(catalog(), 1));

    let mut pipeline = Pipeline::new(4).unwrap();
    pipeline
        .filter(|item| item["price"].as_f64().unwrap_or(0.0) > 10.0)
        .map(|item| item["name"].clone());

    let names = workbench
        .transform(&ViewRequest::new("catalog"), &mut pipeline)
        .await
        .unwrap();
    assert_eq!(names, vec![json!("Anvil"), json!("Chisel"), json!("Drill")]);
}

#[test]
fn test_view_request_from_json() {
    let request: ViewRequest = serde_json::from_value(json!({
        "namespace": "catalog",
        "filters": {"status": "active"},
        "sort": [{"field": "price", "direction": "desc", "type": "number"}],
        "group_by": ["category"],
        "aggregations": {"price": ["avg", "max"]}
    }))
    .unwrap();

    assert_eq!(request.sort, vec![SortCriterion::desc("price").of_type(SortType::Number)]);
    assert_eq!(request.aggregations["price"].len(), 2);
    assert!(request.search.is_none());
    assert_eq!(request.params, Value::Null);
}

#[test]
fn test_invalid_settings_rejected() {
    let mut settings = AppSettings::default();
    settings.engine.search.threshold = 2.0;

    let result = Workbench::new(Box::new(MockSource::new()), &settings);
    assert!(matches!(result, Err(Error::Engine(_))));
}
