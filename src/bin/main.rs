//! Demo binary: runs one view over a small in-memory catalog and prints it as JSON.
//!
//! ```bash
//! datakit --search "hamer" --sort price:desc
//! datakit --filter category=tools --group-by status --sort name
//! RUST_LOG=debug DATAKIT__SEARCH__THRESHOLD=0.4 datakit --search drl
//! ```

use clap::Parser;
use datakit::{AppSettings, BoxError, DataSource, ViewProcessor, ViewRequest, Workbench};
use datakit::engine::{aggregation_spec, AggregateFunction, SortCriterion, SortType};
use futures::stream::{self, BoxStream};
use serde_json::{json, Value};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct CliArgs {
    /// Directory holding default.toml and local.toml
    #[arg(short, long, value_name = "DIR", default_value = "config", env = "DATAKIT_CONFIG_DIR")]
    config_dir: PathBuf,

    /// Fuzzy query over the configured search fields
    #[arg(long)]
    search: Option<String>,

    /// Filter criterion as field=value; `*` matches any run of characters
    #[arg(long, value_name = "FIELD=VALUE")]
    filter: Vec<String>,

    /// Sort criterion as field[:asc|desc]; repeat for tie-breakers
    #[arg(long, value_name = "FIELD[:DIR]")]
    sort: Vec<String>,

    /// Field to group by; repeat for nested groups
    #[arg(long, value_name = "FIELD")]
    group_by: Vec<String>,
}

struct DemoCatalog;

impl DataSource for DemoCatalog {
    fn records(&self, _namespace: &str, _params: &Value) -> BoxStream<'static, Result<Value, BoxError>> {
        let records = vec![
            json!({"id": 1, "name": "Claw hammer", "category": "tools", "status": "active", "price": 24.5, "added": "2024-03-01"}),
            json!({"id": 2, "name": "Drill driver", "category": "power", "status": "active", "price": 129, "added": "2024-01-15"}),
            json!({"id": 3, "name": "Wood chisel", "category": "tools", "status": "retired", "price": 18, "added": "2023-11-20"}),
            json!({"id": 4, "name": "Hex bolts (50)", "category": "hardware", "status": "active", "price": 7.25, "added": "2024-02-02"}),
            json!({"id": 5, "name": "Sledge hammer", "category": "tools", "status": "active", "price": 46, "added": "2024-04-11"}),
            json!({"id": 6, "name": "Angle grinder", "category": "power", "status": null, "price": 89.99, "added": "2023-09-30"}),
        ];
        Box::pin(stream::iter(records.into_iter().map(Ok::<Value, BoxError>)))
    }
}

fn parse_sort(arg: &str) -> SortCriterion {
    let (field, direction) = arg.split_once(':').unwrap_or((arg, "asc"));
    let criterion = if direction.eq_ignore_ascii_case("desc") {
        SortCriterion::desc(field)
    } else {
        SortCriterion::asc(field)
    };
    match field {
        "price" | "id" => criterion.of_type(SortType::Number),
        "added" => criterion.of_type(SortType::Date),
        _ => criterion,
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = CliArgs::parse();
    let settings = AppSettings::from_dir(&args.config_dir)?;
    let workbench = Workbench::new(Box::new(DemoCatalog), &settings)?;

    let mut request = ViewRequest::new("catalog");
    request.search = args.search;
    for filter in &args.filter {
        if let Some((field, value)) = filter.split_once('=') {
            request.filters.insert(field.to_string(), Value::String(value.to_string()));
        }
    }
    request.sort = args.sort.iter().map(|s| parse_sort(s)).collect();
    request.group_by = args.group_by;
    request.aggregations = aggregation_spec([(
        "price",
        &[AggregateFunction::Count, AggregateFunction::Avg, AggregateFunction::Max][..],
    )]);

    let view = workbench.view(&request).await?;
    println!("{}", serde_json::to_string_pretty(&view)?);

    let stats = workbench.cache_stats().await;
    tracing::info!(hits = stats.hits, misses = stats.misses, "cache stats");

    Ok(())
}
