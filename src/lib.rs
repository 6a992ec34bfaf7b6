//! datakit: a local data workbench for record collections
//!
//! Records come from an application-supplied [`DataSource`]. The [`Workbench`]
//! keeps fetched collections in an expiring cache, then filters, searches,
//! sorts and groups them per [`ViewRequest`]. The engines themselves live in
//! `datakit_core` and are re-exported as [`engine`].
//!
//! # Example
//!
//! ```rust,no_run
//! use datakit::{AppSettings, DataSource, ViewProcessor, ViewRequest, Workbench, BoxError};
//! use futures::stream::{self, BoxStream};
//! use serde_json::{json, Value};
//!
//! struct Inventory;
//!
//! impl DataSource for Inventory {
//!     fn records(&self, _namespace: &str, _params: &Value) -> BoxStream<'static, Result<Value, BoxError>> {
//!         Box::pin(stream::iter(vec![
//!             Ok(json!({"name": "bolt", "category": "hardware", "price": 0.25})),
//!             Ok(json!({"name": "hammer", "category": "tools", "price": 12.0})),
//!         ]))
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let settings = AppSettings::new()?;
//!     let workbench = Workbench::new(Box::new(Inventory), &settings)?;
//!
//!     let mut request = ViewRequest::new("inventory");
//!     request.search = Some("hamer".to_string());
//!
//!     let view = workbench.view(&request).await?;
//!     println!("{} of {} records", view.items.len(), view.fetched);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod workbench;

#[cfg(test)]
mod tests;

pub use datakit_core as engine;

pub use config::{AppSettings, WorkbenchSettings};
pub use error::{BoxError, Error, Result};
pub use workbench::{DataSource, ViewProcessor, ViewRequest, ViewResult, Workbench};
