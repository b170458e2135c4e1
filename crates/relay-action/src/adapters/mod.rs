//! Built-in adapters (§4.3, §4.4). `http.rs` and `transform.rs` back the
//! two non-`Connector` builtin node types that are still connector-shaped;
//! the rest are registered under their connector type name.

mod conditional;
mod database;
mod delay;
mod http;
mod stub;
mod transform;
mod utility;
mod validation;
mod webhook;

pub use conditional::ConditionAdapter;
pub use database::DatabaseAdapter;
pub use delay::DelayAdapter;
pub use http::HttpRequestAdapter;
pub use stub::{EmailStub, FileProcessStub};
pub use transform::{apply_transform, TransformAdapter};
pub use utility::UtilityAdapter;
pub use validation::ValidationAdapter;
pub use webhook::WebhookAdapter;
