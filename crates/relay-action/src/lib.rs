//! Connector registry, built-in adapters, and the persistence/HTTP ports
//! they depend on (§4.4, §6.2, §6.3).

mod adapter;
mod eval_ctx;
mod ports;
mod registry;
mod stats;

pub mod adapters;

pub use adapter::{ConnectorAdapter, ConnectorDefinition};
pub use eval_ctx::build_context;
pub use ports::{DataPort, HttpPort, HttpRequestSpec, HttpResponseSpec, InMemoryDataPort, MockHttpPort, ReqwestHttpPort};
pub use registry::ConnectorRegistry;
pub use stats::{ConnectorStats, ConnectorStatsSnapshot};

pub mod prelude {
    pub use crate::adapters::{
        ConditionAdapter, DatabaseAdapter, DelayAdapter, EmailStub, FileProcessStub, HttpRequestAdapter,
        TransformAdapter, UtilityAdapter, ValidationAdapter, WebhookAdapter,
    };
    pub use crate::{
        ConnectorAdapter, ConnectorDefinition, ConnectorRegistry, ConnectorStats, ConnectorStatsSnapshot, DataPort,
        HttpPort, HttpRequestSpec, HttpResponseSpec, InMemoryDataPort, MockHttpPort, ReqwestHttpPort,
    };
}
