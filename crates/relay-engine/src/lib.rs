//! Node dispatch, wave scheduling, and the in-process execution facade
//! (C5/C6, §4.3-§4.6, §6.1) that ties the rest of the crates together into
//! something an embedder can actually call.

mod api;
mod dispatcher;
mod persistence;
mod result;
mod scheduler;

pub use api::{Engine, ExecuteOptions, DEFAULT_MAX_CONCURRENT_EXECUTIONS};
pub use dispatcher::{NodeDispatcher, DEFAULT_MAX_LOOP_ITERATIONS, DEFAULT_SUBWORKFLOW_DEPTH_LIMIT};
pub use persistence::{ExecutionRecord, InMemoryPersistence, PersistencePort};
pub use result::{ExecutionOutcome, ExecutionSnapshot, ExecutionStatus};
pub use scheduler::DEFAULT_PARALLELISM_CAP;

pub mod prelude {
    pub use crate::{
        Engine, ExecuteOptions, ExecutionOutcome, ExecutionRecord, ExecutionSnapshot, ExecutionStatus,
        InMemoryPersistence, NodeDispatcher, PersistencePort,
    };
}
