//! Domain model (envelope shapes, errors, ids, invocation).

pub mod envelope;
pub mod errors;
pub mod ids;
pub mod invocation;

pub use envelope::{
    CumulusMeta, MAX_NON_REMOTE_PAYLOAD_SIZE, MessageConfig, NestedEvent, OutputMapping,
    RemotePointer,
};
pub use errors::{CirrusError, Result, WorkflowErrorKind};
pub use ids::{EventKey, InvocationId};
pub use invocation::Invocation;
