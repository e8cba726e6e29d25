//! Queue draining and reconciliation with the remote authority.

mod dispatcher;
mod engine;
mod http;
mod protocol;
mod remote;
mod resolver;

pub use dispatcher::{BatchDispatcher, Dispatched, ItemOutcome};
pub use engine::{SyncEngine, SyncReport, SyncStatusReport};
pub use http::HttpRemote;
pub use protocol::{BatchItem, BatchRequest, BatchResponse, ItemResult};
pub use remote::{RemoteAuthority, TransportError, TransportResult};
pub use resolver::{resolve, STRATEGY as LWW_STRATEGY};
