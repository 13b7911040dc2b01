//! RFC 3261 forking-proxy engine for the sipfork stack.
//!
//! One [`ProxyCore`] per proxied initial request: applications hand it a set
//! of target URIs, it forks the request onto one [`ProxyBranch`] per target
//! (all at once or one at a time), aggregates the responses under the
//! best-response rule and emits exactly one final response upstream. CANCEL
//! fan-out, 3xx recursion, per-branch timeouts and record-route/path
//! insertion all live here.
//!
//! The engine owns no sockets and no clock. Sending goes through the
//! [`ProxyTransport`] trait, timing through [`TimerService`], and expired
//! timers come back to [`ProxyCore::on_event`] as [`ProxyEvent`] values over
//! whatever channel the embedding wires up; [`TokioTimerService`] is the
//! stock implementation.
//!
//! ## Layout
//!
//! ```text
//! proxy-core
//!   ├── proxy        ProxyCore: forking, aggregation, completion
//!   ├── branch       per-target branch state machine
//!   ├── factory      outbound request construction and response synthesis
//!   ├── transaction  transaction correlation keys
//!   ├── transport    sending traits the embedding implements
//!   ├── timer        branch timer scheduling
//!   ├── events       timer-to-core event values
//!   ├── settings     forking behavior knobs
//!   ├── snapshot     failover state capture
//!   └── errors       engine error type
//! ```

pub mod branch;
pub mod errors;
pub mod events;
pub mod factory;
pub mod proxy;
pub mod settings;
pub mod snapshot;
pub mod timer;
pub mod transaction;
pub mod transport;

pub use branch::{BranchState, BranchTransaction, ProxyBranch};
pub use errors::{ProxyError, ProxyResult};
pub use events::ProxyEvent;
pub use factory::{RequestFactory, DEFAULT_MAX_FORWARDS};
pub use proxy::ProxyCore;
pub use settings::{ProxySettings, DEFAULT_PROXY_TIMEOUT};
pub use snapshot::ProxySnapshot;
pub use timer::{TimerHandle, TimerService, TokioTimerService};
pub use transaction::TransactionKey;
pub use transport::{
    NetworkInterfaces, ProxyTransport, StaticInterfaces, TransportError, TransportResult,
};

/// Common imports for embedding crates.
pub mod prelude {
    pub use crate::branch::{BranchState, ProxyBranch};
    pub use crate::errors::{ProxyError, ProxyResult};
    pub use crate::events::ProxyEvent;
    pub use crate::factory::RequestFactory;
    pub use crate::proxy::ProxyCore;
    pub use crate::settings::ProxySettings;
    pub use crate::snapshot::ProxySnapshot;
    pub use crate::timer::{TimerService, TokioTimerService};
    pub use crate::transaction::TransactionKey;
    pub use crate::transport::{NetworkInterfaces, ProxyTransport, TransportError};
}
