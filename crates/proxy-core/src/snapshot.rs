//! Serializable state for proxy failover.
//!
//! Only the fields a peer node needs to route in-dialog requests survive a
//! handoff. Branches, timers and the original request stay behind: they are
//! transaction-scoped and meaningless on another node, so a restored core
//! correlates and routes but never re-runs the fork.

use serde::{Deserialize, Serialize};

use sipfork_sip_types::Uri;

use crate::settings::ProxySettings;

/// State captured by [`ProxyCore::snapshot`](crate::ProxyCore::snapshot)
/// and consumed by [`ProxyCore::restore`](crate::ProxyCore::restore).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxySnapshot {
    pub settings: ProxySettings,
    pub started: bool,
    pub ack_received: bool,
    pub trying_sent: bool,
    pub previous_node: Option<Uri>,
    pub caller_from: Option<String>,
    pub final_branch: Option<Uri>,
}
