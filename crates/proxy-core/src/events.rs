//! Events delivered back to the engine by its timer service.
//!
//! Timer expirations never call into the engine directly. The timer service
//! posts a [`ProxyEvent`] on a channel owned by the embedding, and the
//! embedding feeds it to [`ProxyCore::on_event`](crate::proxy::ProxyCore::on_event)
//! under the same lock it uses for signaling. That keeps the engine
//! single-threaded without the timer tasks ever touching proxy state.

use serde::{Deserialize, Serialize};
use sipfork_sip_types::Uri;

/// An asynchronous occurrence the engine must react to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProxyEvent {
    /// A branch reached its timeout without a final response.
    BranchTimedOut {
        /// Target URI of the branch whose timer fired.
        target: Uri,
    },
}
