//! The two correlation key types.

use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// Identifies one dialog (call leg) owned by one application.
///
/// Equality and hashing cover `from_tag`, `call_id`, `app_session_id` and
/// `application` only. The peer's tag arrives late (once the far end tags
/// the dialog) and distinguishes forked dialogs from each other, not the key
/// itself: a key created before the peer tagged the dialog must keep
/// matching after `set_to_tag`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DialogKey {
    /// Tag of the local party. Always the local side, regardless of whether
    /// the engine originated or answered the dialog.
    pub from_tag: String,
    /// Tag of the peer, once known. Excluded from equality and hash.
    pub to_tag: Option<String>,
    pub call_id: String,
    /// Identifier of the owning application session.
    pub app_session_id: String,
    /// Name of the owning application.
    pub application: String,
}

impl DialogKey {
    pub fn new(
        from_tag: impl Into<String>,
        call_id: impl Into<String>,
        app_session_id: impl Into<String>,
        application: impl Into<String>,
    ) -> Self {
        DialogKey {
            from_tag: from_tag.into(),
            to_tag: None,
            call_id: call_id.into(),
            app_session_id: app_session_id.into(),
            application: application.into(),
        }
    }

    /// Records the peer's tag. Defined once, when the first tagged response
    /// or in-dialog request from the peer arrives.
    pub fn set_to_tag(&mut self, to_tag: impl Into<String>) {
        self.to_tag = Some(to_tag.into());
    }

    pub fn to_tag(&self) -> Option<&str> {
        self.to_tag.as_deref()
    }

    /// The portion of the key stable across cluster nodes, used as the
    /// replication key: `fromTag:callId`.
    pub fn ha_form(&self) -> String {
        format!("{}:{}", self.from_tag, self.call_id)
    }
}

impl PartialEq for DialogKey {
    fn eq(&self, other: &Self) -> bool {
        // to_tag intentionally absent
        self.from_tag == other.from_tag
            && self.call_id == other.call_id
            && self.app_session_id == other.app_session_id
            && self.application == other.application
    }
}

impl Eq for DialogKey {}

impl Hash for DialogKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // to_tag intentionally absent
        self.from_tag.hash(state);
        self.call_id.hash(state);
        self.app_session_id.hash(state);
        self.application.hash(state);
    }
}

impl fmt::Display for DialogKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}:{}:{}:{})",
            self.from_tag, self.call_id, self.app_session_id, self.application
        )
    }
}

/// Identifies one application invocation unit.
///
/// Immutable for its lifetime; destroyed with the owning application
/// session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AppSessionKey {
    pub id: String,
    pub application: String,
}

impl AppSessionKey {
    pub fn new(id: impl Into<String>, application: impl Into<String>) -> Self {
        AppSessionKey {
            id: id.into(),
            application: application.into(),
        }
    }
}

impl fmt::Display for AppSessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}:{})", self.id, self.application)
    }
}
