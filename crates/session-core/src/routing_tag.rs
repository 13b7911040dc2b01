//! Routing tokens carried in From/To tag parameters.
//!
//! A token is `salt SEP applicationHash [SEP appSessionId]`. The salt is
//! eight random digits whose only job is keeping concurrent dialogs from the
//! same application/session from colliding on identical tags; decode throws
//! it away. The hash is what survives a restart: any node holding the same
//! application registry can recover `(application, appSessionId)` from the
//! tag of an in-dialog request without any replicated state.

use std::sync::Arc;

use rand::Rng;
use tracing::debug;

use crate::errors::{SessionKeyError, SessionKeyResult};
use crate::registry::ApplicationRegistry;

/// Separator between token fields.
pub const TAG_SEPARATOR: char = '_';

const SALT_MIN: u32 = 10_000_000;
const SALT_MAX: u32 = 100_000_000;

/// Encodes and decodes routing tokens against an application registry.
#[derive(Clone)]
pub struct RoutingTagComposer {
    registry: Arc<dyn ApplicationRegistry>,
}

impl RoutingTagComposer {
    pub fn new(registry: Arc<dyn ApplicationRegistry>) -> Self {
        RoutingTagComposer { registry }
    }

    /// Builds the token for `(application, app_session_id)`. The session id
    /// part is appended only when non-empty.
    pub fn encode(&self, application: &str, app_session_id: &str) -> SessionKeyResult<String> {
        let hash = self
            .registry
            .hash_for_name(application)
            .ok_or_else(|| SessionKeyError::unknown_application(application))?;
        let mut token = format!("{}{}{}", salt(), TAG_SEPARATOR, hash);
        if !app_session_id.is_empty() {
            token.push(TAG_SEPARATOR);
            token.push_str(app_session_id);
        }
        debug!(application, app_session_id, token = %token, "encoded routing tag");
        Ok(token)
    }

    /// Recovers `(application, app_session_id)` from a token.
    ///
    /// `Ok(None)` means the tag carries no routing information (fewer than
    /// two fields). That is an expected outcome for tags minted by foreign
    /// elements, not an error. A well-formed token whose hash the registry
    /// cannot resolve is an internal inconsistency and fails hard.
    pub fn decode(&self, token: &str) -> SessionKeyResult<Option<(String, String)>> {
        let mut parts = token.splitn(3, TAG_SEPARATOR);
        let _salt = parts.next();
        let Some(hash) = parts.next() else {
            debug!(token, "tag carries no routing information");
            return Ok(None);
        };
        let application = self
            .registry
            .name_for_hash(hash)
            .ok_or_else(|| SessionKeyError::unknown_hash(hash))?;
        let app_session_id = parts.next().unwrap_or_default().to_string();
        Ok(Some((application, app_session_id)))
    }
}

impl std::fmt::Debug for RoutingTagComposer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoutingTagComposer").finish_non_exhaustive()
    }
}

/// Eight random decimal digits.
fn salt() -> String {
    let mut rng = rand::thread_rng();
    rng.gen_range(SALT_MIN..SALT_MAX).to_string()
}
