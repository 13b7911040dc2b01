//! Computing keys from messages and parsing their textual forms.
//!
//! The textual grammars are deliberately rigid: `"(" id ":" app ")"` for the
//! application key, `fromTag ":" callId ":" appSessionId ":" app` (optionally
//! parenthesized) for the dialog key. Parse failures always name the
//! delimiter that was not found, together with the offending input and the
//! offset where the search started; these strings travel through logs and
//! replication metadata, so the diagnostics have to stand on their own.

use tracing::trace;

use sipfork_sip_types::DialogHeaders;

use crate::allocator::SessionIdAllocator;
use crate::errors::{SessionKeyError, SessionKeyResult};
use crate::keys::{AppSessionKey, DialogKey};

/// Separator between the fields of a key's textual form.
pub const KEY_SEPARATOR: char = ':';

/// Derives the dialog key for a message owned by `application`.
///
/// The returned key always carries the *local* party's tag in the `from_tag`
/// slot: with `inverted` false the engine originated the dialog and the
/// message's From tag is local; with `inverted` true the engine is the
/// answering side and the roles swap.
pub fn dialog_key_for_message(
    app_session_id: &str,
    application: &str,
    message: &impl DialogHeaders,
    inverted: bool,
) -> SessionKeyResult<DialogKey> {
    if application.is_empty() {
        return Err(SessionKeyError::missing_application_name(
            "compute a dialog key",
        ));
    }
    let (local_tag, peer_tag) = if inverted {
        (message.to_tag(), message.from_tag())
    } else {
        (message.from_tag(), message.to_tag())
    };
    let mut key = DialogKey::new(
        local_tag.unwrap_or_default(),
        message.call_id(),
        app_session_id,
        application,
    );
    if let Some(peer) = peer_tag {
        key.set_to_tag(peer);
    }
    trace!(key = %key, inverted, "derived dialog key");
    Ok(key)
}

/// Builds the application-session key, allocating a fresh identifier when
/// the caller supplied none.
pub fn app_session_key(
    application: &str,
    id: Option<&str>,
    allocator: &dyn SessionIdAllocator,
) -> SessionKeyResult<AppSessionKey> {
    if application.is_empty() {
        return Err(SessionKeyError::missing_application_name(
            "compute an application session key",
        ));
    }
    let id = match id {
        Some(id) => id.to_string(),
        None => allocator.next_id(),
    };
    Ok(AppSessionKey::new(id, application))
}

/// Parses `"(" id ":" application ")"`.
pub fn parse_app_session_key(text: &str) -> SessionKeyResult<AppSessionKey> {
    let open = text
        .find('(')
        .ok_or_else(|| SessionKeyError::missing_delimiter("(", text, 0))?;
    let sep = text[open..]
        .find(KEY_SEPARATOR)
        .map(|i| open + i)
        .ok_or_else(|| SessionKeyError::missing_delimiter(":", text, open + 1))?;
    let close = text[sep..]
        .find(')')
        .map(|i| sep + i)
        .ok_or_else(|| SessionKeyError::missing_delimiter(")", text, sep + 1))?;
    Ok(AppSessionKey::new(
        &text[open + 1..sep],
        &text[sep + 1..close],
    ))
}

/// Parses `fromTag ":" callId ":" appSessionId ":" application`, with or
/// without the surrounding parentheses. The peer tag is never part of the
/// textual form, so the returned key has `to_tag` unset.
pub fn parse_dialog_key(text: &str) -> SessionKeyResult<DialogKey> {
    let (inner, base) = match text.strip_prefix('(') {
        Some(stripped) => (stripped.strip_suffix(')').unwrap_or(stripped), 1),
        None => (text, 0),
    };

    let first = inner
        .find(KEY_SEPARATOR)
        .ok_or_else(|| SessionKeyError::missing_delimiter(":", text, base))?;
    let second = inner[first + 1..]
        .find(KEY_SEPARATOR)
        .map(|i| first + 1 + i)
        .ok_or_else(|| SessionKeyError::missing_delimiter(":", text, base + first + 1))?;
    let third = inner[second + 1..]
        .find(KEY_SEPARATOR)
        .map(|i| second + 1 + i)
        .ok_or_else(|| SessionKeyError::missing_delimiter(":", text, base + second + 1))?;

    Ok(DialogKey::new(
        &inner[..first],
        &inner[first + 1..second],
        &inner[second + 1..third],
        &inner[third + 1..],
    ))
}

/// Parses the replicated form `fromTag ":" callId`, completing the key with
/// the application-session identity known to the restoring node.
pub fn parse_dialog_key_ha(
    text: &str,
    app_session_id: &str,
    application: &str,
) -> SessionKeyResult<DialogKey> {
    if application.is_empty() {
        return Err(SessionKeyError::missing_application_name(
            "parse a replicated dialog key",
        ));
    }
    let sep = text
        .find(KEY_SEPARATOR)
        .ok_or_else(|| SessionKeyError::missing_delimiter(":", text, 0))?;
    Ok(DialogKey::new(
        &text[..sep],
        &text[sep + 1..],
        app_session_id,
        application,
    ))
}
