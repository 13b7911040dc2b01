//! Correlation keys for the sipfork proxy engine.
//!
//! Two keys identify everything the engine correlates:
//!
//! - [`DialogKey`] names one dialog (call leg) owned by one application.
//!   Equality deliberately ignores the peer's tag so that a key created
//!   before the far end tagged the dialog keeps matching afterwards.
//! - [`AppSessionKey`] names the owning application invocation unit.
//!
//! Both keys have a canonical text form with a strict parse counterpart, and
//! [`RoutingTagComposer`] turns `(application, app-session-id)` into an
//! opaque token small enough to ride inside a From/To tag parameter. That
//! token is the only wire-visible artifact this system persists, and the
//! thing that lets a restarted node recover "which application, which
//! session" from an in-dialog request alone.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use sipfork_session_core::{InMemoryApplicationRegistry, RoutingTagComposer};
//!
//! let registry = Arc::new(InMemoryApplicationRegistry::new());
//! registry.register("conference");
//!
//! let tags = RoutingTagComposer::new(registry);
//! let token = tags.encode("conference", "session-42").unwrap();
//! let decoded = tags.decode(&token).unwrap();
//! assert_eq!(decoded, Some(("conference".to_string(), "session-42".to_string())));
//! ```

pub mod allocator;
pub mod codec;
pub mod errors;
pub mod keys;
pub mod registry;
pub mod routing_tag;

pub use allocator::{SessionIdAllocator, UuidSessionIdAllocator};
pub use codec::{
    app_session_key, dialog_key_for_message, parse_app_session_key, parse_dialog_key,
    parse_dialog_key_ha, KEY_SEPARATOR,
};
pub use errors::{SessionKeyError, SessionKeyResult};
pub use keys::{AppSessionKey, DialogKey};
pub use registry::{ApplicationRegistry, InMemoryApplicationRegistry};
pub use routing_tag::{RoutingTagComposer, TAG_SEPARATOR};

/// Common imports for downstream crates.
pub mod prelude {
    pub use crate::allocator::{SessionIdAllocator, UuidSessionIdAllocator};
    pub use crate::codec::{
        app_session_key, dialog_key_for_message, parse_app_session_key, parse_dialog_key,
        parse_dialog_key_ha,
    };
    pub use crate::errors::{SessionKeyError, SessionKeyResult};
    pub use crate::keys::{AppSessionKey, DialogKey};
    pub use crate::registry::{ApplicationRegistry, InMemoryApplicationRegistry};
    pub use crate::routing_tag::RoutingTagComposer;
}
