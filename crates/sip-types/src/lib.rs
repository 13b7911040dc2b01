//! Parsed SIP message values for the sipfork proxy engine.
//!
//! This crate is the value layer the engine consumes: methods, status codes,
//! URIs, addresses, Via entries and whole request/response objects with typed
//! accessors for the headers proxy logic actually touches (From/To/Call-ID/
//! Via/Contact/Record-Route). It deliberately implements no header grammar:
//! messages arrive here already parsed by whatever transport stack hosts the
//! engine, and the `FromStr` impls on [`Uri`] and [`Method`] exist as
//! construction conveniences, not as a SIP parser.
//!
//! ## Layout
//!
//! ```text
//! sip-types
//!   ├── method      SIP request methods
//!   ├── status      status codes with class helpers
//!   ├── uri         sip/sips/tel URIs with parameters
//!   ├── address     name-addr values (From/To/Contact) with tag handling
//!   ├── via         Via entries carrying the branch identifier
//!   ├── reason      RFC 3326 reason values attached to CANCEL
//!   └── message     Request / Response value objects
//! ```

pub mod address;
pub mod message;
pub mod method;
pub mod reason;
pub mod status;
pub mod uri;
pub mod via;

pub use address::Address;
pub use message::{CSeq, DialogHeaders, Request, Response};
pub use method::Method;
pub use reason::ReasonInfo;
pub use status::StatusCode;
pub use uri::{Scheme, Uri, UriError};
pub use via::{Via, MAGIC_COOKIE};

/// Common imports for downstream crates.
pub mod prelude {
    pub use crate::address::Address;
    pub use crate::message::{CSeq, DialogHeaders, Request, Response};
    pub use crate::method::Method;
    pub use crate::reason::ReasonInfo;
    pub use crate::status::StatusCode;
    pub use crate::uri::{Scheme, Uri, UriError};
    pub use crate::via::{Via, MAGIC_COOKIE};
}
