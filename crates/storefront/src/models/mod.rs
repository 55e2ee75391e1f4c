//! Storefront-local models.
//!
//! Order and catalog types live in `orderdesk-core`; this module only holds
//! what the HTTP edge keeps in the session.

pub mod session;

pub use session::{CurrentUser, keys as session_keys};
