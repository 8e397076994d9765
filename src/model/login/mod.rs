//! The token authority: single-use, time-limited login links.
//!
//! Login links carry an opaque random secret, stored server-side so that
//! expiry and single use are enforced by the database rather than by claims
//! presented by the client. The secret is additionally signed before it is
//! put into a URL, so that altered or guessed links are rejected before any
//! lookup happens.

mod authority;
mod cleanup;
mod secret;
mod signed;

pub use authority::{TokenAuthority, DEFAULT_TTL_MINUTES};
pub use cleanup::{CleanupCandidate, CleanupReport, DEFAULT_RETENTION_DAYS, MAX_RETENTION_DAYS};
pub use secret::{TokenSecret, SECRET_BYTES};
pub use signed::SignedToken;
