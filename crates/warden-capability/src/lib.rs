//! # warden-capability
//!
//! Short-lived, scoped capability tokens standing in for raw secrets.
//!
//! When an allowed tool call needs a credential, the action interceptor
//! issues a [`CapabilityToken`] bound to one agent and one tool, with an
//! explicit action list and TTL. The tool receives only the token id; the
//! secret itself is resolved by a pluggable [`SecretBackend`] at the moment
//! a validated token authorizes an action, inside a closure, and is never
//! logged, persisted, or returned.
//!
//! Expiry is always derived from `issued_at + ttl` — never written back —
//! so a token cannot be un-expired by a racing mutation.

pub mod error;
pub mod secrets;
pub mod token;

pub use error::CapabilityError;
pub use secrets::{CapabilityBroker, SecretBackend, SecretString, StaticSecretBackend};
pub use token::{CapabilityToken, TokenStore};
