//! # warden-approval
//!
//! The approval workflow: paused boundary decisions awaiting explicit human
//! resolution.
//!
//! A boundary interceptor that hits a `require_approval` decision creates an
//! [`ApprovalRequest`] and returns its id to the caller without blocking.
//! The request is later resolved by `approve`/`deny` (first resolution
//! wins), or auto-resolved when its TTL elapses. Requests are never
//! deleted — resolved ones stay in the store for audit.
//!
//! Creation is idempotent within a dedup window: an identical pending
//! request (same agent, same tool or boundary, same content hash) is
//! returned instead of a new one.

pub mod error;
pub mod request;
pub mod store;

pub use error::ApprovalError;
pub use request::{ApprovalRequest, ApprovalState};
pub use store::{ApprovalFilter, ApprovalStore, ApprovalStoreConfig, CreateApproval};
