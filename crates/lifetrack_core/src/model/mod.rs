//! Record model shared by every object store.
//!
//! # Responsibility
//! - Define the opaque record shape and its primary key.
//! - Provide typed per-store record structs for module code.
//! - Stamp ISO-8601 timestamps from a monotonic clock.
//!
//! # Invariants
//! - A persisted record always carries `createdAt` and `updatedAt`.
//! - `updatedAt >= createdAt` for every persisted record.

pub mod clock;
pub mod domain;
pub mod record;
