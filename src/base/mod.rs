//! Base types shared across the pipeline.
//!
//! - [`error::WatchError`]: the crate-wide failure taxonomy
//! - [`context::OpContext`]: cancellation + deadline propagation

pub mod context;
pub mod error;

/// The portal runs in a fixed UTC+8 zone; the schedule table and the report
/// query date are evaluated in it.
pub const PORTAL_UTC_OFFSET: time::UtcOffset = time::macros::offset!(+8);
