//! Engine Utilities
//!
//! Common helpers shared by the memory components.

mod time;

pub use time::{elapsed_days, fixed_rfc3339, format_timestamp, half_decay};
