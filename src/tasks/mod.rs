//! Background Tasks Module
//!
//! Contains background tasks that run periodically while a store is alive.
//!
//! # Tasks
//! - TTL Sweep: removes expired cache entries at a configured interval

mod sweeper;

pub use sweeper::{Sweep, Sweeper};
