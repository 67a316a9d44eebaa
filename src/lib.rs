//! Terminal work-time tracker. A timer is started and stopped, and on confirmation the elapsed
//! time is added to the day's total kept in a remote `workSessions` collection.
//!

pub mod cli;
pub mod store;
pub mod tracker;
pub mod utils;
