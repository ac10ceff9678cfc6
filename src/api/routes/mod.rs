//! API Routes
//!
//! Route handlers organized by functionality.

pub mod congestion;
pub mod health;
pub mod stats;
