//! API handlers for all routes
//!
//! HTTP handlers for the six public endpoints in spec.md §6.

pub mod assign;
pub mod assignments;
pub mod impression;
pub mod optimizations;
pub mod webhooks;
