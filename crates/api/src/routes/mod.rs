//! HTTP route handlers.

pub mod orders;
pub mod system;
