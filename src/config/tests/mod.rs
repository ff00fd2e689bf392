//! Unit tests for configuration loading and precedence.
//!
//! - `helpers`: Shared test utilities
//! - `precedence`: Layer precedence tests
//! - `derived`: Retry policy, credential layer, and repository resolution

mod derived;
mod helpers;
mod precedence;
