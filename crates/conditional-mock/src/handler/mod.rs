//! Conditional mock handler.
//!
//! ## Module Structure
//!
//! - `types`: response templates and response sources
//! - `registry`: literal/pattern rules and the per-URL resolution cache
//! - `core`: the `Handler` façade

mod core;
pub mod registry;
mod types;


pub use self::core::Handler;
pub use registry::{Resolution, RuleSet};
pub use types::{ResponseFactory, ResponseSource, ResponseTemplate};
