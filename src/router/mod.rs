//! Router module for chat provider selection.
//!
//! This module handles:
//! - Model allow-list validation
//! - Text vs. image request classification
//! - Ordered, optionally shuffled, provider pool dispatch
//! - The single strong-to-weak model fallback

pub mod fallback;
mod group;
mod selector;
mod types;

pub use group::{attempt_once, collect, ProviderGroup};
pub use selector::Router;
pub use types::{ChatRequest, ChatResult, DispatchRequest, Message, RouteOutcome};
