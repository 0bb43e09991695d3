//! omnicron - API gateway for free-tier chat completion, song recognition and OCR
//!
//! The core is the provider router: model allow-listing, image/text
//! classification, pool dispatch with optional shuffle, and a single
//! strong-to-weak model fallback. Song and text extraction endpoints are
//! pass-throughs to external services.

pub mod config;
pub mod error;
pub mod providers;
pub mod proxy;
pub mod router;
pub mod services;

pub use config::Config;
pub use error::{Error, Result};
