//! URL shortener service implementation.
//!
//! This crate provides the shortener service, the short code generators it
//! mints codes with, and the pool that applies soft deletes in the
//! background. Core types are re-exported from `snip_core`.

pub mod deleter;
pub mod generator;
pub mod service;

pub use deleter::{DeleteSubmitter, DeletionPool, PoolError, PoolSettings, SubmitError};
pub use generator::Generator;
pub use service::ShortenerService;
pub use snip_core::{Shortener, ShortenerError};
