//! Core types and traits for the Snip URL shortener.
//!
//! This crate provides the shared domain model, the storage contract that
//! every backend implements, and the service contract consumed by the
//! HTTP gateway.

pub mod error;
pub mod mapping;
pub mod repository;
pub mod shortcode;
pub mod shortener;
pub mod user;

pub use error::{ShortenerError, StorageError};
pub use mapping::{BatchEntry, DeleteRequest, UrlMapping};
pub use repository::{Deleter, ReadRepository, Repository};
pub use shortcode::ShortCode;
pub use shortener::{BatchItem, BatchShortened, Shortened, Shortener};
pub use user::UserId;
