//! HTTP surface of the shortener.
//!
//! [`App::router`] builds the axum router; the `snip` binary wires it to a
//! storage backend, the deletion pool and a listener.

pub mod app;
pub mod error;
pub mod handlers;
pub mod identity;
pub mod model;
pub mod state;

pub use app::App;
pub use identity::{Identity, COOKIE_NAME};
pub use state::AppState;
