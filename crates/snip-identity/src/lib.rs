//! Stateless anonymous identity tokens.
//!
//! A token is `hex(user_id || HMAC-SHA256(secret, user_id))`. The server keeps
//! no session table: anything that verifies under the secret is accepted, and
//! anything else is replaced by a freshly minted identity.

pub mod error;
mod token;

pub use error::Error;
pub use token::{TokenCodec, USER_ID_LEN};
