//! Common types shared by the credential core and the sheet reader

mod env;
mod error;
mod secret;

pub use env::{optional_env, require_env};
pub use error::{Error, Result};
pub use secret::Secret;
