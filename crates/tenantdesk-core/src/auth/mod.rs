//! Authentication module for managing the persisted session.
//!
//! This module provides:
//! - `Session`: explicit handle to the access/refresh token pair
//! - `TokenStore`: key-value persistence behind a session, with memory,
//!   file and OS keychain backends
//!
//! Tokens live under the fixed keys `access_token` and `refresh_token`.

pub mod credentials;
pub mod session;
pub mod store;

pub use credentials::KeyringTokenStore;
pub use session::{Session, ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY};
pub use store::{FileTokenStore, MemoryTokenStore, TokenStore};
