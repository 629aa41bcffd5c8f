//! Authentication module for managing the user session.
//!
//! This module provides:
//! - `Session`: the bearer token and display name
//! - `SessionManager`: the two-state (anonymous/authenticated) lifecycle,
//!   persisted through a `KeyValueStore`
//!
//! A session ends on explicit logout or on any 401 from the backend.

pub mod session;

pub use session::{
    AuthState, Session, SessionManager, PLACEHOLDER_USERNAME, TOKEN_KEY, USERNAME_KEY,
};
