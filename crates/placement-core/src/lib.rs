//! Core library for the Adaptive Placement Agent client.
//!
//! - `api`: HTTP client for the backend endpoints
//! - `auth`: session lifecycle (login, validation, logout)
//! - `storage`: durable key-value store backing the session
//! - `background`: health polling and the widget fallback check
//! - `config`: on-disk configuration with environment overrides

pub mod api;
pub mod auth;
pub mod background;
pub mod config;
pub mod models;
pub mod storage;
pub mod widget;

pub use api::{ApiClient, ApiError};
pub use auth::{AuthState, Session, SessionManager};
pub use config::Config;
pub use storage::{FileStore, KeyValueStore, MemoryStore};
