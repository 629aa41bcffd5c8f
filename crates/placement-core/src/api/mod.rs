//! REST API client module for the placement agent backend.
//!
//! Endpoints consumed:
//! - `GET /health`, `GET /info` (unauthenticated)
//! - `POST /auth/token` (form credentials, returns a JWT bearer token)
//! - `GET /auth/me`, `POST /gemini/generate` (bearer token)

pub mod client;
pub mod error;

pub use client::ApiClient;
pub use error::ApiError;
pub use reqwest::Method;
