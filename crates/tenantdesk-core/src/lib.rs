//! Core library for the tenantdesk admin dashboard.
//!
//! This crate talks to the tenantdesk backend REST service. It provides:
//!
//! - `api`: the session-aware `ApiClient` with bearer-token attachment and
//!   transparent refresh-and-retry on 401, plus typed admin endpoints
//! - `auth`: the `Session` handle and the `TokenStore` backends it persists to
//! - `config`: base URL and storage configuration
//! - `models`: users, organizations, roles and permissions

pub mod api;
pub mod auth;
pub mod config;
pub mod models;

pub use api::{ApiClient, ApiError, ApiResponse, RequestDescriptor};
pub use auth::{Session, TokenStore};
pub use config::Config;
