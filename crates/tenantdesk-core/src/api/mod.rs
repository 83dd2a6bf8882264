//! REST API client module for the tenantdesk backend.
//!
//! This module provides the `ApiClient` for communicating with the backend
//! service that owns authentication, organizations and RBAC.
//!
//! Every call carries the stored access token as a bearer credential. A 401
//! on the first attempt triggers one exchange of the refresh token at
//! `/api/v1/auth/refresh` followed by a single retry of the original call.

pub mod client;
pub mod endpoints;
pub mod error;
pub mod request;

pub use client::{ApiClient, ApiResponse};
pub use error::ApiError;
pub use request::RequestDescriptor;
