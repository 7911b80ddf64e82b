//! # Taskorg API Server Library
//!
//! HTTP surface over the shared workflows: the Permit proxy endpoints, the
//! organization/membership/task workflow endpoints and the SSE live feeds.
//!
//! ## Modules
//!
//! - `app`: Application state and router builder
//! - `config`: Configuration management
//! - `error`: Error handling and HTTP response mapping
//! - `routes`: API route handlers

pub mod app;
pub mod config;
pub mod error;
pub mod routes;
