//! # Taskorg Shared Library
//!
//! This crate contains the domain layer shared by the Taskorg services:
//! - Document store access (PostgreSQL JSONB or in-memory) with live queries
//! - Policy sync client for the external authorization service (Permit.io)
//! - Data models for users, organizations, memberships and tasks
//! - Workflow functions composing permission checks, writes and policy sync
//! - Live feeds built on top of store subscriptions
//!
//! ## Modules
//!
//! - `db`: Connection pooling and migrations
//! - `store`: Document store trait, implementations and subscriptions
//! - `policy`: Authorization service client
//! - `models`: Typed records and per-entity store helpers
//! - `workflows`: Create/update orchestration
//! - `live`: Continuously-updated listings

pub mod db;
pub mod live;
pub mod models;
pub mod policy;
pub mod store;
pub mod workflows;
