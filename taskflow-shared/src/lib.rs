//! # TaskFlow Shared Library
//!
//! Types and business logic shared by the TaskFlow API server and the
//! notification worker.
//!
//! ## Module Organization
//!
//! - `db`: connection pool and schema migrations
//! - `models`: users, tasks and the audit log
//! - `auth`: passwords, JWTs and role-based access control
//! - `pagination`: page/limit handling for list endpoints
//! - `notify`: email delivery and templates

pub mod auth;
pub mod db;
pub mod models;
pub mod notify;
pub mod pagination;

/// Current version of the TaskFlow shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
