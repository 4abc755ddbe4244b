//! bookshelf-rs: a small web catalog for uploading and distributing book files.
//!
//! This crate provides a single-binary web application where signed-in
//! users upload book files (PDF, DOC and whatever else the config
//! allows). Uploads land in a date-keyed directory tree and are listed
//! in a browsable catalog with categories, paging and search.
//!
//! # Features
//!
//! - Catalog pages with pagination and category navigation
//! - Substring search over title, author or category
//! - Multipart uploads with extension and size checks
//! - Files stored by upload date and content hash
//! - Cookie sessions backed by signed tokens
//! - User management from the command line

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Authentication and user management.
pub mod auth;
/// Configuration and CLI.
pub mod config;
/// Database operations.
pub mod db;
/// Error types.
pub mod error;
/// HTML page generation.
pub mod pages;
/// HTTP server.
pub mod server;
/// Uploaded file storage.
pub mod storage;

#[cfg(test)]
mod tests;

pub use config::{Cli, Command, Config};
pub use db::Database;
pub use error::{AppError, Result};
pub use server::AppState;
