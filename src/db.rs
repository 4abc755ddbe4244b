mod schema;

pub use schema::Database;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// User account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Unique user ID.
    pub id: i64,
    /// Username for login.
    pub username: String,
    /// Argon2 password hash.
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// Account creation timestamp.
    pub created_at: i64,
}

/// Catalog entry for an uploaded book file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Book {
    /// Unique book ID.
    pub id: i64,
    /// Book title.
    pub title: String,
    /// Book author.
    pub author: String,
    /// Category name.
    pub category: String,
    /// Free-text description.
    pub description: Option<String>,
    /// SHA-256 hash of the file content.
    pub content_hash: String,
    /// Path of the file relative to the upload directory.
    pub storage_path: String,
    /// Upload timestamp.
    pub created_at: i64,
}

/// Book record ready for insertion, before a row ID exists.
#[derive(Debug, Clone)]
pub struct NewBook {
    /// Book title.
    pub title: String,
    /// Book author.
    pub author: String,
    /// Category name.
    pub category: String,
    /// Free-text description.
    pub description: Option<String>,
    /// SHA-256 hash of the file content.
    pub content_hash: String,
    /// Path of the file relative to the upload directory.
    pub storage_path: String,
    /// Upload timestamp.
    pub created_at: i64,
}

/// Field a catalog search matches against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchField {
    /// Match against the book title.
    Title,
    /// Match against the author.
    Author,
    /// Match against the category name.
    Category,
}

impl SearchField {
    /// Parse a search field name from a request form.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "title" => Some(SearchField::Title),
            "author" => Some(SearchField::Author),
            "category" => Some(SearchField::Category),
            _ => None,
        }
    }

    /// Column name in the books table.
    pub fn column(&self) -> &'static str {
        match self {
            SearchField::Title => "title",
            SearchField::Author => "author",
            SearchField::Category => "category",
        }
    }
}

/// Timestamp helper.
pub fn now_timestamp() -> i64 {
    Utc::now().timestamp()
}

/// Convert timestamp to DateTime.
pub fn timestamp_to_datetime(ts: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(ts, 0).unwrap_or_else(Utc::now)
}
