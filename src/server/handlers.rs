//! HTTP request handlers.

use crate::db::{NewBook, SearchField};
use crate::error::{AppError, Result};
use crate::pages;
use crate::server::AppState;
use crate::storage::{self, FileStore};
use axum::{
    Json,
    body::Body,
    extract::{Form, Multipart, Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{Html, IntoResponse, Redirect, Response},
};
use serde::{Deserialize, Serialize};
use tokio_util::io::ReaderStream;

/// Name of the cookie carrying the signed token.
const SESSION_COOKIE: &str = "session";

/// Page number from the query string.
#[derive(Debug, Deserialize)]
pub struct PageQuery {
    #[serde(default = "default_page")]
    page: i64,
}

fn default_page() -> i64 {
    1
}

// ============================================================================
// CATALOG PAGES
// ============================================================================

/// Index page: recent uploads with category links.
pub async fn index(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<PageQuery>,
) -> Result<Html<String>> {
    let size = state.page_size();

    let total = state.db.count_books()?;
    let (page, offset, total_pages) = page_window(query.page, size, total);

    let books = state.db.list_recent(size, offset)?;
    let categories = state.db.list_categories()?;
    let user = current_user(&state, &headers)?;

    Ok(Html(pages::catalog_page(
        &state.config.server.title,
        "Recent uploads",
        &categories,
        &books,
        total,
        page,
        total_pages,
        "/?",
        user.as_deref(),
    )))
}

/// Category listing query.
#[derive(Debug, Deserialize)]
pub struct CategoryQuery {
    name: String,
    #[serde(default = "default_page")]
    page: i64,
}

/// Books in one category. An unknown category renders an empty listing.
pub async fn category(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<CategoryQuery>,
) -> Result<Html<String>> {
    let size = state.page_size();

    let total = state.db.count_books_in_category(&query.name)?;
    let (page, offset, total_pages) = page_window(query.page, size, total);

    let books = state.db.list_by_category(&query.name, size, offset)?;
    let categories = state.db.list_categories()?;
    let user = current_user(&state, &headers)?;

    let heading = format!("Category: {}", query.name);
    let page_base = format!("/category?name={}&", urlencoding::encode(&query.name));

    Ok(Html(pages::catalog_page(
        &state.config.server.title,
        &heading,
        &categories,
        &books,
        total,
        page,
        total_pages,
        &page_base,
        user.as_deref(),
    )))
}

/// Search form.
pub async fn search_form(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Html<String>> {
    let user = current_user(&state, &headers)?;
    Ok(Html(pages::search_page(
        &state.config.server.title,
        user.as_deref(),
        None,
    )))
}

/// Search request form fields.
#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    search: String,
    search_type: String,
}

/// Run a substring search over one book field.
pub async fn search(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<SearchRequest>,
) -> Result<Html<String>> {
    let field = SearchField::parse(&form.search_type)
        .ok_or_else(|| AppError::Invalid(format!("Unknown search field: {}", form.search_type)))?;

    let term = form.search.trim();
    let books = state.db.search_books(field, term)?;
    let user = current_user(&state, &headers)?;

    Ok(Html(pages::search_page(
        &state.config.server.title,
        user.as_deref(),
        Some((field.column(), term, &books)),
    )))
}

// ============================================================================
// AUTH PAGES
// ============================================================================

/// Login form.
pub async fn login_form(State(state): State<AppState>) -> Html<String> {
    Html(pages::login_page(&state.config.server.title, None))
}

/// Login request form fields.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    username: String,
    password: String,
}

/// Verify credentials and set the session cookie.
pub async fn login(
    State(state): State<AppState>,
    Form(form): Form<LoginRequest>,
) -> Result<Response> {
    let token = match state.auth.login(&form.username, &form.password) {
        Ok(token) => token,
        Err(AppError::Unauthorized(msg)) => {
            tracing::info!(username = %form.username, "Login rejected");
            let body = pages::login_page(&state.config.server.title, Some(&msg));
            return Ok((StatusCode::UNAUTHORIZED, Html(body)).into_response());
        }
        Err(e) => return Err(e),
    };

    let max_age = state.config.auth.token_ttl_minutes as i64 * 60;
    let cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        SESSION_COOKIE, token, max_age
    );

    tracing::info!(username = %form.username, "Login successful");

    Ok(Response::builder()
        .status(StatusCode::SEE_OTHER)
        .header(header::LOCATION, "/")
        .header(header::SET_COOKIE, cookie)
        .body(Body::empty())
        .unwrap_or_else(|_| Response::default()))
}

/// Clear the session cookie. Tokens are stateless, so the cookie is
/// all there is to drop.
pub async fn logout() -> Response {
    let cookie = format!("{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0", SESSION_COOKIE);

    Response::builder()
        .status(StatusCode::SEE_OTHER)
        .header(header::LOCATION, "/")
        .header(header::SET_COOKIE, cookie)
        .body(Body::empty())
        .unwrap_or_else(|_| Response::default())
}

// ============================================================================
// UPLOAD
// ============================================================================

/// Upload form.
pub async fn upload_form(State(state): State<AppState>, headers: HeaderMap) -> Result<Response> {
    let Some(user) = current_user(&state, &headers)? else {
        return Ok(Redirect::to("/login").into_response());
    };

    let body = pages::upload_page(
        &state.config.server.title,
        Some(&user),
        &state.config.upload.allowed_extensions,
        state.config.upload.max_size_mb,
        None,
    );

    Ok(Html(body).into_response())
}

/// Receive a multipart upload, store the file and insert the catalog row.
pub async fn upload(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Response> {
    let Some(user) = current_user(&state, &headers)? else {
        return Ok(Redirect::to("/login").into_response());
    };

    let mut title = String::new();
    let mut author = String::new();
    let mut category = String::new();
    let mut description = String::new();
    let mut file_name = None;
    let mut file_data = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Invalid(format!("Malformed upload: {}", e)))?
    {
        match field.name() {
            Some("title") => title = field_text(field).await?,
            Some("author") => author = field_text(field).await?,
            Some("category") => category = field_text(field).await?,
            Some("description") => description = field_text(field).await?,
            Some("file") => {
                file_name = field.file_name().map(|s| s.to_string());
                file_data = Some(field.bytes().await.map_err(|e| {
                    AppError::Invalid(format!("Failed to read uploaded file: {}", e))
                })?);
            }
            _ => {}
        }
    }

    let data = file_data.ok_or_else(|| AppError::Invalid("No file in upload".to_string()))?;

    let file_name = file_name.unwrap_or_default();
    let ext = storage::extension_of(&file_name)
        .ok_or_else(|| AppError::Invalid(format!("File '{}' has no extension", file_name)))?;
    if !state.config.upload.allows_extension(&ext) {
        return Err(AppError::Invalid(format!(
            "File type '{}' is not accepted",
            ext
        )));
    }

    if data.len() > state.config.upload.max_size_bytes() {
        return Err(AppError::TooLarge(format!(
            "File exceeds {} MB",
            state.config.upload.max_size_mb
        )));
    }

    let title = title.trim();
    let author = author.trim();
    let category = category.trim();
    if title.is_empty() || author.is_empty() || category.is_empty() {
        return Err(AppError::Invalid(
            "Title, author and category are required".to_string(),
        ));
    }

    let now = chrono::Utc::now();
    let hash = storage::content_hash(&data);
    let storage_path = FileStore::derive_path(title, &hash, &ext, now);

    state.store.save(&storage_path, &data)?;

    let book = NewBook {
        title: title.to_string(),
        author: author.to_string(),
        category: category.to_string(),
        description: {
            let d = description.trim();
            (!d.is_empty()).then(|| d.to_string())
        },
        content_hash: hash,
        storage_path: storage_path.clone(),
        created_at: now.timestamp(),
    };

    let id = match state.db.insert_book(&book) {
        Ok(id) => id,
        Err(e) => {
            // An earlier upload of the same content may still reference
            // the file, so only unlink when nothing does
            if let Ok(0) = state.db.count_books_with_path(&storage_path) {
                let _ = state.store.remove(&storage_path);
            }
            return Err(e);
        }
    };

    tracing::info!(id, title = %book.title, user = %user, "Book uploaded");

    let notice = format!("Uploaded '{}'", book.title);
    let body = pages::upload_page(
        &state.config.server.title,
        Some(&user),
        &state.config.upload.allowed_extensions,
        state.config.upload.max_size_mb,
        Some(&notice),
    );

    Ok(Html(body).into_response())
}

/// Read a text field of a multipart request.
async fn field_text(field: axum::extract::multipart::Field<'_>) -> Result<String> {
    field
        .text()
        .await
        .map_err(|e| AppError::Invalid(format!("Malformed upload: {}", e)))
}

// ============================================================================
// DELETE
// ============================================================================

/// Book list with delete buttons.
pub async fn delete_form(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<PageQuery>,
) -> Result<Response> {
    let Some(user) = current_user(&state, &headers)? else {
        return Ok(Redirect::to("/login").into_response());
    };

    let size = state.page_size();

    let total = state.db.count_books()?;
    let (page, offset, total_pages) = page_window(query.page, size, total);
    let books = state.db.list_recent(size, offset)?;

    let body = pages::delete_page(
        &state.config.server.title,
        Some(&user),
        &books,
        page,
        total_pages,
    );

    Ok(Html(body).into_response())
}

/// Delete request form fields.
#[derive(Debug, Deserialize)]
pub struct DeleteRequest {
    id: String,
}

/// Delete a catalog row and, when it was the last reference, the file.
pub async fn delete_book(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<DeleteRequest>,
) -> Result<Response> {
    let Some(user) = current_user(&state, &headers)? else {
        return Ok(Redirect::to("/login").into_response());
    };

    let id: i64 = form
        .id
        .trim()
        .parse()
        .map_err(|_| AppError::Invalid(format!("Invalid book id: {}", form.id)))?;

    let book = state
        .db
        .delete_book(id)?
        .ok_or_else(|| AppError::NotFound(format!("Book {} not found", id)))?;

    if state.db.count_books_with_path(&book.storage_path)? == 0 {
        // File removal is best effort, the row is already gone
        match state.store.remove(&book.storage_path) {
            Ok(true) => {}
            Ok(false) => {
                tracing::warn!(path = %book.storage_path, "Stored file already missing");
            }
            Err(e) => {
                tracing::warn!(path = %book.storage_path, error = %e, "Failed to remove stored file");
            }
        }
    }

    tracing::info!(id, title = %book.title, user = %user, "Book deleted");

    Ok(Redirect::to("/delete").into_response())
}

// ============================================================================
// FILES
// ============================================================================

/// Stream a stored file as an attachment.
pub async fn download(
    State(state): State<AppState>,
    Path(path): Path<String>,
) -> Result<Response<Body>> {
    let resolved = state.store.resolve(&path)?;

    let file = match tokio::fs::File::open(&resolved).await {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(AppError::NotFound(format!("File not found: {}", path)));
        }
        Err(e) => return Err(e.into()),
    };

    let file_size = file.metadata().await?.len();
    let stream = ReaderStream::new(file);
    let body = Body::from_stream(stream);

    let filename = std::path::Path::new(&path)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("download");
    let mime = storage::extension_of(filename)
        .map(|ext| storage::mime_for_extension(&ext))
        .unwrap_or("application/octet-stream");
    let content_disposition = format!("attachment; filename=\"{}\"", filename);

    Ok(Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, mime)
        .header(header::CONTENT_DISPOSITION, content_disposition)
        .header(header::CONTENT_LENGTH, file_size)
        .body(body)
        .unwrap_or_else(|_| Response::default()))
}

// ============================================================================
// STATS API
// ============================================================================

/// Catalog statistics.
#[derive(Serialize)]
pub struct StatsResponse {
    total_books: i64,
    total_users: i64,
    category_counts: std::collections::HashMap<String, i64>,
}

/// API: catalog statistics.
pub async fn api_stats(State(state): State<AppState>) -> Result<Json<StatsResponse>> {
    Ok(Json(StatsResponse {
        total_books: state.db.count_books()?,
        total_users: state.db.count_users()?,
        category_counts: state.db.list_categories()?.into_iter().collect(),
    }))
}

// ============================================================================
// HELPERS
// ============================================================================

/// Effective page, row offset and page count for a listing page.
/// Requested pages outside the catalog land on the nearest real page,
/// which also keeps the offset arithmetic in range.
fn page_window(page: i64, size: i64, total: i64) -> (i64, i64, i64) {
    let total_pages = ((total + size - 1) / size).max(1);
    let page = page.clamp(1, total_pages);
    let offset = (page - 1) * size;
    (page, offset, total_pages)
}

/// Extract the token from the Authorization header or the session cookie.
fn extract_token(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
    {
        return Some(token.to_string());
    }

    let cookies = headers.get(header::COOKIE)?.to_str().ok()?;
    cookies.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == SESSION_COOKIE).then(|| value.to_string())
    })
}

/// Username of the requester, when a valid token names an existing user.
fn current_user(state: &AppState, headers: &HeaderMap) -> Result<Option<String>> {
    let Some(token) = extract_token(headers) else {
        return Ok(None);
    };
    Ok(state.auth.current_user(&token)?.map(|user| user.username))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthService;
    use crate::config::Config;
    use crate::db::Database;

    fn test_state(root: &std::path::Path) -> AppState {
        let db = Database::open_memory().unwrap();
        let auth = AuthService::new(db.clone(), "test-secret".to_string(), 30);
        let store = FileStore::new(root).unwrap();
        AppState::new(Config::default(), db, auth, store)
    }

    fn session_headers(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            format!("session={}", token).parse().unwrap(),
        );
        headers
    }

    #[test]
    fn test_page_window_basic() {
        assert_eq!(page_window(1, 20, 100), (1, 0, 5));
        assert_eq!(page_window(3, 20, 100), (3, 40, 5));
        assert_eq!(page_window(1, 20, 0), (1, 0, 1));
    }

    #[test]
    fn test_page_window_clamps_out_of_range() {
        assert_eq!(page_window(9, 20, 100), (5, 80, 5));
        assert_eq!(page_window(i64::MAX, 20, 100), (5, 80, 5));
        assert_eq!(page_window(-7, 20, 100), (1, 0, 5));
    }

    #[test]
    fn test_delete_keeps_shared_file_until_last_reference() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path());

        state.auth.create_user("admin", "password").unwrap();
        let token = state.auth.login("admin", "password").unwrap();
        let headers = session_headers(&token);

        let path = "2024/2024-01-01/Dune_abc123.pdf";
        state.store.save(path, b"content").unwrap();

        let book = NewBook {
            title: "Dune".to_string(),
            author: "Frank Herbert".to_string(),
            category: "Science Fiction".to_string(),
            description: None,
            content_hash: "abc123".to_string(),
            storage_path: path.to_string(),
            created_at: 100,
        };
        let first = state.db.insert_book(&book).unwrap();
        let second = state.db.insert_book(&book).unwrap();

        let response = tokio_test::block_on(delete_book(
            State(state.clone()),
            headers.clone(),
            Form(DeleteRequest {
                id: first.to_string(),
            }),
        ))
        .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert!(state.store.exists(path));

        let response = tokio_test::block_on(delete_book(
            State(state.clone()),
            headers,
            Form(DeleteRequest {
                id: second.to_string(),
            }),
        ))
        .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert!(!state.store.exists(path));
    }
}
