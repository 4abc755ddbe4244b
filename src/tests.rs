use crate::auth::AuthService;
use crate::config::Config;
use crate::db::{Database, NewBook, SearchField};
use crate::error::AppError;

fn test_db() -> Database {
    Database::open_memory().unwrap()
}

fn test_auth(db: &Database) -> AuthService {
    AuthService::new(db.clone(), "test-secret".to_string(), 30)
}

fn add_book(db: &Database, title: &str, category: &str, created_at: i64) -> i64 {
    db.insert_book(&NewBook {
        title: title.to_string(),
        author: "Author".to_string(),
        category: category.to_string(),
        description: None,
        content_hash: format!("{}-hash", title),
        storage_path: format!("2024/2024-01-01/{}_hash.pdf", title),
        created_at,
    })
    .unwrap()
}

#[test]
fn db_create_and_get_user() {
    let db = test_db();
    let id = db.create_user("alice", "hash").unwrap();
    assert!(id > 0);

    let user = db.get_user_by_username("alice").unwrap().unwrap();
    assert_eq!(user.id, id);
    assert_eq!(user.username, "alice");
    assert_eq!(user.password_hash, "hash");

    assert!(db.get_user_by_username("nobody").unwrap().is_none());
}

#[test]
fn db_duplicate_username_rejected() {
    let db = test_db();
    db.create_user("alice", "hash1").unwrap();

    let result = db.create_user("alice", "hash2");
    assert!(matches!(result, Err(AppError::Invalid(_))));
    assert_eq!(db.count_users().unwrap(), 1);
}

#[test]
fn db_delete_user() {
    let db = test_db();
    db.create_user("bob", "hash").unwrap();

    assert!(db.delete_user("bob").unwrap());
    assert!(db.get_user_by_username("bob").unwrap().is_none());
    assert!(!db.delete_user("bob").unwrap());
}

#[test]
fn db_update_user_password() {
    let db = test_db();
    db.create_user("carol", "old").unwrap();

    assert!(db.update_user_password("carol", "new").unwrap());
    let user = db.get_user_by_username("carol").unwrap().unwrap();
    assert_eq!(user.password_hash, "new");

    assert!(!db.update_user_password("nobody", "new").unwrap());
}

#[test]
fn db_list_users_sorted() {
    let db = test_db();
    db.create_user("zoe", "hash").unwrap();
    db.create_user("adam", "hash").unwrap();

    let users = db.list_users().unwrap();
    assert_eq!(users.len(), 2);
    assert_eq!(users[0].username, "adam");
    assert_eq!(users[1].username, "zoe");
    assert_eq!(db.count_users().unwrap(), 2);
}

#[test]
fn db_insert_and_get_book() {
    let db = test_db();
    let id = db
        .insert_book(&NewBook {
            title: "Dune".to_string(),
            author: "Frank Herbert".to_string(),
            category: "Science Fiction".to_string(),
            description: Some("Desert planet".to_string()),
            content_hash: "abc123".to_string(),
            storage_path: "2024/2024-01-01/Dune_abc123.pdf".to_string(),
            created_at: 1000,
        })
        .unwrap();

    let book = db.get_book(id).unwrap().unwrap();
    assert_eq!(book.id, id);
    assert_eq!(book.title, "Dune");
    assert_eq!(book.author, "Frank Herbert");
    assert_eq!(book.category, "Science Fiction");
    assert_eq!(book.description.as_deref(), Some("Desert planet"));
    assert_eq!(book.content_hash, "abc123");
    assert_eq!(book.storage_path, "2024/2024-01-01/Dune_abc123.pdf");
    assert_eq!(book.created_at, 1000);

    assert!(db.get_book(9999).unwrap().is_none());
}

#[test]
fn db_list_recent_orders_newest_first() {
    let db = test_db();
    add_book(&db, "Oldest", "Fiction", 100);
    add_book(&db, "Middle", "Fiction", 200);
    add_book(&db, "Newest", "Fiction", 300);

    let books = db.list_recent(10, 0).unwrap();
    let titles: Vec<&str> = books.iter().map(|b| b.title.as_str()).collect();
    assert_eq!(titles, vec!["Newest", "Middle", "Oldest"]);
}

#[test]
fn db_list_recent_breaks_ties_by_id() {
    let db = test_db();
    add_book(&db, "First", "Fiction", 100);
    add_book(&db, "Second", "Fiction", 100);

    let books = db.list_recent(10, 0).unwrap();
    assert_eq!(books[0].title, "Second");
    assert_eq!(books[1].title, "First");
}

#[test]
fn db_list_recent_paginates() {
    let db = test_db();
    for i in 1..=5 {
        add_book(&db, &format!("Book {}", i), "Fiction", i * 100);
    }

    let page1 = db.list_recent(2, 0).unwrap();
    let page2 = db.list_recent(2, 2).unwrap();
    let page3 = db.list_recent(2, 4).unwrap();

    assert_eq!(page1[0].title, "Book 5");
    assert_eq!(page1[1].title, "Book 4");
    assert_eq!(page2[0].title, "Book 3");
    assert_eq!(page2[1].title, "Book 2");
    assert_eq!(page3.len(), 1);
    assert_eq!(page3[0].title, "Book 1");
    assert_eq!(db.count_books().unwrap(), 5);
}

#[test]
fn db_list_by_category() {
    let db = test_db();
    add_book(&db, "Dune", "Science Fiction", 100);
    add_book(&db, "Hobbit", "Fantasy", 200);
    add_book(&db, "Foundation", "Science Fiction", 300);

    let books = db.list_by_category("Science Fiction", 10, 0).unwrap();
    assert_eq!(books.len(), 2);
    assert_eq!(books[0].title, "Foundation");
    assert_eq!(books[1].title, "Dune");

    assert_eq!(db.count_books_in_category("Science Fiction").unwrap(), 2);
    assert_eq!(db.count_books_in_category("Fantasy").unwrap(), 1);
    assert_eq!(db.count_books_in_category("Missing").unwrap(), 0);
}

#[test]
fn db_list_categories_with_counts() {
    let db = test_db();
    add_book(&db, "Dune", "Science Fiction", 100);
    add_book(&db, "Hobbit", "Fantasy", 200);
    add_book(&db, "Foundation", "Science Fiction", 300);

    let categories = db.list_categories().unwrap();
    assert_eq!(
        categories,
        vec![
            ("Fantasy".to_string(), 1),
            ("Science Fiction".to_string(), 2),
        ]
    );
}

#[test]
fn db_search_books() {
    let db = test_db();
    db.insert_book(&NewBook {
        title: "The Left Hand of Darkness".to_string(),
        author: "Ursula K. Le Guin".to_string(),
        category: "Science Fiction".to_string(),
        description: None,
        content_hash: "h1".to_string(),
        storage_path: "p1".to_string(),
        created_at: 100,
    })
    .unwrap();
    db.insert_book(&NewBook {
        title: "A Wizard of Earthsea".to_string(),
        author: "Ursula K. Le Guin".to_string(),
        category: "Fantasy".to_string(),
        description: None,
        content_hash: "h2".to_string(),
        storage_path: "p2".to_string(),
        created_at: 200,
    })
    .unwrap();

    let by_title = db.search_books(SearchField::Title, "Wizard").unwrap();
    assert_eq!(by_title.len(), 1);
    assert_eq!(by_title[0].title, "A Wizard of Earthsea");

    let by_author = db.search_books(SearchField::Author, "Le Guin").unwrap();
    assert_eq!(by_author.len(), 2);
    assert_eq!(by_author[0].title, "A Wizard of Earthsea");

    let by_category = db.search_books(SearchField::Category, "Fantasy").unwrap();
    assert_eq!(by_category.len(), 1);
    assert_eq!(by_category[0].title, "A Wizard of Earthsea");

    let none = db.search_books(SearchField::Title, "Dune").unwrap();
    assert!(none.is_empty());
}

#[test]
fn db_search_empty_term_rejected() {
    let db = test_db();
    add_book(&db, "Dune", "Science Fiction", 100);

    assert!(matches!(
        db.search_books(SearchField::Title, ""),
        Err(AppError::Invalid(_))
    ));
    assert!(matches!(
        db.search_books(SearchField::Author, "   "),
        Err(AppError::Invalid(_))
    ));
}

#[test]
fn db_delete_book_returns_row() {
    let db = test_db();
    let id = add_book(&db, "Doomed", "Fiction", 100);

    let deleted = db.delete_book(id).unwrap().unwrap();
    assert_eq!(deleted.id, id);
    assert_eq!(deleted.title, "Doomed");
    assert!(db.get_book(id).unwrap().is_none());
}

#[test]
fn db_delete_missing_book_returns_none() {
    let db = test_db();
    assert!(db.delete_book(42).unwrap().is_none());
}

#[test]
fn db_count_books_with_path() {
    let db = test_db();
    let path = "2024/2024-01-01/Shared_abc.pdf";

    let mut ids = Vec::new();
    for ts in [100, 200] {
        let id = db
            .insert_book(&NewBook {
                title: "Shared".to_string(),
                author: "Author".to_string(),
                category: "Fiction".to_string(),
                description: None,
                content_hash: "abc".to_string(),
                storage_path: path.to_string(),
                created_at: ts,
            })
            .unwrap();
        ids.push(id);
    }

    assert_eq!(db.count_books_with_path(path).unwrap(), 2);
    db.delete_book(ids[0]).unwrap();
    assert_eq!(db.count_books_with_path(path).unwrap(), 1);
    db.delete_book(ids[1]).unwrap();
    assert_eq!(db.count_books_with_path(path).unwrap(), 0);
}

#[test]
fn search_field_parse() {
    assert_eq!(SearchField::parse("title"), Some(SearchField::Title));
    assert_eq!(SearchField::parse("author"), Some(SearchField::Author));
    assert_eq!(SearchField::parse("category"), Some(SearchField::Category));
    assert_eq!(SearchField::parse("publisher"), None);
    assert_eq!(SearchField::parse(""), None);
}

#[test]
fn search_field_column() {
    assert_eq!(SearchField::Title.column(), "title");
    assert_eq!(SearchField::Author.column(), "author");
    assert_eq!(SearchField::Category.column(), "category");
}

#[test]
fn auth_create_user_and_login() {
    let db = test_db();
    let auth = test_auth(&db);

    let user = auth.create_user("alice", "password123").unwrap();
    assert_eq!(user.username, "alice");

    let token = auth.login("alice", "password123").unwrap();
    assert_eq!(auth.verify_token(&token), Some("alice".to_string()));
}

#[test]
fn auth_wrong_password_rejected() {
    let db = test_db();
    let auth = test_auth(&db);
    auth.create_user("alice", "correct1").unwrap();

    assert!(matches!(
        auth.login("alice", "wrong"),
        Err(AppError::Unauthorized(_))
    ));
    assert!(matches!(
        auth.login("nobody", "whatever"),
        Err(AppError::Unauthorized(_))
    ));
}

#[test]
fn auth_short_password_rejected() {
    let db = test_db();
    let auth = test_auth(&db);

    assert!(auth.create_user("alice", "abc").is_err());
}

#[test]
fn auth_invalid_username_rejected() {
    let db = test_db();
    let auth = test_auth(&db);

    assert!(auth.create_user("user@host", "password").is_err());
    assert!(auth.create_user("user name", "password").is_err());
    assert!(auth.create_user("", "password").is_err());
}

#[test]
fn auth_change_password() {
    let db = test_db();
    let auth = test_auth(&db);
    auth.create_user("alice", "oldpass").unwrap();

    assert!(auth.change_password("alice", "newpass").unwrap());
    assert!(auth.login("alice", "oldpass").is_err());
    assert!(auth.login("alice", "newpass").is_ok());
}

#[test]
fn auth_delete_user() {
    let db = test_db();
    let auth = test_auth(&db);
    auth.create_user("bob", "password").unwrap();

    assert!(auth.delete_user("bob").unwrap());
    assert!(auth.login("bob", "password").is_err());
    assert!(auth.list_users().unwrap().is_empty());
}

#[test]
fn auth_deleted_user_token_rejected() {
    let db = test_db();
    let auth = test_auth(&db);
    auth.create_user("bob", "password").unwrap();

    let token = auth.login("bob", "password").unwrap();
    assert!(auth.current_user(&token).unwrap().is_some());

    auth.delete_user("bob").unwrap();
    assert!(auth.current_user(&token).unwrap().is_none());
}

#[test]
fn config_parse_toml() {
    let toml = r#"
[server]
bind = "127.0.0.1:9090"
title = "Test Shelf"

[auth]
secret = "fixed-secret"
token_ttl_minutes = 5

[upload]
max_size_mb = 2
allowed_extensions = ["epub"]

[catalog]
page_size = 3
"#;
    let config: Config = toml::from_str(toml).unwrap();
    assert_eq!(config.server.bind.port(), 9090);
    assert_eq!(config.server.title, "Test Shelf");
    assert_eq!(config.auth.secret, "fixed-secret");
    assert_eq!(config.auth.token_ttl_minutes, 5);
    assert_eq!(config.upload.max_size_mb, 2);
    assert!(config.upload.allows_extension("epub"));
    assert!(!config.upload.allows_extension("pdf"));
    assert_eq!(config.catalog.page_size, 3);
    assert_eq!(config.database.path, std::path::Path::new("data/bookshelf.db"));
}

#[test]
fn config_default_values() {
    let config = Config::default();
    assert_eq!(config.server.bind.port(), 8080);
    assert_eq!(config.server.title, "My Bookshelf");
    assert!(config.auth.secret.is_empty());
    assert_eq!(config.auth.token_ttl_minutes, 60);
    assert_eq!(config.upload.max_size_mb, 16);
    assert_eq!(config.upload.allowed_extensions, vec!["doc", "pdf"]);
    assert_eq!(config.catalog.page_size, 20);
}

#[test]
fn config_generate_default_parses() {
    let config: Config = toml::from_str(&Config::generate_default()).unwrap();
    assert_eq!(config.server.bind.port(), 8080);
    assert_eq!(config.auth.token_ttl_minutes, 60);
    assert!(config.upload.allows_extension("pdf"));
    assert_eq!(config.catalog.page_size, 20);
}

#[test]
fn upload_config_limits() {
    let upload = Config::default().upload;
    assert_eq!(upload.max_size_bytes(), 16 * 1024 * 1024);
    assert!(upload.allows_extension("doc"));
    assert!(!upload.allows_extension("exe"));
}
