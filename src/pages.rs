//! HTML page generation.

use crate::db::Book;
use crate::db::timestamp_to_datetime;
use std::fmt::Write;

/// Escape text for HTML bodies and attribute values.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Navigation bar, varies with login state.
fn nav(user: Option<&str>) -> String {
    let mut buf = String::new();
    buf.push_str(r#"<nav><a href="/">Home</a> <a href="/search">Search</a>"#);

    match user {
        Some(name) => {
            let _ = write!(
                buf,
                r#" <a href="/upload">Upload</a> <a href="/delete">Delete</a> <span class="user">{}</span><form method="post" action="/logout" class="inline"><button type="submit">Logout</button></form>"#,
                escape(name)
            );
        }
        None => {
            buf.push_str(r#" <a href="/login">Login</a>"#);
        }
    }

    buf.push_str("</nav>");
    buf
}

/// Wrap page content in the shared layout.
pub fn layout(site_title: &str, heading: &str, user: Option<&str>, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>{heading} - {site}</title>
<style>
body {{ font-family: sans-serif; margin: 2em auto; max-width: 60em; padding: 0 1em; }}
nav a {{ margin-right: 0.8em; }}
nav .user {{ color: #555; margin-right: 0.5em; }}
form.inline {{ display: inline; }}
table {{ border-collapse: collapse; width: 100%; margin-top: 1em; }}
th, td {{ border: 1px solid #ccc; padding: 0.4em 0.6em; text-align: left; }}
ul.categories {{ list-style: none; padding: 0; }}
ul.categories li {{ display: inline-block; margin-right: 1em; }}
p.error {{ color: #a00; }}
p.notice {{ color: #080; }}
.pager {{ margin-top: 1em; }}
.pager a {{ margin-right: 0.6em; }}
</style>
</head>
<body>
{nav}
<h1>{heading}</h1>
{body}
</body>
</html>
"#,
        site = escape(site_title),
        heading = escape(heading),
        nav = nav(user),
        body = body
    )
}

/// Render the rows of a book table.
fn book_rows(books: &[Book], with_delete: bool) -> String {
    let mut buf = String::new();
    for book in books {
        let date = timestamp_to_datetime(book.created_at).format("%Y-%m-%d");
        let _ = write!(
            buf,
            r#"<tr><td><a href="/files/{path}">{title}</a></td><td>{author}</td><td><a href="/category?name={cat_link}">{category}</a></td><td>{description}</td><td>{date}</td>"#,
            path = escape(&book.storage_path),
            title = escape(&book.title),
            author = escape(&book.author),
            cat_link = urlencoding::encode(&book.category),
            category = escape(&book.category),
            description = escape(book.description.as_deref().unwrap_or("")),
            date = date
        );

        if with_delete {
            let _ = write!(
                buf,
                r#"<td><form method="post" action="/delete"><input type="hidden" name="id" value="{}"><button type="submit">Delete</button></form></td>"#,
                book.id
            );
        }

        buf.push_str("</tr>\n");
    }
    buf
}

/// Render a book table, or a placeholder when there are no rows.
fn book_table(books: &[Book], with_delete: bool) -> String {
    if books.is_empty() {
        return "<p>No books found.</p>".to_string();
    }

    let extra = if with_delete { "<th></th>" } else { "" };
    format!(
        "<table>\n<tr><th>Title</th><th>Author</th><th>Category</th><th>Description</th><th>Uploaded</th>{}</tr>\n{}</table>",
        extra,
        book_rows(books, with_delete)
    )
}

/// Previous/next page links. `base` must end with '?' or '&'.
fn pagination(base: &str, page: i64, total_pages: i64) -> String {
    let mut buf = String::from(r#"<div class="pager">"#);

    if page > 1 {
        let _ = write!(buf, r#"<a href="{}page={}">&laquo; Newer</a>"#, base, page - 1);
    }
    let _ = write!(buf, "Page {} of {}", page, total_pages.max(1));
    if page < total_pages {
        let _ = write!(buf, r#" <a href="{}page={}">Older &raquo;</a>"#, base, page + 1);
    }

    buf.push_str("</div>");
    buf
}

/// Catalog listing shared by the index and category views.
#[allow(clippy::too_many_arguments)]
pub fn catalog_page(
    site_title: &str,
    heading: &str,
    categories: &[(String, i64)],
    books: &[Book],
    total: i64,
    page: i64,
    total_pages: i64,
    page_base: &str,
    user: Option<&str>,
) -> String {
    let mut body = String::new();

    if !categories.is_empty() {
        body.push_str(r#"<ul class="categories">"#);
        for (name, count) in categories {
            let _ = write!(
                body,
                r#"<li><a href="/category?name={}">{}</a> ({})</li>"#,
                urlencoding::encode(name),
                escape(name),
                count
            );
        }
        body.push_str("</ul>");
    }

    let _ = write!(body, "<p>{} book(s)</p>", total);
    body.push_str(&book_table(books, false));
    body.push_str(&pagination(page_base, page, total_pages));

    layout(site_title, heading, user, &body)
}

/// Search form with the result table below it once a query ran. The
/// field of the last query stays selected in the dropdown.
pub fn search_page(
    site_title: &str,
    user: Option<&str>,
    results: Option<(&str, &str, &[Book])>,
) -> String {
    let selected = results.map_or("title", |(field, _, _)| field);

    let mut body = String::from(
        "<form method=\"post\" action=\"/search\">\n<select name=\"search_type\">\n",
    );
    for (value, label) in [("title", "Title"), ("author", "Author"), ("category", "Category")] {
        let mark = if value == selected { " selected" } else { "" };
        let _ = writeln!(body, r#"<option value="{}"{}>{}</option>"#, value, mark, label);
    }
    body.push_str(
        r#"</select>
<input type="text" name="search" required>
<button type="submit">Search</button>
</form>
"#,
    );

    if let Some((field, term, books)) = results {
        let _ = write!(
            body,
            "<h2>{} result(s) for {} \"{}\"</h2>\n",
            books.len(),
            escape(field),
            escape(term)
        );
        body.push_str(&book_table(books, false));
    }

    layout(site_title, "Search", user, &body)
}

/// Login form, with an error line after a failed attempt.
pub fn login_page(site_title: &str, error: Option<&str>) -> String {
    let mut body = String::new();

    if let Some(msg) = error {
        let _ = write!(body, r#"<p class="error">{}</p>"#, escape(msg));
    }

    body.push_str(
        r#"<form method="post" action="/login">
<p><label>Username <input type="text" name="username" required></label></p>
<p><label>Password <input type="password" name="password" required></label></p>
<button type="submit">Login</button>
</form>"#,
    );

    layout(site_title, "Login", None, &body)
}

/// Upload form, with a notice line after a successful upload.
pub fn upload_page(
    site_title: &str,
    user: Option<&str>,
    allowed_extensions: &[String],
    max_size_mb: u64,
    notice: Option<&str>,
) -> String {
    let mut body = String::new();

    if let Some(msg) = notice {
        let _ = write!(body, r#"<p class="notice">{}</p>"#, escape(msg));
    }

    let _ = write!(
        body,
        r#"<p>Accepted: {} (max {} MB)</p>
<form method="post" action="/upload" enctype="multipart/form-data">
<p><label>Title <input type="text" name="title" required></label></p>
<p><label>Author <input type="text" name="author" required></label></p>
<p><label>Category <input type="text" name="category" required></label></p>
<p><label>Description <textarea name="description"></textarea></label></p>
<p><input type="file" name="file" required></p>
<button type="submit">Upload</button>
</form>"#,
        escape(&allowed_extensions.join(", ")),
        max_size_mb
    );

    layout(site_title, "Upload", user, &body)
}

/// Book list with per-row delete buttons.
pub fn delete_page(
    site_title: &str,
    user: Option<&str>,
    books: &[Book],
    page: i64,
    total_pages: i64,
) -> String {
    let mut body = book_table(books, true);
    body.push_str(&pagination("/delete?", page, total_pages));

    layout(site_title, "Delete books", user, &body)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_book() -> Book {
        Book {
            id: 7,
            title: "Dune <b>".to_string(),
            author: "Herbert".to_string(),
            category: "Fiction".to_string(),
            description: None,
            content_hash: "abc".to_string(),
            storage_path: "2024/2024-03-05/Dune_abc.pdf".to_string(),
            created_at: 1709640000,
        }
    }

    #[test]
    fn test_escape() {
        assert_eq!(escape("a<b>&\"c\""), "a&lt;b&gt;&amp;&quot;c&quot;");
    }

    #[test]
    fn test_catalog_page_escapes_titles() {
        let page = catalog_page(
            "Shelf",
            "Recent uploads",
            &[("Fiction".to_string(), 1)],
            &[sample_book()],
            1,
            1,
            1,
            "/?",
            None,
        );

        assert!(page.contains("Dune &lt;b&gt;"));
        assert!(!page.contains("Dune <b>"));
        assert!(page.contains("/files/2024/2024-03-05/Dune_abc.pdf"));
    }

    #[test]
    fn test_login_page_shows_error() {
        let page = login_page("Shelf", Some("Invalid username or password"));
        assert!(page.contains("Invalid username or password"));
    }

    #[test]
    fn test_delete_page_has_forms() {
        let page = delete_page("Shelf", Some("alice"), &[sample_book()], 1, 1);
        assert!(page.contains(r#"name="id" value="7""#));
        assert!(page.contains(r#"action="/delete""#));
    }

    #[test]
    fn test_search_page_keeps_selected_field() {
        let page = search_page("Shelf", None, Some(("author", "herbert", &[])));
        assert!(page.contains(r#"<option value="author" selected>"#));
        assert!(!page.contains(r#"<option value="title" selected>"#));

        let blank = search_page("Shelf", None, None);
        assert!(blank.contains(r#"<option value="title" selected>"#));
    }

    #[test]
    fn test_upload_page_shows_notice() {
        let exts = vec!["pdf".to_string()];
        let page = upload_page("Shelf", Some("alice"), &exts, 16, Some("Uploaded 'Dune'"));
        assert!(page.contains("Uploaded &#39;Dune&#39;"));

        let blank = upload_page("Shelf", Some("alice"), &exts, 16, None);
        assert!(!blank.contains("notice\""));
    }
}
