//! HTML pages rendered by the login flow.
//!
//! The provider renders a handful of small pages: the connector chooser,
//! the password prompt, the consent page, the out-of-band code page, and a
//! generic error page. They are plain HTML built with `format!`; everything
//! user- or client-controlled goes through [`html_escape`].

use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};

/// Escapes text for safe embedding in HTML.
#[must_use]
pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

fn page(title: &str, body: &str) -> String {
    format!(
        r"<!DOCTYPE html>
<html>
<head><title>{}</title></head>
<body>
{body}
</body>
</html>",
        html_escape(title)
    )
}

/// A generic error page, used wherever no redirect target is trusted yet.
#[must_use]
pub fn error_page(status: StatusCode, error: &str, description: &str) -> Response {
    let body = format!(
        "<h1>Error</h1>\n<p><strong>{}</strong></p>\n<p>{}</p>",
        html_escape(error),
        html_escape(description)
    );
    (status, Html(page("Error", &body))).into_response()
}

/// The connector chooser, shown when more than one connector is registered.
///
/// `connectors` holds `(connector_id, display_name)` pairs.
#[must_use]
pub fn login_chooser(connectors: &[(String, String)], auth_req_id: &str) -> Response {
    let links: String = connectors
        .iter()
        .map(|(id, name)| {
            format!(
                r#"<li><a href="/auth/{}?req={}">{}</a></li>"#,
                urlencoding::encode(id),
                urlencoding::encode(auth_req_id),
                html_escape(name)
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    let body = format!("<h1>Log in to Portico</h1>\n<ul>\n{links}\n</ul>");
    Html(page("Log in", &body)).into_response()
}

/// The password prompt. `invalid` re-renders with a failure notice and the
/// previously entered username.
#[must_use]
pub fn password_prompt(
    connector_id: &str,
    auth_req_id: &str,
    username: &str,
    invalid: bool,
) -> Response {
    let notice = if invalid {
        "<p><strong>Invalid username and password.</strong></p>\n"
    } else {
        ""
    };
    let body = format!(
        r#"<h1>Log in</h1>
{notice}<form method="post" action="/auth/{}?req={}">
<label>Username <input type="text" name="login" value="{}" /></label>
<label>Password <input type="password" name="password" /></label>
<button type="submit">Login</button>
</form>"#,
        urlencoding::encode(connector_id),
        urlencoding::encode(auth_req_id),
        html_escape(username)
    );
    Html(page("Log in", &body)).into_response()
}

/// The consent page.
#[must_use]
pub fn approval_page(
    auth_req_id: &str,
    username: &str,
    client_name: &str,
    scopes: &[String],
) -> Response {
    let scope_items: String = scopes
        .iter()
        .map(|s| format!("<li>{}</li>", html_escape(s)))
        .collect::<Vec<_>>()
        .join("\n");

    let body = format!(
        r#"<h1>Grant access</h1>
<p>{} would like to access the account of {}:</p>
<ul>
{scope_items}
</ul>
<form method="post" action="/approval?req={}">
<input type="hidden" name="req" value="{}" />
<button type="submit" name="approval" value="approve">Grant access</button>
<button type="submit" name="approval" value="reject">Deny</button>
</form>"#,
        html_escape(client_name),
        html_escape(username),
        urlencoding::encode(auth_req_id),
        html_escape(auth_req_id)
    );
    Html(page("Grant access", &body)).into_response()
}

/// The out-of-band page, shown instead of redirecting when the client
/// registered the OOB sentinel.
#[must_use]
pub fn oob_page(code: &str) -> Response {
    let body = format!(
        "<h1>Login successful</h1>\n<p>Enter the following code in your application:</p>\n<pre>{}</pre>",
        html_escape(code)
    );
    Html(page("Login successful", &body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_special_chars() {
        assert_eq!(html_escape("<script>"), "&lt;script&gt;");
        assert_eq!(html_escape("a & b"), "a &amp; b");
        assert_eq!(html_escape(r#"say "hi""#), "say &quot;hi&quot;");
    }

    #[test]
    fn chooser_links_connectors() {
        let connectors = vec![
            ("ldap".to_string(), "Corporate LDAP".to_string()),
            ("local".to_string(), "Email & password".to_string()),
        ];
        let response = login_chooser(&connectors, "req-1");
        assert_eq!(response.status(), StatusCode::OK);
    }
}
