//! Small HTML pages the dev server answers with when it has nothing built
//! to serve: the interim page for an SSR project whose bundles are not
//! paired yet, the not-found page, and the error page.
//!
//! Every interpolated string is HTML-escaped.

/// Seconds before the interim page reloads itself.
pub const INTERIM_REFRESH_SECS: u32 = 1;

const STYLE: &str = "body{font-family:-apple-system,BlinkMacSystemFont,'Segoe UI',sans-serif;\
background:#1e1e1e;color:#d4d4d4;padding:2rem;line-height:1.5}\
h1{font-size:1.25rem;color:#ffffff}pre{background:#252526;padding:1rem;\
border-left:4px solid #f14c4c;overflow:auto;white-space:pre-wrap}code{color:#9cdcfe}";

fn page(title: &str, head_extra: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{}</title>\n{}<style>{}</style>\n</head>\n<body>\n{}\n</body>\n</html>\n",
        html_escape(title),
        head_extra,
        STYLE,
        body
    )
}

/// Shown while a server-rendered project is still compiling. Reloads itself.
pub fn interim(project: &str) -> String {
    let project = html_escape(project);
    page(
        "Compiling",
        &format!(
            "<meta http-equiv=\"refresh\" content=\"{}\">\n",
            INTERIM_REFRESH_SECS
        ),
        &format!(
            "<h1>Compiling <code>{}</code></h1>\n<p>The page will reload when the first build finishes.</p>",
            project
        ),
    )
}

pub fn not_found(path: &str) -> String {
    page(
        "Not Found",
        "",
        &format!("<h1>Not Found</h1>\n<p><code>{}</code></p>", html_escape(path)),
    )
}

/// Error page with a heading and escaped detail.
pub fn error(heading: &str, detail: &str) -> String {
    page(
        heading,
        "",
        &format!(
            "<h1>{}</h1>\n<pre>{}</pre>",
            html_escape(heading),
            html_escape(detail)
        ),
    )
}

/// Escape HTML special characters.
pub fn html_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}
