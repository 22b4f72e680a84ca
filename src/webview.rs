//! Panel document embedding the chat app.
//!
//! The document is a full-size iframe plus a small forwarding script. The
//! script relays in both directions: messages from the frame go to the host
//! only if `event.origin === APP_ORIGIN`, and host messages are posted into
//! the frame with `APP_ORIGIN` as the target origin. The CSP allows frames,
//! scripts and styles from the app origin only, plus the nonce'd relay script.

use anyhow::Result;

use crate::relay::OriginFilter;

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Render the panel document for the app at `app_url`.
pub fn render_html(app_url: &str, title: &str) -> Result<String> {
    let filter = OriginFilter::for_app_url(app_url)?;
    let origin = filter.origin();
    let nonce = uuid::Uuid::new_v4().simple().to_string();
    // JSON string literals are valid JS string literals.
    let origin_js = serde_json::to_string(origin)?.replace("</", "<\\/");
    let src = escape_html(app_url);
    let title = escape_html(title);

    Ok(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <meta http-equiv="Content-Security-Policy" content="default-src 'none'; frame-src {origin}; style-src {origin} 'unsafe-inline'; script-src 'nonce-{nonce}' {origin}; font-src https://fonts.gstatic.com;">
    <title>{title}</title>
    <style>
        body, html, iframe {{
            margin: 0;
            padding: 0;
            width: 100%;
            height: 100vh;
            overflow: hidden;
            border: none;
        }}
    </style>
</head>
<body>
    <iframe id="app" src="{src}"></iframe>
    <script nonce="{nonce}">
        (function () {{
            const APP_ORIGIN = {origin_js};
            const host = acquireVsCodeApi();
            const frame = document.getElementById("app");
            window.addEventListener("message", function (event) {{
                if (event.source === frame.contentWindow) {{
                    if (event.origin !== APP_ORIGIN) {{
                        return;
                    }}
                    host.postMessage(event.data);
                    return;
                }}
                if (event.origin !== window.origin) {{
                    return;
                }}
                frame.contentWindow.postMessage(event.data, APP_ORIGIN);
            }});
        }})();
    </script>
</body>
</html>"#
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csp_scoped_to_app_origin() {
        let html = render_html("https://app.example/chat", "Chat").unwrap();
        assert!(html.contains("frame-src https://app.example;"));
        assert!(html.contains("default-src 'none'"));
        assert!(html.contains(r#"<iframe id="app" src="https://app.example/chat">"#));
        assert!(html.contains(r#"const APP_ORIGIN = "https://app.example";"#));
        assert!(html.contains("event.origin !== APP_ORIGIN"));
    }

    #[test]
    fn test_script_nonce_matches_csp() {
        let html = render_html("https://app.example", "Chat").unwrap();
        let start = html.find("'nonce-").unwrap() + "'nonce-".len();
        let nonce = &html[start..start + 32];
        assert!(html.contains(&format!(r#"<script nonce="{nonce}">"#)));
    }

    #[test]
    fn test_title_and_src_escaped() {
        let html = render_html("https://app.example/?a=1&b=\"2\"", "<Chat>").unwrap();
        assert!(html.contains("<title>&lt;Chat&gt;</title>"));
        assert!(html.contains(r#"src="https://app.example/?a=1&amp;b=&quot;2&quot;""#));
    }

    #[test]
    fn test_invalid_url_is_error() {
        assert!(render_html("nope", "Chat").is_err());
    }
}
