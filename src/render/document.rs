//! Document assembly helpers shared by both render modes.

use crate::render::module::RenderedDocument;
use crate::render::template::TemplateFragments;
use crate::JsonMap;

/// Client event dispatched once streamed data is in place.
pub const DATA_READY_EVENT: &str = "initial-data-ready";

/// JSON for embedding in an inline script. Every `<` becomes `\u003c`, so
/// the payload can never close the script element early.
pub fn serialize_initial_data(data: &JsonMap) -> String {
    serde_json::to_string(data)
        .unwrap_or_else(|_| "{}".to_string())
        .replace('<', "\\u003c")
}

pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
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

fn nonce_attr(nonce: Option<&str>) -> String {
    nonce
        .map(|n| format!(" nonce=\"{}\"", escape_html(n)))
        .unwrap_or_default()
}

/// `<script>` assigning the snapshot to `window.__INITIAL_DATA__`.
pub fn data_script(data: &JsonMap, nonce: Option<&str>) -> String {
    format!(
        "<script{}>window.__INITIAL_DATA__ = {};</script>",
        nonce_attr(nonce),
        serialize_initial_data(data)
    )
}

/// Data script for the end of a stream; also tells the client the data is in.
pub fn data_ready_script(data: &JsonMap, nonce: Option<&str>) -> String {
    format!(
        "<script{}>window.__INITIAL_DATA__ = {};window.dispatchEvent(new Event('{}'));</script>",
        nonce_attr(nonce),
        serialize_initial_data(data),
        DATA_READY_EVENT
    )
}

/// Client bootstrap script, or nothing when hydration is off or no module is known.
pub fn bootstrap_script(module: Option<&str>, hydrate: bool, nonce: Option<&str>) -> String {
    match module {
        Some(src) if hydrate => format!(
            "<script{} type=\"module\" src=\"{}\" defer></script>",
            nonce_attr(nonce),
            escape_html(src)
        ),
        _ => String::new(),
    }
}

/// Everything a buffered document needs besides the template.
#[derive(Debug, Clone, Copy)]
pub struct DocumentParts<'a> {
    pub rendered: &'a RenderedDocument,
    pub data: &'a JsonMap,
    /// Stylesheet and preload links appended to the head.
    pub head_links: &'a str,
    pub bootstrap_module: Option<&'a str>,
    pub hydrate: bool,
    pub nonce: Option<&'a str>,
}

/// Stitch a complete buffered document.
pub fn assemble_document(template: &TemplateFragments, parts: DocumentParts<'_>) -> String {
    let data = data_script(parts.data, parts.nonce);
    let bootstrap = bootstrap_script(parts.bootstrap_module, parts.hydrate, parts.nonce);

    let mut html = String::with_capacity(
        template.before_head.len()
            + template.after_head.len()
            + template.before_body.len()
            + template.after_body.len()
            + parts.rendered.head.len()
            + parts.rendered.body.len()
            + parts.head_links.len()
            + data.len()
            + bootstrap.len(),
    );
    html.push_str(&template.before_head);
    html.push_str(&parts.rendered.head);
    html.push_str(parts.head_links);
    html.push_str(&template.after_head);
    html.push_str(&template.before_body);
    html.push_str(&parts.rendered.body);
    html.push_str(&data);
    html.push_str(&bootstrap);
    html.push_str(&template.after_body);
    html
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn map(value: Value) -> JsonMap {
        match value {
            Value::Object(m) => m,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_script_breakout_is_escaped() {
        let data = map(json!({ "bio": "</script><script>alert(1)</script>" }));
        let out = serialize_initial_data(&data);
        assert!(!out.contains('<'));

        // Still valid JSON that parses back to the original.
        let parsed: JsonMap = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed, data);
    }

    #[test]
    fn test_data_script_carries_nonce() {
        let data = map(json!({ "a": 1 }));
        assert_eq!(
            data_script(&data, Some("abc")),
            "<script nonce=\"abc\">window.__INITIAL_DATA__ = {\"a\":1};</script>"
        );
        assert_eq!(
            data_script(&JsonMap::new(), None),
            "<script>window.__INITIAL_DATA__ = {};</script>"
        );
    }

    #[test]
    fn test_data_ready_script_dispatches_event() {
        let script = data_ready_script(&JsonMap::new(), None);
        assert!(script.contains("window.dispatchEvent(new Event('initial-data-ready'))"));
    }

    #[test]
    fn test_bootstrap_script_rules() {
        assert_eq!(bootstrap_script(None, true, None), "");
        assert_eq!(bootstrap_script(Some("/assets/app.js"), false, None), "");
        assert_eq!(
            bootstrap_script(Some("/assets/app.js"), true, Some("n1")),
            "<script nonce=\"n1\" type=\"module\" src=\"/assets/app.js\" defer></script>"
        );
    }

    #[test]
    fn test_assemble_order() {
        let template = TemplateFragments::split(
            "<html><head><!--ssr-head--></head><body><div id=\"root\"><!--ssr-html--></div></body></html>",
        )
        .unwrap();
        let rendered = RenderedDocument {
            head: "<title>Ada</title>".into(),
            body: "<h1>Ada</h1>".into(),
        };
        let data = map(json!({ "name": "Ada" }));
        let html = assemble_document(
            &template,
            DocumentParts {
                rendered: &rendered,
                data: &data,
                head_links: "<link rel=\"stylesheet\" href=\"/assets/app.css\">",
                bootstrap_module: Some("/assets/app.js"),
                hydrate: true,
                nonce: None,
            },
        );
        assert_eq!(
            html,
            "<html><head><title>Ada</title><link rel=\"stylesheet\" href=\"/assets/app.css\"></head>\
             <body><div id=\"root\"><h1>Ada</h1>\
             <script>window.__INITIAL_DATA__ = {\"name\":\"Ada\"};</script>\
             <script type=\"module\" src=\"/assets/app.js\" defer></script></div></body></html>"
        );
    }
}
