//! Cleanup of completion output into a standalone HTML document

use crate::error::Result;
use askama::Template;
use once_cell::sync::Lazy;
use regex::Regex;

static HTML_FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"```html\n?").expect("valid fence pattern"));
static BARE_FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"```\n?").expect("valid fence pattern"));
static HTML_START: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<html[\s>]").expect("valid html pattern"));

pub const DEFAULT_TITLE: &str = "文档";
pub const FOOTER_TEXT: &str = "由快速排版系统生成";

/// Fallback wrapper for completions that returned a fragment.
#[derive(Template)]
#[template(source = r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>排版结果 - {{ title }}</title>
    <style>
        body { font-family: 'Segoe UI', Tahoma, Geneva, Verdana, sans-serif; line-height: 1.6; color: #333; max-width: 800px; margin: 0 auto; padding: 20px; }
        h1 { color: #2c3e50; border-bottom: 2px solid #3498db; padding-bottom: 10px; }
        h2 { color: #34495e; margin-top: 30px; }
        p { margin-bottom: 15px; }
        ul, ol { margin-left: 20px; margin-bottom: 20px; }
        .header { background: #f8f9fa; padding: 20px; border-radius: 5px; margin-bottom: 30px; }
        .footer { margin-top: 40px; padding-top: 20px; border-top: 1px solid #eee; color: #7f8c8d; font-size: 0.9em; }
    </style>
</head>
<body>
    <div class="header">
        <h1>排版结果</h1>
        <p>生成时间: {{ generated_at|safe }}</p>
    </div>
    {{ body|safe }}
    <div class="footer">
        <p>由快速排版系统生成</p>
    </div>
</body>
</html>"#, ext = "html")]
struct FallbackDocument<'a> {
    title: &'a str,
    generated_at: &'a str,
    body: &'a str,
}

/// Remove markdown code fences and surrounding whitespace.
pub fn strip_fences(raw: &str) -> String {
    let without_lang = HTML_FENCE.replace_all(raw, "");
    BARE_FENCE.replace_all(&without_lang, "").trim().to_string()
}

/// Whether `html` already carries an `<html>` document start tag.
pub fn has_document_wrapper(html: &str) -> bool {
    HTML_START.is_match(html)
}

/// Strip fences and, for fragments, wrap in the fallback document stamped
/// with the current local time.
pub fn normalize(raw: &str, title: Option<&str>) -> Result<String> {
    let generated_at = chrono::Local::now().format("%Y/%-m/%-d %H:%M:%S").to_string();
    normalize_at(raw, title, &generated_at)
}

pub fn normalize_at(raw: &str, title: Option<&str>, generated_at: &str) -> Result<String> {
    let cleaned = strip_fences(raw);
    if has_document_wrapper(&cleaned) {
        return Ok(cleaned);
    }

    let title = title.filter(|t| !t.trim().is_empty()).unwrap_or(DEFAULT_TITLE);
    let document = FallbackDocument {
        title,
        generated_at,
        body: &cleaned,
    };
    Ok(document.render()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    const STAMP: &str = "2026/10/16 09:30:00";

    #[test]
    fn test_strip_fences() {
        assert_eq!(strip_fences("```html\n<p>x</p>\n```"), "<p>x</p>");
        assert_eq!(strip_fences("  ```\n<p>y</p>```  \n"), "<p>y</p>");
        assert_eq!(strip_fences("<p>plain</p>"), "<p>plain</p>");
    }

    #[test]
    fn test_full_document_is_not_rewrapped() {
        let raw = "```html\n<!DOCTYPE html>\n<html>\n<body><p>Hi</p></body>\n</html>\n```\n";
        let out = normalize_at(raw, Some("a.txt"), STAMP).unwrap();
        assert_eq!(out, "<!DOCTYPE html>\n<html>\n<body><p>Hi</p></body>\n</html>");
    }

    #[test]
    fn test_html_tag_with_attributes_counts_as_document() {
        let raw = "<!DOCTYPE html><HTML lang=\"zh-CN\"><body>x</body></HTML>";
        assert_eq!(normalize_at(raw, None, STAMP).unwrap(), raw);
        assert!(!has_document_wrapper("<p>talks about <htmlish> things</p>"));
    }

    #[test]
    fn test_fragment_is_wrapped_once_with_content_verbatim() {
        let fragment = "<h2>第一节</h2>\n<p>a &amp; b <em>c</em></p>";
        let out = normalize_at(fragment, Some("notes.txt"), STAMP).unwrap();

        assert!(out.starts_with("<!DOCTYPE html>"));
        assert_eq!(out.matches("<div class=\"header\">").count(), 1);
        assert_eq!(out.matches(FOOTER_TEXT).count(), 1);
        assert!(out.contains(fragment));
        assert!(out.contains("<title>排版结果 - notes.txt</title>"));
        assert!(out.contains(&format!("生成时间: {}", STAMP)));

        let header = out.find("class=\"header\"").unwrap();
        let body = out.find(fragment).unwrap();
        let footer = out.find("class=\"footer\"").unwrap();
        assert!(header < body && body < footer);
    }

    #[test]
    fn test_title_defaults_and_is_escaped() {
        let out = normalize_at("<p>x</p>", None, STAMP).unwrap();
        assert!(out.contains("<title>排版结果 - 文档</title>"));

        let out = normalize_at("<p>x</p>", Some("<b>.txt"), STAMP).unwrap();
        assert!(out.contains("&#60;b&#62;.txt"));
        assert!(!out.contains("<b>"));
    }

    #[test]
    fn test_normalization_is_idempotent() {
        let once = normalize_at("<p>hello</p>", Some("n.txt"), STAMP).unwrap();
        let twice = normalize_at(&once, Some("n.txt"), "2030/1/1 00:00:00").unwrap();
        assert_eq!(once, twice);
    }
}
