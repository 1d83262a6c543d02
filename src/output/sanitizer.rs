//! Removal of active content from generated HTML before it is served or converted

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

const ACTIVE_TAGS: [&str; 4] = ["script", "iframe", "object", "noscript"];
const SCRIPT_SCHEMES: [&str; 2] = ["javascript:", "vbscript:"];
const URL_ATTRIBUTES: [&str; 5] = ["href", "src", "action", "formaction", "xlink:href"];
/// Each pass removes at least one construct, so this only bounds hostile input.
const MAX_PASSES: usize = 32;

static ACTIVE_ELEMENTS: Lazy<Vec<Regex>> = Lazy::new(|| {
    ACTIVE_TAGS
        .iter()
        .map(|tag| {
            Regex::new(&format!(r"(?is)<{tag}\b[^>]*?(?:/>|>.*?</{tag}\s*>)"))
                .expect("valid element pattern")
        })
        .collect()
});
// Unclosed or stray open/close tags left behind by the element pass.
static ACTIVE_TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)</?(?:script|iframe|object|noscript|embed)\b[^>]*>").expect("valid tag pattern")
});
static OPEN_TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"<[a-zA-Z](?:[^>"']|"[^"]*"|'[^']*')*>"#).expect("valid tag pattern")
});
// One attribute with its leading separator. Quoted values are consumed
// whole so their contents are never mistaken for attributes.
static ATTRIBUTE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"([\s/]+)([^\s"'>/=]+)(?:(\s*=\s*)("[^"]*"|'[^']*'|[^\s>]*))?"#).expect("valid attribute pattern")
});
static CHAR_REF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)&#(?:x([0-9a-f]+)|([0-9]+));?").expect("valid entity pattern")
});

/// Strip scripts, embedded frames/objects, inline event handlers and
/// `javascript:` URLs. Everything else is returned byte-for-byte.
///
/// Passes repeat until the markup is stable, so removing one construct
/// cannot splice together another.
pub fn sanitize(html: &str) -> String {
    let mut out = html.to_string();
    for _ in 0..MAX_PASSES {
        let next = sanitize_pass(&out);
        if next == out {
            return out;
        }
        out = next;
    }
    // Still changing: drop every tag-like sequence rather than return
    // something half cleaned.
    OPEN_TAG.replace_all(&ACTIVE_TAG.replace_all(&out, ""), "").into_owned()
}

fn sanitize_pass(html: &str) -> String {
    let mut out = html.to_string();
    for pattern in ACTIVE_ELEMENTS.iter() {
        out = pattern.replace_all(&out, "").into_owned();
    }
    out = ACTIVE_TAG.replace_all(&out, "").into_owned();

    OPEN_TAG
        .replace_all(&out, |tag: &Captures| ATTRIBUTE.replace_all(&tag[0], clean_attribute).into_owned())
        .into_owned()
}

fn clean_attribute(attr: &Captures) -> String {
    let name = attr[2].to_ascii_lowercase();
    if name.starts_with("on") {
        return String::new();
    }

    match (attr.get(3), attr.get(4)) {
        (Some(eq), Some(value)) if URL_ATTRIBUTES.contains(&name.as_str()) && is_script_url(value.as_str()) => {
            format!("{}{}{}\"#\"", &attr[1], &attr[2], eq.as_str())
        }
        _ => attr[0].to_string(),
    }
}

/// Decodes numeric character references and drops whitespace and control
/// characters before checking the scheme.
fn is_script_url(value: &str) -> bool {
    let value = value.trim_matches(|c| c == '"' || c == '\'');
    let decoded = CHAR_REF.replace_all(value, |caps: &Captures| {
        let code = match (caps.get(1), caps.get(2)) {
            (Some(hex), _) => u32::from_str_radix(hex.as_str(), 16).ok(),
            (None, Some(dec)) => dec.as_str().parse::<u32>().ok(),
            _ => None,
        };
        code.and_then(char::from_u32).map(String::from).unwrap_or_default()
    });
    let scheme: String = decoded
        .replace("&colon;", ":")
        .chars()
        .filter(|c| !c.is_whitespace() && !c.is_control())
        .flat_map(char::to_lowercase)
        .collect();

    SCRIPT_SCHEMES.iter().any(|prefix| scheme.starts_with(prefix))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_blocks_removed() {
        let html = "<p>a</p><script type=\"text/javascript\">alert('x<y')</script><p>b</p>";
        assert_eq!(sanitize(html), "<p>a</p><p>b</p>");

        let html = "<SCRIPT src=\"x.js\"/><p>c</p>";
        assert_eq!(sanitize(html), "<p>c</p>");
    }

    #[test]
    fn test_event_handlers_and_script_urls_removed() {
        let html = r##"<button onclick="steal()" class="btn">Go</button><a href="javascript:alert(1)">x</a>"##;
        assert_eq!(
            sanitize(html),
            r##"<button class="btn">Go</button><a href="#">x</a>"##
        );
    }

    #[test]
    fn test_nested_fragments_cannot_rebuild_a_script() {
        assert_eq!(sanitize("<scr<script></script>ipt>alert(1)</script>"), "alert(1)");
        assert!(!sanitize("<p>x</p><script>alert(1)").to_lowercase().contains("<script"));
    }

    #[test]
    fn test_slash_separated_handlers_removed() {
        assert_eq!(sanitize("<img/onerror=alert(1) src=x>"), "<img src=x>");
        assert_eq!(sanitize(r#"<img alt=">" onerror="x()">"#), r#"<img alt=">">"#);
    }

    #[test]
    fn test_encoded_script_urls_removed() {
        let html = r#"<a href="jav&#x61;script&#58;alert(1)">x</a><a href=" JAVA SCRIPT:alert(1)">y</a>"#;
        assert_eq!(sanitize(html), r##"<a href="#">x</a><a href="#">y</a>"##);

        let html = r#"<a href="https://example.com/javascript:guide">ok</a>"#;
        assert_eq!(sanitize(html), html);
    }

    #[test]
    fn test_frames_and_embeds_removed() {
        let html = "<div><iframe src=\"https://evil\"></iframe><embed src=\"a.swf\"><object data=\"b\"></object>ok</div>";
        assert_eq!(sanitize(html), "<div>ok</div>");
    }

    #[test]
    fn test_plain_markup_untouched() {
        let html = "<!DOCTYPE html>\n<html>\n<head><style>p { color: red; }</style></head>\n<body><p>online only</p></body>\n</html>";
        assert_eq!(sanitize(html), html);
    }
}
