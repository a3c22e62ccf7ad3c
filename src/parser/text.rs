//! Plain text extraction from MDF 4 XML metadata (`##MD` blocks)

use regex::Regex;
use std::sync::OnceLock;

fn tx_element() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<TX>(.*?)</TX>").expect("static regex"))
}

fn unescape(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Human-readable text of a comment: the `<TX>` element of XML metadata,
/// or the text itself when it is not XML
pub fn comment_text(raw: &str) -> String {
    let trimmed = raw.trim();
    if !trimmed.starts_with('<') {
        return trimmed.to_string();
    }
    tx_element()
        .captures(trimmed)
        .and_then(|caps| caps.get(1))
        .map(|m| unescape(m.as_str().trim()))
        .unwrap_or_default()
}

/// Value of a `<e name="...">` common property in XML metadata
pub fn md_property(raw: &str, name: &str) -> Option<String> {
    let pattern = format!(r#"(?s)<e name="{}"[^>]*>(.*?)</e>"#, regex::escape(name));
    let re = Regex::new(&pattern).ok()?;
    re.captures(raw)
        .and_then(|caps| caps.get(1))
        .map(|m| unescape(m.as_str().trim()))
        .filter(|v| !v.is_empty())
}
