//! Utility functions

use url::Url;

/// Keep at most `max_chars` characters, never splitting a character.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

/// Short single-line excerpt for log output.
pub fn excerpt(text: &str, max_chars: usize) -> String {
    let flat: String = text
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();
    if flat.chars().count() > max_chars {
        format!("{}…", truncate_chars(&flat, max_chars))
    } else {
        flat
    }
}

/// URL without query string, fragment or userinfo, safe to log.
pub fn redact_url(raw: &str) -> String {
    match Url::parse(raw) {
        Ok(mut url) => {
            url.set_query(None);
            url.set_fragment(None);
            let _ = url.set_username("");
            let _ = url.set_password(None);
            url.to_string()
        }
        Err(_) => "<invalid url>".to_string(),
    }
}

/// True for `application/json` and `+json` media types.
pub fn is_json_content_type(content_type: &str) -> bool {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();
    essence == "application/json" || (essence.starts_with("application/") && essence.ends_with("+json"))
}

/// Absolute http(s) URL check for administrator-supplied webhook URLs.
pub fn is_http_url(raw: &str) -> bool {
    Url::parse(raw.trim())
        .map(|url| matches!(url.scheme(), "http" | "https") && url.host().is_some())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("hello", 10), "hello");
        assert_eq!(truncate_chars("hello", 2), "he");
        assert_eq!(truncate_chars("ñandú", 3), "ñan");
        assert_eq!(truncate_chars(&"x".repeat(2000), 500).len(), 500);
    }

    #[test]
    fn test_excerpt() {
        assert_eq!(excerpt("line\nbreak", 20), "line break");
        assert_eq!(excerpt("abcdef", 3), "abc…");
    }

    #[test]
    fn test_redact_url() {
        assert_eq!(
            redact_url("https://user:pw@x.test/webhook/abc?key=secret#frag"),
            "https://x.test/webhook/abc"
        );
        assert_eq!(redact_url("nope"), "<invalid url>");
    }

    #[test]
    fn test_is_json_content_type() {
        assert!(is_json_content_type("application/json"));
        assert!(is_json_content_type("Application/JSON; charset=utf-8"));
        assert!(is_json_content_type("application/problem+json"));
        assert!(!is_json_content_type("text/plain"));
        assert!(!is_json_content_type("text/json+html"));
    }

    #[test]
    fn test_is_http_url() {
        assert!(is_http_url("https://hooks.example.com/webhook/abc"));
        assert!(is_http_url("http://localhost:8001/webhook/chat"));
        assert!(!is_http_url("ftp://example.com/file"));
        assert!(!is_http_url("/webhook/abc"));
        assert!(!is_http_url(""));
    }
}
