// src/fetch/mod.rs
//! Content retrieval contract plus HTML-to-text normalization.
//!
//! The monitor only depends on [`ContentFetcher`]; transport details live in
//! [`http::HttpFetcher`]. `Ok("")` means the page was reachable but had no
//! text, `Err` means it could not be retrieved at all. Callers treat both as
//! "no content" for that URL.
//!
//! Bodies are decoded with the charset from `Content-Type`, falling back to a
//! `<meta>` declaration and then UTF-8; regional bulletins still serve
//! ISO-8859-1 with the charset only in the markup.

pub mod http;

use async_trait::async_trait;
use encoding_rs::{Encoding, UTF_8};
use once_cell::sync::Lazy;
use regex::bytes::Regex as BytesRegex;
use regex::Regex;
use scraper::{ElementRef, Html};

use crate::error::FetchError;

pub use http::HttpFetcher;

#[async_trait]
pub trait ContentFetcher: Send + Sync {
    /// Fetch `url` and return its normalized visible text.
    async fn fetch_text(&self, url: &str, verify_tls: bool) -> Result<String, FetchError>;

    /// Fetch `url` and return the decoded markup untouched.
    async fn fetch_raw(&self, url: &str, verify_tls: bool) -> Result<String, FetchError>;

    /// Existence probe: HTTP 200 and the body does not contain `not_found_marker`.
    async fn page_exists(&self, url: &str, not_found_marker: &str, verify_tls: bool) -> bool;
}

/// Bytes scanned for a `<meta>` charset declaration.
const META_SNIFF_LEN: usize = 4096;

static META_CHARSET: Lazy<BytesRegex> = Lazy::new(|| {
    BytesRegex::new(r#"(?i-u)<meta[^>]*?charset\s*=\s*["']?\s*([a-z0-9_:.\-]+)"#)
        .expect("valid meta charset pattern")
});

/// Decode a response body. A byte-order mark overrides any declaration.
pub fn decode_body(bytes: &[u8], content_type: Option<&str>) -> String {
    let encoding = content_type
        .and_then(header_charset)
        .and_then(|label| Encoding::for_label(label.as_bytes()))
        .or_else(|| meta_charset(bytes).and_then(Encoding::for_label))
        .unwrap_or(UTF_8);
    let (text, _, _) = encoding.decode(bytes);
    text.into_owned()
}

fn header_charset(content_type: &str) -> Option<&str> {
    content_type.split(';').skip(1).find_map(|param| {
        let (key, value) = param.split_once('=')?;
        key.trim()
            .eq_ignore_ascii_case("charset")
            .then(|| value.trim().trim_matches('"'))
    })
}

fn meta_charset(bytes: &[u8]) -> Option<&[u8]> {
    let head = &bytes[..bytes.len().min(META_SNIFF_LEN)];
    Some(META_CHARSET.captures(head)?.get(1)?.as_bytes())
}

/// Subtrees that never carry readable content.
const SKIPPED_ELEMENTS: &[&str] = &["script", "style", "noscript", "meta", "link", "template"];

/// Extract visible text from an HTML document, one text node per line.
pub fn html_to_text(html: &str) -> String {
    let doc = Html::parse_document(html);
    let mut pieces = Vec::new();
    collect_text(doc.root_element(), &mut pieces);
    collapse_blank_lines(&pieces.join("\n"))
}

fn collect_text(el: ElementRef<'_>, out: &mut Vec<String>) {
    if SKIPPED_ELEMENTS.contains(&el.value().name()) {
        return;
    }
    for child in el.children() {
        if let Some(child_el) = ElementRef::wrap(child) {
            collect_text(child_el, out);
        } else if let Some(text) = child.value().as_text() {
            let t = text.trim();
            if !t.is_empty() {
                out.push(t.to_string());
            }
        }
    }
}

/// Trim every line and drop the blank ones.
pub fn collapse_blank_lines(s: &str) -> String {
    s.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Read the first capture group of `pattern` in `raw` as a page count.
pub fn extract_page_count(raw: &str, pattern: &str) -> Option<u32> {
    let re = Regex::new(pattern).ok()?;
    re.captures(raw)?.get(1)?.as_str().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scripts_and_styles_are_dropped() {
        let html = r#"<html><head><title>Empleo</title><style>p{color:red}</style>
            <script>var x = "hidden";</script></head>
            <body><h1> Ofertas </h1>
            <p>Convocatoria &amp; bases 2026</p>
            <div>

            <span>Plazo abierto</span></div></body></html>"#;
        let text = html_to_text(html);
        assert_eq!(text, "Empleo\nOfertas\nConvocatoria & bases 2026\nPlazo abierto");
        assert!(!text.contains("hidden"));
        assert!(!text.contains("color"));
    }

    #[test]
    fn latin1_declared_in_meta_is_decoded() {
        let mut body = b"<html><head><meta charset=\"iso-8859-1\"></head><body>Tabl".to_vec();
        body.extend_from_slice(b"\xF3n de anuncios</body></html>");
        let html = decode_body(&body, Some("text/html"));
        assert_eq!(html_to_text(&html), "Tablón de anuncios");
    }

    #[test]
    fn http_equiv_declaration_is_honoured() {
        let body = b"<meta http-equiv=\"Content-Type\" content=\"text/html; charset=ISO-8859-1\"><p>Se\xF1al</p>";
        assert_eq!(html_to_text(&decode_body(body, None)), "Señal");
    }

    #[test]
    fn header_charset_wins_over_meta() {
        let body = "<meta charset=\"iso-8859-1\"><p>Tablón</p>".as_bytes();
        let html = decode_body(body, Some("text/html; charset=UTF-8"));
        assert_eq!(html_to_text(&html), "Tablón");
    }

    #[test]
    fn undeclared_body_is_utf8() {
        let body = "<p>Convocatoria pública</p>".as_bytes();
        assert_eq!(html_to_text(&decode_body(body, Some("text/html"))), "Convocatoria pública");
        assert_eq!(header_charset("text/html; charset=\"windows-1252\""), Some("windows-1252"));
        assert_eq!(header_charset("text/html"), None);
    }

    #[test]
    fn blank_lines_collapse() {
        assert_eq!(collapse_blank_lines("  a \n\n   \n b\n"), "a\nb");
    }

    #[test]
    fn page_count_token_is_parsed() {
        let raw = "paginator({ current:1, pages:7, size:20 })";
        assert_eq!(extract_page_count(raw, r"pages:(\d+)"), Some(7));
        assert_eq!(extract_page_count("no token here", r"pages:(\d+)"), None);
        assert_eq!(extract_page_count("total=12", r"total=(\d+)"), Some(12));
    }
}
