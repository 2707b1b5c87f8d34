//! Charset detection for fetched article pages.
//!
//! News sites still serve legacy encodings (GBK, Big5, Shift_JIS), often
//! without a charset in `Content-Type`. The encoding is chosen from, in order:
//! a byte-order mark, the `Content-Type` charset, a `<meta>` charset near the
//! top of the document, and finally `chardetng` detection.

use chardetng::EncodingDetector;
use encoding_rs::{Encoding, UTF_8};
use once_cell::sync::Lazy;
use regex::Regex;

/// How far into the document to look for a `<meta>` charset.
const META_SNIFF_BYTES: usize = 2048;

static META_CHARSET: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)<meta[^>]+charset\s*=\s*["']?\s*([a-z0-9_:.\-]+)"#).unwrap()
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedBody {
    pub text: String,
    pub encoding: &'static Encoding,
    /// Malformed sequences were replaced with U+FFFD.
    pub had_errors: bool,
}

/// Decode a response body to UTF-8.
pub fn decode_body(bytes: &[u8], content_type: Option<&str>) -> DecodedBody {
    let encoding = Encoding::for_bom(bytes)
        .map(|(encoding, _)| encoding)
        .or_else(|| content_type.and_then(header_charset))
        .or_else(|| meta_charset(bytes))
        .unwrap_or_else(|| detect(bytes));

    let (text, encoding, had_errors) = encoding.decode(bytes);
    DecodedBody {
        text: text.into_owned(),
        encoding,
        had_errors,
    }
}

fn header_charset(content_type: &str) -> Option<&'static Encoding> {
    content_type.split(';').skip(1).find_map(|param| {
        let (name, value) = param.split_once('=')?;
        if !name.trim().eq_ignore_ascii_case("charset") {
            return None;
        }
        Encoding::for_label(value.trim().trim_matches(['"', '\'']).as_bytes())
    })
}

fn meta_charset(bytes: &[u8]) -> Option<&'static Encoding> {
    let head = String::from_utf8_lossy(&bytes[..bytes.len().min(META_SNIFF_BYTES)]);
    let label = META_CHARSET.captures(&head)?.get(1)?.as_str();
    let encoding = Encoding::for_label(label.as_bytes())?;
    // A UTF-16 declaration inside an ASCII-compatible document is a lie.
    if encoding == encoding_rs::UTF_16LE || encoding == encoding_rs::UTF_16BE {
        Some(UTF_8)
    } else {
        Some(encoding)
    }
}

fn detect(bytes: &[u8]) -> &'static Encoding {
    let mut detector = EncodingDetector::new();
    detector.feed(bytes, true);
    detector.guess(None, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use encoding_rs::{GBK, SHIFT_JIS};

    fn gbk(text: &str) -> Vec<u8> {
        GBK.encode(text).0.into_owned()
    }

    #[test]
    fn test_utf8_with_header_charset() {
        let body = "<title>新闻</title>".as_bytes();
        let decoded = decode_body(body, Some("text/html; charset=utf-8"));
        assert_eq!(decoded.text, "<title>新闻</title>");
        assert_eq!(decoded.encoding, UTF_8);
        assert!(!decoded.had_errors);
    }

    #[test]
    fn test_header_charset_is_case_and_quote_insensitive() {
        let body = gbk("<title>新闻</title>");
        let decoded = decode_body(&body, Some(r#"text/html; Charset="GBK""#));
        assert_eq!(decoded.text, "<title>新闻</title>");
    }

    #[test]
    fn test_meta_charset_without_header_charset() {
        let mut body = b"<html><head><meta charset=\"gbk\"><title>".to_vec();
        body.extend(gbk("新闻"));
        body.extend(b"</title></head></html>");

        let decoded = decode_body(&body, Some("text/html"));
        assert!(decoded.text.contains("<title>新闻</title>"), "{}", decoded.text);
        assert_eq!(decoded.encoding, GBK);
    }

    #[test]
    fn test_http_equiv_meta_charset() {
        let mut body =
            br#"<meta http-equiv="Content-Type" content="text/html; charset=shift_jis"><p>"#.to_vec();
        body.extend(SHIFT_JIS.encode("ニュース").0.iter());

        let decoded = decode_body(&body, None);
        assert!(decoded.text.ends_with("<p>ニュース"));
    }

    #[test]
    fn test_header_charset_beats_meta() {
        let body = "<meta charset=\"gbk\"><p>新闻</p>".as_bytes();
        let decoded = decode_body(body, Some("text/html; charset=utf-8"));
        assert_eq!(decoded.text, "<meta charset=\"gbk\"><p>新闻</p>");
    }

    #[test]
    fn test_bom_beats_everything() {
        let mut body = vec![0xEF, 0xBB, 0xBF];
        body.extend("<p>新闻</p>".as_bytes());
        let decoded = decode_body(&body, Some("text/html; charset=gbk"));
        assert_eq!(decoded.encoding, UTF_8);
        assert_eq!(decoded.text, "<p>新闻</p>");
    }

    #[test]
    fn test_detects_undeclared_gbk() {
        let text = "北京时间今天上午，国务院新闻办公室举行新闻发布会，介绍今年前三季度国民经济运行情况。".repeat(4);
        let body = gbk(&format!("<html><body><p>{text}</p></body></html>"));

        let decoded = decode_body(&body, Some("text/html"));
        assert!(decoded.text.contains("国务院新闻办公室"));
        assert!(!decoded.had_errors);
    }

    #[test]
    fn test_unknown_header_label_falls_through() {
        let decoded = decode_body(b"<p>plain ascii</p>", Some("text/html; charset=bogus-9"));
        assert_eq!(decoded.text, "<p>plain ascii</p>");
    }
}
