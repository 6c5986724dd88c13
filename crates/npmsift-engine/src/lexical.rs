//! Lexical statistics over raw script text: character entropy plus URL and
//! IPv4-looking literal counts.

use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::LazyLock;

static URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"https?://(?:[-\w.]|(?:%[\da-fA-F]{2}))+").expect("url regex")
});

static IP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:\d{1,3}\.){3}\d{1,3}\b").expect("ip regex"));

/// Shannon entropy (bits) of the character distribution of `text`.
///
/// Returns 0.0 for empty text. Bounded above by log2 of the number of
/// distinct characters:
/// - < 4.0: ordinary prose or sparse code
/// - 4.0-5.5: typical source code
/// - > 5.5: minified, encoded or obfuscated blobs
pub fn shannon_entropy(text: &str) -> f64 {
    let mut freq: HashMap<char, usize> = HashMap::new();
    let mut len = 0usize;
    for c in text.chars() {
        *freq.entry(c).or_insert(0) += 1;
        len += 1;
    }
    if len == 0 {
        return 0.0;
    }

    let len = len as f64;
    let mut entropy = 0.0;
    for count in freq.values() {
        let p = *count as f64 / len;
        entropy -= p * p.log2();
    }
    entropy.max(0.0)
}

pub fn count_urls(text: &str) -> usize {
    URL_RE.find_iter(text).count()
}

/// Dotted quads, without range checking the octets.
pub fn count_ips(text: &str) -> usize {
    IP_RE.find_iter(text).count()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct LexicalStats {
    pub entropy: f64,
    /// Unicode scalar values, not bytes
    pub chars: usize,
    pub urls: usize,
    pub ips: usize,
}

pub fn scan_text(text: &str) -> LexicalStats {
    LexicalStats {
        entropy: shannon_entropy(text),
        chars: text.chars().count(),
        urls: count_urls(text),
        ips: count_ips(text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_entropy_empty_and_uniform() {
        assert_eq!(shannon_entropy(""), 0.0);
        assert_eq!(shannon_entropy("aaaaaaaa"), 0.0);
        assert!(close(shannon_entropy("ab"), 1.0));
        assert!(close(shannon_entropy("abcd"), 2.0));
        assert!(close(shannon_entropy("abcdabcdabcd"), 2.0));
    }

    #[test]
    fn test_entropy_bounded_by_distinct_chars() {
        let samples = [
            "var x = require('fs');",
            "eval(atob('ZXZhbCgiYWxlcnQoMSkiKQ=='))",
            "\u{00e9}\u{4e2d}\u{1f600}abc",
            "\n\n\t ",
        ];
        for s in samples {
            let distinct = s.chars().collect::<std::collections::HashSet<_>>().len();
            let h = shannon_entropy(s);
            assert!(h >= 0.0, "{s:?}");
            assert!(h <= (distinct as f64).log2() + 1e-9, "{s:?}");
        }
    }

    #[test]
    fn test_entropy_counts_characters_not_bytes() {
        // two distinct multi-byte chars, equally frequent
        assert!(close(shannon_entropy("\u{4e2d}\u{6587}"), 1.0));
    }

    #[test]
    fn test_url_count() {
        let text = r#"fetch("https://evil.example.com/x"); get('http://10.0.0.1:80/'); "ftp://no""#;
        assert_eq!(count_urls(text), 2);
        assert_eq!(count_urls("https://a%2Fb.c"), 1);
        assert_eq!(count_urls("no links here"), 0);
    }

    #[test]
    fn test_ip_count() {
        assert_eq!(count_ips("connect('192.168.1.10', 4444)"), 1);
        assert_eq!(count_ips("1.2.3.4 and 999.999.999.999"), 2);
        assert_eq!(count_ips("version 1.2.3"), 0);
    }

    #[test]
    fn test_scan_text() {
        let stats = scan_text("http://1.2.3.4/");
        assert_eq!(stats.chars, 15);
        assert_eq!(stats.urls, 1);
        assert_eq!(stats.ips, 1);
        assert!(stats.entropy > 0.0);
    }
}
