use std::sync::LazyLock;

use regex::Regex;

static STATUS_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/status(?:es)?/(\d+)").unwrap());

/// Resolve a tweet id from a bare id or a status URL
/// (`https://x.com/user/status/123`, `twitter.com/.../statuses/123?s=20`).
pub fn parse_tweet_ref(input: &str) -> Option<String> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }
    if input.chars().all(|c| c.is_ascii_digit()) {
        return Some(input.to_string());
    }
    STATUS_URL
        .captures(input)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}
