use sha2::{Digest, Sha256};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Maximum length of the title part of a slug.
pub const MAX_SLUG_LEN: usize = 100;

/// Hex characters of the tweet-id digest appended to every slug.
const SUFFIX_LEN: usize = 6;

/// URL-safe slug for a title: lowercase ASCII letters, digits, single hyphens.
///
/// Accents are folded (`é` → `e`), whitespace and underscores become hyphens,
/// everything else is dropped. Empty when nothing survives.
pub fn slugify(title: &str) -> String {
    let folded: String = title
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase();

    let mut slug = String::with_capacity(folded.len());
    let mut pending_hyphen = false;

    for c in folded.chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c);
        } else if c == '-' || c == '_' || c.is_whitespace() {
            pending_hyphen = true;
        }
    }

    // ASCII only from here, so byte truncation is safe.
    slug.truncate(MAX_SLUG_LEN);
    slug.trim_end_matches('-').to_string()
}

/// Deterministic short suffix for a tweet id: first hex chars of its SHA-256.
pub fn slug_suffix(tweet_id: &str) -> String {
    Sha256::digest(tweet_id.as_bytes())
        .iter()
        .take(SUFFIX_LEN / 2)
        .map(|b| format!("{b:02x}"))
        .collect()
}

/// Full article slug: `{title-slug}--{suffix}`.
///
/// Titles that slugify to nothing (e.g. entirely CJK) fall back to
/// `article-{first 6 chars of the tweet id}`.
pub fn article_slug(title: &str, tweet_id: &str) -> String {
    let mut base = slugify(title);
    if base.is_empty() {
        let short: String = tweet_id
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .take(6)
            .collect();
        base = format!("article-{short}");
    }
    format!("{base}--{}", slug_suffix(tweet_id))
}
