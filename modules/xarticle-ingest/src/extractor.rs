// Body and media extraction for X Articles.
//
// Article bodies live in draft.js style blocks under `content_state`; older
// payloads put them under `content`. Text blocks become paragraphs and media
// becomes <img> tags, joined by blank lines.

use std::collections::HashSet;

use rapidapi_client::{ArticleResult, Block, MediaEntity, Tweet};
use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediaUrls {
    pub images: Vec<String>,
    pub videos: Vec<String>,
}

/// Render the article body. Falls back from `content_state` blocks to legacy
/// `content` blocks, then to `preview_text`, then `description`.
/// `None` when every source is empty.
pub fn full_article_content(article: &ArticleResult) -> Option<String> {
    if let Some(body) = render_blocks(article.content_state_blocks()) {
        debug!(chars = body.len(), "Extracted article body from content_state");
        return Some(body);
    }
    if let Some(body) = render_blocks(article.legacy_blocks()) {
        debug!(chars = body.len(), "Extracted article body from legacy content blocks");
        return Some(body);
    }
    non_blank(article.preview_text.as_deref()).or_else(|| non_blank(article.description.as_deref()))
}

fn render_blocks(blocks: &[Block]) -> Option<String> {
    let mut parts = Vec::new();

    for block in blocks {
        if let Some(text) = non_blank(block.text.as_deref()) {
            parts.push(text);
        }
        for url in block_media_urls(block) {
            parts.push(format!(
                r#"<img src="{}" alt="Article image" />"#,
                url.replace('"', "%22")
            ));
        }
    }

    if parts.is_empty() {
        None
    } else {
        Some(parts.join("\n\n"))
    }
}

/// Media URLs on a block, from `media` then `entities.media`, deduplicated.
fn block_media_urls(block: &Block) -> Vec<&str> {
    let mut urls: Vec<&str> = Vec::new();
    for media in block_media(block) {
        if let Some(url) = media.best_url() {
            if !urls.contains(&url) {
                urls.push(url);
            }
        }
    }
    urls
}

fn block_media(block: &Block) -> impl Iterator<Item = &MediaEntity> {
    let direct = block.media.as_deref().unwrap_or(&[]);
    let entity = block
        .entities
        .as_ref()
        .and_then(|e| e.media.as_deref())
        .unwrap_or(&[]);
    direct.iter().chain(entity.iter())
}

/// All image and video URLs across both block lists, first-seen order.
pub fn media_urls(article: &ArticleResult) -> MediaUrls {
    let mut out = MediaUrls::default();
    let mut seen = HashSet::new();

    let blocks = article
        .content_state_blocks()
        .iter()
        .chain(article.legacy_blocks().iter());

    for block in blocks {
        for media in block_media(block) {
            let Some(url) = media.best_url() else {
                continue;
            };
            if !seen.insert(url.to_string()) {
                continue;
            }
            let kind = media.kind.as_deref().unwrap_or("");
            if kind.contains("video") || kind.contains("gif") || url.contains("video") {
                out.videos.push(url.to_string());
            } else {
                out.images.push(url.to_string());
            }
        }

        let links = block
            .entities
            .as_ref()
            .and_then(|e| e.urls.as_deref())
            .unwrap_or(&[]);
        for link in links {
            let Some(url) = link.expanded_url.as_deref().or(link.url.as_deref()) else {
                continue;
            };
            if is_video_link(url) && seen.insert(url.to_string()) {
                out.videos.push(url.to_string());
            }
        }
    }

    out
}

fn is_video_link(url: &str) -> bool {
    url.contains("youtube.com")
        || url.contains("youtu.be")
        || url.contains("vimeo.com")
        || url.contains("video")
}

/// First photo attached to the tweet itself, preferring `extended_entities`.
pub fn first_tweet_photo(tweet: &Tweet) -> Option<&str> {
    let legacy = tweet.legacy.as_ref()?;
    [legacy.extended_entities.as_ref(), legacy.entities.as_ref()]
        .into_iter()
        .flatten()
        .filter_map(|e| e.media.as_deref())
        .flatten()
        .filter(|m| m.kind.as_deref().map_or(true, |k| k == "photo"))
        .find_map(MediaEntity::best_url)
}

pub(crate) fn non_blank(s: Option<&str>) -> Option<String> {
    s.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}
