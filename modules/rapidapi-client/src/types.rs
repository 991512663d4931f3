use std::collections::HashMap;

use serde::Deserialize;

// The twitter241 API mirrors X's internal GraphQL payloads. None of it is
// contractual, so every field is optional and decoding never requires more
// than the shape we actually read.

// --- Tweet ---

/// A single tweet result (`tweet_results.result`).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Tweet {
    #[serde(rename = "__typename")]
    pub typename: Option<String>,
    pub rest_id: Option<String>,
    pub core: Option<TweetCore>,
    pub legacy: Option<TweetLegacy>,
    pub views: Option<TweetViews>,
    pub article: Option<ArticleEnvelope>,
    pub article_results: Option<ArticleResults>,
    pub card: Option<Card>,
}

impl Tweet {
    /// Tweet id, preferring `legacy.id_str` over `rest_id`.
    pub fn id(&self) -> Option<&str> {
        present(self.legacy.as_ref().and_then(|l| l.id_str.as_deref()))
            .or_else(|| present(self.rest_id.as_deref()))
    }

    /// Tweet body, preferring `full_text`. Empty string when neither is present.
    pub fn text(&self) -> &str {
        let legacy = self.legacy.as_ref();
        present(legacy.and_then(|l| l.full_text.as_deref()))
            .or_else(|| present(legacy.and_then(|l| l.text.as_deref())))
            .unwrap_or("")
    }

    /// The attached X Article, from either of the two places upstream puts it.
    pub fn article_result(&self) -> Option<&ArticleResult> {
        self.article_results
            .as_ref()
            .and_then(|r| r.result.as_ref())
            .or_else(|| {
                self.article
                    .as_ref()
                    .and_then(|a| a.article_results.as_ref())
                    .and_then(|r| r.result.as_ref())
            })
    }

    pub fn user(&self) -> Option<&UserResult> {
        self.core
            .as_ref()
            .and_then(|c| c.user_results.as_ref())
            .and_then(|u| u.result.as_ref())
    }

    /// Author handle: user legacy, then user core (newer payloads), then the
    /// user embedded in the tweet legacy block.
    pub fn author_handle(&self) -> Option<&str> {
        let user = self.user();
        present(user.and_then(|u| u.legacy.as_ref()).and_then(|l| l.screen_name.as_deref()))
            .or_else(|| present(user.and_then(|u| u.core.as_ref()).and_then(|c| c.screen_name.as_deref())))
            .or_else(|| present(self.embedded_user().and_then(|u| u.screen_name.as_deref())))
    }

    pub fn author_name(&self) -> Option<&str> {
        let user = self.user();
        present(user.and_then(|u| u.legacy.as_ref()).and_then(|l| l.name.as_deref()))
            .or_else(|| present(user.and_then(|u| u.core.as_ref()).and_then(|c| c.name.as_deref())))
            .or_else(|| present(self.embedded_user().and_then(|u| u.name.as_deref())))
    }

    pub fn author_avatar(&self) -> Option<&str> {
        let user = self.user();
        present(user.and_then(|u| u.legacy.as_ref()).and_then(|l| l.profile_image_url_https.as_deref()))
            .or_else(|| present(user.and_then(|u| u.avatar.as_ref()).and_then(|a| a.image_url.as_deref())))
            .or_else(|| present(self.embedded_user().and_then(|u| u.profile_image_url_https.as_deref())))
    }

    pub fn created_at(&self) -> Option<&str> {
        self.legacy.as_ref().and_then(|l| l.created_at.as_deref())
    }

    fn embedded_user(&self) -> Option<&UserLegacy> {
        self.legacy.as_ref().and_then(|l| l.user.as_ref())
    }
}

/// Upstream sends `""` for missing strings as often as it omits the field.
fn present(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TweetCore {
    pub user_results: Option<UserResults>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserResults {
    pub result: Option<UserResult>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserResult {
    pub rest_id: Option<String>,
    pub legacy: Option<UserLegacy>,
    pub core: Option<UserCore>,
    pub avatar: Option<UserAvatar>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserLegacy {
    pub screen_name: Option<String>,
    pub name: Option<String>,
    pub profile_image_url_https: Option<String>,
}

/// Newer payloads moved name/handle out of `legacy` into `core`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserCore {
    pub screen_name: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserAvatar {
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TweetLegacy {
    pub id_str: Option<String>,
    pub full_text: Option<String>,
    pub text: Option<String>,
    /// Twitter date format: `Wed Oct 05 21:25:35 +0000 2022`.
    pub created_at: Option<String>,
    pub user: Option<UserLegacy>,
    pub reply_count: Option<Metric>,
    pub retweet_count: Option<Metric>,
    pub favorite_count: Option<Metric>,
    pub quote_count: Option<Metric>,
    pub bookmark_count: Option<Metric>,
    pub lang: Option<String>,
    pub entities: Option<Entities>,
    pub extended_entities: Option<Entities>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Entities {
    pub urls: Option<Vec<UrlEntity>>,
    pub media: Option<Vec<MediaEntity>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UrlEntity {
    pub url: Option<String>,
    pub expanded_url: Option<String>,
    pub display_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MediaEntity {
    pub media_url_https: Option<String>,
    pub media_url: Option<String>,
    pub url: Option<String>,
    pub expanded_url: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

impl MediaEntity {
    /// Best URL for the media item, in upstream's order of reliability.
    pub fn best_url(&self) -> Option<&str> {
        present(self.media_url_https.as_deref())
            .or_else(|| present(self.media_url.as_deref()))
            .or_else(|| present(self.url.as_deref()))
            .or_else(|| present(self.expanded_url.as_deref()))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TweetViews {
    pub count: Option<Metric>,
}

// --- Engagement counts ---

/// An engagement count. Upstream sends these as numbers, numeric strings,
/// or abbreviated display strings ("1.2K", "3,401").
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Metric {
    Count(i64),
    Float(f64),
    Text(String),
}

impl Metric {
    /// Parse into a count. Anything unparseable is 0.
    pub fn value(&self) -> i64 {
        match self {
            Metric::Count(n) => *n,
            Metric::Float(f) => f.floor() as i64,
            Metric::Text(s) => parse_abbreviated_count(s),
        }
    }
}

fn parse_abbreviated_count(raw: &str) -> i64 {
    let v = raw.trim().to_lowercase().replace(',', "");
    let (number, multiplier) = match v.chars().last() {
        Some('k') => (&v[..v.len() - 1], 1_000f64),
        Some('m') => (&v[..v.len() - 1], 1_000_000f64),
        Some('b') => (&v[..v.len() - 1], 1_000_000_000f64),
        _ => (v.as_str(), 1f64),
    };
    number
        .trim()
        .parse::<f64>()
        .map(|n| (n * multiplier).floor() as i64)
        .unwrap_or(0)
}

// --- X Articles ---

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ArticleEnvelope {
    pub article_results: Option<ArticleResults>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ArticleResults {
    pub result: Option<ArticleResult>,
}

/// Long-form X Article attached to a tweet.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ArticleResult {
    pub rest_id: Option<String>,
    pub title: Option<String>,
    pub preview_text: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,
    pub content_state: Option<ContentState>,
    /// Older payloads carry blocks here; some carry a plain string.
    pub content: Option<ArticleContent>,
    pub cover_media: Option<CoverMedia>,
    pub metadata: Option<ArticleMetadata>,
}

impl ArticleResult {
    pub fn content_state_blocks(&self) -> &[Block] {
        self.content_state
            .as_ref()
            .and_then(|c| c.blocks.as_deref())
            .unwrap_or(&[])
    }

    pub fn legacy_blocks(&self) -> &[Block] {
        match &self.content {
            Some(ArticleContent::Blocks(state)) => state.blocks.as_deref().unwrap_or(&[]),
            _ => &[],
        }
    }

    pub fn cover_image_url(&self) -> Option<&str> {
        self.cover_media
            .as_ref()
            .and_then(|c| c.media_info.as_ref())
            .and_then(|m| m.original_img_url.as_deref())
            .filter(|u| !u.is_empty())
    }

    pub fn first_published_at_secs(&self) -> Option<i64> {
        self.metadata.as_ref().and_then(|m| m.first_published_at_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ArticleContent {
    Blocks(ContentState),
    Text(String),
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContentState {
    pub blocks: Option<Vec<Block>>,
}

/// A draft.js style content block.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Block {
    pub text: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub media: Option<Vec<MediaEntity>>,
    pub entities: Option<Entities>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CoverMedia {
    pub media_info: Option<MediaInfo>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MediaInfo {
    pub original_img_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ArticleMetadata {
    pub first_published_at_secs: Option<i64>,
}

// --- Link cards ---

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Card {
    pub legacy: Option<CardLegacy>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CardLegacy {
    pub name: Option<String>,
    pub url: Option<String>,
    pub binding_values: Option<BindingValues>,
}

/// Card bindings arrive as a key/value list in GraphQL payloads and as a
/// map in the older REST shape.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum BindingValues {
    List(Vec<BindingValue>),
    Map(HashMap<String, BindingValueData>),
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BindingValue {
    pub key: Option<String>,
    pub value: Option<BindingValueData>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BindingValueData {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub string_value: Option<String>,
    pub image_value: Option<ImageValue>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ImageValue {
    pub url: Option<String>,
}

impl Card {
    /// Look up a binding's string (or image URL) by key. Blank values count as absent.
    pub fn binding(&self, key: &str) -> Option<&str> {
        let data = match self.legacy.as_ref()?.binding_values.as_ref()? {
            BindingValues::List(list) => list
                .iter()
                .find(|b| b.key.as_deref() == Some(key))
                .and_then(|b| b.value.as_ref()),
            BindingValues::Map(map) => map.get(key),
        }?;
        data.string_value
            .as_deref()
            .or_else(|| data.image_value.as_ref().and_then(|i| i.url.as_deref()))
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }
}
