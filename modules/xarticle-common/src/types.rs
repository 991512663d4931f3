use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::XarticleError;
use crate::slug::article_slug;

// --- Harvest ---

/// Which tier of the fallback chain supplied an article's body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentSource {
    /// A long-form X Article attached to the tweet.
    Article,
    /// A link card (title/description bindings).
    Card,
    /// Plain tweet text.
    Text,
}

impl ContentSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentSource::Article => "article",
            ContentSource::Card => "card",
            ContentSource::Text => "text",
        }
    }
}

impl fmt::Display for ContentSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleMetrics {
    pub views: i64,
    pub replies: i64,
    pub retweets: i64,
    pub likes: i64,
    pub bookmarks: i64,
}

/// An article extracted from one tweet, before it is assigned a row id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarvestedArticle {
    /// `https://x.com/{handle}/status/{tweet_id}`.
    pub article_url: String,
    pub title: String,
    pub excerpt: Option<String>,
    pub author_handle: String,
    pub author_name: String,
    pub author_avatar: Option<String>,
    pub tweet_id: String,
    pub rest_id: Option<String>,
    /// Link the article or card points at, if any.
    pub original_url: Option<String>,
    pub published_at: DateTime<Utc>,
    pub featured_image_url: Option<String>,
    pub full_article_content: String,
    pub tweet_text: String,
    pub article_images: Vec<String>,
    pub article_videos: Vec<String>,
    pub metrics: ArticleMetrics,
    pub content_source: ContentSource,
}

impl HarvestedArticle {
    /// Reject records that would violate table constraints or render badly.
    pub fn validate(&self) -> Result<(), XarticleError> {
        if self.title.trim().is_empty() {
            return Err(XarticleError::Validation(format!(
                "tweet {}: empty title",
                self.tweet_id
            )));
        }
        if self.full_article_content.trim().is_empty() {
            return Err(XarticleError::Validation(format!(
                "tweet {}: empty content",
                self.tweet_id
            )));
        }
        if self.author_handle.is_empty() || self.tweet_id.is_empty() {
            return Err(XarticleError::Validation(
                "missing author handle or tweet id".to_string(),
            ));
        }
        if url::Url::parse(&self.article_url).is_err() {
            return Err(XarticleError::Validation(format!(
                "tweet {}: invalid article url {:?}",
                self.tweet_id, self.article_url
            )));
        }
        if let Some(original) = &self.original_url {
            if url::Url::parse(original).is_err() {
                return Err(XarticleError::Validation(format!(
                    "tweet {}: invalid original url {original:?}",
                    self.tweet_id
                )));
            }
        }
        Ok(())
    }
}

// --- Persistence records ---

/// A row for the `articles` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleRecord {
    /// Used on insert only; an existing row keeps its id.
    pub id: Uuid,
    pub slug: String,
    pub title: String,
    pub excerpt: Option<String>,
    pub full_article_content: String,
    pub author_name: String,
    pub author_handle: String,
    pub author_avatar: Option<String>,
    pub image: Option<String>,
    pub tweet_id: String,
    pub tweet_text: String,
    pub tweet_views: i64,
    pub tweet_replies: i64,
    pub tweet_retweets: i64,
    pub tweet_likes: i64,
    pub tweet_bookmarks: i64,
    pub tweet_published_at: DateTime<Utc>,
    pub article_published_at: DateTime<Utc>,
    pub article_url: String,
    pub original_url: Option<String>,
    pub article_images: Vec<String>,
    pub article_videos: Vec<String>,
    pub content_source: ContentSource,
}

impl ArticleRecord {
    pub fn from_harvested(h: &HarvestedArticle) -> Self {
        Self {
            id: Uuid::new_v4(),
            slug: article_slug(&h.title, &h.tweet_id),
            title: h.title.clone(),
            excerpt: h.excerpt.clone(),
            full_article_content: h.full_article_content.clone(),
            author_name: h.author_name.clone(),
            author_handle: h.author_handle.clone(),
            author_avatar: h.author_avatar.clone(),
            image: h.featured_image_url.clone(),
            tweet_id: h.tweet_id.clone(),
            tweet_text: h.tweet_text.clone(),
            tweet_views: h.metrics.views,
            tweet_replies: h.metrics.replies,
            tweet_retweets: h.metrics.retweets,
            tweet_likes: h.metrics.likes,
            tweet_bookmarks: h.metrics.bookmarks,
            tweet_published_at: h.published_at,
            article_published_at: h.published_at,
            article_url: h.article_url.clone(),
            original_url: h.original_url.clone(),
            article_images: h.article_images.clone(),
            article_videos: h.article_videos.clone(),
            content_source: h.content_source,
        }
    }
}

/// A row for the `tweets` table. Every tweet seen is recorded, article or not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TweetRecord {
    pub tweet_id: String,
    pub author_handle: String,
    pub has_article: bool,
    pub list_id: Option<String>,
}

/// Whether an upsert created or refreshed a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}

/// A curated X list that the ingester scans.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TwitterList {
    pub list_id: String,
    pub name: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub last_scanned_at: Option<DateTime<Utc>>,
    pub articles_found: i32,
}
