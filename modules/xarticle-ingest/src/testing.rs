// Test mocks for the ingestion pipeline.
//
// One mock per trait boundary:
// - MockTweetSource (TweetSource): HashMap-based list/tweet fixtures
// - MockArticleSink (ArticleSink): stateful in-memory tables
// - MockUrlExpander (UrlExpander): fixed short→long mapping
//
// Plus builders for tweet payloads in the shapes upstream sends.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use rapidapi_client::Tweet;
use serde_json::json;
use uuid::Uuid;
use xarticle_common::{ArticleRecord, TweetRecord, UpsertOutcome};

use crate::short_url::is_short_url;
use crate::store::ShortUrlRow;
use crate::traits::{ArticleSink, TweetSource, UrlExpander};

// ---------------------------------------------------------------------------
// Tweet builders
// ---------------------------------------------------------------------------

fn base_tweet(id: &str, handle: &str, text: &str) -> serde_json::Value {
    json!({
        "__typename": "Tweet",
        "rest_id": id,
        "core": { "user_results": { "result": { "legacy": {
            "screen_name": handle,
            "name": handle.to_uppercase()
        }}}},
        "legacy": {
            "id_str": id,
            "full_text": text,
            "created_at": "Wed Oct 05 21:25:35 +0000 2022",
            "favorite_count": 1
        },
        "views": { "count": "10" }
    })
}

fn decode(value: serde_json::Value) -> Tweet {
    serde_json::from_value(value).expect("fixture tweet must decode")
}

/// Tweet carrying a long-form X Article.
pub fn article_tweet(id: &str, handle: &str, title: &str) -> Tweet {
    let mut v = base_tweet(id, handle, "https://t.co/article");
    v["article"] = json!({ "article_results": { "result": {
        "rest_id": format!("art-{id}"),
        "title": title,
        "preview_text": format!("{title} preview"),
        "content_state": { "blocks": [{ "text": format!("{title} body") }] }
    }}});
    decode(v)
}

/// Tweet with a link card and no article.
pub fn card_tweet(id: &str, handle: &str, title: &str, card_url: &str) -> Tweet {
    let mut v = base_tweet(id, handle, "look at this");
    v["card"] = json!({ "legacy": { "binding_values": [
        { "key": "title", "value": { "string_value": title } },
        { "key": "description", "value": { "string_value": format!("{title} description") } },
        { "key": "card_url", "value": { "string_value": card_url } }
    ]}});
    decode(v)
}

/// Plain text tweet.
pub fn plain_tweet(id: &str, handle: &str, text: &str) -> Tweet {
    decode(base_tweet(id, handle, text))
}

/// Tweet with no author, which harvesting rejects.
pub fn authorless_tweet(id: &str) -> Tweet {
    decode(json!({ "rest_id": id, "legacy": { "id_str": id, "created_at": "Wed Oct 05 21:25:35 +0000 2022" } }))
}

// ---------------------------------------------------------------------------
// MockTweetSource
// ---------------------------------------------------------------------------

/// Returns `Err` for unregistered lists, `Ok(None)` for unregistered tweets.
/// Builder pattern: `.on_list()`, `.on_tweet()`, `.failing_tweet()`.
#[derive(Default)]
pub struct MockTweetSource {
    lists: HashMap<String, Vec<Tweet>>,
    tweets: HashMap<String, Tweet>,
    failing_tweets: HashSet<String>,
    fetched: Mutex<Vec<String>>,
}

impl MockTweetSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_list(mut self, list_id: &str, tweets: Vec<Tweet>) -> Self {
        self.lists.insert(list_id.to_string(), tweets);
        self
    }

    pub fn on_tweet(mut self, tweet: Tweet) -> Self {
        let id = tweet.id().unwrap_or_default().to_string();
        self.tweets.insert(id, tweet);
        self
    }

    pub fn failing_tweet(mut self, tweet_id: &str) -> Self {
        self.failing_tweets.insert(tweet_id.to_string());
        self
    }

    /// Tweet ids requested through `fetch_tweet`, in order.
    pub fn fetched_tweet_ids(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }
}

#[async_trait]
impl TweetSource for MockTweetSource {
    async fn fetch_list_tweets(&self, list_id: &str, _max_pages: u32) -> Result<Vec<Tweet>> {
        self.lists
            .get(list_id)
            .cloned()
            .ok_or_else(|| anyhow!("API error (status 404): list {list_id} not found"))
    }

    async fn fetch_tweet(&self, tweet_id: &str) -> Result<Option<Tweet>> {
        self.fetched.lock().unwrap().push(tweet_id.to_string());
        if self.failing_tweets.contains(tweet_id) {
            bail!("Rate limited after 3 attempts");
        }
        Ok(self.tweets.get(tweet_id).cloned())
    }
}

// ---------------------------------------------------------------------------
// MockArticleSink
// ---------------------------------------------------------------------------

#[derive(Default)]
struct SinkState {
    articles: HashMap<String, ArticleRecord>,
    tweets: HashMap<String, TweetRecord>,
    scanned: Vec<(String, i32)>,
    fail_writes_for: HashSet<String>,
}

/// In-memory tables with the same upsert semantics as Postgres: an update
/// keeps the stored `id` and `slug`, and keeps `original_url` when the new
/// record has none.
#[derive(Default)]
pub struct MockArticleSink {
    inner: Mutex<SinkState>,
}

impl MockArticleSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate a stored article.
    pub fn with_article(self, record: ArticleRecord) -> Self {
        self.inner
            .lock()
            .unwrap()
            .articles
            .insert(record.tweet_id.clone(), record);
        self
    }

    /// Make `upsert_harvest` fail for this tweet id.
    pub fn fail_writes_for(self, tweet_id: &str) -> Self {
        self.inner
            .lock()
            .unwrap()
            .fail_writes_for
            .insert(tweet_id.to_string());
        self
    }

    pub fn article(&self, tweet_id: &str) -> Option<ArticleRecord> {
        self.inner.lock().unwrap().articles.get(tweet_id).cloned()
    }

    pub fn article_count(&self) -> usize {
        self.inner.lock().unwrap().articles.len()
    }

    pub fn tweet(&self, tweet_id: &str) -> Option<TweetRecord> {
        self.inner.lock().unwrap().tweets.get(tweet_id).cloned()
    }

    pub fn tweet_count(&self) -> usize {
        self.inner.lock().unwrap().tweets.len()
    }

    /// `(list_id, articles_found)` for every `mark_list_scanned` call.
    pub fn scanned(&self) -> Vec<(String, i32)> {
        self.inner.lock().unwrap().scanned.clone()
    }
}

#[async_trait]
impl ArticleSink for MockArticleSink {
    async fn existing_tweet_ids(&self, tweet_ids: &[String]) -> Result<HashSet<String>> {
        let inner = self.inner.lock().unwrap();
        Ok(tweet_ids
            .iter()
            .filter(|id| inner.articles.contains_key(*id))
            .cloned()
            .collect())
    }

    async fn upsert_harvest(&self, article: &ArticleRecord, tweet: &TweetRecord) -> Result<UpsertOutcome> {
        let mut inner = self.inner.lock().unwrap();
        if inner.fail_writes_for.contains(&article.tweet_id) {
            bail!("Database error: connection reset");
        }

        let outcome = match inner.articles.get(&article.tweet_id) {
            Some(existing) => {
                let mut updated = article.clone();
                updated.id = existing.id;
                updated.slug = existing.slug.clone();
                if updated.original_url.is_none() {
                    updated.original_url = existing.original_url.clone();
                }
                inner.articles.insert(article.tweet_id.clone(), updated);
                UpsertOutcome::Updated
            }
            None => {
                inner.articles.insert(article.tweet_id.clone(), article.clone());
                UpsertOutcome::Inserted
            }
        };
        inner.tweets.insert(tweet.tweet_id.clone(), tweet.clone());
        Ok(outcome)
    }

    async fn upsert_tweets(&self, tweets: &[TweetRecord]) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        for tweet in tweets {
            inner.tweets.insert(tweet.tweet_id.clone(), tweet.clone());
        }
        Ok(())
    }

    async fn mark_list_scanned(&self, list_id: &str, articles_found: i32) -> Result<()> {
        self.inner
            .lock()
            .unwrap()
            .scanned
            .push((list_id.to_string(), articles_found));
        Ok(())
    }

    async fn articles_with_short_urls(&self, limit: i64) -> Result<Vec<ShortUrlRow>> {
        let inner = self.inner.lock().unwrap();
        let mut rows: Vec<ShortUrlRow> = inner
            .articles
            .values()
            .filter(|a| is_short_url(&a.article_url) || a.original_url.as_deref().is_some_and(is_short_url))
            .map(|a| ShortUrlRow {
                id: a.id,
                tweet_id: a.tweet_id.clone(),
                article_url: a.article_url.clone(),
                original_url: a.original_url.clone(),
            })
            .collect();
        rows.sort_by(|a, b| a.tweet_id.cmp(&b.tweet_id));
        rows.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(rows)
    }

    async fn update_article_urls(&self, id: Uuid, article_url: &str, original_url: Option<&str>) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        let article = inner
            .articles
            .values_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| anyhow!("no article with id {id}"))?;
        article.article_url = article_url.to_string();
        article.original_url = original_url.map(str::to_string);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MockUrlExpander
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MockUrlExpander {
    targets: HashMap<String, String>,
}

impl MockUrlExpander {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(mut self, short_url: &str, target: &str) -> Self {
        self.targets.insert(short_url.to_string(), target.to_string());
        self
    }
}

#[async_trait]
impl UrlExpander for MockUrlExpander {
    async fn resolve(&self, short_url: &str) -> Option<String> {
        self.targets.get(short_url).cloned()
    }
}
