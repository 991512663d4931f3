// Seams between the ingestion pipeline and the outside world.
//
// TweetSource wraps the RapidAPI client, ArticleSink wraps Postgres, and
// UrlExpander wraps the t.co resolver. Tests swap in the in-memory mocks from
// `testing`.

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use rapidapi_client::{Tweet, TwitterClient};
use uuid::Uuid;
use xarticle_common::{ArticleRecord, TweetRecord, UpsertOutcome};

use crate::short_url::ShortUrlExpander;
use crate::store::{ArticleStore, ShortUrlRow};

// ---------------------------------------------------------------------------
// TweetSource
// ---------------------------------------------------------------------------

#[async_trait]
pub trait TweetSource: Send + Sync {
    /// All tweets on a list timeline, up to `max_pages` pages.
    async fn fetch_list_tweets(&self, list_id: &str, max_pages: u32) -> Result<Vec<Tweet>>;

    /// A single tweet by id. `Ok(None)` when upstream has no such tweet.
    async fn fetch_tweet(&self, tweet_id: &str) -> Result<Option<Tweet>>;
}

#[async_trait]
impl TweetSource for TwitterClient {
    async fn fetch_list_tweets(&self, list_id: &str, max_pages: u32) -> Result<Vec<Tweet>> {
        Ok(self.fetch_all_list_pages(list_id, max_pages).await?)
    }

    async fn fetch_tweet(&self, tweet_id: &str) -> Result<Option<Tweet>> {
        match self.fetch_tweet(tweet_id).await {
            Ok(tweet) => Ok(tweet),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl<T: TweetSource + ?Sized> TweetSource for Arc<T> {
    async fn fetch_list_tweets(&self, list_id: &str, max_pages: u32) -> Result<Vec<Tweet>> {
        (**self).fetch_list_tweets(list_id, max_pages).await
    }

    async fn fetch_tweet(&self, tweet_id: &str) -> Result<Option<Tweet>> {
        (**self).fetch_tweet(tweet_id).await
    }
}

// ---------------------------------------------------------------------------
// ArticleSink
// ---------------------------------------------------------------------------

#[async_trait]
pub trait ArticleSink: Send + Sync {
    /// Subset of `tweet_ids` that already have an article.
    async fn existing_tweet_ids(&self, tweet_ids: &[String]) -> Result<HashSet<String>>;

    /// Write an article and its tweet row atomically.
    async fn upsert_harvest(&self, article: &ArticleRecord, tweet: &TweetRecord) -> Result<UpsertOutcome>;

    async fn upsert_tweets(&self, tweets: &[TweetRecord]) -> Result<()>;

    async fn mark_list_scanned(&self, list_id: &str, articles_found: i32) -> Result<()>;

    async fn articles_with_short_urls(&self, limit: i64) -> Result<Vec<ShortUrlRow>>;

    async fn update_article_urls(&self, id: Uuid, article_url: &str, original_url: Option<&str>) -> Result<()>;
}

#[async_trait]
impl ArticleSink for ArticleStore {
    async fn existing_tweet_ids(&self, tweet_ids: &[String]) -> Result<HashSet<String>> {
        Ok(self.existing_tweet_ids(tweet_ids).await?)
    }

    async fn upsert_harvest(&self, article: &ArticleRecord, tweet: &TweetRecord) -> Result<UpsertOutcome> {
        Ok(self.upsert_harvest(article, tweet).await?)
    }

    async fn upsert_tweets(&self, tweets: &[TweetRecord]) -> Result<()> {
        Ok(self.upsert_tweets(tweets).await?)
    }

    async fn mark_list_scanned(&self, list_id: &str, articles_found: i32) -> Result<()> {
        Ok(self.mark_list_scanned(list_id, articles_found).await?)
    }

    async fn articles_with_short_urls(&self, limit: i64) -> Result<Vec<ShortUrlRow>> {
        Ok(self.articles_with_short_urls(limit).await?)
    }

    async fn update_article_urls(&self, id: Uuid, article_url: &str, original_url: Option<&str>) -> Result<()> {
        Ok(self.update_article_urls(id, article_url, original_url).await?)
    }
}

#[async_trait]
impl<S: ArticleSink + ?Sized> ArticleSink for Arc<S> {
    async fn existing_tweet_ids(&self, tweet_ids: &[String]) -> Result<HashSet<String>> {
        (**self).existing_tweet_ids(tweet_ids).await
    }

    async fn upsert_harvest(&self, article: &ArticleRecord, tweet: &TweetRecord) -> Result<UpsertOutcome> {
        (**self).upsert_harvest(article, tweet).await
    }

    async fn upsert_tweets(&self, tweets: &[TweetRecord]) -> Result<()> {
        (**self).upsert_tweets(tweets).await
    }

    async fn mark_list_scanned(&self, list_id: &str, articles_found: i32) -> Result<()> {
        (**self).mark_list_scanned(list_id, articles_found).await
    }

    async fn articles_with_short_urls(&self, limit: i64) -> Result<Vec<ShortUrlRow>> {
        (**self).articles_with_short_urls(limit).await
    }

    async fn update_article_urls(&self, id: Uuid, article_url: &str, original_url: Option<&str>) -> Result<()> {
        (**self).update_article_urls(id, article_url, original_url).await
    }
}

// ---------------------------------------------------------------------------
// UrlExpander
// ---------------------------------------------------------------------------

#[async_trait]
pub trait UrlExpander: Send + Sync {
    /// Redirect target of a short link, or `None` if it cannot be resolved.
    async fn resolve(&self, short_url: &str) -> Option<String>;
}

#[async_trait]
impl UrlExpander for ShortUrlExpander {
    async fn resolve(&self, short_url: &str) -> Option<String> {
        self.resolve(short_url).await
    }
}
