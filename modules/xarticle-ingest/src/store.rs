// Postgres persistence for harvested articles, seen tweets, and curated lists.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;
use xarticle_common::{ArticleRecord, TweetRecord, TwitterList, UpsertOutcome};

use crate::error::{StoreError, StoreResult};

pub struct ArticleStore {
    pool: PgPool,
}

/// An article whose stored links still point at the `t.co` shortener.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct ShortUrlRow {
    pub id: Uuid,
    pub tweet_id: String,
    pub article_url: String,
    pub original_url: Option<String>,
}

#[derive(sqlx::FromRow)]
struct ListRow {
    list_id: String,
    name: String,
    description: Option<String>,
    is_active: bool,
    last_scanned_at: Option<DateTime<Utc>>,
    articles_found: i32,
}

impl From<ListRow> for TwitterList {
    fn from(row: ListRow) -> Self {
        Self {
            list_id: row.list_id,
            name: row.name,
            description: row.description,
            is_active: row.is_active,
            last_scanned_at: row.last_scanned_at,
            articles_found: row.articles_found,
        }
    }
}

impl ArticleStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run the embedded SQL migrations.
    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Database(e.into()))?;
        Ok(())
    }

    // --- Articles ---

    /// Insert or refresh an article and its tweet row in one transaction.
    ///
    /// Conflicts on `tweet_id` update content and metrics but keep the
    /// existing `id`, `slug` and `created_at`.
    pub async fn upsert_harvest(
        &self,
        article: &ArticleRecord,
        tweet: &TweetRecord,
    ) -> StoreResult<UpsertOutcome> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query_scalar::<_, bool>(
            r#"
            INSERT INTO articles
                (id, slug, title, excerpt, full_article_content,
                 author_name, author_handle, author_avatar, image,
                 tweet_id, tweet_text, tweet_views, tweet_replies, tweet_retweets,
                 tweet_likes, tweet_bookmarks, tweet_published_at, article_published_at,
                 article_url, original_url, article_images, article_videos, content_source)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14,
                    $15, $16, $17, $18, $19, $20, $21, $22, $23)
            ON CONFLICT (tweet_id) DO UPDATE SET
                title                = EXCLUDED.title,
                excerpt              = EXCLUDED.excerpt,
                full_article_content = EXCLUDED.full_article_content,
                author_name          = EXCLUDED.author_name,
                author_handle        = EXCLUDED.author_handle,
                author_avatar        = EXCLUDED.author_avatar,
                image                = EXCLUDED.image,
                tweet_text           = EXCLUDED.tweet_text,
                tweet_views          = EXCLUDED.tweet_views,
                tweet_replies        = EXCLUDED.tweet_replies,
                tweet_retweets       = EXCLUDED.tweet_retweets,
                tweet_likes          = EXCLUDED.tweet_likes,
                tweet_bookmarks      = EXCLUDED.tweet_bookmarks,
                tweet_published_at   = EXCLUDED.tweet_published_at,
                article_published_at = EXCLUDED.article_published_at,
                article_url          = EXCLUDED.article_url,
                original_url         = COALESCE(EXCLUDED.original_url, articles.original_url),
                article_images       = EXCLUDED.article_images,
                article_videos       = EXCLUDED.article_videos,
                content_source       = EXCLUDED.content_source,
                updated_at           = now()
            RETURNING (xmax = 0) AS inserted
            "#,
        )
        .bind(article.id)
        .bind(&article.slug)
        .bind(&article.title)
        .bind(&article.excerpt)
        .bind(&article.full_article_content)
        .bind(&article.author_name)
        .bind(&article.author_handle)
        .bind(&article.author_avatar)
        .bind(&article.image)
        .bind(&article.tweet_id)
        .bind(&article.tweet_text)
        .bind(article.tweet_views)
        .bind(article.tweet_replies)
        .bind(article.tweet_retweets)
        .bind(article.tweet_likes)
        .bind(article.tweet_bookmarks)
        .bind(article.tweet_published_at)
        .bind(article.article_published_at)
        .bind(&article.article_url)
        .bind(&article.original_url)
        .bind(&article.article_images)
        .bind(&article.article_videos)
        .bind(article.content_source.as_str())
        .fetch_one(&mut *tx)
        .await?;

        upsert_tweet(&mut tx, tweet).await?;
        tx.commit().await?;

        debug!(tweet_id = %article.tweet_id, inserted, "Upserted article");
        Ok(if inserted {
            UpsertOutcome::Inserted
        } else {
            UpsertOutcome::Updated
        })
    }

    /// Which of `tweet_ids` already have an article row.
    pub async fn existing_tweet_ids(&self, tweet_ids: &[String]) -> StoreResult<HashSet<String>> {
        if tweet_ids.is_empty() {
            return Ok(HashSet::new());
        }
        let rows = sqlx::query_scalar::<_, String>(
            "SELECT tweet_id FROM articles WHERE tweet_id = ANY($1)",
        )
        .bind(tweet_ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().collect())
    }

    pub async fn articles_with_short_urls(&self, limit: i64) -> StoreResult<Vec<ShortUrlRow>> {
        let rows = sqlx::query_as::<_, ShortUrlRow>(
            r#"
            SELECT id, tweet_id, article_url, original_url FROM articles
            WHERE article_url LIKE 'https://t.co/%' OR article_url LIKE 'http://t.co/%'
               OR original_url LIKE 'https://t.co/%' OR original_url LIKE 'http://t.co/%'
            ORDER BY created_at DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn update_article_urls(
        &self,
        id: Uuid,
        article_url: &str,
        original_url: Option<&str>,
    ) -> StoreResult<()> {
        sqlx::query(
            "UPDATE articles SET article_url = $2, original_url = $3, updated_at = now() WHERE id = $1",
        )
        .bind(id)
        .bind(article_url)
        .bind(original_url)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // --- Tweets ---

    /// Record every tweet seen, article or not, in one transaction.
    pub async fn upsert_tweets(&self, tweets: &[TweetRecord]) -> StoreResult<()> {
        if tweets.is_empty() {
            return Ok(());
        }
        let mut tx = self.pool.begin().await?;
        for tweet in tweets {
            upsert_tweet(&mut tx, tweet).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    // --- Lists ---

    pub async fn active_list_ids(&self) -> StoreResult<Vec<String>> {
        let ids = sqlx::query_scalar::<_, String>(
            "SELECT list_id FROM twitter_lists WHERE is_active ORDER BY created_at",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    /// Register a list, or update its name/description and reactivate it.
    pub async fn add_list(
        &self,
        list_id: &str,
        name: &str,
        description: Option<&str>,
    ) -> StoreResult<TwitterList> {
        let row = sqlx::query_as::<_, ListRow>(
            r#"
            INSERT INTO twitter_lists (list_id, name, description)
            VALUES ($1, $2, $3)
            ON CONFLICT (list_id) DO UPDATE SET
                name        = EXCLUDED.name,
                description = COALESCE(EXCLUDED.description, twitter_lists.description),
                is_active   = true,
                updated_at  = now()
            RETURNING list_id, name, description, is_active, last_scanned_at, articles_found
            "#,
        )
        .bind(list_id)
        .bind(name)
        .bind(description)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    pub async fn set_list_active(&self, list_id: &str, active: bool) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE twitter_lists SET is_active = $2, updated_at = now() WHERE list_id = $1",
        )
        .bind(list_id)
        .bind(active)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::UnknownList(list_id.to_string()));
        }
        Ok(())
    }

    pub async fn list_lists(&self) -> StoreResult<Vec<TwitterList>> {
        let rows = sqlx::query_as::<_, ListRow>(
            r#"
            SELECT list_id, name, description, is_active, last_scanned_at, articles_found
            FROM twitter_lists
            ORDER BY created_at
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(TwitterList::from).collect())
    }

    /// Stamp a scan. `articles_found` accumulates across scans.
    /// Lists not yet registered are ignored.
    pub async fn mark_list_scanned(&self, list_id: &str, articles_found: i32) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE twitter_lists
            SET last_scanned_at = now(),
                articles_found  = articles_found + $2,
                updated_at      = now()
            WHERE list_id = $1
            "#,
        )
        .bind(list_id)
        .bind(articles_found)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

async fn upsert_tweet(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    tweet: &TweetRecord,
) -> StoreResult<()> {
    sqlx::query(
        r#"
        INSERT INTO tweets (tweet_id, author_handle, has_article, list_id)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (tweet_id) DO UPDATE SET
            author_handle = EXCLUDED.author_handle,
            has_article   = tweets.has_article OR EXCLUDED.has_article,
            list_id       = COALESCE(EXCLUDED.list_id, tweets.list_id),
            updated_at    = now()
        "#,
    )
    .bind(&tweet.tweet_id)
    .bind(&tweet.author_handle)
    .bind(tweet.has_article)
    .bind(&tweet.list_id)
    .execute(&mut **tx)
    .await?;
    Ok(())
}
