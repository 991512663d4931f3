// Batch ingestion: fetch tweets, normalize them into articles, write them.
//
// Processing is sequential. One bad tweet, list, or write is logged and
// counted in the report; it never aborts the run.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use anyhow::{bail, Result};
use tracing::{debug, info, warn};
use xarticle_common::{ArticleRecord, Config, ContentSource, HarvestedArticle, TweetRecord, UpsertOutcome};

use crate::harvest::{content_source, harvest_article, tweet_record};
use crate::short_url::is_short_url;
use crate::traits::{ArticleSink, TweetSource, UrlExpander};
use crate::tweet_ref::parse_tweet_ref;

#[derive(Debug, Clone)]
pub struct IngestOptions {
    /// Harvest and report, but write nothing.
    pub dry_run: bool,
    /// Leave tweets that already have an article untouched.
    pub skip_existing: bool,
    /// Harvest list tweets that carry neither an article nor a card.
    pub include_plain_tweets: bool,
    /// Resolve `t.co` original URLs before writing.
    pub expand_short_urls: bool,
    /// Pause between single-tweet fetches.
    pub request_delay: Duration,
    pub batch_size: usize,
    /// Pause between write batches.
    pub batch_delay: Duration,
    pub max_list_pages: u32,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            skip_existing: false,
            include_plain_tweets: false,
            expand_short_urls: false,
            request_delay: Duration::from_millis(1_000),
            batch_size: 10,
            batch_delay: Duration::from_millis(1_000),
            max_list_pages: 3,
        }
    }
}

impl IngestOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            request_delay: Duration::from_millis(config.request_delay_ms),
            batch_size: config.batch_size,
            batch_delay: Duration::from_millis(config.batch_delay_ms),
            max_list_pages: config.max_list_pages,
            ..Self::default()
        }
    }
}

/// Per-list outcome of `ingest_lists`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListReport {
    pub list_id: String,
    pub tweets: usize,
    pub articles: usize,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub fetched: usize,
    pub harvested: usize,
    pub inserted: usize,
    pub updated: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Articles a dry run would have written.
    pub would_write: usize,
    pub errors: Vec<String>,
    pub lists: Vec<ListReport>,
}

impl IngestReport {
    fn fail(&mut self, message: String) {
        self.failed += 1;
        self.errors.push(message);
    }

    pub fn written(&self) -> usize {
        self.inserted + self.updated
    }
}

impl fmt::Display for IngestReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "fetched={} harvested={} inserted={} updated={} skipped={} failed={}",
            self.fetched, self.harvested, self.inserted, self.updated, self.skipped, self.failed
        )?;
        if self.would_write > 0 {
            write!(f, " would_write={}", self.would_write)?;
        }
        if !self.lists.is_empty() {
            let failed_lists = self.lists.iter().filter(|l| l.error.is_some()).count();
            write!(f, " lists={} failed_lists={failed_lists}", self.lists.len())?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpandReport {
    pub scanned: usize,
    pub expanded: usize,
    pub unchanged: usize,
    pub failed: usize,
}

impl fmt::Display for ExpandReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "scanned={} expanded={} unchanged={} failed={}",
            self.scanned, self.expanded, self.unchanged, self.failed
        )
    }
}

pub struct Ingestor<F, S> {
    source: F,
    sink: S,
    options: IngestOptions,
    expander: Option<Box<dyn UrlExpander>>,
}

impl<F: TweetSource, S: ArticleSink> Ingestor<F, S> {
    pub fn new(source: F, sink: S, options: IngestOptions) -> Self {
        Self {
            source,
            sink,
            options,
            expander: None,
        }
    }

    pub fn with_url_expander(mut self, expander: impl UrlExpander + 'static) -> Self {
        self.expander = Some(Box::new(expander));
        self
    }

    pub fn options(&self) -> &IngestOptions {
        &self.options
    }

    // --- Lists ---

    /// Scan each list and write the articles found on it.
    pub async fn ingest_lists(&self, list_ids: &[String]) -> IngestReport {
        let mut report = IngestReport::default();

        for list_id in list_ids {
            let list_report = self.ingest_list(list_id, &mut report).await;
            info!(
                list_id = %list_report.list_id,
                tweets = list_report.tweets,
                articles = list_report.articles,
                failed = list_report.error.is_some(),
                "List scanned"
            );
            report.lists.push(list_report);
        }

        report
    }

    async fn ingest_list(&self, list_id: &str, report: &mut IngestReport) -> ListReport {
        let mut list_report = ListReport {
            list_id: list_id.to_string(),
            ..Default::default()
        };

        let tweets = match self
            .source
            .fetch_list_tweets(list_id, self.options.max_list_pages)
            .await
        {
            Ok(tweets) => tweets,
            Err(e) => {
                warn!(list_id, error = %e, "List fetch failed");
                let message = format!("list {list_id}: {e:#}");
                list_report.error = Some(message.clone());
                report.fail(message);
                return list_report;
            }
        };
        list_report.tweets = tweets.len();
        report.fetched += tweets.len();

        let seen: Vec<TweetRecord> = tweets
            .iter()
            .filter_map(|t| tweet_record(t, Some(list_id)))
            .collect();
        if !self.options.dry_run {
            if let Err(e) = self.sink.upsert_tweets(&seen).await {
                warn!(list_id, error = %e, "Failed to record seen tweets");
                report.errors.push(format!("list {list_id}: recording tweets: {e:#}"));
            }
        }

        let mut harvested = Vec::new();
        for tweet in &tweets {
            let source = content_source(tweet);
            if source == ContentSource::Text && !self.options.include_plain_tweets {
                continue;
            }
            match harvest_article(tweet) {
                Ok(article) => harvested.push(article),
                Err(e) => {
                    warn!(list_id, tweet_id = tweet.id().unwrap_or("?"), error = %e, "Skipping tweet");
                    report.fail(format!("list {list_id}: {e}"));
                }
            }
        }
        report.harvested += harvested.len();

        let before = report.written() + report.would_write;
        self.write_articles(harvested, Some(list_id), report).await;
        let written = report.written() + report.would_write - before;
        list_report.articles = written;

        if !self.options.dry_run {
            let found = i32::try_from(written).unwrap_or(i32::MAX);
            if let Err(e) = self.sink.mark_list_scanned(list_id, found).await {
                warn!(list_id, error = %e, "Failed to mark list scanned");
                report.errors.push(format!("list {list_id}: marking scanned: {e:#}"));
            }
        }

        list_report
    }

    // --- Single tweets ---

    /// Fetch tweets by URL or id, one at a time, and write their articles.
    pub async fn ingest_tweets(&self, refs: &[String]) -> IngestReport {
        let mut report = IngestReport::default();

        let mut ids: Vec<String> = Vec::new();
        for raw in refs {
            match parse_tweet_ref(raw) {
                Some(id) if !ids.contains(&id) => ids.push(id),
                Some(id) => {
                    debug!(tweet_id = %id, "Duplicate tweet reference");
                    report.skipped += 1;
                }
                None => {
                    warn!(input = %raw, "Not a tweet URL or id");
                    report.fail(format!("invalid tweet reference: {raw:?}"));
                }
            }
        }

        if self.options.skip_existing && !ids.is_empty() {
            match self.sink.existing_tweet_ids(&ids).await {
                Ok(existing) => {
                    let before = ids.len();
                    ids.retain(|id| !existing.contains(id));
                    report.skipped += before - ids.len();
                }
                Err(e) => warn!(error = %e, "Existing-tweet lookup failed, fetching all"),
            }
        }

        let mut harvested = Vec::new();
        for (i, tweet_id) in ids.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(self.options.request_delay).await;
            }
            info!(tweet_id, n = i + 1, total = ids.len(), "Fetching tweet");

            let tweet = match self.source.fetch_tweet(tweet_id).await {
                Ok(Some(tweet)) => tweet,
                Ok(None) => {
                    warn!(tweet_id, "Tweet not found");
                    report.fail(format!("tweet {tweet_id}: not found"));
                    continue;
                }
                Err(e) => {
                    warn!(tweet_id, error = %e, "Tweet fetch failed");
                    report.fail(format!("tweet {tweet_id}: {e:#}"));
                    continue;
                }
            };
            report.fetched += 1;

            match harvest_article(&tweet) {
                Ok(article) => harvested.push(article),
                Err(e) => {
                    warn!(tweet_id, error = %e, "Skipping tweet");
                    report.fail(format!("tweet {tweet_id}: {e}"));
                }
            }
        }
        report.harvested += harvested.len();

        self.write_articles(harvested, None, &mut report).await;
        report
    }

    // --- Writing ---

    async fn write_articles(
        &self,
        harvested: Vec<HarvestedArticle>,
        list_id: Option<&str>,
        report: &mut IngestReport,
    ) {
        let before = harvested.len();
        let mut articles = dedup_by_article_url(harvested);
        report.skipped += before - articles.len();

        if self.options.skip_existing && list_id.is_some() && !articles.is_empty() {
            let ids: Vec<String> = articles.iter().map(|a| a.tweet_id.clone()).collect();
            match self.sink.existing_tweet_ids(&ids).await {
                Ok(existing) => {
                    let before = articles.len();
                    articles.retain(|a| !existing.contains(&a.tweet_id));
                    report.skipped += before - articles.len();
                }
                Err(e) => warn!(error = %e, "Existing-tweet lookup failed, writing all"),
            }
        }

        if self.options.expand_short_urls {
            self.expand_original_urls(&mut articles).await;
        }

        let batch_size = self.options.batch_size.max(1);
        let batch_count = articles.len().div_ceil(batch_size);

        for (n, batch) in articles.chunks(batch_size).enumerate() {
            if n > 0 {
                tokio::time::sleep(self.options.batch_delay).await;
            }
            debug!(batch = n + 1, batches = batch_count, size = batch.len(), "Writing batch");

            for article in batch {
                let record = ArticleRecord::from_harvested(article);
                let tweet = TweetRecord {
                    tweet_id: article.tweet_id.clone(),
                    author_handle: article.author_handle.clone(),
                    has_article: article.content_source == ContentSource::Article,
                    list_id: list_id.map(str::to_string),
                };

                if self.options.dry_run {
                    info!(tweet_id = %record.tweet_id, slug = %record.slug, title = %record.title, "Dry run, would write");
                    report.would_write += 1;
                    continue;
                }

                match self.sink.upsert_harvest(&record, &tweet).await {
                    Ok(UpsertOutcome::Inserted) => {
                        info!(tweet_id = %record.tweet_id, slug = %record.slug, "Inserted article");
                        report.inserted += 1;
                    }
                    Ok(UpsertOutcome::Updated) => {
                        info!(tweet_id = %record.tweet_id, "Updated article");
                        report.updated += 1;
                    }
                    Err(e) => {
                        warn!(tweet_id = %record.tweet_id, error = %e, "Article write failed");
                        report.fail(format!("tweet {}: write failed: {e:#}", record.tweet_id));
                    }
                }
            }
        }
    }

    async fn expand_original_urls(&self, articles: &mut [HarvestedArticle]) {
        let Some(expander) = self.expander.as_deref() else {
            return;
        };
        for article in articles {
            if let Some(original) = article.original_url.clone().filter(|u| is_short_url(u)) {
                if let Some(target) = expander.resolve(&original).await {
                    article.original_url = Some(target);
                }
            }
        }
    }

    // --- Stored short links ---

    /// Resolve `t.co` links already stored on articles. Unresolvable links are
    /// left as they are.
    pub async fn expand_short_urls(&self, limit: i64) -> Result<ExpandReport> {
        let Some(expander) = self.expander.as_deref() else {
            bail!("no URL expander configured");
        };

        let rows = self.sink.articles_with_short_urls(limit).await?;
        let mut report = ExpandReport {
            scanned: rows.len(),
            ..Default::default()
        };

        for row in rows {
            let article_url = expand_if_short(expander, &row.article_url).await;
            let original_url = match row.original_url.as_deref() {
                Some(u) => Some(expand_if_short(expander, u).await),
                None => None,
            };

            if article_url == row.article_url && original_url == row.original_url {
                report.unchanged += 1;
                continue;
            }

            if self.options.dry_run {
                info!(tweet_id = %row.tweet_id, %article_url, ?original_url, "Dry run, would update URLs");
                report.expanded += 1;
                continue;
            }

            match self
                .sink
                .update_article_urls(row.id, &article_url, original_url.as_deref())
                .await
            {
                Ok(()) => {
                    debug!(tweet_id = %row.tweet_id, "Expanded stored short URLs");
                    report.expanded += 1;
                }
                Err(e) => {
                    warn!(tweet_id = %row.tweet_id, error = %e, "Failed to update URLs");
                    report.failed += 1;
                }
            }
        }

        info!(%report, "Short URL expansion complete");
        Ok(report)
    }
}

/// Expand `url` if it is a short link; otherwise, or on failure, return it unchanged.
async fn expand_if_short(expander: &dyn UrlExpander, url: &str) -> String {
    if !is_short_url(url) {
        return url.to_string();
    }
    expander.resolve(url).await.unwrap_or_else(|| url.to_string())
}

/// Keep one article per `article_url`; a later duplicate replaces the
/// earlier one in place.
fn dedup_by_article_url(articles: Vec<HarvestedArticle>) -> Vec<HarvestedArticle> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut out: Vec<HarvestedArticle> = Vec::with_capacity(articles.len());
    for article in articles {
        match index.get(&article.article_url) {
            Some(&i) => out[i] = article,
            None => {
                index.insert(article.article_url.clone(), out.len());
                out.push(article);
            }
        }
    }
    out
}
