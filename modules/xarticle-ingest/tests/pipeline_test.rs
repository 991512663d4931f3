//! Ingestion pipeline behaviour against in-memory mocks.
//! No network, no database.

use std::sync::Arc;
use std::time::Duration;

use rapidapi_client::Tweet;
use serde_json::json;
use xarticle_common::{ArticleRecord, ContentSource};
use xarticle_ingest::testing::{
    article_tweet, authorless_tweet, card_tweet, plain_tweet, MockArticleSink, MockTweetSource,
    MockUrlExpander,
};
use xarticle_ingest::{harvest_article, IngestOptions, Ingestor};

fn options() -> IngestOptions {
    IngestOptions {
        request_delay: Duration::ZERO,
        batch_delay: Duration::ZERO,
        ..Default::default()
    }
}

fn ingestor(
    source: MockTweetSource,
    sink: &Arc<MockArticleSink>,
    options: IngestOptions,
) -> Ingestor<MockTweetSource, Arc<MockArticleSink>> {
    Ingestor::new(source, Arc::clone(sink), options)
}

fn list(ids: &[&str]) -> Vec<String> {
    ids.iter().map(|s| s.to_string()).collect()
}

/// An article tweet with no author, which fails harvesting.
fn authorless_article_tweet(id: &str) -> Tweet {
    serde_json::from_value(json!({
        "legacy": { "id_str": id, "created_at": "Wed Oct 05 21:25:35 +0000 2022" },
        "article": { "article_results": { "result": { "title": "Orphan" } } }
    }))
    .unwrap()
}

// =========================================================================
// List ingestion
// =========================================================================

#[tokio::test]
async fn list_harvests_articles_and_cards_but_records_every_tweet() {
    let source = MockTweetSource::new().on_list(
        "L1",
        vec![
            article_tweet("1", "alice", "Long Read"),
            card_tweet("2", "bob", "Linked Post", "https://blog.example.com/p"),
            plain_tweet("3", "carol", "just chatting"),
            authorless_tweet("4"),
        ],
    );
    let sink = Arc::new(MockArticleSink::new());

    let report = ingestor(source, &sink, options())
        .ingest_lists(&list(&["L1"]))
        .await;

    assert_eq!(report.fetched, 4);
    assert_eq!(report.harvested, 2);
    assert_eq!(report.inserted, 2);
    assert_eq!(report.failed, 0);
    assert_eq!(sink.article_count(), 2);
    assert_eq!(sink.tweet_count(), 4);

    let article = sink.article("1").unwrap();
    assert_eq!(article.title, "Long Read");
    assert_eq!(article.content_source, ContentSource::Article);
    assert!(article.slug.starts_with("long-read--"));
    assert!(sink.tweet("1").unwrap().has_article);
    assert!(!sink.tweet("3").unwrap().has_article);
    assert_eq!(sink.tweet("3").unwrap().list_id.as_deref(), Some("L1"));

    let card = sink.article("2").unwrap();
    assert_eq!(card.content_source, ContentSource::Card);
    assert_eq!(card.original_url.as_deref(), Some("https://blog.example.com/p"));

    assert_eq!(sink.scanned(), vec![("L1".to_string(), 2)]);
    assert_eq!(report.lists[0].articles, 2);
}

#[tokio::test]
async fn plain_tweets_harvested_when_enabled() {
    let source = MockTweetSource::new().on_list(
        "L1",
        vec![
            article_tweet("1", "alice", "Long Read"),
            plain_tweet("3", "carol", "Thoughts on caching\nmore below"),
        ],
    );
    let sink = Arc::new(MockArticleSink::new());

    let report = ingestor(source, &sink, IngestOptions { include_plain_tweets: true, ..options() })
        .ingest_lists(&list(&["L1"]))
        .await;

    assert_eq!(report.inserted, 2);
    let plain = sink.article("3").unwrap();
    assert_eq!(plain.title, "Thoughts on caching");
    assert_eq!(plain.content_source, ContentSource::Text);
}

#[tokio::test]
async fn failed_list_is_reported_and_run_continues() {
    let source = MockTweetSource::new().on_list("L1", vec![article_tweet("1", "alice", "Kept")]);
    let sink = Arc::new(MockArticleSink::new());

    let report = ingestor(source, &sink, options())
        .ingest_lists(&list(&["missing", "L1"]))
        .await;

    assert_eq!(report.lists.len(), 2);
    assert!(report.lists[0].error.as_deref().unwrap().contains("missing"));
    assert!(report.lists[1].error.is_none());
    assert_eq!(report.failed, 1);
    assert_eq!(report.inserted, 1);
    assert_eq!(sink.scanned(), vec![("L1".to_string(), 1)]);
    assert!(report.to_string().contains("failed_lists=1"));
}

#[tokio::test]
async fn bad_tweet_does_not_abort_the_batch() {
    let source = MockTweetSource::new().on_list(
        "L1",
        vec![
            article_tweet("1", "alice", "First"),
            authorless_article_tweet("2"),
            article_tweet("3", "alice", "Third"),
        ],
    );
    let sink = Arc::new(MockArticleSink::new());

    let report = ingestor(source, &sink, options())
        .ingest_lists(&list(&["L1"]))
        .await;

    assert_eq!(report.failed, 1);
    assert_eq!(report.inserted, 2);
    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].contains("no author"));
}

#[tokio::test]
async fn write_failure_is_counted_and_others_still_written() {
    let source = MockTweetSource::new().on_list(
        "L1",
        vec![
            article_tweet("1", "alice", "Doomed"),
            article_tweet("2", "alice", "Fine"),
        ],
    );
    let sink = Arc::new(MockArticleSink::new().fail_writes_for("1"));

    let report = ingestor(source, &sink, options())
        .ingest_lists(&list(&["L1"]))
        .await;

    assert_eq!(report.failed, 1);
    assert_eq!(report.inserted, 1);
    assert!(sink.article("1").is_none());
    assert!(sink.article("2").is_some());
    assert_eq!(sink.scanned(), vec![("L1".to_string(), 1)]);
}

#[tokio::test]
async fn duplicate_tweets_in_a_batch_are_written_once() {
    let source = MockTweetSource::new().on_list(
        "L1",
        vec![
            article_tweet("1", "alice", "Old Title"),
            article_tweet("1", "alice", "New Title"),
        ],
    );
    let sink = Arc::new(MockArticleSink::new());

    let report = ingestor(source, &sink, options())
        .ingest_lists(&list(&["L1"]))
        .await;

    assert_eq!(report.harvested, 2);
    assert_eq!(report.inserted, 1);
    assert_eq!(report.skipped, 1);
    assert_eq!(sink.article("1").unwrap().title, "New Title");
}

#[tokio::test]
async fn reingesting_updates_in_place_and_keeps_identity() {
    let sink = Arc::new(MockArticleSink::new());

    let first = MockTweetSource::new().on_list("L1", vec![article_tweet("1", "alice", "Original")]);
    let report = ingestor(first, &sink, options()).ingest_lists(&list(&["L1"])).await;
    assert_eq!(report.inserted, 1);
    let before = sink.article("1").unwrap();

    let second = MockTweetSource::new().on_list("L1", vec![article_tweet("1", "alice", "Edited")]);
    let report = ingestor(second, &sink, options()).ingest_lists(&list(&["L1"])).await;
    assert_eq!(report.inserted, 0);
    assert_eq!(report.updated, 1);

    let after = sink.article("1").unwrap();
    assert_eq!(sink.article_count(), 1);
    assert_eq!(after.id, before.id);
    assert_eq!(after.slug, before.slug);
    assert_eq!(after.title, "Edited");
}

#[tokio::test]
async fn reingesting_without_a_link_keeps_the_stored_original_url() {
    let mut stored = ArticleRecord::from_harvested(
        &harvest_article(&article_tweet("1", "alice", "Original")).unwrap(),
    );
    stored.original_url = Some("https://blog.example.com/kept".into());
    let sink = Arc::new(MockArticleSink::new().with_article(stored));

    let source = MockTweetSource::new().on_list("L1", vec![article_tweet("1", "alice", "Edited")]);
    let report = ingestor(source, &sink, options()).ingest_lists(&list(&["L1"])).await;

    assert_eq!(report.updated, 1);
    let after = sink.article("1").unwrap();
    assert_eq!(after.title, "Edited");
    assert_eq!(after.original_url.as_deref(), Some("https://blog.example.com/kept"));
}

#[tokio::test]
async fn skip_existing_leaves_stored_articles_alone() {
    let stored = ArticleRecord::from_harvested(
        &harvest_article(&article_tweet("1", "alice", "Stored")).unwrap(),
    );
    let sink = Arc::new(MockArticleSink::new().with_article(stored));
    let source = MockTweetSource::new().on_list(
        "L1",
        vec![
            article_tweet("1", "alice", "Changed"),
            article_tweet("2", "alice", "Fresh"),
        ],
    );

    let report = ingestor(source, &sink, IngestOptions { skip_existing: true, ..options() })
        .ingest_lists(&list(&["L1"]))
        .await;

    assert_eq!(report.skipped, 1);
    assert_eq!(report.inserted, 1);
    assert_eq!(report.updated, 0);
    assert_eq!(sink.article("1").unwrap().title, "Stored");
}

#[tokio::test]
async fn dry_run_writes_nothing() {
    let source = MockTweetSource::new().on_list(
        "L1",
        vec![
            article_tweet("1", "alice", "One"),
            card_tweet("2", "bob", "Two", "https://example.com/two"),
        ],
    );
    let sink = Arc::new(MockArticleSink::new());

    let report = ingestor(source, &sink, IngestOptions { dry_run: true, ..options() })
        .ingest_lists(&list(&["L1"]))
        .await;

    assert_eq!(report.would_write, 2);
    assert_eq!(report.written(), 0);
    assert_eq!(sink.article_count(), 0);
    assert_eq!(sink.tweet_count(), 0);
    assert!(sink.scanned().is_empty());
    assert_eq!(report.lists[0].articles, 2);
}

#[tokio::test]
async fn small_batches_still_write_everything() {
    let tweets = (1..=5)
        .map(|i| article_tweet(&i.to_string(), "alice", &format!("Post {i}")))
        .collect();
    let source = MockTweetSource::new().on_list("L1", tweets);
    let sink = Arc::new(MockArticleSink::new());

    let report = ingestor(source, &sink, IngestOptions { batch_size: 2, ..options() })
        .ingest_lists(&list(&["L1"]))
        .await;

    assert_eq!(report.inserted, 5);
    assert_eq!(sink.article_count(), 5);
}

// =========================================================================
// Direct tweet ingestion
// =========================================================================

#[tokio::test]
async fn tweets_by_url_or_id_with_failures_counted() {
    let source = Arc::new(
        MockTweetSource::new()
            .on_tweet(article_tweet("10", "alice", "Direct"))
            .failing_tweet("11"),
    );
    let sink = Arc::new(MockArticleSink::new());
    let ingestor = Ingestor::new(Arc::clone(&source), Arc::clone(&sink), options());

    let report = ingestor
        .ingest_tweets(&list(&[
            "https://x.com/alice/status/10",
            "10",
            "not a tweet",
            "11",
            "12",
        ]))
        .await;

    assert_eq!(source.fetched_tweet_ids(), vec!["10", "11", "12"]);
    assert_eq!(report.fetched, 1);
    assert_eq!(report.inserted, 1);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.failed, 3);
    assert_eq!(report.errors.len(), 3);
    assert!(sink.tweet("10").unwrap().has_article);
    assert_eq!(sink.tweet("10").unwrap().list_id, None);
}

#[tokio::test]
async fn direct_ingestion_harvests_plain_tweets() {
    let source = MockTweetSource::new().on_tweet(plain_tweet("20", "dave", "A thread starter"));
    let sink = Arc::new(MockArticleSink::new());

    let report = ingestor(source, &sink, options())
        .ingest_tweets(&list(&["20"]))
        .await;

    assert_eq!(report.inserted, 1);
    assert_eq!(sink.article("20").unwrap().content_source, ContentSource::Text);
}

#[tokio::test]
async fn skip_existing_avoids_refetching_tweets() {
    let stored = ArticleRecord::from_harvested(
        &harvest_article(&article_tweet("10", "alice", "Stored")).unwrap(),
    );
    let source = Arc::new(
        MockTweetSource::new()
            .on_tweet(article_tweet("10", "alice", "Stored"))
            .on_tweet(article_tweet("11", "alice", "New")),
    );
    let sink = Arc::new(MockArticleSink::new().with_article(stored));
    let ingestor = Ingestor::new(
        Arc::clone(&source),
        Arc::clone(&sink),
        IngestOptions { skip_existing: true, ..options() },
    );

    let report = ingestor.ingest_tweets(&list(&["10", "11"])).await;

    assert_eq!(source.fetched_tweet_ids(), vec!["11"]);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.inserted, 1);
}

// =========================================================================
// Short URL expansion
// =========================================================================

#[tokio::test]
async fn card_short_links_expanded_before_write() {
    let source = MockTweetSource::new().on_list(
        "L1",
        vec![card_tweet("2", "bob", "Linked", "https://t.co/abc")],
    );
    let sink = Arc::new(MockArticleSink::new());
    let ingestor = ingestor(source, &sink, IngestOptions { expand_short_urls: true, ..options() })
        .with_url_expander(MockUrlExpander::new().on("https://t.co/abc", "https://blog.example.com/full"));

    ingestor.ingest_lists(&list(&["L1"])).await;

    assert_eq!(
        sink.article("2").unwrap().original_url.as_deref(),
        Some("https://blog.example.com/full")
    );
}

#[tokio::test]
async fn stored_short_links_expanded_or_left_alone() {
    let mut resolvable =
        ArticleRecord::from_harvested(&harvest_article(&article_tweet("1", "alice", "A")).unwrap());
    resolvable.original_url = Some("https://t.co/good".into());
    let mut dead =
        ArticleRecord::from_harvested(&harvest_article(&article_tweet("2", "alice", "B")).unwrap());
    dead.original_url = Some("https://t.co/dead".into());
    let untouched =
        ArticleRecord::from_harvested(&harvest_article(&article_tweet("3", "alice", "C")).unwrap());

    let sink = Arc::new(
        MockArticleSink::new()
            .with_article(resolvable)
            .with_article(dead)
            .with_article(untouched),
    );
    let ingestor = ingestor(MockTweetSource::new(), &sink, options())
        .with_url_expander(MockUrlExpander::new().on("https://t.co/good", "https://example.com/real"));

    let report = ingestor.expand_short_urls(50).await.unwrap();

    assert_eq!(report.scanned, 2);
    assert_eq!(report.expanded, 1);
    assert_eq!(report.unchanged, 1);
    assert_eq!(
        sink.article("1").unwrap().original_url.as_deref(),
        Some("https://example.com/real")
    );
    assert_eq!(sink.article("2").unwrap().original_url.as_deref(), Some("https://t.co/dead"));
}

#[tokio::test]
async fn expanding_without_an_expander_is_an_error() {
    let sink = Arc::new(MockArticleSink::new());
    let result = ingestor(MockTweetSource::new(), &sink, options())
        .expand_short_urls(10)
        .await;
    assert!(result.is_err());
}
