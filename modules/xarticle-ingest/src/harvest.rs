// Tweet → article normalization.
//
// Every field is resolved through a fixed fallback chain so that the same
// payload always produces the same record, and title/content are never empty:
// structured X Article first, then link-card bindings, then raw tweet text.

use chrono::{DateTime, TimeZone, Utc};
use rapidapi_client::{Card, Tweet};
use tracing::warn;
use xarticle_common::{ArticleMetrics, ContentSource, HarvestedArticle, TweetRecord};

use crate::error::HarvestError;
use crate::extractor::{first_tweet_photo, full_article_content, media_urls, non_blank, MediaUrls};

pub const UNTITLED: &str = "Untitled Article";
const TITLE_MAX_CHARS: usize = 100;
const EXCERPT_MAX_CHARS: usize = 200;

/// Twitter's `created_at` format: `Wed Oct 05 21:25:35 +0000 2022`.
const TWITTER_DATE_FORMAT: &str = "%a %b %d %H:%M:%S %z %Y";

const CARD_IMAGE_KEYS: &[&str] = &[
    "thumbnail_image_large",
    "summary_photo_image_large",
    "photo_image_full_size_large",
    "player_image",
];

/// Which tier of the fallback chain this tweet's content comes from.
pub fn content_source(tweet: &Tweet) -> ContentSource {
    if tweet.article_result().is_some() {
        ContentSource::Article
    } else if tweet
        .card
        .as_ref()
        .is_some_and(|c| c.binding("title").is_some() || c.binding("description").is_some())
    {
        ContentSource::Card
    } else {
        ContentSource::Text
    }
}

/// Row for the `tweets` table. `None` when the tweet has no id.
pub fn tweet_record(tweet: &Tweet, list_id: Option<&str>) -> Option<TweetRecord> {
    Some(TweetRecord {
        tweet_id: tweet.id()?.to_string(),
        author_handle: tweet.author_handle().unwrap_or("unknown").to_string(),
        has_article: tweet.article_result().is_some(),
        list_id: list_id.map(str::to_string),
    })
}

/// Normalize a tweet into an article record.
pub fn harvest_article(tweet: &Tweet) -> Result<HarvestedArticle, HarvestError> {
    let tweet_id = tweet.id().ok_or(HarvestError::MissingId)?.to_string();
    let author_handle = tweet
        .author_handle()
        .ok_or_else(|| HarvestError::MissingAuthor(tweet_id.clone()))?
        .to_string();
    let created_at = tweet
        .created_at()
        .ok_or_else(|| HarvestError::MissingCreatedAt(tweet_id.clone()))?;

    let article = tweet.article_result();
    let card = tweet.card.as_ref();
    let tweet_text = tweet.text().to_string();
    let source = content_source(tweet);

    let title = resolve_title(tweet, card, &tweet_text);

    let excerpt = article
        .and_then(|a| non_blank(a.preview_text.as_deref()).or_else(|| non_blank(a.description.as_deref())))
        .or_else(|| card.and_then(|c| c.binding("description")).map(str::to_string))
        .or_else(|| non_blank(Some(tweet_text.as_str())).map(|t| truncate_chars(&t, EXCERPT_MAX_CHARS)));

    let full_article_content = article
        .and_then(full_article_content)
        .or_else(|| card.and_then(|c| c.binding("description")).map(str::to_string))
        .or_else(|| non_blank(Some(tweet_text.as_str())))
        .or_else(|| excerpt.clone())
        .unwrap_or_else(|| title.clone());

    let featured_image_url = article
        .and_then(|a| a.cover_image_url())
        .or_else(|| card.and_then(|c| CARD_IMAGE_KEYS.iter().find_map(|k| c.binding(k))))
        .or_else(|| first_tweet_photo(tweet))
        .map(str::to_string);

    let original_url = article
        .and_then(|a| a.url.as_deref())
        .filter(|u| is_http_url(u))
        .or_else(|| card.and_then(|c| c.binding("card_url")).filter(|u| is_http_url(u)))
        .or_else(|| first_external_link(tweet).filter(|u| is_http_url(u)))
        .map(str::to_string);

    let published_at = resolve_published_at(
        &tweet_id,
        created_at,
        article.and_then(|a| a.first_published_at_secs()),
    );

    let MediaUrls { images, videos } = article.map(media_urls).unwrap_or_default();

    let author_name = tweet.author_name().unwrap_or(&author_handle).to_string();

    let harvested = HarvestedArticle {
        article_url: format!("https://x.com/{author_handle}/status/{tweet_id}"),
        title,
        excerpt,
        author_avatar: tweet.author_avatar().map(str::to_string),
        author_name,
        author_handle,
        rest_id: article.and_then(|a| a.rest_id.clone()),
        tweet_id,
        original_url,
        published_at,
        featured_image_url,
        full_article_content,
        tweet_text,
        article_images: images,
        article_videos: videos,
        metrics: metrics(tweet),
        content_source: source,
    };

    harvested.validate()?;
    Ok(harvested)
}

fn resolve_title(tweet: &Tweet, card: Option<&Card>, tweet_text: &str) -> String {
    tweet
        .article_result()
        .and_then(|a| non_blank(a.title.as_deref()))
        .or_else(|| card.and_then(|c| c.binding("title")).map(str::to_string))
        .or_else(|| title_from_text(tweet_text))
        .unwrap_or_else(|| UNTITLED.to_string())
}

/// First non-empty line of the tweet, without t.co links, capped at 100 chars.
fn title_from_text(text: &str) -> Option<String> {
    text.lines()
        .map(|line| {
            line.split_whitespace()
                .filter(|w| !w.starts_with("https://t.co/"))
                .collect::<Vec<_>>()
                .join(" ")
        })
        .find(|line| !line.is_empty())
        .map(|line| truncate_chars(&line, TITLE_MAX_CHARS))
}

fn resolve_published_at(tweet_id: &str, created_at: &str, article_secs: Option<i64>) -> DateTime<Utc> {
    if let Some(parsed) = parse_twitter_date(created_at) {
        return parsed;
    }
    if let Some(ts) = article_secs.and_then(|s| Utc.timestamp_opt(s, 0).single()) {
        warn!(tweet_id, created_at, "Unparseable created_at, using article publish time");
        return ts;
    }
    warn!(tweet_id, created_at, "Unparseable created_at, using current time");
    Utc::now()
}

/// Parse Twitter's `created_at`, also accepting RFC 3339.
pub fn parse_twitter_date(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_str(raw.trim(), TWITTER_DATE_FORMAT)
        .or_else(|_| DateTime::parse_from_rfc3339(raw.trim()))
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

fn metrics(tweet: &Tweet) -> ArticleMetrics {
    let legacy = tweet.legacy.as_ref();
    let count = |m: Option<&rapidapi_client::Metric>| m.map_or(0, |m| m.value());
    ArticleMetrics {
        views: count(tweet.views.as_ref().and_then(|v| v.count.as_ref())),
        replies: count(legacy.and_then(|l| l.reply_count.as_ref())),
        retweets: count(legacy.and_then(|l| l.retweet_count.as_ref())),
        likes: count(legacy.and_then(|l| l.favorite_count.as_ref())),
        bookmarks: count(legacy.and_then(|l| l.bookmark_count.as_ref())),
    }
}

/// First link in the tweet that is not a link back to X itself.
fn first_external_link(tweet: &Tweet) -> Option<&str> {
    tweet
        .legacy
        .as_ref()?
        .entities
        .as_ref()?
        .urls
        .as_deref()?
        .iter()
        .filter_map(|u| non_empty(u.expanded_url.as_deref()).or_else(|| non_empty(u.url.as_deref())))
        .find(|u| !is_x_link(u))
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

fn is_x_link(raw: &str) -> bool {
    url::Url::parse(raw)
        .ok()
        .and_then(|u| u.host_str().map(str::to_lowercase))
        .is_some_and(|h| {
            matches!(
                h.as_str(),
                "x.com" | "www.x.com" | "twitter.com" | "www.twitter.com" | "mobile.twitter.com"
            )
        })
}

fn is_http_url(raw: &str) -> bool {
    url::Url::parse(raw).is_ok_and(|u| u.scheme() == "http" || u.scheme() == "https")
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect::<String>().trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;
    use serde_json::{json, Value};

    fn tweet(extra: Value) -> Tweet {
        let mut base = json!({
            "rest_id": "1700",
            "core": { "user_results": { "result": { "legacy": {
                "screen_name": "alice",
                "name": "Alice Liddell",
                "profile_image_url_https": "https://pbs/alice.jpg"
            }}}},
            "legacy": {
                "id_str": "1700",
                "full_text": "Read my new piece\nsecond line https://t.co/abc",
                "created_at": "Wed Oct 05 21:25:35 +0000 2022",
                "favorite_count": 12,
                "reply_count": "3",
                "retweet_count": 4,
                "bookmark_count": 1
            },
            "views": { "count": "1.5K" }
        });
        merge(&mut base, extra);
        serde_json::from_value(base).unwrap()
    }

    fn merge(base: &mut Value, extra: Value) {
        if let (Value::Object(b), Value::Object(e)) = (base, extra) {
            for (k, v) in e {
                match b.get_mut(&k) {
                    Some(existing @ Value::Object(_)) if v.is_object() => merge(existing, v),
                    _ => {
                        b.insert(k, v);
                    }
                }
            }
        }
    }

    #[test]
    fn structured_article_wins() {
        let t = tweet(json!({ "article": { "article_results": { "result": {
            "rest_id": "art-1",
            "title": "  The Real Title ",
            "preview_text": "Preview",
            "url": "https://example.com/post",
            "content_state": { "blocks": [{ "text": "Body one" }, { "text": "Body two" }] },
            "cover_media": { "media_info": { "original_img_url": "https://pbs/cover.jpg" } }
        }}}}));

        let a = harvest_article(&t).unwrap();
        assert_eq!(a.content_source, ContentSource::Article);
        assert_eq!(a.title, "The Real Title");
        assert_eq!(a.excerpt.as_deref(), Some("Preview"));
        assert_eq!(a.full_article_content, "Body one\n\nBody two");
        assert_eq!(a.featured_image_url.as_deref(), Some("https://pbs/cover.jpg"));
        assert_eq!(a.original_url.as_deref(), Some("https://example.com/post"));
        assert_eq!(a.rest_id.as_deref(), Some("art-1"));
        assert_eq!(a.article_url, "https://x.com/alice/status/1700");
        assert_eq!(a.author_name, "Alice Liddell");
        assert_eq!(a.author_avatar.as_deref(), Some("https://pbs/alice.jpg"));
        assert_eq!(a.published_at.year(), 2022);
    }

    #[test]
    fn card_fills_in_when_no_article() {
        let t = tweet(json!({ "card": { "legacy": { "binding_values": [
            { "key": "title", "value": { "string_value": "Card Headline" } },
            { "key": "description", "value": { "string_value": "Card summary" } },
            { "key": "card_url", "value": { "string_value": "https://blog.example.com/x" } },
            { "key": "thumbnail_image_large", "value": { "image_value": { "url": "https://pbs/thumb.jpg" } } }
        ]}}}));

        let a = harvest_article(&t).unwrap();
        assert_eq!(a.content_source, ContentSource::Card);
        assert_eq!(a.title, "Card Headline");
        assert_eq!(a.excerpt.as_deref(), Some("Card summary"));
        assert_eq!(a.full_article_content, "Card summary");
        assert_eq!(a.featured_image_url.as_deref(), Some("https://pbs/thumb.jpg"));
        assert_eq!(a.original_url.as_deref(), Some("https://blog.example.com/x"));
    }

    #[test]
    fn plain_tweet_uses_text() {
        let a = harvest_article(&tweet(json!({}))).unwrap();
        assert_eq!(a.content_source, ContentSource::Text);
        assert_eq!(a.title, "Read my new piece");
        assert_eq!(a.full_article_content, "Read my new piece\nsecond line https://t.co/abc");
        assert!(a.excerpt.as_deref().unwrap().starts_with("Read my new piece"));
    }

    #[test]
    fn empty_everything_still_has_title_and_content() {
        let t = tweet(json!({ "legacy": { "full_text": "" } }));
        let a = harvest_article(&t).unwrap();
        assert_eq!(a.title, UNTITLED);
        assert_eq!(a.full_article_content, UNTITLED);
        assert_eq!(a.excerpt, None);
    }

    #[test]
    fn link_only_tweet_falls_back_to_untitled() {
        let t = tweet(json!({ "legacy": { "full_text": "https://t.co/zzz" } }));
        let a = harvest_article(&t).unwrap();
        assert_eq!(a.title, UNTITLED);
        assert_eq!(a.full_article_content, "https://t.co/zzz");
    }

    #[test]
    fn long_text_title_is_capped() {
        let long = "word ".repeat(60);
        let t = tweet(json!({ "legacy": { "full_text": long } }));
        let a = harvest_article(&t).unwrap();
        assert!(a.title.chars().count() <= TITLE_MAX_CHARS);
        assert!(!a.title.ends_with(' '));
    }

    #[test]
    fn parses_metrics_in_all_shapes() {
        let a = harvest_article(&tweet(json!({}))).unwrap();
        assert_eq!(a.metrics.views, 1500);
        assert_eq!(a.metrics.likes, 12);
        assert_eq!(a.metrics.replies, 3);
        assert_eq!(a.metrics.retweets, 4);
        assert_eq!(a.metrics.bookmarks, 1);
    }

    #[test]
    fn author_name_falls_back_to_handle() {
        let t: Tweet = serde_json::from_value(json!({
            "legacy": {
                "id_str": "5",
                "created_at": "Wed Oct 05 21:25:35 +0000 2022",
                "user": { "screen_name": "bob" }
            }
        }))
        .unwrap();
        let a = harvest_article(&t).unwrap();
        assert_eq!(a.author_handle, "bob");
        assert_eq!(a.author_name, "bob");
    }

    #[test]
    fn blank_fields_fall_back_to_next_source() {
        let t = tweet(json!({
            "core": { "user_results": { "result": {
                "legacy": { "screen_name": "" },
                "core": { "screen_name": "carol" }
            }}},
            "legacy": { "id_str": "", "full_text": "", "text": "Short body" }
        }));

        let a = harvest_article(&t).unwrap();
        assert_eq!(a.tweet_id, "1700");
        assert_eq!(a.author_handle, "carol");
        assert_eq!(a.tweet_text, "Short body");
        assert_eq!(a.title, "Short body");
        assert_eq!(a.article_url, "https://x.com/carol/status/1700");
    }

    #[test]
    fn missing_required_fields_are_rejected() {
        let no_author: Tweet = serde_json::from_value(json!({
            "legacy": { "id_str": "5", "created_at": "Wed Oct 05 21:25:35 +0000 2022" }
        }))
        .unwrap();
        assert!(matches!(harvest_article(&no_author), Err(HarvestError::MissingAuthor(_))));

        let no_id: Tweet = serde_json::from_value(json!({})).unwrap();
        assert!(matches!(harvest_article(&no_id), Err(HarvestError::MissingId)));

        let no_date = tweet(json!({ "legacy": { "created_at": null } }));
        assert!(matches!(harvest_article(&no_date), Err(HarvestError::MissingCreatedAt(_))));
    }

    #[test]
    fn bad_date_uses_article_publish_time() {
        let t = tweet(json!({
            "legacy": { "created_at": "yesterday-ish" },
            "article_results": { "result": { "metadata": { "first_published_at_secs": 1_700_000_000 } } }
        }));
        let a = harvest_article(&t).unwrap();
        assert_eq!(a.published_at.timestamp(), 1_700_000_000);
    }

    #[test]
    fn external_link_becomes_original_url() {
        let t = tweet(json!({ "legacy": { "entities": { "urls": [
            { "url": "https://t.co/1", "expanded_url": "https://x.com/alice/status/1" },
            { "url": "https://t.co/2", "expanded_url": "https://news.example.org/story" }
        ]}}}));
        let a = harvest_article(&t).unwrap();
        assert_eq!(a.original_url.as_deref(), Some("https://news.example.org/story"));
    }

    #[test]
    fn blank_article_url_falls_back_to_card_url() {
        let t = tweet(json!({
            "article_results": { "result": { "title": "Piece", "url": "" } },
            "card": { "legacy": { "binding_values": [
                { "key": "card_url", "value": { "string_value": "https://blog.example.com/piece" } }
            ]}},
            "legacy": { "entities": { "urls": [
                { "url": "https://t.co/3", "expanded_url": "" }
            ]}}
        }));
        let a = harvest_article(&t).unwrap();
        assert_eq!(a.original_url.as_deref(), Some("https://blog.example.com/piece"));
    }

    #[test]
    fn same_payload_same_record() {
        let t = tweet(json!({ "card": { "legacy": { "binding_values": [
            { "key": "title", "value": { "string_value": "Stable" } }
        ]}}}));
        assert_eq!(harvest_article(&t).unwrap(), harvest_article(&t).unwrap());
    }

    #[test]
    fn tweet_record_flags_articles() {
        let plain = tweet_record(&tweet(json!({})), Some("L1")).unwrap();
        assert!(!plain.has_article);
        assert_eq!(plain.list_id.as_deref(), Some("L1"));

        let with_article = tweet(json!({ "article_results": { "result": { "rest_id": "a" } } }));
        assert!(tweet_record(&with_article, None).unwrap().has_article);
    }

    #[test]
    fn parses_twitter_and_rfc3339_dates() {
        let d = parse_twitter_date("Wed Oct 05 21:25:35 +0000 2022").unwrap();
        assert_eq!(d.to_rfc3339(), "2022-10-05T21:25:35+00:00");
        assert!(parse_twitter_date("2022-10-05T21:25:35Z").is_some());
        assert!(parse_twitter_date("not a date").is_none());
    }
}
