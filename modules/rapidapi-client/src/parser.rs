// Response walkers for timeline and tweet-detail payloads. Responses are
// navigated as raw JSON because the container shapes shift between
// endpoints; only the tweet objects themselves are decoded into types.

use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::types::Tweet;

/// Extract all decodable tweets from a list-timeline response.
///
/// Handles plain timeline items and module entries (conversation threads).
/// Tweets that fail to decode are logged and skipped.
pub fn extract_tweets(response: &Value) -> Vec<Tweet> {
    let mut tweets = Vec::new();

    for instruction in instructions(response, "/result/timeline/instructions") {
        let Some(entries) = instruction.get("entries").and_then(Value::as_array) else {
            continue;
        };

        for entry in entries {
            let Some(content) = entry.get("content") else {
                continue;
            };

            if let Some(raw) = content.pointer("/itemContent/tweet_results/result") {
                push_decoded(&mut tweets, raw, entry);
            }

            if let Some(items) = content.get("items").and_then(Value::as_array) {
                for item in items {
                    if let Some(raw) = item.pointer("/item/itemContent/tweet_results/result") {
                        push_decoded(&mut tweets, raw, entry);
                    }
                }
            }
        }
    }

    tweets
}

/// Bottom cursor for the next timeline page, if any.
pub fn extract_next_cursor(response: &Value) -> Option<String> {
    for instruction in instructions(response, "/result/timeline/instructions") {
        if instruction.get("type").and_then(Value::as_str) != Some("TimelineAddEntries") {
            continue;
        }
        let Some(entries) = instruction.get("entries").and_then(Value::as_array) else {
            continue;
        };
        for entry in entries {
            let Some(content) = entry.get("content") else {
                continue;
            };
            let is_cursor =
                content.get("entryType").and_then(Value::as_str) == Some("TimelineTimelineCursor");
            let is_bottom = content.get("cursorType").and_then(Value::as_str) == Some("Bottom");
            if is_cursor && is_bottom {
                if let Some(value) = content.get("value").and_then(Value::as_str) {
                    return Some(value.to_string());
                }
            }
        }
    }

    // Some endpoints hoist the cursor out of the timeline.
    match response.get("cursor") {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(Value::Object(obj)) => obj
            .get("bottom")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        _ => None,
    }
}

/// Pull the focal tweet out of a tweet-detail response.
///
/// Tries the `tweet-v2` shape, then the threaded conversation shape, then the
/// legacy `result.tweet_results` shape.
pub fn parse_tweet_detail(response: &Value) -> Option<Tweet> {
    let raw = response
        .pointer("/result/tweetResult/result")
        .or_else(|| first_conversation_tweet(response))
        .or_else(|| response.pointer("/result/tweet_results/result"))?;

    let raw = unwrap_visibility(raw);
    match Tweet::deserialize(raw) {
        Ok(tweet) => Some(tweet),
        Err(e) => {
            warn!(error = %e, "Failed to decode tweet detail");
            None
        }
    }
}

fn first_conversation_tweet(response: &Value) -> Option<&Value> {
    instructions(
        response,
        "/data/threaded_conversation_with_injections_v2/instructions",
    )
    .filter(|i| i.get("type").and_then(Value::as_str) == Some("TimelineAddEntries"))
    .filter_map(|i| i.get("entries").and_then(Value::as_array))
    .flatten()
    .find_map(|entry| entry.pointer("/content/itemContent/tweet_results/result"))
}

fn instructions<'a>(response: &'a Value, pointer: &str) -> impl Iterator<Item = &'a Value> {
    response
        .pointer(pointer)
        .and_then(Value::as_array)
        .map(|a| a.iter())
        .into_iter()
        .flatten()
}

/// Tweets with limited visibility are wrapped: `{ "__typename": "TweetWithVisibilityResults", "tweet": {...} }`.
fn unwrap_visibility(raw: &Value) -> &Value {
    if raw.get("__typename").and_then(Value::as_str) == Some("TweetWithVisibilityResults") {
        if let Some(inner) = raw.get("tweet") {
            return inner;
        }
    }
    raw
}

fn push_decoded(tweets: &mut Vec<Tweet>, raw: &Value, entry: &Value) {
    let raw = unwrap_visibility(raw);
    // Tombstones and unavailable tweets carry no body.
    if raw.get("__typename").and_then(Value::as_str) == Some("TweetTombstone") {
        return;
    }
    match Tweet::deserialize(raw) {
        Ok(tweet) => tweets.push(tweet),
        Err(e) => {
            let entry_id = entry.get("entryId").and_then(Value::as_str).unwrap_or("?");
            warn!(entry_id, error = %e, "Failed to decode timeline tweet");
        }
    }
}
