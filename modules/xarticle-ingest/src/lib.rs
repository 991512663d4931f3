pub mod error;
pub mod extractor;
pub mod harvest;
pub mod pipeline;
pub mod short_url;
pub mod store;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
pub mod traits;
pub mod tweet_ref;

pub use error::{HarvestError, StoreError};
pub use harvest::{harvest_article, parse_twitter_date};
pub use pipeline::{ExpandReport, IngestOptions, IngestReport, Ingestor, ListReport};
pub use short_url::{is_short_url, ShortUrlExpander};
pub use store::{ArticleStore, ShortUrlRow};
pub use traits::{ArticleSink, TweetSource, UrlExpander};
pub use tweet_ref::parse_tweet_ref;
