pub mod config;
pub mod error;
pub mod slug;
pub mod types;

pub use config::Config;
pub use error::XarticleError;
pub use slug::{article_slug, slug_suffix, slugify};
pub use types::*;
