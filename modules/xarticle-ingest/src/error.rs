use xarticle_common::XarticleError;

/// Why a tweet could not be turned into an article.
#[derive(Debug, thiserror::Error)]
pub enum HarvestError {
    #[error("Tweet has no id")]
    MissingId,

    #[error("Tweet {0} has no author handle")]
    MissingAuthor(String),

    #[error("Tweet {0} has no created_at")]
    MissingCreatedAt(String),

    #[error(transparent)]
    Invalid(#[from] XarticleError),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Unknown list: {0}")]
    UnknownList(String),
}
