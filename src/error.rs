#[derive(Debug, thiserror::Error)]
pub enum BazaarError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Catalogue error: {0}")]
    Api(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Purchase failed: {0}")]
    Purchase(String),

    #[error("Purchasing is disabled in the settings")]
    PurchasingDisabled,

    #[error("Not available for purchase: {0}")]
    NotPurchasable(String),

    #[error("Not downloadable: {0}")]
    NotDownloadable(String),

    #[error("Install failed: {0}")]
    Install(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

pub type Result<T> = std::result::Result<T, BazaarError>;
