use thiserror::Error;

#[derive(Error, Debug)]
pub enum CantinaError {
    #[error("Wallet is blocked for purchases")]
    WalletBlocked,
    #[error("Insufficient balance: {0}")]
    InsufficientBalance(String),
    #[error("Credit limit exceeded, wallet blocked")]
    CreditLimitExceeded,
    #[error("Permission denied: {0}")]
    Permission(String),
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Remote error: {message}")]
    Remote {
        message: String,
        code: Option<String>,
    },
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Config error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, CantinaError>;

impl CantinaError {
    /// HTTP-style status reported by the batch jobs.
    pub fn status_code(&self) -> u16 {
        match self {
            CantinaError::ValidationError(_) => 400,
            CantinaError::Unauthorized(_) => 401,
            CantinaError::Permission(_) => 403,
            CantinaError::NotFound(_) => 404,
            CantinaError::WalletBlocked => 409,
            CantinaError::InsufficientBalance(_) | CantinaError::CreditLimitExceeded => 422,
            CantinaError::Remote { .. } | CantinaError::Http(_) => 502,
            CantinaError::Json(_)
            | CantinaError::CsvError(_)
            | CantinaError::IoError(_)
            | CantinaError::Config(_) => 500,
        }
    }

    /// Machine-readable code forwarded by the backend, if any.
    pub fn remote_code(&self) -> Option<&str> {
        match self {
            CantinaError::Remote { code, .. } => code.as_deref(),
            _ => None,
        }
    }
}
