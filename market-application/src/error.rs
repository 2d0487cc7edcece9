use market_domain::error::DomainError;

#[non_exhaustive]
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("domain: {0}")]
    Domain(#[source] DomainError),

    #[error("validation: {0}")]
    Validation(String),

    #[error("authorization: {0}")]
    Authorization(String),

    #[error("auction not found: {0}")]
    AuctionNotFound(String),

    #[error("infra: {0}")]
    Infra(String),
}

pub type AppResult<T> = Result<T, AppError>;

/// 领域错误按类别归入调用方可区分的应用错误
impl From<DomainError> for AppError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Unauthorized { actor, owner } => {
                Self::Authorization(format!("{actor} is not the seller ({owner})"))
            }
            DomainError::NotFound { reason } => Self::AuctionNotFound(reason),
            DomainError::InvalidArgument { reason } | DomainError::InvalidValue { reason } => {
                Self::Validation(reason)
            }
            err if err.is_transient() => Self::Infra(err.to_string()),
            err => Self::Domain(err),
        }
    }
}
