use jsonwebtoken::errors::ErrorKind;
use thiserror::Error;

pub type AuthResult<T> = Result<T, AuthError>;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("no jwt_secret configured")]
    MissingSecret,
    #[error("unsupported algorithm '{0}', only HS256/HS384/HS512 are allowed")]
    UnsupportedAlgorithm(String),
    #[error("wrong credentials: invalid signature")]
    InvalidSignature,
    #[error("malformed token: {0}")]
    Malformed(String),
    #[error("expired")]
    Expired,
    #[error("expired because of server-side expiration")]
    ServerSideExpired,
    #[error("token not yet valid (nbf)")]
    NotYetValid,
    #[error("iat claim is in the future")]
    IssuedInFuture,
    #[error("invalid issuer")]
    InvalidIssuer,
    #[error("invalid audience")]
    InvalidAudience,
    #[error("missing '{0}' in the payload")]
    MissingClaim(String),
    #[error("invalid claim '{0}' with value '{1}'")]
    InvalidClaim(&'static str, String),
    #[error("wrong user")]
    UserMismatch,
    #[error("unhandled verification failure: {0}")]
    Internal(String),
}

impl AuthError {
    /// Stable label used for logs and metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            AuthError::MissingSecret | AuthError::UnsupportedAlgorithm(_) => "config",
            AuthError::InvalidSignature => "signature",
            AuthError::Malformed(_) => "malformed",
            AuthError::Expired => "expired",
            AuthError::ServerSideExpired => "server_expired",
            AuthError::NotYetValid => "not_yet_valid",
            AuthError::IssuedInFuture => "iat_future",
            AuthError::InvalidIssuer => "issuer",
            AuthError::InvalidAudience => "audience",
            AuthError::MissingClaim(_) => "missing_claim",
            AuthError::InvalidClaim(_, _) => "invalid_claim",
            AuthError::UserMismatch => "user",
            AuthError::Internal(_) => "internal",
        }
    }

    /// Failures that are worth retrying with the next candidate secret.
    pub fn is_signature_mismatch(&self) -> bool {
        matches!(self, AuthError::InvalidSignature)
    }
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(value: jsonwebtoken::errors::Error) -> Self {
        match value.kind() {
            ErrorKind::InvalidSignature => Self::InvalidSignature,
            ErrorKind::ExpiredSignature => Self::Expired,
            ErrorKind::ImmatureSignature => Self::NotYetValid,
            ErrorKind::InvalidIssuer => Self::InvalidIssuer,
            ErrorKind::InvalidAudience => Self::InvalidAudience,
            ErrorKind::MissingRequiredClaim(claim) => Self::MissingClaim(claim.clone()),
            ErrorKind::InvalidToken
            | ErrorKind::InvalidAlgorithm
            | ErrorKind::MissingAlgorithm
            | ErrorKind::InvalidAlgorithmName
            | ErrorKind::Base64(_)
            | ErrorKind::Json(_)
            | ErrorKind::Utf8(_) => Self::Malformed(value.to_string()),
            _ => Self::Internal(value.to_string()),
        }
    }
}
