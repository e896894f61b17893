use jsonwebtoken::Algorithm;

use crate::error::{AuthError, AuthResult};

pub const DEFAULT_USER_CLAIM: &str = "sub";
pub const DEFAULT_LEEWAY_SECONDS: u64 = 10;

/// Runtime configuration for JWT verification.
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// Current signing secret. Without it every token is rejected.
    pub secret: Option<String>,
    /// Previous signing secret, tried when the current one fails on the signature.
    pub secret_old: Option<String>,
    pub algorithm: Algorithm,
    /// Expected issuer claim (iss).
    pub issuer: Option<String>,
    /// Expected audience claim (aud).
    pub audience: Option<String>,
    /// Claim compared against the `user@domain` login.
    pub user_claim: String,
    /// Server-side token lifetime counted from `iat`, on top of `exp`.
    pub expiration_seconds: Option<u64>,
    /// Allowable clock skew in seconds when validating exp/nbf/iat.
    pub leeway_seconds: u64,
}

impl JwtConfig {
    /// Construct config for a single secret with defaults (HS256, `sub`, 10 second leeway).
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: Some(secret.into()),
            ..Self::default()
        }
    }

    pub fn with_secret_old(mut self, secret: impl Into<String>) -> Self {
        self.secret_old = Some(secret.into());
        self
    }

    pub fn with_algorithm(mut self, algorithm: Algorithm) -> AuthResult<Self> {
        ensure_hmac(algorithm)?;
        self.algorithm = algorithm;
        Ok(self)
    }

    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = Some(audience.into());
        self
    }

    pub fn with_user_claim(mut self, claim: impl Into<String>) -> Self {
        self.user_claim = claim.into();
        self
    }

    pub fn with_expiration(mut self, seconds: u64) -> Self {
        self.expiration_seconds = Some(seconds);
        self
    }

    /// Adjust the allowed leeway.
    pub fn with_leeway(mut self, seconds: u64) -> Self {
        self.leeway_seconds = seconds;
        self
    }

    /// Secrets in the order they are tried.
    pub fn candidate_secrets(&self) -> AuthResult<Vec<&str>> {
        let primary = self.secret.as_deref().ok_or(AuthError::MissingSecret)?;
        let mut secrets = vec![primary];
        if let Some(old) = self.secret_old.as_deref() {
            secrets.push(old);
        }
        Ok(secrets)
    }
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            secret: None,
            secret_old: None,
            algorithm: Algorithm::HS256,
            issuer: None,
            audience: None,
            user_claim: DEFAULT_USER_CLAIM.to_string(),
            expiration_seconds: None,
            leeway_seconds: DEFAULT_LEEWAY_SECONDS,
        }
    }
}

/// Only shared-secret algorithms can be verified from a configured secret.
pub fn ensure_hmac(algorithm: Algorithm) -> AuthResult<()> {
    match algorithm {
        Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => Ok(()),
        other => Err(AuthError::UnsupportedAlgorithm(format!("{other:?}"))),
    }
}
