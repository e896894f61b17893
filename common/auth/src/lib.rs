pub mod claims;
pub mod config;
pub mod error;
pub mod verifier;

pub use claims::Claims;
pub use config::{ensure_hmac, JwtConfig, DEFAULT_LEEWAY_SECONDS, DEFAULT_USER_CLAIM};
pub use error::{AuthError, AuthResult};
pub use jsonwebtoken::Algorithm;
pub use verifier::{decision, verify, JwtVerifier};
