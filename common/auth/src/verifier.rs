use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::claims::Claims;
use crate::config::JwtConfig;
use crate::error::{AuthError, AuthResult};

/// Checks `user@domain` logins against HMAC-signed JWTs.
#[derive(Debug, Clone)]
pub struct JwtVerifier {
    config: JwtConfig,
}

impl JwtVerifier {
    pub fn new(config: JwtConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &JwtConfig {
        &self.config
    }

    /// Accept/reject decision for `login`. Every failure is logged and reads as `false`.
    pub fn verify(&self, login: &str, token: &str) -> bool {
        self.verify_at(login, token, Utc::now())
    }

    /// Same as [`verify`](Self::verify) with an explicit clock for the server-side expiration.
    pub fn verify_at(&self, login: &str, token: &str, now: DateTime<Utc>) -> bool {
        decision(login, &self.check_at(login, token, now))
    }

    pub fn check(&self, login: &str, token: &str) -> AuthResult<Claims> {
        self.check_at(login, token, Utc::now())
    }

    /// Full verification returning the reason of a rejection.
    pub fn check_at(&self, login: &str, token: &str, now: DateTime<Utc>) -> AuthResult<Claims> {
        let claims = self.decode_claims(token)?;
        self.check_validity_window(&claims, now)?;

        if let Some(lifetime) = self.config.expiration_seconds {
            self.check_server_expiration(&claims, lifetime, now)?;
        }

        if claims.audience_differs(self.config.audience.as_deref()) {
            return Err(AuthError::InvalidAudience);
        }

        match claims.get_str(&self.config.user_claim) {
            Some(user) if user == login => Ok(claims),
            Some(_) => Err(AuthError::UserMismatch),
            None => Err(AuthError::MissingClaim(self.config.user_claim.clone())),
        }
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(self.config.algorithm);
        validation.leeway = self.config.leeway_seconds;
        validation.validate_nbf = true;

        let mut required = Vec::new();
        if let Some(issuer) = &self.config.issuer {
            validation.set_issuer(&[issuer]);
            required.push("iss");
        }
        if let Some(audience) = &self.config.audience {
            validation.set_audience(&[audience]);
            required.push("aud");
        }
        validation.set_required_spec_claims(&required);
        validation
    }

    /// Decodes with each configured secret in turn, moving on only after a signature mismatch.
    fn decode_claims(&self, token: &str) -> AuthResult<Claims> {
        let validation = self.validation();
        let mut last_err = AuthError::InvalidSignature;

        for (attempt, secret) in self.config.candidate_secrets()?.into_iter().enumerate() {
            if attempt > 0 {
                info!("current jwt_secret is not working, trying the old one");
            }
            let key = DecodingKey::from_secret(secret.as_bytes());
            match decode::<Value>(token, &key, &validation) {
                Ok(data) => return Claims::try_from(data.claims),
                Err(err) => {
                    let err = AuthError::from(err);
                    if !err.is_signature_mismatch() {
                        return Err(err);
                    }
                    last_err = err;
                }
            }
        }

        Err(last_err)
    }

    /// `exp`/`nbf` again, covering fractional values the decoder does not read.
    fn check_validity_window(&self, claims: &Claims, now: DateTime<Utc>) -> AuthResult<()> {
        let leeway = i64::try_from(self.config.leeway_seconds).unwrap_or(i64::MAX);
        let now = now.timestamp();

        if let Some(exp) = claims.expires_at {
            if exp.timestamp() < now.saturating_sub(leeway) {
                return Err(AuthError::Expired);
            }
        }
        if let Some(nbf) = claims.not_before {
            if nbf.timestamp() > now.saturating_add(leeway) {
                return Err(AuthError::NotYetValid);
            }
        }
        Ok(())
    }

    fn check_server_expiration(
        &self,
        claims: &Claims,
        lifetime: u64,
        now: DateTime<Utc>,
    ) -> AuthResult<()> {
        let issued_at = claims
            .issued_at
            .ok_or_else(|| AuthError::MissingClaim("iat".to_string()))?
            .timestamp();
        let leeway = i64::try_from(self.config.leeway_seconds).unwrap_or(i64::MAX);
        let lifetime = i64::try_from(lifetime).unwrap_or(i64::MAX);
        let now = now.timestamp().saturating_add(leeway);

        if issued_at > now {
            return Err(AuthError::IssuedInFuture);
        }
        if now > issued_at.saturating_add(lifetime) {
            return Err(AuthError::ServerSideExpired);
        }
        Ok(())
    }
}

/// Collapses a verification outcome into the accept/reject answer, logging the reason.
pub fn decision(login: &str, outcome: &AuthResult<Claims>) -> bool {
    match outcome {
        Ok(_) => {
            debug!(login, "jwt auth accepted");
            true
        }
        Err(err @ AuthError::Internal(_)) => {
            error!(login, reason = err.reason(), "wrong auth for {login}: {err}");
            false
        }
        Err(err) => {
            warn!(login, reason = err.reason(), "wrong auth for {login}: {err}");
            false
        }
    }
}

/// One-shot form of [`JwtVerifier::verify`].
pub fn verify(login: &str, token: &str, config: &JwtConfig) -> bool {
    JwtVerifier::new(config.clone()).verify(login, token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
    use serde_json::json;

    const LOGIN: &str = "user@domain.ext";
    const APP: &str = "https://www.myapplication.com";

    fn sign(claims: &Value, secret: &str) -> String {
        sign_with(claims, secret, Algorithm::HS256)
    }

    fn sign_with(claims: &Value, secret: &str, algorithm: Algorithm) -> String {
        encode(
            &Header::new(algorithm),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .expect("sign token")
    }

    fn full_config() -> JwtConfig {
        JwtConfig::new("SECRET")
            .with_user_claim("jid")
            .with_secret_old("OLDSECRET")
            .with_issuer(APP)
            .with_audience(APP)
            .with_expiration(86_400)
            .with_leeway(10)
    }

    fn full_claims() -> Value {
        let now = Utc::now().timestamp();
        json!({
            "iss": APP,
            "aud": APP,
            "exp": now + 10,
            "iat": now,
            "nbf": now,
            "jid": LOGIN,
        })
    }

    #[test]
    fn missing_secret_rejects_everything() {
        let verifier = JwtVerifier::new(JwtConfig::default());
        let token = sign(&json!({"sub": LOGIN}), "SECRET");
        assert!(!verifier.verify(LOGIN, &token));
        assert!(matches!(
            verifier.check(LOGIN, &token),
            Err(AuthError::MissingSecret)
        ));
    }

    #[test]
    fn simple_token_is_accepted() {
        let verifier = JwtVerifier::new(JwtConfig::new("SECRET"));
        let token = sign(&json!({"sub": LOGIN}), "SECRET");
        assert!(verifier.verify(LOGIN, &token));
    }

    #[test]
    fn other_login_is_rejected() {
        let verifier = JwtVerifier::new(JwtConfig::new("SECRET"));
        let token = sign(&json!({"sub": LOGIN}), "SECRET");
        assert!(matches!(
            verifier.check("user2@domain.ext", &token),
            Err(AuthError::UserMismatch)
        ));
    }

    #[test]
    fn unknown_secret_is_rejected() {
        let verifier = JwtVerifier::new(JwtConfig::new("SECRET").with_secret_old("OLDSECRET"));
        let token = sign(&json!({"sub": LOGIN}), "BADSECRET");
        assert!(matches!(
            verifier.check(LOGIN, &token),
            Err(AuthError::InvalidSignature)
        ));
    }

    #[test]
    fn custom_user_claim() {
        let verifier = JwtVerifier::new(JwtConfig::new("SECRET").with_user_claim("jid"));
        let jid_token = sign(&json!({"jid": LOGIN}), "SECRET");
        assert!(verifier.verify(LOGIN, &jid_token));

        let sub_token = sign(&json!({"sub": LOGIN}), "SECRET");
        assert!(matches!(
            verifier.check(LOGIN, &sub_token),
            Err(AuthError::MissingClaim(claim)) if claim == "jid"
        ));
    }

    #[test]
    fn full_config_accepts_current_and_old_secret() {
        let verifier = JwtVerifier::new(full_config());
        assert!(verifier.verify(LOGIN, &sign(&full_claims(), "SECRET")));
        assert!(verifier.verify(LOGIN, &sign(&full_claims(), "OLDSECRET")));
    }

    #[test]
    fn old_secret_still_enforces_claims() {
        let verifier = JwtVerifier::new(full_config());
        let mut claims = full_claims();
        claims["exp"] = json!(Utc::now().timestamp() - 11);
        assert!(matches!(
            verifier.check(LOGIN, &sign(&claims, "OLDSECRET")),
            Err(AuthError::Expired)
        ));
    }

    #[test]
    fn wrong_issuer_is_rejected() {
        let verifier = JwtVerifier::new(full_config());
        let mut claims = full_claims();
        claims["iss"] = json!("bad_iss");
        assert!(matches!(
            verifier.check(LOGIN, &sign(&claims, "SECRET")),
            Err(AuthError::InvalidIssuer)
        ));
    }

    #[test]
    fn wrong_audience_is_rejected() {
        let verifier = JwtVerifier::new(full_config());
        let mut claims = full_claims();
        claims["aud"] = json!("bad_aud");
        assert!(matches!(
            verifier.check(LOGIN, &sign(&claims, "SECRET")),
            Err(AuthError::InvalidAudience)
        ));
    }

    #[test]
    fn configured_issuer_and_audience_are_mandatory() {
        let verifier = JwtVerifier::new(full_config());
        let mut claims = full_claims();
        claims.as_object_mut().expect("object").remove("aud");
        assert!(!verifier.verify(LOGIN, &sign(&claims, "SECRET")));

        let mut claims = full_claims();
        claims.as_object_mut().expect("object").remove("iss");
        assert!(!verifier.verify(LOGIN, &sign(&claims, "SECRET")));
    }

    #[test]
    fn audience_without_configured_audience_is_rejected() {
        let verifier = JwtVerifier::new(JwtConfig::new("SECRET"));
        let token = sign(&json!({"sub": LOGIN, "aud": APP}), "SECRET");
        assert!(matches!(
            verifier.check(LOGIN, &token),
            Err(AuthError::InvalidAudience)
        ));
    }

    #[test]
    fn expired_beyond_leeway_is_rejected() {
        let verifier = JwtVerifier::new(full_config());
        let mut claims = full_claims();
        claims["exp"] = json!(Utc::now().timestamp() - 11);
        assert!(matches!(
            verifier.check(LOGIN, &sign(&claims, "SECRET")),
            Err(AuthError::Expired)
        ));
    }

    #[test]
    fn expired_within_leeway_is_accepted() {
        let verifier = JwtVerifier::new(JwtConfig::new("SECRET").with_leeway(60));
        let token = sign(
            &json!({"sub": LOGIN, "exp": Utc::now().timestamp() - 5}),
            "SECRET",
        );
        assert!(verifier.verify(LOGIN, &token));
    }

    #[test]
    fn iat_in_future_is_rejected() {
        let verifier = JwtVerifier::new(full_config());
        let mut claims = full_claims();
        claims["iat"] = json!(Utc::now().timestamp() + 11);
        assert!(matches!(
            verifier.check(LOGIN, &sign(&claims, "SECRET")),
            Err(AuthError::IssuedInFuture)
        ));
    }

    #[test]
    fn nbf_in_future_is_rejected() {
        let verifier = JwtVerifier::new(full_config());
        let mut claims = full_claims();
        claims["nbf"] = json!(Utc::now().timestamp() + 11);
        assert!(matches!(
            verifier.check(LOGIN, &sign(&claims, "SECRET")),
            Err(AuthError::NotYetValid)
        ));
    }

    #[test]
    fn nbf_within_leeway_is_accepted() {
        let verifier = JwtVerifier::new(JwtConfig::new("SECRET"));
        let token = sign(
            &json!({"sub": LOGIN, "nbf": Utc::now().timestamp() + 5}),
            "SECRET",
        );
        assert!(verifier.verify(LOGIN, &token));
    }

    #[test]
    fn iat_slightly_ahead_is_accepted_with_server_expiration() {
        let verifier = JwtVerifier::new(JwtConfig::new("SECRET").with_expiration(3600));
        let token = sign(
            &json!({"sub": LOGIN, "iat": Utc::now().timestamp() + 5}),
            "SECRET",
        );
        assert!(verifier.verify(LOGIN, &token));
    }

    #[test]
    fn string_exp_is_rejected() {
        let verifier = JwtVerifier::new(JwtConfig::new("SECRET"));
        for exp in ["2001-01-01T00:00:00Z", "978307200"] {
            let token = sign(&json!({"sub": LOGIN, "exp": exp}), "SECRET");
            assert!(!verifier.verify(LOGIN, &token));
            assert!(matches!(
                verifier.check(LOGIN, &token),
                Err(AuthError::InvalidClaim("exp", _))
            ));
        }
    }

    #[test]
    fn string_nbf_is_rejected() {
        let verifier = JwtVerifier::new(JwtConfig::new("SECRET"));
        let token = sign(
            &json!({"sub": LOGIN, "nbf": "2999-01-01T00:00:00Z"}),
            "SECRET",
        );
        assert!(!verifier.verify(LOGIN, &token));
        assert!(matches!(
            verifier.check(LOGIN, &token),
            Err(AuthError::InvalidClaim("nbf", _))
        ));
    }

    #[test]
    fn fractional_exp_in_the_past_is_rejected() {
        let verifier = JwtVerifier::new(JwtConfig::new("SECRET"));
        let exp = (Utc::now().timestamp() - 60) as f64 + 0.5;
        let token = sign(&json!({"sub": LOGIN, "exp": exp}), "SECRET");
        assert!(matches!(
            verifier.check(LOGIN, &token),
            Err(AuthError::Expired)
        ));
    }

    #[test]
    fn null_audience_reads_as_absent() {
        let verifier = JwtVerifier::new(JwtConfig::new("SECRET"));
        let token = sign(&json!({"sub": LOGIN, "aud": null}), "SECRET");
        assert!(verifier.verify(LOGIN, &token));
    }

    #[test]
    fn server_side_expiration_requires_iat() {
        let verifier = JwtVerifier::new(JwtConfig::new("SECRET").with_expiration(3600));
        let token = sign(&json!({"sub": LOGIN}), "SECRET");
        assert!(matches!(
            verifier.check(LOGIN, &token),
            Err(AuthError::MissingClaim(claim)) if claim == "iat"
        ));
    }

    #[test]
    fn server_side_expiration_overrides_live_exp() {
        let verifier = JwtVerifier::new(
            JwtConfig::new("SECRET")
                .with_expiration(60)
                .with_leeway(10),
        );
        let now = Utc::now().timestamp();
        let token = sign(
            &json!({"sub": LOGIN, "iat": now - 3600, "exp": now + 3600}),
            "SECRET",
        );
        assert!(matches!(
            verifier.check(LOGIN, &token),
            Err(AuthError::ServerSideExpired)
        ));
    }

    #[test]
    fn server_side_expiration_boundary_counts_leeway() {
        let verifier = JwtVerifier::new(
            JwtConfig::new("SECRET")
                .with_expiration(100)
                .with_leeway(10),
        );
        let issued = Utc::now() - Duration::seconds(1000);
        let token = sign(
            &json!({"sub": LOGIN, "iat": issued.timestamp()}),
            "SECRET",
        );

        let last_accepted = issued + Duration::seconds(90);
        assert!(verifier.verify_at(LOGIN, &token, last_accepted));
        assert!(!verifier.verify_at(LOGIN, &token, last_accepted + Duration::seconds(1)));
        assert!(!verifier.verify_at(LOGIN, &token, issued + Duration::seconds(111)));
    }

    #[test]
    fn non_numeric_iat_collapses_to_rejection() {
        let verifier = JwtVerifier::new(JwtConfig::new("SECRET"));
        let token = sign(&json!({"sub": LOGIN, "iat": "now"}), "SECRET");
        assert!(!verifier.verify(LOGIN, &token));
    }

    #[test]
    fn algorithm_mismatch_is_rejected() {
        let verifier = JwtVerifier::new(JwtConfig::new("SECRET"));
        let token = sign_with(&json!({"sub": LOGIN}), "SECRET", Algorithm::HS512);
        assert!(matches!(
            verifier.check(LOGIN, &token),
            Err(AuthError::Malformed(_))
        ));
    }

    #[test]
    fn garbage_token_is_rejected() {
        let verifier = JwtVerifier::new(JwtConfig::new("SECRET").with_secret_old("OLD"));
        assert!(!verifier.verify(LOGIN, "not-a-jwt"));
        assert!(!verifier.verify(LOGIN, ""));
    }

    #[test]
    fn verification_is_idempotent() {
        let config = full_config();
        let good = sign(&full_claims(), "OLDSECRET");
        let bad = sign(&full_claims(), "WRONG");
        let now = Utc::now();
        let verifier = JwtVerifier::new(config.clone());
        assert_eq!(
            verifier.verify_at(LOGIN, &good, now),
            verifier.verify_at(LOGIN, &good, now)
        );
        assert!(verify(LOGIN, &good, &config));
        assert!(!verify(LOGIN, &bad, &config));
        assert!(!verify(LOGIN, &bad, &config));
    }
}
