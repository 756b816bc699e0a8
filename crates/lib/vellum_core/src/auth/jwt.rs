//! JWT generation and verification.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::{Error as JwtLibError, ErrorKind};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, decode_header, encode};
use serde_json::{Map, Value};
use tracing::warn;

use super::jwks::JwksCache;
use super::{JwtError, RejectReason, TokenRejection};
use crate::config::OAuthConfig;

/// Verified claim set.
pub type Claims = Map<String, Value>;

/// Clock skew tolerated on `exp`, `nbf` and `iat`.
pub const LEEWAY_SECS: u64 = 300;

const REQUIRED_CLAIMS: [&str; 5] = ["exp", "iat", "iss", "aud", "sub"];

/// Signs internal access tokens and verifies both internal and identity
/// provider tokens.
pub struct JwtHelper {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    algorithm: Algorithm,
    issuer: String,
    ttl: Duration,
    idp_issuer: String,
    idp_algorithm: Algorithm,
    jwks: JwksCache,
}

impl JwtHelper {
    pub fn new(config: &OAuthConfig, http: reqwest::Client) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            algorithm: config.jwt_algorithm,
            issuer: config.jwt_issuer.clone(),
            ttl: Duration::seconds(config.access_token_ttl_secs()),
            idp_issuer: config.idp_issuer.clone(),
            idp_algorithm: config.idp_algorithm,
            jwks: JwksCache::new(config.idp_jwks_url.clone(), http),
        }
    }

    /// Sign `payload` with the internal secret, adding `exp`, `iat`, `iss` and `aud`.
    pub fn generate_internal_token(&self, payload: &Claims, audience: &str) -> Result<String, JwtError> {
        self.generate_internal_token_at(payload, audience, Utc::now())
    }

    pub(crate) fn generate_internal_token_at(
        &self,
        payload: &Claims,
        audience: &str,
        issued_at: DateTime<Utc>,
    ) -> Result<String, JwtError> {
        let mut claims = payload.clone();
        claims.insert("exp".into(), Value::from((issued_at + self.ttl).timestamp()));
        claims.insert("iat".into(), Value::from(issued_at.timestamp()));
        claims.insert("iss".into(), Value::from(self.issuer.clone()));
        claims.insert("aud".into(), Value::from(audience));

        encode(&Header::new(self.algorithm), &claims, &self.encoding_key)
            .map_err(|e| JwtError::Signing(format!("jwt encode: {e}")))
    }

    /// Verify a token minted by [`generate_internal_token`](Self::generate_internal_token).
    pub fn verify_internal_token(&self, token: &str, audience: &str) -> Result<Claims, TokenRejection> {
        verify_token(token, &self.decoding_key, self.algorithm, audience, &self.issuer)
            .inspect_err(|rejection| log_rejection("internal", rejection))
    }

    /// Verify an identity-provider token against the provider key set.
    ///
    /// The signing key is located by the token's `kid` header. Failing to
    /// fetch the key set is reported separately from token rejection.
    pub async fn verify_external_token(&self, token: &str, audience: &str) -> Result<Claims, JwtError> {
        let result = self.verify_external(token, audience).await;
        if let Err(JwtError::Rejected(rejection)) = &result {
            log_rejection("external", rejection);
        }
        result
    }

    async fn verify_external(&self, token: &str, audience: &str) -> Result<Claims, JwtError> {
        let header = decode_header(token).map_err(|e| reject(&e))?;
        let kid = header
            .kid
            .ok_or_else(|| TokenRejection::new(RejectReason::MissingKeyId, "token header has no kid"))?;

        let keys = self.jwks.get().await?;
        let jwk = keys.find(&kid).ok_or_else(|| {
            TokenRejection::new(RejectReason::UnknownKey, format!("no key with kid '{kid}'"))
        })?;
        let key = DecodingKey::from_jwk(jwk).map_err(|e| {
            TokenRejection::new(RejectReason::UnknownKey, format!("unusable key '{kid}': {e}"))
        })?;

        Ok(verify_token(token, &key, self.idp_algorithm, audience, &self.idp_issuer)?)
    }
}

impl std::fmt::Debug for JwtHelper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtHelper")
            .field("algorithm", &self.algorithm)
            .field("issuer", &self.issuer)
            .field("idp_issuer", &self.idp_issuer)
            .field("idp_algorithm", &self.idp_algorithm)
            .field("jwks_url", &self.jwks.url())
            .finish_non_exhaustive()
    }
}

fn verify_token(
    token: &str,
    key: &DecodingKey,
    algorithm: Algorithm,
    audience: &str,
    issuer: &str,
) -> Result<Claims, TokenRejection> {
    let mut validation = Validation::new(algorithm);
    validation.leeway = LEEWAY_SECS;
    validation.validate_nbf = true;
    validation.set_required_spec_claims(&REQUIRED_CLAIMS);
    validation.set_audience(&[audience]);
    validation.set_issuer(&[issuer]);

    let claims = decode::<Claims>(token, key, &validation)
        .map_err(|e| reject(&e))?
        .claims;

    // The library does not enforce `iat`.
    check_issued_at(&claims, Utc::now().timestamp())?;
    Ok(claims)
}

fn check_issued_at(claims: &Claims, now: i64) -> Result<(), TokenRejection> {
    let iat = claims
        .get("iat")
        .ok_or_else(|| TokenRejection::new(RejectReason::MissingClaim("iat".into()), "iat is required"))?;
    let iat = iat
        .as_i64()
        .ok_or_else(|| TokenRejection::new(RejectReason::Malformed, "iat must be an integer"))?;
    if iat > now + LEEWAY_SECS as i64 {
        return Err(TokenRejection::new(RejectReason::Immature, "iat is in the future"));
    }
    Ok(())
}

fn reject(e: &JwtLibError) -> TokenRejection {
    let reason = match e.kind() {
        ErrorKind::ExpiredSignature => RejectReason::Expired,
        ErrorKind::InvalidAudience => RejectReason::InvalidAudience,
        ErrorKind::InvalidIssuer => RejectReason::InvalidIssuer,
        ErrorKind::InvalidSignature => RejectReason::InvalidSignature,
        ErrorKind::MissingRequiredClaim(claim) => RejectReason::MissingClaim(claim.clone()),
        ErrorKind::ImmatureSignature => RejectReason::Immature,
        _ => RejectReason::Malformed,
    };
    TokenRejection::new(reason, e.to_string())
}

fn log_rejection(kind: &str, rejection: &TokenRejection) {
    warn!(
        token = kind,
        reason = %rejection.reason,
        detail = %rejection.detail,
        "Token rejected"
    );
}
