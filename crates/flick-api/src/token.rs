use std::fmt;

use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use thiserror::Error;

use flick_types::api::Claims;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token signing failed: {0}")]
    Signing(jsonwebtoken::errors::Error),

    #[error("token rejected: {0}")]
    Invalid(jsonwebtoken::errors::Error),

    #[error("token subject is not a positive user id")]
    MalformedSubject,

    #[error("token lifetime overflows the expiry timestamp")]
    ExpiryOverflow,
}

#[derive(Clone)]
pub struct TokenSettings {
    pub secret: Vec<u8>,
    pub issuer: String,
    pub audience: String,
    pub ttl: Duration,
}

/// Profile fields embedded into an issued token.
#[derive(Debug, Clone)]
pub struct TokenSubject<'a> {
    pub user_id: i64,
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub pfp_url: Option<&'a str>,
}

/// HS512 signer/verifier. Built once at startup from the configured secret.
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    issuer: String,
    audience: String,
    ttl: Duration,
}

impl TokenService {
    pub fn new(settings: TokenSettings) -> Self {
        let mut validation = Validation::new(Algorithm::HS512);
        validation.set_issuer(&[settings.issuer.as_str()]);
        validation.set_audience(&[settings.audience.as_str()]);
        validation.set_required_spec_claims(&["exp", "sub", "iss", "aud"]);

        Self {
            encoding: EncodingKey::from_secret(&settings.secret),
            decoding: DecodingKey::from_secret(&settings.secret),
            validation,
            issuer: settings.issuer,
            audience: settings.audience,
            ttl: settings.ttl,
        }
    }

    /// Build claims for `subject` with this service's issuer, audience and
    /// lifetime, and sign them.
    pub fn issue(&self, subject: &TokenSubject<'_>) -> Result<String, TokenError> {
        let now = Utc::now();
        let expires = now.checked_add_signed(self.ttl).ok_or(TokenError::ExpiryOverflow)?;
        let claims = Claims {
            sub: subject.user_id.to_string(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            iat: now.timestamp(),
            exp: expires.timestamp(),
            first_name: subject.first_name.to_string(),
            last_name: subject.last_name.to_string(),
            profile_image: subject.pfp_url.unwrap_or_default().to_string(),
        };
        self.sign(&claims)
    }

    pub fn sign(&self, claims: &Claims) -> Result<String, TokenError> {
        encode(&Header::new(Algorithm::HS512), claims, &self.encoding).map_err(TokenError::Signing)
    }

    /// Check signature, algorithm, issuer, audience and expiry.
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(TokenError::Invalid)
    }
}

impl fmt::Debug for TokenService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenService")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

/// Parse a token subject into a numeric user id. Only positive integers are
/// accepted.
pub fn subject_user_id(claims: &Claims) -> Result<i64, TokenError> {
    match claims.sub.parse::<i64>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(TokenError::MalformedSubject),
    }
}
