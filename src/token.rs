use std::time::Duration;

use chrono::{DateTime, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use uuid::Uuid;

use crate::{
    config::AuthConfig,
    error::AuthError,
    types::{Claims, User},
};

/// Appended to the root secret to derive the refresh-token secret.
const REFRESH_SECRET_SUFFIX: &str = "_refresh";

const SIGNING_ALGORITHM: Algorithm = Algorithm::HS256;

/// Algorithms accepted on verification. Anything outside the HMAC family
/// (including `none` and every asymmetric algorithm) is rejected.
const ACCEPTED_ALGORITHMS: [Algorithm; 3] = [Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Clone)]
struct KindKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    lifetime: Duration,
}

impl KindKeys {
    fn from_secret(secret: &[u8], lifetime: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            lifetime,
        }
    }
}

/// Issues and verifies signed, time-bounded identity tokens.
#[derive(Clone)]
pub struct TokenCodec {
    issuer: String,
    access: KindKeys,
    refresh: KindKeys,
}

impl TokenCodec {
    pub fn new(config: &AuthConfig) -> Result<Self, AuthError> {
        config.validate()?;

        let refresh_secret = format!("{}{}", config.token_secret, REFRESH_SECRET_SUFFIX);

        Ok(Self {
            issuer: config.token_issuer.clone(),
            access: KindKeys::from_secret(
                config.token_secret.as_bytes(),
                config.access_token_lifetime,
            ),
            refresh: KindKeys::from_secret(
                refresh_secret.as_bytes(),
                config.refresh_token_lifetime,
            ),
        })
    }

    pub fn issue_access_token(&self, user: &User) -> Result<String, AuthError> {
        self.issue_at(user, TokenKind::Access, Utc::now())
    }

    pub fn issue_refresh_token(&self, user: &User) -> Result<String, AuthError> {
        self.issue_at(user, TokenKind::Refresh, Utc::now())
    }

    pub(crate) fn issue_at(
        &self,
        user: &User,
        kind: TokenKind,
        now: DateTime<Utc>,
    ) -> Result<String, AuthError> {
        let keys = self.keys(kind);
        let iat = u64::try_from(now.timestamp()).unwrap_or_default();

        let claims = Claims {
            user_id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            role: user.role,
            iss: self.issuer.clone(),
            sub: user.id.to_string(),
            jti: Uuid::new_v4().to_string(),
            iat,
            nbf: iat,
            exp: iat + keys.lifetime.as_secs(),
        };

        let token = encode(&Header::new(SIGNING_ALGORITHM), &claims, &keys.encoding)?;

        Ok(token)
    }

    /// Verify `token` as a token of the given kind and return its claims.
    ///
    /// An elapsed expiry yields [`AuthError::TokenExpired`]; every other failure
    /// (signature, algorithm, format, issuer, not-yet-valid) yields
    /// [`AuthError::TokenInvalid`].
    pub fn parse(&self, token: &str, kind: TokenKind) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(SIGNING_ALGORITHM);
        validation.algorithms = ACCEPTED_ALGORITHMS.to_vec();
        validation.leeway = 0;
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation.set_issuer(&[&self.issuer]);
        validation.set_required_spec_claims(&["exp", "nbf", "iss", "sub"]);

        let data = decode::<Claims>(token, &self.keys(kind).decoding, &validation).map_err(
            |err| match err.kind() {
                ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                other => {
                    tracing::debug!(?kind, reason = ?other, "rejected token");
                    AuthError::TokenInvalid
                }
            },
        )?;

        Ok(data.claims)
    }

    fn keys(&self, kind: TokenKind) -> &KindKeys {
        match kind {
            TokenKind::Access => &self.access,
            TokenKind::Refresh => &self.refresh,
        }
    }
}
