//! JWT issuance and verification (HS256).
//!
//! Stateless: the codec holds only the derived keys and TTLs. Expiry is
//! checked lazily at verify time; there is no server-side revocation of
//! access tokens (logout only invalidates the stored refresh token).

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use uuid::Uuid;

use errors::{EntregaError, EntregaResult};

use super::{Claims, Principal, Role};

static JWT_ALGORITHM: Algorithm = Algorithm::HS256;

pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenCodec {
    pub fn new(secret: &str, access_ttl_hours: i64, refresh_ttl_hours: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            access_ttl: Duration::hours(access_ttl_hours),
            refresh_ttl: Duration::hours(refresh_ttl_hours),
        }
    }

    /// Access-token lifetime in seconds (surfaced as `expires_in`)
    pub fn access_expires_in(&self) -> u64 {
        self.access_ttl.num_seconds().max(0) as u64
    }

    pub fn issue_access(&self, user_id: Uuid, email: &str, role: Role) -> EntregaResult<String> {
        self.issue(user_id, email, role, self.access_ttl, false)
    }

    pub fn issue_refresh(&self, user_id: Uuid, email: &str, role: Role) -> EntregaResult<String> {
        self.issue(user_id, email, role, self.refresh_ttl, true)
    }

    fn issue(
        &self,
        user_id: Uuid,
        email: &str,
        role: Role,
        ttl: Duration,
        refresh: bool,
    ) -> EntregaResult<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            email: email.to_string(),
            role,
            exp: (now + ttl).timestamp() as usize,
            iat: now.timestamp() as usize,
            jti: Uuid::new_v4(),
            refresh,
        };

        let header = Header::new(JWT_ALGORITHM);
        encode(&header, &claims, &self.encoding_key)
            .map_err(|e| EntregaError::Internal(format!("token encode: {}", e)))
    }

    /// Verify an access token and extract the principal.
    ///
    /// Expired and tampered tokens fail with distinct errors so the
    /// audit trail can tell them apart; the HTTP layer collapses both
    /// to a generic 401.
    pub fn verify(&self, token: &str) -> EntregaResult<Principal> {
        let claims = self.decode(token)?;
        if claims.refresh {
            return Err(EntregaError::InvalidToken(
                "refresh token used as access token".to_string(),
            ));
        }
        Principal::try_from(claims)
    }

    /// Verify a refresh token and extract the principal.
    pub fn verify_refresh(&self, token: &str) -> EntregaResult<Principal> {
        let claims = self.decode(token)?;
        if !claims.refresh {
            return Err(EntregaError::InvalidToken(
                "access token used as refresh token".to_string(),
            ));
        }
        Principal::try_from(claims)
    }

    fn decode(&self, token: &str) -> EntregaResult<Claims> {
        let mut validation = Validation::new(JWT_ALGORITHM);
        validation.leeway = 0;

        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => EntregaError::TokenExpired,
                jsonwebtoken::errors::ErrorKind::InvalidSignature => {
                    EntregaError::InvalidToken("signature mismatch".to_string())
                },
                _ => EntregaError::InvalidToken(e.to_string()),
            })
    }
}
