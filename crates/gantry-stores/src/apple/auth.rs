//! App Store Connect API token signing

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{PublishError, Result};
use crate::types::Credentials;

/// Token lifetime; App Store Connect rejects tokens valid for more than 20 minutes
const TOKEN_LIFETIME_MINUTES: i64 = 20;

/// Refresh this long before expiry
const REFRESH_MARGIN_MINUTES: i64 = 5;

/// JWT claims for App Store Connect API
#[derive(Debug, Serialize)]
struct Claims {
    iss: String,
    iat: i64,
    exp: i64,
    aud: String,
}

struct CachedToken {
    token: String,
    expires_at: DateTime<Utc>,
}

/// Signs and caches ES256 bearer tokens for one set of credentials
pub struct TokenProvider {
    credentials: Credentials,
    cache: Mutex<Option<CachedToken>>,
}

impl TokenProvider {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            cache: Mutex::new(None),
        }
    }

    /// Return a valid token, signing a new one when the cached one is close to expiry
    pub async fn token(&self) -> Result<String> {
        let mut cache = self.cache.lock().await;

        if let Some(cached) = cache.as_ref() {
            if Utc::now() < cached.expires_at - Duration::minutes(REFRESH_MARGIN_MINUTES) {
                return Ok(cached.token.clone());
            }
        }

        let now = Utc::now();
        let (token, expires_at) = self.sign(now)?;
        debug!(key_id = %self.credentials.key_id, "signed new App Store Connect token");

        *cache = Some(CachedToken {
            token: token.clone(),
            expires_at,
        });

        Ok(token)
    }

    fn sign(&self, now: DateTime<Utc>) -> Result<(String, DateTime<Utc>)> {
        let exp = now + Duration::minutes(TOKEN_LIFETIME_MINUTES);

        let claims = Claims {
            iss: self.credentials.issuer_id.clone(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
            aud: "appstoreconnect-v1".to_string(),
        };

        let encoding_key = EncodingKey::from_ec_pem(self.credentials.private_key.as_bytes())
            .map_err(|e| PublishError::InvalidCredentials(format!("Invalid API key: {}", e)))?;

        let mut header = Header::new(Algorithm::ES256);
        header.kid = Some(self.credentials.key_id.clone());

        let token = encode(&header, &claims, &encoding_key)?;
        Ok((token, exp))
    }
}
