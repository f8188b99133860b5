use std::collections::HashMap;
use std::time::{Duration, Instant};

use base64::{engine::general_purpose, Engine as _};
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use tokio::sync::RwLock;

use crate::utils::ApiError;

// Google publishes the securetoken signing keys as a JWK set
const JWKS_URL: &str =
    "https://www.googleapis.com/service_accounts/v1/jwk/securetoken@system.gserviceaccount.com";

const KEY_CACHE_TTL: Duration = Duration::from_secs(3600);

#[derive(Debug, Deserialize)]
struct ServiceAccount {
    project_id: String,
}

#[derive(Debug, Clone, Deserialize)]
struct Jwk {
    kid: String,
    n: String,
    e: String,
}

#[derive(Debug, Deserialize)]
struct JwkSet {
    keys: Vec<Jwk>,
}

#[derive(Debug, Deserialize)]
struct RawClaims {
    sub: String,
    #[serde(default)]
    email: Option<String>,
}

/// Decoded, signature-checked Firebase identity.
#[derive(Debug, Clone)]
pub struct VerifiedIdentity {
    pub sub: String,
    pub email: String,
}

struct KeyCache {
    fetched_at: Option<Instant>,
    keys: HashMap<String, Jwk>,
}

/// Verifies Firebase ID tokens against Google's published signing keys.
///
/// Owns its HTTP client and key cache; constructed once at startup and
/// shared through `web::Data`. Keys are refreshed at most once per hour,
/// or earlier when a token arrives signed by a key we have not seen.
pub struct FirebaseAuth {
    http: reqwest::Client,
    project_id: String,
    cache: RwLock<KeyCache>,
}

impl FirebaseAuth {
    /// Builds the verifier from the service-account JSON. Accepts the raw
    /// JSON or its base64 encoding, which is how the key usually travels
    /// through environment config.
    pub fn from_service_account(raw_key: &str) -> Result<Self, String> {
        let json = if raw_key.trim_start().starts_with('{') {
            raw_key.to_string()
        } else {
            let bytes = general_purpose::STANDARD
                .decode(raw_key.trim())
                .map_err(|e| format!("service account key is not valid base64: {}", e))?;
            String::from_utf8(bytes)
                .map_err(|e| format!("service account key is not UTF-8: {}", e))?
        };

        let account: ServiceAccount = serde_json::from_str(&json)
            .map_err(|e| format!("service account key is not valid JSON: {}", e))?;

        if account.project_id.is_empty() {
            return Err("service account key has an empty project_id".to_string());
        }

        Ok(Self {
            http: reqwest::Client::new(),
            project_id: account.project_id,
            cache: RwLock::new(KeyCache {
                fetched_at: None,
                keys: HashMap::new(),
            }),
        })
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// Checks signature, expiry, audience and issuer. Tokens without an
    /// email claim are rejected: every downstream permission is keyed on
    /// the caller's email.
    pub async fn verify_id_token(&self, token: &str) -> Result<VerifiedIdentity, ApiError> {
        let header =
            decode_header(token).map_err(|e| ApiError::InvalidCredential(e.to_string()))?;
        let kid = header
            .kid
            .ok_or_else(|| ApiError::InvalidCredential("token header has no kid".to_string()))?;

        let jwk = self.signing_key(&kid).await?;

        let decoding_key = DecodingKey::from_rsa_components(&jwk.n, &jwk.e)
            .map_err(|e| ApiError::InvalidCredential(e.to_string()))?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[self.project_id.as_str()]);
        validation.set_issuer(&[format!(
            "https://securetoken.google.com/{}",
            self.project_id
        )]);

        let data = decode::<RawClaims>(token, &decoding_key, &validation)
            .map_err(|e| ApiError::InvalidCredential(e.to_string()))?;

        let email = data
            .claims
            .email
            .filter(|email| !email.is_empty())
            .ok_or_else(|| ApiError::InvalidCredential("token carries no email".to_string()))?;

        Ok(VerifiedIdentity {
            sub: data.claims.sub,
            email,
        })
    }

    /// Looks up the RSA key for `kid`, refreshing the key set when it is
    /// stale or does not contain the kid (Google rotates keys).
    async fn signing_key(&self, kid: &str) -> Result<Jwk, ApiError> {
        {
            let cache = self.cache.read().await;
            if let Some(fetched_at) = cache.fetched_at {
                if fetched_at.elapsed() < KEY_CACHE_TTL {
                    if let Some(jwk) = cache.keys.get(kid) {
                        log::debug!("📦 Using cached signing key {}", kid);
                        return Ok(jwk.clone());
                    }
                }
            }
        }

        let fresh = self.fetch_keys().await?;

        let mut cache = self.cache.write().await;
        cache.fetched_at = Some(Instant::now());
        cache.keys = fresh;

        cache
            .keys
            .get(kid)
            .cloned()
            .ok_or_else(|| ApiError::InvalidCredential(format!("unknown signing key: {}", kid)))
    }

    async fn fetch_keys(&self) -> Result<HashMap<String, Jwk>, ApiError> {
        log::info!("🔑 Refreshing Firebase signing keys");

        let response = self
            .http
            .get(JWKS_URL)
            .header("Accept", "application/json")
            .timeout(Duration::from_secs(10))
            .send()
            .await
            .map_err(|e| {
                ApiError::ExternalService(format!("failed to fetch signing keys: {}", e))
            })?;

        if !response.status().is_success() {
            return Err(ApiError::ExternalService(format!(
                "signing key endpoint returned {}",
                response.status()
            )));
        }

        let set: JwkSet = response.json().await.map_err(|e| {
            ApiError::ExternalService(format!("failed to parse signing keys: {}", e))
        })?;

        log::debug!("💾 Cached {} signing keys", set.keys.len());

        Ok(set.keys.into_iter().map(|k| (k.kid.clone(), k)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FAKE_ACCOUNT: &str = r#"{
        "type": "service_account",
        "project_id": "club-sphere-test",
        "private_key_id": "abc123",
        "client_email": "firebase-adminsdk@club-sphere-test.iam.gserviceaccount.com"
    }"#;

    #[test]
    fn test_from_raw_json_key() {
        let auth = FirebaseAuth::from_service_account(FAKE_ACCOUNT).unwrap();
        assert_eq!(auth.project_id(), "club-sphere-test");
    }

    #[test]
    fn test_from_base64_key() {
        let encoded = general_purpose::STANDARD.encode(FAKE_ACCOUNT);
        let auth = FirebaseAuth::from_service_account(&encoded).unwrap();
        assert_eq!(auth.project_id(), "club-sphere-test");
    }

    #[test]
    fn test_rejects_garbage_key() {
        assert!(FirebaseAuth::from_service_account("not json at all").is_err());
        assert!(FirebaseAuth::from_service_account("{\"type\": \"service_account\"}").is_err());
    }

    #[tokio::test]
    async fn test_malformed_token_is_rejected_before_any_fetch() {
        let auth = FirebaseAuth::from_service_account(FAKE_ACCOUNT).unwrap();
        let err = auth.verify_id_token("not-a-jwt").await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidCredential(_)));
    }
}
