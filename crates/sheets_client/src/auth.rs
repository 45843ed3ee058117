//! Credentials for the Sheets API.
//!
//! A service-account key file is read once at start-up. Access tokens are
//! minted from it with a signed JWT assertion (RS256) and cached until a
//! minute before they expire. The key itself is never rotated here.

use std::path::Path;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use openssl::hash::MessageDigest;
use openssl::pkey::{PKey, Private};
use openssl::sign::Signer;
use parking_lot::Mutex;
use serde::Deserialize;

use crate::client::SheetsError;

pub const SPREADSHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
/// Refresh this long before the token's stated expiry.
const EXPIRY_MARGIN_SECS: i64 = 60;

/// The fields of a Google service-account JSON key this client uses.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    #[serde(default)]
    pub project_id: Option<String>,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl ServiceAccountKey {
    pub fn load(path: &Path) -> Result<Self, SheetsError> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            SheetsError::Credentials(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json(&contents)
    }

    pub fn from_json(json: &str) -> Result<Self, SheetsError> {
        serde_json::from_str(json)
            .map_err(|e| SheetsError::Credentials(format!("invalid service account key: {}", e)))
    }
}

/// Supplies a bearer token for each outbound call.
pub trait TokenSource: Send + Sync {
    fn access_token(&self, http: &reqwest::blocking::Client) -> Result<String, SheetsError>;
}

/// A pre-minted bearer token, used as is.
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl TokenSource for StaticToken {
    fn access_token(&self, _http: &reqwest::blocking::Client) -> Result<String, SheetsError> {
        Ok(self.0.clone())
    }
}

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    expires_at: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    ASSERTION_LIFETIME_SECS
}

/// JWT-bearer flow for a service account.
pub struct ServiceAccount {
    key: ServiceAccountKey,
    signing_key: PKey<Private>,
    cached: Mutex<Option<CachedToken>>,
}

impl ServiceAccount {
    pub fn new(key: ServiceAccountKey) -> Result<Self, SheetsError> {
        let signing_key = PKey::private_key_from_pem(key.private_key.as_bytes())
            .map_err(|e| SheetsError::Credentials(format!("invalid private key: {}", e)))?;
        Ok(Self {
            key,
            signing_key,
            cached: Mutex::new(None),
        })
    }

    pub fn from_file(path: &Path) -> Result<Self, SheetsError> {
        Self::new(ServiceAccountKey::load(path)?)
    }

    pub fn client_email(&self) -> &str {
        &self.key.client_email
    }

    /// Signed `header.claims.signature` assertion issued at `now` (unix seconds).
    pub(crate) fn assertion(&self, now: i64) -> Result<String, SheetsError> {
        let mut header = serde_json::json!({ "alg": "RS256", "typ": "JWT" });
        if let Some(kid) = &self.key.private_key_id {
            header["kid"] = serde_json::Value::String(kid.clone());
        }
        let claims = serde_json::json!({
            "iss": self.key.client_email,
            "scope": SPREADSHEETS_SCOPE,
            "aud": self.key.token_uri,
            "iat": now,
            "exp": now + ASSERTION_LIFETIME_SECS,
        });

        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(header.to_string()),
            URL_SAFE_NO_PAD.encode(claims.to_string())
        );
        let signature = self
            .sign(signing_input.as_bytes())
            .map_err(|e| SheetsError::Credentials(format!("signing failed: {}", e)))?;
        Ok(format!("{}.{}", signing_input, URL_SAFE_NO_PAD.encode(signature)))
    }

    fn sign(&self, data: &[u8]) -> Result<Vec<u8>, openssl::error::ErrorStack> {
        let mut signer = Signer::new(MessageDigest::sha256(), &self.signing_key)?;
        signer.update(data)?;
        signer.sign_to_vec()
    }

    fn exchange(&self, http: &reqwest::blocking::Client, now: i64) -> Result<CachedToken, SheetsError> {
        let assertion = self.assertion(now)?;
        let response = http
            .post(&self.key.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .map_err(SheetsError::from_transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(SheetsError::Auth(format!(
                "token exchange failed ({}): {}",
                status.as_u16(),
                body
            )));
        }

        let token: TokenResponse = response
            .json()
            .map_err(|e| SheetsError::Auth(format!("bad token response: {}", e)))?;
        log::info!(
            "obtained access token for {} (expires in {}s)",
            self.key.client_email,
            token.expires_in
        );
        Ok(CachedToken {
            token: token.access_token,
            expires_at: now + token.expires_in,
        })
    }
}

impl TokenSource for ServiceAccount {
    fn access_token(&self, http: &reqwest::blocking::Client) -> Result<String, SheetsError> {
        let now = chrono::Utc::now().timestamp();
        // Held across the exchange so concurrent callers mint one token.
        let mut cached = self.cached.lock();
        if let Some(token) = cached.as_ref() {
            if token.expires_at - EXPIRY_MARGIN_SECS > now {
                return Ok(token.token.clone());
            }
        }
        let fresh = self.exchange(http, now)?;
        let token = fresh.token.clone();
        *cached = Some(fresh);
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use openssl::rsa::Rsa;
    use openssl::sign::Verifier;
    use std::io::Write;

    fn test_key(token_uri: &str) -> (ServiceAccountKey, PKey<Private>) {
        let pkey = PKey::from_rsa(Rsa::generate(2048).unwrap()).unwrap();
        let pem = String::from_utf8(pkey.private_key_to_pem_pkcs8().unwrap()).unwrap();
        let key = ServiceAccountKey {
            client_email: "sink@project.iam.gserviceaccount.com".into(),
            private_key: pem,
            private_key_id: Some("key-1".into()),
            token_uri: token_uri.into(),
            project_id: None,
        };
        (key, pkey)
    }

    fn decode_json(part: &str) -> serde_json::Value {
        serde_json::from_slice(&URL_SAFE_NO_PAD.decode(part).unwrap()).unwrap()
    }

    #[test]
    fn test_assertion_is_signed_rs256() {
        let (key, pkey) = test_key("https://oauth2.example/token");
        let account = ServiceAccount::new(key).unwrap();
        let jwt = account.assertion(1_700_000_000).unwrap();

        let parts: Vec<&str> = jwt.split('.').collect();
        assert_eq!(parts.len(), 3);

        let header = decode_json(parts[0]);
        assert_eq!(header["alg"], "RS256");
        assert_eq!(header["kid"], "key-1");

        let claims = decode_json(parts[1]);
        assert_eq!(claims["iss"], "sink@project.iam.gserviceaccount.com");
        assert_eq!(claims["scope"], SPREADSHEETS_SCOPE);
        assert_eq!(claims["aud"], "https://oauth2.example/token");
        assert_eq!(claims["exp"], 1_700_003_600);

        let signature = URL_SAFE_NO_PAD.decode(parts[2]).unwrap();
        let mut verifier = Verifier::new(MessageDigest::sha256(), &pkey).unwrap();
        verifier
            .update(format!("{}.{}", parts[0], parts[1]).as_bytes())
            .unwrap();
        assert!(verifier.verify(&signature).unwrap());
    }

    #[test]
    fn test_token_exchange_is_cached() {
        let server = MockServer::start();
        let token_mock = server.mock(|when, then| {
            when.method(POST)
                .path("/token")
                .body_contains("grant_type=urn%3Aietf%3Aparams%3Aoauth%3Agrant-type%3Ajwt-bearer")
                .body_contains("assertion=");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(serde_json::json!({
                    "access_token": "ya29.test",
                    "expires_in": 3599,
                    "token_type": "Bearer"
                }));
        });

        let (key, _) = test_key(&server.url("/token"));
        let account = ServiceAccount::new(key).unwrap();
        let http = reqwest::blocking::Client::new();

        assert_eq!(account.access_token(&http).unwrap(), "ya29.test");
        assert_eq!(account.access_token(&http).unwrap(), "ya29.test");
        token_mock.assert();
    }

    #[test]
    fn test_token_exchange_rejected() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/token");
            then.status(400)
                .json_body(serde_json::json!({ "error": "invalid_grant" }));
        });

        let (key, _) = test_key(&server.url("/token"));
        let account = ServiceAccount::new(key).unwrap();
        let err = account
            .access_token(&reqwest::blocking::Client::new())
            .unwrap_err();
        assert!(matches!(err, SheetsError::Auth(ref msg) if msg.contains("invalid_grant")));
    }

    #[test]
    fn test_load_key_file() {
        let (key, _) = test_key("https://oauth2.example/token");
        let json = serde_json::json!({
            "type": "service_account",
            "project_id": "demo",
            "private_key_id": "abc",
            "private_key": key.private_key,
            "client_email": key.client_email,
        });
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(json.to_string().as_bytes()).unwrap();

        let loaded = ServiceAccountKey::load(file.path()).unwrap();
        assert_eq!(loaded.token_uri, DEFAULT_TOKEN_URI);
        assert_eq!(loaded.project_id.as_deref(), Some("demo"));
        assert!(ServiceAccount::new(loaded).is_ok());
    }

    #[test]
    fn test_bad_key_material() {
        let key = ServiceAccountKey::from_json(
            r#"{"client_email": "a@b", "private_key": "not a pem"}"#,
        )
        .unwrap();
        assert!(matches!(ServiceAccount::new(key), Err(SheetsError::Credentials(_))));
        assert!(ServiceAccountKey::from_json("{}").is_err());
    }
}
