use std::time::Duration;

use fabula_common::env_or;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone)]
pub struct IdentityConfig {
    pub base_url: String,
    pub anon_key: String,
    pub request_timeout_secs: u64,
}

impl IdentityConfig {
    pub fn from_env() -> Result<Self, String> {
        let base_url =
            std::env::var("SUPABASE_URL").map_err(|_| "SUPABASE_URL is required".to_string())?;
        let anon_key = std::env::var("SUPABASE_ANON_KEY")
            .map_err(|_| "SUPABASE_ANON_KEY is required".to_string())?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key,
            request_timeout_secs: env_or("IDENTITY_REQUEST_TIMEOUT_SECS", 15u64),
        })
    }
}

/// Error from the identity provider. `status` is 0 when the request never got
/// a response (connect error, timeout).
#[derive(Debug)]
pub struct IdentityError {
    pub status: u16,
    pub message: String,
}

impl IdentityError {
    fn transport(err: reqwest::Error) -> Self {
        Self {
            status: 0,
            message: format!("request failed: {err}"),
        }
    }

    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityUser {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionTokens {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub user: Option<IdentityUser>,
}

#[derive(Deserialize)]
struct ProviderErrorBody {
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default, alias = "msg")]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Thin REST wrapper over the hosted auth API. Account semantics (sessions,
/// email flows, token issuance) live entirely on the provider side.
#[derive(Clone)]
pub struct IdentityClient {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
}

impl IdentityClient {
    pub fn new(config: IdentityConfig) -> Result<Self, String> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|err| format!("identity http client build failed: {err}"))?;
        Ok(Self {
            http,
            base_url: config.base_url,
            anon_key: config.anon_key,
        })
    }

    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
    ) -> Result<serde_json::Value, IdentityError> {
        let url = format!("{}/auth/v1/signup", self.base_url);
        let body = serde_json::json!({ "email": email, "password": password });
        let response = self
            .http
            .post(&url)
            .header("apikey", &self.anon_key)
            .json(&body)
            .send()
            .await
            .map_err(IdentityError::transport)?;
        Self::read_typed(response).await
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<SessionTokens, IdentityError> {
        let url = format!("{}/auth/v1/token", self.base_url);
        let body = serde_json::json!({ "email": email, "password": password });
        let response = self
            .http
            .post(&url)
            .query(&[("grant_type", "password")])
            .header("apikey", &self.anon_key)
            .json(&body)
            .send()
            .await
            .map_err(IdentityError::transport)?;
        Self::read_typed(response).await
    }

    pub async fn logout(&self, access_token: &str) -> Result<(), IdentityError> {
        let url = format!("{}/auth/v1/logout", self.base_url);
        let response = self
            .http
            .post(&url)
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(IdentityError::transport)?;
        Self::read_empty(response).await
    }

    pub async fn recover(&self, email: &str) -> Result<(), IdentityError> {
        let url = format!("{}/auth/v1/recover", self.base_url);
        let body = serde_json::json!({ "email": email });
        let response = self
            .http
            .post(&url)
            .header("apikey", &self.anon_key)
            .json(&body)
            .send()
            .await
            .map_err(IdentityError::transport)?;
        Self::read_empty(response).await
    }

    pub async fn update_password(
        &self,
        access_token: &str,
        new_password: &str,
    ) -> Result<IdentityUser, IdentityError> {
        let url = format!("{}/auth/v1/user", self.base_url);
        let body = serde_json::json!({ "password": new_password });
        let response = self
            .http
            .put(&url)
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token)
            .json(&body)
            .send()
            .await
            .map_err(IdentityError::transport)?;
        Self::read_typed(response).await
    }

    /// Verifies an email or recovery OTP; a successful verification returns a
    /// live session for the user.
    pub async fn verify_otp(
        &self,
        otp_type: &str,
        token_hash: &str,
    ) -> Result<SessionTokens, IdentityError> {
        let url = format!("{}/auth/v1/verify", self.base_url);
        let body = serde_json::json!({ "type": otp_type, "token_hash": token_hash });
        let response = self
            .http
            .post(&url)
            .header("apikey", &self.anon_key)
            .json(&body)
            .send()
            .await
            .map_err(IdentityError::transport)?;
        Self::read_typed(response).await
    }

    pub async fn get_user(&self, access_token: &str) -> Result<IdentityUser, IdentityError> {
        let url = format!("{}/auth/v1/user", self.base_url);
        let response = self
            .http
            .get(&url)
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(IdentityError::transport)?;
        Self::read_typed(response).await
    }

    async fn read_typed<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, IdentityError> {
        let status = response.status();
        let text = response.text().await.map_err(IdentityError::transport)?;
        if !status.is_success() {
            return Err(Self::provider_error(status.as_u16(), &text));
        }
        serde_json::from_str(&text).map_err(|err| IdentityError {
            status: status.as_u16(),
            message: format!("malformed provider response: {err}"),
        })
    }

    async fn read_empty(response: reqwest::Response) -> Result<(), IdentityError> {
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Self::provider_error(status.as_u16(), &text));
        }
        Ok(())
    }

    fn provider_error(status: u16, body: &str) -> IdentityError {
        let message = serde_json::from_str::<ProviderErrorBody>(body)
            .ok()
            .and_then(|parsed| {
                parsed
                    .error_description
                    .or(parsed.message)
                    .or(parsed.error)
            })
            .unwrap_or_else(|| format!("identity provider returned status {status}"));
        IdentityError { status, message }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_prefers_description() {
        let err = IdentityClient::provider_error(
            400,
            r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#,
        );
        assert_eq!(err.status, 400);
        assert_eq!(err.message, "Invalid login credentials");
        assert!(err.is_client_error());
    }

    #[test]
    fn provider_error_handles_unparseable_body() {
        let err = IdentityClient::provider_error(502, "<html>bad gateway</html>");
        assert_eq!(err.status, 502);
        assert!(err.message.contains("502"));
        assert!(!err.is_client_error());
    }

    #[test]
    fn session_tokens_parse_with_user() {
        let raw = r#"{
            "access_token": "tok",
            "token_type": "bearer",
            "expires_in": 3600,
            "refresh_token": "ref",
            "user": { "id": "7f2c1e90-3f66-4f4e-9a6b-0d1acdd2b1aa", "email": "kid@example.com" }
        }"#;
        let session: SessionTokens = serde_json::from_str(raw).expect("session");
        assert_eq!(session.access_token, "tok");
        assert_eq!(
            session.user.expect("user").email.as_deref(),
            Some("kid@example.com")
        );
    }
}
