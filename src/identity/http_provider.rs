use super::{IdentityError, IdentityProvider, SignInSession, SignUpOutcome};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Talks to a GoTrue-compatible identity provider over its REST API.
///
/// The api key doubles as the service role key for the admin endpoints,
/// which is how the hosted provider distributes it.
pub struct HttpIdentityProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Deserialize)]
struct ProviderUser {
    id: Uuid,
}

#[derive(Deserialize)]
struct SessionResponse {
    access_token: Option<String>,
    user: Option<ProviderUser>,
    // Sign-up with confirmation enabled returns the bare user object.
    id: Option<Uuid>,
}

impl HttpIdentityProvider {
    pub fn new(base_url: String, api_key: String) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(HttpIdentityProvider {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    async fn post_credentials(
        &self,
        path: &str,
        email: &str,
        password: &str,
    ) -> Result<reqwest::Response, IdentityError> {
        self.client
            .post(format!("{}{}", self.base_url, path))
            .header("apikey", &self.api_key)
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .map_err(|e| IdentityError::Unavailable(e.to_string()))
    }
}

/// Pulls a human-readable message out of a provider error payload. The
/// provider is inconsistent about the field name across endpoints.
fn parse_provider_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    for key in ["message", "msg", "error_description", "error"] {
        if let Some(message) = value.get(key).and_then(|v| v.as_str()) {
            return Some(message.to_string());
        }
    }
    None
}

async fn read_error_message(response: reqwest::Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    parse_provider_message(&body).unwrap_or_else(|| format!("Provider returned {}", status))
}

#[async_trait]
impl IdentityProvider for HttpIdentityProvider {
    async fn sign_up(&self, email: &str, password: &str) -> Result<SignUpOutcome, IdentityError> {
        let response = self.post_credentials("/auth/v1/signup", email, password).await?;
        if !response.status().is_success() {
            let message = read_error_message(response).await;
            warn!("Sign-up rejected: {}", message);
            return Err(IdentityError::Rejected(message));
        }

        let session: SessionResponse = response
            .json()
            .await
            .map_err(|e| IdentityError::Unavailable(e.to_string()))?;
        match session {
            SessionResponse {
                access_token: Some(token),
                user: Some(user),
                ..
            } => Ok(SignUpOutcome::Registered {
                user_id: user.id,
                token,
            }),
            SessionResponse { id: Some(user_id), .. } => {
                debug!("Sign-up pending confirmation for {}", user_id);
                Ok(SignUpOutcome::ConfirmationPending { user_id })
            }
            SessionResponse {
                user: Some(user), ..
            } => Ok(SignUpOutcome::ConfirmationPending { user_id: user.id }),
            _ => Err(IdentityError::Unavailable(
                "Sign-up response carried no user".to_string(),
            )),
        }
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<SignInSession, IdentityError> {
        let response = self
            .post_credentials("/auth/v1/token?grant_type=password", email, password)
            .await?;
        if !response.status().is_success() {
            let message = read_error_message(response).await;
            debug!("Sign-in rejected: {}", message);
            return Err(IdentityError::InvalidCredentials);
        }

        let session: SessionResponse = response
            .json()
            .await
            .map_err(|e| IdentityError::Unavailable(e.to_string()))?;
        match (session.access_token, session.user) {
            (Some(token), Some(user)) => Ok(SignInSession {
                user_id: user.id,
                token,
            }),
            _ => Err(IdentityError::Unavailable(
                "Sign-in response carried no session".to_string(),
            )),
        }
    }

    async fn sign_out(&self, token: &str) -> Result<(), IdentityError> {
        let response = self
            .client
            .post(format!("{}/auth/v1/logout", self.base_url))
            .header("apikey", &self.api_key)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| IdentityError::Unavailable(e.to_string()))?;
        if !response.status().is_success() {
            let message = read_error_message(response).await;
            return Err(IdentityError::Unavailable(message));
        }
        Ok(())
    }

    async fn delete_user(&self, user_id: Uuid) -> Result<(), IdentityError> {
        let response = self
            .client
            .delete(format!("{}/auth/v1/admin/users/{}", self.base_url, user_id))
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| IdentityError::Unavailable(e.to_string()))?;
        if !response.status().is_success() {
            let message = read_error_message(response).await;
            return Err(IdentityError::Unavailable(message));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_message_is_read_from_any_known_field() {
        assert_eq!(
            parse_provider_message(r#"{"message":"User already registered"}"#).as_deref(),
            Some("User already registered")
        );
        assert_eq!(
            parse_provider_message(r#"{"msg":"Password should be at least 6 characters"}"#)
                .as_deref(),
            Some("Password should be at least 6 characters")
        );
        assert_eq!(
            parse_provider_message(r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#)
                .as_deref(),
            Some("Invalid login credentials")
        );
    }

    #[test]
    fn unparseable_error_bodies_yield_none() {
        assert!(parse_provider_message("<html>502</html>").is_none());
        assert!(parse_provider_message(r#"{"code":400}"#).is_none());
    }

    #[test]
    fn session_response_tolerates_both_shapes() {
        let with_session: SessionResponse = serde_json::from_str(
            r#"{"access_token":"t","user":{"id":"b9481a1e-0f1f-44b4-83b6-5a06ae0f0a66"}}"#,
        )
        .unwrap();
        assert!(with_session.access_token.is_some());
        assert!(with_session.user.is_some());

        let bare_user: SessionResponse = serde_json::from_str(
            r#"{"id":"b9481a1e-0f1f-44b4-83b6-5a06ae0f0a66","email":"a@b.c"}"#,
        )
        .unwrap();
        assert!(bare_user.access_token.is_none());
        assert!(bare_user.id.is_some());
    }
}
