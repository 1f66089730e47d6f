mod http_provider;

pub use http_provider::HttpIdentityProvider;

use async_trait::async_trait;
use uuid::Uuid;

/// Outcome of a registration attempt against the identity provider.
#[derive(Debug, Clone, PartialEq)]
pub enum SignUpOutcome {
    /// The account is active and a session token was issued.
    Registered { user_id: Uuid, token: String },
    /// The provider requires email confirmation before issuing a token.
    ConfirmationPending { user_id: Uuid },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SignInSession {
    pub user_id: Uuid,
    pub token: String,
}

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    /// The provider rejected the request, e.g. email already in use or
    /// a password policy violation.
    #[error("{0}")]
    Rejected(String),
    #[error("Authentication failed")]
    InvalidCredentials,
    /// The provider could not be reached or answered garbage.
    #[error("Identity provider unavailable: {0}")]
    Unavailable(String),
}

/// Gateway to the external identity provider. Credentials never touch our
/// own storage, we only hold the user id and token the provider hands back.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_up(&self, email: &str, password: &str) -> Result<SignUpOutcome, IdentityError>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<SignInSession, IdentityError>;

    async fn sign_out(&self, token: &str) -> Result<(), IdentityError>;

    async fn delete_user(&self, user_id: Uuid) -> Result<(), IdentityError>;
}
