use super::session::TokenVerifier;
use super::ServerConfig;
use crate::catalog_store::CatalogStore;
use crate::identity::IdentityProvider;
use crate::object_storage::StorageUrlIssuer;
use crate::profile_store::ProfileStore;
use axum::extract::FromRef;
use std::sync::Arc;
use std::time::Instant;

pub type GuardedProfileStore = Arc<dyn ProfileStore>;
pub type GuardedCatalogStore = Arc<dyn CatalogStore>;
pub type GuardedIdentityProvider = Arc<dyn IdentityProvider>;
pub type GuardedUrlIssuer = Arc<dyn StorageUrlIssuer>;

#[derive(Clone)]
pub struct ServerState {
    pub config: ServerConfig,
    pub start_time: Instant,
    pub profile_store: GuardedProfileStore,
    pub catalog_store: GuardedCatalogStore,
    pub identity: GuardedIdentityProvider,
    pub url_issuer: GuardedUrlIssuer,
    pub token_verifier: TokenVerifier,
}

impl FromRef<ServerState> for GuardedProfileStore {
    fn from_ref(input: &ServerState) -> Self {
        input.profile_store.clone()
    }
}

impl FromRef<ServerState> for GuardedCatalogStore {
    fn from_ref(input: &ServerState) -> Self {
        input.catalog_store.clone()
    }
}

impl FromRef<ServerState> for GuardedIdentityProvider {
    fn from_ref(input: &ServerState) -> Self {
        input.identity.clone()
    }
}

impl FromRef<ServerState> for GuardedUrlIssuer {
    fn from_ref(input: &ServerState) -> Self {
        input.url_issuer.clone()
    }
}

impl FromRef<ServerState> for ServerConfig {
    fn from_ref(input: &ServerState) -> Self {
        input.config.clone()
    }
}
