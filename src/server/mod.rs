pub mod config;
mod error;
mod guard;
mod http_layers;
pub mod server;
pub(self) mod session;
pub mod state;

pub use config::ServerConfig;
pub use error::ApiError;
pub use http_layers::*;
pub use server::run_server;
pub use session::TokenVerifier;
