//! Kuro auth service — library crate.
//!
//! API token minting and verification layered on top of the sign-in
//! sessions written by the web frontend's auth layer.

pub mod api;
pub mod cli;
pub mod config;
pub mod errors;
pub mod jobs;
pub mod models;
pub mod session;
pub mod store;
pub mod telemetry;
pub mod tokens;

use std::sync::Arc;

use config::Config;
use session::SessionResolver;
use store::{SessionStore, TokenStore, UserStore};
use tokens::TokenService;

/// Shared application state passed to handlers and middleware.
pub struct AppState {
    pub config: Config,
    pub tokens: TokenService,
    pub sessions: SessionResolver,
    pub users: Arc<dyn UserStore>,
}

impl AppState {
    /// Wire every collaborator to one backing store.
    pub fn new<S>(config: Config, store: S) -> Self
    where
        S: TokenStore + SessionStore + UserStore + Clone + 'static,
    {
        let tokens = TokenService::new(Arc::new(store.clone()))
            .with_max_attempts(config.mint_max_attempts);
        Self {
            config,
            tokens,
            sessions: SessionResolver::new(Arc::new(store.clone())),
            users: Arc::new(store),
        }
    }
}
