use std::sync::Arc;

use db::{DBService, DbErr, DbPool};
use events::EventHub;
use services::services::{
    auth::{AuthError, AuthService},
    config::ServerConfig,
    rate_limit::RateLimiter,
    task::TaskService,
};
use thiserror::Error;
use utils_jwt::{JwtError, JwtManager};

#[derive(Debug, Error)]
pub enum AppStateError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error(transparent)]
    Jwt(#[from] JwtError),
    #[error(transparent)]
    Auth(#[from] AuthError),
}

/// Everything a request handler can reach.
#[derive(Clone)]
pub struct AppState {
    config: Arc<ServerConfig>,
    db: DbPool,
    hub: EventHub,
    tasks: TaskService,
    auth: AuthService,
    login_limiter: Arc<RateLimiter>,
    lead_limiter: Arc<RateLimiter>,
}

impl AppState {
    /// Opens the configured database (running migrations) and wires services.
    pub async fn new(config: ServerConfig) -> Result<Self, AppStateError> {
        let db = match config.database_url.as_deref() {
            Some(url) => DBService::connect(url).await?,
            None => DBService::new().await?,
        };
        let jwt = JwtManager::new(&config.jwt_secret, config.jwt_ttl)?;
        let auth = AuthService::new(db.pool.clone(), jwt)?;
        Ok(Self::from_parts(config, db.pool, auth))
    }

    pub fn from_parts(config: ServerConfig, db: DbPool, auth: AuthService) -> Self {
        let hub = EventHub::default();
        Self {
            tasks: TaskService::new(db.clone(), hub.clone()),
            config: Arc::new(config),
            db,
            hub,
            auth,
            login_limiter: Arc::new(RateLimiter::login()),
            lead_limiter: Arc::new(RateLimiter::leads()),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn db(&self) -> &DbPool {
        &self.db
    }

    pub fn hub(&self) -> &EventHub {
        &self.hub
    }

    pub fn tasks(&self) -> &TaskService {
        &self.tasks
    }

    pub fn auth(&self) -> &AuthService {
        &self.auth
    }

    pub fn login_limiter(&self) -> &RateLimiter {
        &self.login_limiter
    }

    pub fn lead_limiter(&self) -> &RateLimiter {
        &self.lead_limiter
    }
}
