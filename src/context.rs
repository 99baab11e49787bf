//! Explicit wiring of the collaborators every overlay needs.
//!
//! A [`LoopContext`] is cheap to clone. Overlays built from clones of the same
//! context share the tile cache and nothing else.

use crate::core::config::{LoopConfig, LoopProfile};
use crate::net::{HttpRequest, ReqwestClient, DEFAULT_USER_AGENT};
use crate::prelude::Future;
use crate::runtime::{default_spawner, AsyncSpawner, TaskHandle};
use crate::tiles::cache::TileCache;
use crate::tiles::source::{normalize_base_url, DEFAULT_BASE_URL};
use crate::traits::{CredentialProvider, HttpClient};
use crate::{LoopError, Result};
use std::sync::Arc;

#[derive(Clone)]
pub struct LoopContext {
    config: Arc<LoopConfig>,
    cache: Arc<TileCache>,
    http: Arc<dyn HttpClient>,
    credentials: Arc<dyn CredentialProvider>,
    spawner: Arc<dyn AsyncSpawner>,
    user_agent: Arc<str>,
    base_url: Arc<str>,
}

impl LoopContext {
    pub fn builder() -> LoopContextBuilder {
        LoopContextBuilder::new()
    }

    pub fn config(&self) -> &LoopConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<TileCache> {
        &self.cache
    }

    pub fn http(&self) -> &Arc<dyn HttpClient> {
        &self.http
    }

    pub fn spawner(&self) -> &Arc<dyn AsyncSpawner> {
        &self.spawner
    }

    /// Starts a task on the context's spawner
    pub fn spawn<F>(&self, future: F) -> TaskHandle
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.spawner.spawn(future)
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Request carrying the credential headers, for the valid-times endpoint
    pub fn authorized_request(&self, url: impl Into<String>) -> HttpRequest {
        self.credentials.authorize(self.tile_request(url))
    }

    /// Tile requests only identify the client
    pub fn tile_request(&self, url: impl Into<String>) -> HttpRequest {
        HttpRequest::new(url)
            .with_header("User-Agent", self.user_agent.as_ref())
            .with_timeout(self.config.request_timeout())
    }

    /// Same collaborators, different settings. The cache is kept.
    pub fn with_config(&self, config: LoopConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
            ..self.clone()
        })
    }
}

impl std::fmt::Debug for LoopContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoopContext")
            .field("config", &self.config)
            .field("cache", &self.cache)
            .field("user_agent", &self.user_agent)
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[derive(Default)]
pub struct LoopContextBuilder {
    config: Option<LoopConfig>,
    cache: Option<Arc<TileCache>>,
    http: Option<Arc<dyn HttpClient>>,
    credentials: Option<Arc<dyn CredentialProvider>>,
    spawner: Option<Arc<dyn AsyncSpawner>>,
    user_agent: Option<String>,
    base_url: Option<String>,
}

impl LoopContextBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: LoopConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn profile(self, profile: LoopProfile) -> Self {
        self.config(profile.resolve())
    }

    /// Share an existing cache instead of creating one
    pub fn cache(mut self, cache: Arc<TileCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn http_client(mut self, http: Arc<dyn HttpClient>) -> Self {
        self.http = Some(http);
        self
    }

    pub fn credentials(mut self, credentials: impl CredentialProvider + 'static) -> Self {
        self.credentials = Some(Arc::new(credentials));
        self
    }

    /// Runs every task of the pipeline on `spawner` instead of plain tokio
    pub fn spawner(mut self, spawner: Arc<dyn AsyncSpawner>) -> Self {
        self.spawner = Some(spawner);
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn build(self) -> Result<LoopContext> {
        let credentials = self
            .credentials
            .ok_or_else(|| LoopError::MissingCredentials("no credential provider".into()))?;
        credentials.validate()?;

        let config = self.config.unwrap_or_default();
        config.validate()?;

        let spawner = self.spawner.unwrap_or_else(default_spawner);
        let cache = self
            .cache
            .unwrap_or_else(|| Arc::new(TileCache::from_config(&config).with_spawner(spawner.clone())));
        let http = self
            .http
            .unwrap_or_else(|| Arc::new(ReqwestClient::new()) as Arc<dyn HttpClient>);
        let base_url = normalize_base_url(self.base_url.unwrap_or_else(|| DEFAULT_BASE_URL.into()));

        Ok(LoopContext {
            config: Arc::new(config),
            cache,
            http,
            credentials,
            spawner,
            user_agent: self
                .user_agent
                .unwrap_or_else(|| DEFAULT_USER_AGENT.into())
                .into(),
            base_url: base_url.into(),
        })
    }
}
