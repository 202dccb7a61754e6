use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;

use crate::cache::{ResultStore, local_result_key, page_cache_key};
use crate::client::{SearchBackend, ZoomEye};
use crate::config::Config;
use crate::credentials;
use crate::data_models::{
    FetchedPage, FilterRecord, HistoryResult, Kind, PageStatus, ResourcesInfo, SearchResult,
};
use crate::error::Result;
use crate::fetch_pool;
use crate::planner::{self, PageSource};

/// Pages of one dork, served from the per-page cache when possible and
/// written back to it after every successful fetch.
pub struct CachedPages {
    backend: Arc<dyn SearchBackend>,
    store: ResultStore,
    kind: Kind,
    dork: String,
    force: bool,
}

impl CachedPages {
    pub fn new(
        backend: Arc<dyn SearchBackend>,
        store: ResultStore,
        kind: Kind,
        dork: &str,
        force: bool,
    ) -> Self {
        Self {
            backend,
            store,
            kind,
            dork: dork.to_string(),
            force,
        }
    }
}

#[async_trait]
impl PageSource for CachedPages {
    async fn resources_info(&self) -> Result<ResourcesInfo> {
        self.backend.resources_info().await
    }

    async fn fetch(&self, page: usize) -> Result<FetchedPage> {
        let key = page_cache_key(self.kind, &self.dork, page);
        if !self.force {
            if let Some(mut result) = self.store.read_page(&key).await {
                log::debug!("cache hit for {} page {page}", self.kind);
                result.kind = Some(self.kind);
                return Ok(FetchedPage {
                    status: PageStatus::Cached,
                    result,
                });
            }
        }

        let result = self.backend.dork_search(&self.dork, page, self.kind, "").await?;
        if let Err(e) = self.store.write_page(&key, &result).await {
            log::warn!("failed to cache {} page {page}: {e}", self.kind);
        }
        Ok(FetchedPage {
            status: PageStatus::Fetched,
            result,
        })
    }
}

/// Entry point for callers: owns the configuration, the stores and, once
/// initialized, the authenticated backend.
pub struct Agent {
    config: Config,
    store: ResultStore,
    backend: Option<Arc<dyn SearchBackend>>,
}

impl Agent {
    pub fn new(config: Config) -> Self {
        let store = ResultStore::from_config(&config);
        Self {
            config,
            store,
            backend: None,
        }
    }

    /// Uses `backend` instead of building a client from stored credentials.
    pub fn with_backend(config: Config, backend: Arc<dyn SearchBackend>) -> Self {
        let mut agent = Self::new(config);
        agent.backend = Some(backend);
        agent
    }

    fn client(&self, api_key: &str, access_token: &str) -> Result<ZoomEye> {
        Ok(ZoomEye::with_key(api_key, access_token)?.with_base(&self.config.api_base))
    }

    /// Validates an API key against the account info endpoint and stores it.
    pub async fn init_by_key(&mut self, api_key: &str) -> Result<ResourcesInfo> {
        let client = self.client(api_key, "")?;
        let info = client.resources_info().await?;
        credentials::save_api_key(&self.config.config_path, api_key)?;
        self.backend = Some(Arc::new(client));
        Ok(info)
    }

    /// Logs in with username/password and stores the returned token.
    pub async fn init_by_user(&mut self, username: &str, password: &str) -> Result<ResourcesInfo> {
        let mut client = self.client("", "")?;
        let token = client.login(username, password).await?;
        let info = client.resources_info().await?;
        credentials::save_token(&self.config.config_path, &token)?;
        self.backend = Some(Arc::new(client));
        Ok(info)
    }

    /// Builds the backend from stored credentials and validates it.
    pub async fn init_local(&mut self) -> Result<ResourcesInfo> {
        let creds = credentials::load(&self.config.config_path)?;
        let client = self.client(&creds.api_key, &creds.access_token)?;
        let info = client.resources_info().await?;
        self.backend = Some(Arc::new(client));
        Ok(info)
    }

    pub async fn info(&mut self) -> Result<ResourcesInfo> {
        match &self.backend {
            Some(backend) => backend.resources_info().await,
            None => self.init_local().await,
        }
    }

    async fn backend(&mut self) -> Result<Arc<dyn SearchBackend>> {
        if self.backend.is_none() {
            self.init_local().await?;
        }
        match &self.backend {
            Some(backend) => Ok(backend.clone()),
            None => Err(crate::error::Error::NoCredentials),
        }
    }

    /// Returns `num` results for `dork`, from the local store, the page
    /// cache or the API, in that order of preference. `force` skips both
    /// stores but still refreshes the page cache.
    pub async fn search(
        &mut self,
        dork: &str,
        num: i64,
        kind: Kind,
        force: bool,
    ) -> Result<SearchResult> {
        let backend = self.backend().await?;
        let num = planner::normalize_count(num);
        let max_page = planner::max_page_for(num as i64);

        if !force {
            let name = local_result_key(kind, dork, num);
            if let Some(mut result) = self.store.read_local(&name).await {
                log::info!("serving {kind} search from local store: {name}");
                result.kind = Some(kind);
                return Ok(result);
            }
        }

        let source = Arc::new(CachedPages::new(
            backend,
            self.store.clone(),
            kind,
            dork,
            force,
        ));
        let mut result = fetch_pool::multi_to_one_search(source, kind, max_page).await?;
        result.matches.truncate(num);
        Ok(result)
    }

    pub async fn history(&mut self, ip: &str) -> Result<HistoryResult> {
        let backend = self.backend().await?;
        backend.history_ip(ip).await
    }

    /// Reads a saved result file, inferring its kind from the records.
    pub async fn load(&self, path: &Path) -> Result<SearchResult> {
        ResultStore::load(path).await
    }

    pub async fn save(&self, result: &SearchResult, name: &str) -> Result<PathBuf> {
        self.store.save(result, name).await
    }

    pub async fn save_filter_data(&self, records: &[FilterRecord], path: &Path) -> Result<PathBuf> {
        self.store.save_filtered(records, path).await
    }

    pub async fn clean(&self) -> Result<usize> {
        self.store.clean().await
    }
}
