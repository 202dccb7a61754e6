use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::json;

use crate::config::DEFAULT_API_BASE;
use crate::data_models::{HistoryResult, Kind, LoginResult, ResourcesInfo, SearchResult};
use crate::error::{ApiError, Error, Result};

const LOGIN_API: &str = "/user/login";
const RESOURCES_INFO_API: &str = "/resources-info";
const HISTORY_API: &str = "/both/search";

pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// The remote search surface the engine depends on.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    async fn resources_info(&self) -> Result<ResourcesInfo>;

    /// Fetches one page of results. An empty `facets` string selects the
    /// default facets of `kind`.
    async fn dork_search(
        &self,
        dork: &str,
        page: usize,
        kind: Kind,
        facets: &str,
    ) -> Result<SearchResult>;

    async fn history_ip(&self, ip: &str) -> Result<HistoryResult>;
}

/// Authenticated HTTP client for the ZoomEye API.
#[derive(Debug, Clone)]
pub struct ZoomEye {
    api_key: String,
    access_token: String,
    base: String,
    http: Client,
}

impl ZoomEye {
    /// Builds a client with the per-request timeout. Empty credentials are
    /// not sent.
    pub fn with_key(api_key: &str, access_token: &str) -> Result<Self> {
        let http = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            api_key: api_key.to_string(),
            access_token: access_token.to_string(),
            base: DEFAULT_API_BASE.to_string(),
            http,
        })
    }

    pub fn with_base(mut self, base: &str) -> Self {
        self.base = base.trim_end_matches('/').to_string();
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    fn authorize(&self, mut builder: RequestBuilder) -> RequestBuilder {
        if !self.api_key.is_empty() {
            builder = builder.header("API-KEY", &self.api_key);
        }
        if !self.access_token.is_empty() {
            builder = builder.header("Authorization", format!("JWT {}", self.access_token));
        }
        builder
    }

    /// Sends a request and decodes a 200 body into `T`, returning the raw
    /// bytes alongside. Any other status is decoded as an [`ApiError`].
    async fn send<T>(&self, builder: RequestBuilder) -> Result<(T, Vec<u8>)>
    where
        T: DeserializeOwned + Default,
    {
        let response = self.authorize(builder).send().await?;
        let status = response.status();
        let body = response.bytes().await?.to_vec();

        if status == StatusCode::OK {
            let value = serde_json::from_slice(&body)?;
            return Ok((value, body));
        }
        if status == StatusCode::FORBIDDEN && contains(&body, b"specified resource") {
            log::debug!("resource not available for this account, treating as empty");
            return Ok((T::default(), Vec::new()));
        }
        let error: ApiError = serde_json::from_slice(&body)?;
        Err(Error::Api(error))
    }

    /// Logs in with username and password and keeps the returned JWT.
    pub async fn login(&mut self, username: &str, password: &str) -> Result<String> {
        let body = json!({ "username": username, "password": password });
        let request = self.http.post(self.url(LOGIN_API)).json(&body);
        let (result, _): (LoginResult, _) = self.send(request).await?;
        self.access_token = result.access_token;
        Ok(self.access_token.clone())
    }
}

#[async_trait]
impl SearchBackend for ZoomEye {
    async fn resources_info(&self) -> Result<ResourcesInfo> {
        let request = self.http.get(self.url(RESOURCES_INFO_API));
        let (info, _) = self.send(request).await?;
        Ok(info)
    }

    async fn dork_search(
        &self,
        dork: &str,
        page: usize,
        kind: Kind,
        facets: &str,
    ) -> Result<SearchResult> {
        let page = page.max(1);
        let facets = if facets.trim().is_empty() {
            kind.default_facets()
        } else {
            facets
        };
        let page_param = page.to_string();
        let request = self
            .http
            .get(self.url(&format!("/{kind}/search")))
            .query(&[("query", dork), ("page", page_param.as_str()), ("facets", facets)]);

        log::debug!("searching {kind} page {page} for dork: {dork}");
        let (mut result, raw): (SearchResult, _) = self.send(request).await?;
        if result.matches.is_empty() {
            return Err(Error::NoResults);
        }
        result.kind = Some(kind);
        result.raw = raw;
        Ok(result)
    }

    async fn history_ip(&self, ip: &str) -> Result<HistoryResult> {
        let request = self
            .http
            .get(self.url(HISTORY_API))
            .query(&[("history", "true"), ("ip", ip)]);
        let (history, _) = self.send(request).await?;
        Ok(history)
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}
