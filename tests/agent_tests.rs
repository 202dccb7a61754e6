use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::Result;
use async_trait::async_trait;
use serde_json::json;
use tempfile::TempDir;

use zoomeye::cache::local_result_key;
use zoomeye::client::SearchBackend;
use zoomeye::config::Config;
use zoomeye::data_models::{HistoryResult, Resources, ResourcesInfo};
use zoomeye::error::{ApiError, Error};
use zoomeye::{Agent, Kind, Record, SearchResult};

mod test_helpers {
    use super::*;

    /// Serves `total` host results in pages of 20; counts API calls.
    pub struct FakeBackend {
        pub quota: i64,
        pub total: u64,
        pub searches: AtomicUsize,
        pub info_calls: AtomicUsize,
        pub reject_key: bool,
    }

    impl FakeBackend {
        pub fn new(quota: i64, total: u64) -> Self {
            Self {
                quota,
                total,
                searches: AtomicUsize::new(0),
                info_calls: AtomicUsize::new(0),
                reject_key: false,
            }
        }

        pub fn searches(&self) -> usize {
            self.searches.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SearchBackend for FakeBackend {
        async fn resources_info(&self) -> zoomeye::Result<ResourcesInfo> {
            self.info_calls.fetch_add(1, Ordering::SeqCst);
            if self.reject_key {
                return Err(Error::Api(ApiError {
                    error: "bad_api_key".into(),
                    message: "invalid API key".into(),
                    url: String::new(),
                }));
            }
            Ok(ResourcesInfo {
                plan: "developer".into(),
                resources: Resources {
                    search: self.quota,
                    ..Default::default()
                },
            })
        }

        async fn dork_search(
            &self,
            dork: &str,
            page: usize,
            kind: Kind,
            _facets: &str,
        ) -> zoomeye::Result<SearchResult> {
            self.searches.fetch_add(1, Ordering::SeqCst);
            let start = (page - 1) * 20;
            let end = (start + 20).min(self.total as usize);
            if start >= end {
                return Err(Error::NoResults);
            }
            let mut result = SearchResult::new(kind);
            result.total = self.total;
            result.available = self.total;
            result.matches = (start..end)
                .map(|i| Record::try_from(json!({ "ip": format!("10.0.0.{i}"), "dork": dork })).unwrap())
                .collect();
            result.raw = format!("{{\"page\":{page}}}").into_bytes();
            Ok(result)
        }

        async fn history_ip(&self, ip: &str) -> zoomeye::Result<HistoryResult> {
            Ok(HistoryResult {
                count: 1,
                data: vec![Record::try_from(json!({ "ip": ip })).unwrap()],
            })
        }
    }

    pub fn config(tmp: &TempDir) -> Config {
        let config = Config::new(
            tmp.path().join("setting"),
            tmp.path().join("cache"),
            tmp.path().join("data"),
        );
        config.ensure_dirs().unwrap();
        config
    }

    pub fn agent(tmp: &TempDir, backend: Arc<FakeBackend>) -> Agent {
        Agent::with_backend(config(tmp), backend)
    }

    pub fn ips(result: &SearchResult) -> Vec<String> {
        result.matches.iter().map(|m| m.find_string("ip")).collect()
    }
}

use test_helpers::*;

#[tokio::test]
async fn test_search_truncates_to_requested_count() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    let backend = Arc::new(FakeBackend::new(10_000, 1_000));
    let mut agent = agent(&tmp, backend.clone());

    let result = agent.search("port:21", 30, Kind::Host, false).await?;
    assert_eq!(result.matches.len(), 30);
    assert_eq!(result.kind, Some(Kind::Host));
    assert_eq!(result.total, 1_000);
    assert_eq!(ips(&result)[0], "10.0.0.0");
    assert_eq!(ips(&result)[29], "10.0.0.29");
    assert_eq!(backend.searches(), 2);
    Ok(())
}

#[tokio::test]
async fn test_search_defaults_to_twenty() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    let backend = Arc::new(FakeBackend::new(10_000, 1_000));
    let mut agent = agent(&tmp, backend.clone());

    let result = agent.search("port:21", 0, Kind::Host, false).await?;
    assert_eq!(result.matches.len(), 20);
    assert_eq!(backend.searches(), 1);
    Ok(())
}

#[tokio::test]
async fn test_second_search_is_served_from_page_cache() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    let backend = Arc::new(FakeBackend::new(10_000, 1_000));
    let mut agent = agent(&tmp, backend.clone());

    let first = agent.search("app:nginx", 140, Kind::Host, false).await?;
    assert_eq!(backend.searches(), 7);

    let second = agent.search("app:nginx", 140, Kind::Host, false).await?;
    assert_eq!(backend.searches(), 7, "all pages should come from the cache");
    assert_eq!(ips(&first), ips(&second));
    Ok(())
}

#[tokio::test]
async fn test_force_bypasses_cache() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    let backend = Arc::new(FakeBackend::new(10_000, 1_000));
    let mut agent = agent(&tmp, backend.clone());

    agent.search("app:nginx", 40, Kind::Host, false).await?;
    agent.search("app:nginx", 40, Kind::Host, true).await?;
    assert_eq!(backend.searches(), 4);
    Ok(())
}

#[tokio::test]
async fn test_saved_result_short_circuits_search() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    let backend = Arc::new(FakeBackend::new(10_000, 1_000));
    let mut agent = agent(&tmp, backend.clone());

    let result = agent.search("site:example.com", 20, Kind::Web, false).await?;
    agent
        .save(&result, &local_result_key(Kind::Web, "site:example.com", 20))
        .await?;
    let infos_before = backend.info_calls.load(Ordering::SeqCst);

    let again = agent.search("site:example.com", 20, Kind::Web, false).await?;
    assert_eq!(again.kind, Some(Kind::Web));
    assert_eq!(ips(&again), ips(&result));
    assert_eq!(backend.searches(), 1);
    assert_eq!(backend.info_calls.load(Ordering::SeqCst), infos_before);
    Ok(())
}

#[tokio::test]
async fn test_quota_limits_search() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    let backend = Arc::new(FakeBackend::new(25, 1_000));
    let mut agent = agent(&tmp, backend.clone());

    let result = agent.search("port:80", 200, Kind::Host, false).await?;
    assert_eq!(result.matches.len(), 40);
    assert_eq!(backend.searches(), 2);
    Ok(())
}

#[tokio::test]
async fn test_short_result_set() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    let backend = Arc::new(FakeBackend::new(10_000, 45));
    let mut agent = agent(&tmp, backend.clone());

    let result = agent.search("rare", 200, Kind::Host, false).await?;
    assert_eq!(result.matches.len(), 45);
    assert_eq!(backend.searches(), 3);
    Ok(())
}

#[tokio::test]
async fn test_auth_error_propagates() {
    let tmp = tempfile::tempdir().unwrap();
    let mut fake = FakeBackend::new(10_000, 1_000);
    fake.reject_key = true;
    let backend = Arc::new(fake);
    let mut agent = agent(&tmp, backend.clone());

    let err = agent.search("port:21", 20, Kind::Host, false).await.unwrap_err();
    assert!(matches!(err, Error::Api(ref api) if api.message == "invalid API key"));
    assert_eq!(backend.searches(), 0);
}

#[tokio::test]
async fn test_missing_credentials() {
    let tmp = tempfile::tempdir().unwrap();
    let mut agent = Agent::new(config(&tmp));
    let err = agent.search("port:21", 20, Kind::Host, false).await.unwrap_err();
    assert!(matches!(err, Error::NoCredentials));
    assert!(matches!(agent.info().await, Err(Error::NoCredentials)));
}

#[tokio::test]
async fn test_history_and_clean() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    let backend = Arc::new(FakeBackend::new(10_000, 1_000));
    let mut agent = agent(&tmp, backend.clone());

    let history = agent.history("1.2.3.4").await?;
    assert_eq!(history.data[0].find_string("ip"), "1.2.3.4");

    agent.search("port:21", 40, Kind::Host, false).await?;
    assert_eq!(agent.clean().await?, 2);
    agent.search("port:21", 40, Kind::Host, false).await?;
    assert_eq!(backend.searches(), 4);
    Ok(())
}

#[tokio::test]
async fn test_load_and_save_filter_data() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    let backend = Arc::new(FakeBackend::new(10_000, 1_000));
    let mut agent = agent(&tmp, backend);

    let result = agent.search("port:21", 20, Kind::Host, false).await?;
    let path = agent.save(&result, "host_port%3A21_20").await?;

    let mut loaded = agent.load(&path).await?;
    assert_eq!(loaded.kind, Some(Kind::Host));
    let records = loaded.filter(&["ip=^10\\.0\\.0\\.1"]);
    assert_eq!(records.len(), 11);

    let out = tmp.path().join("filtered.json");
    agent.save_filter_data(&loaded.filter_cache, &out).await?;
    let saved: serde_json::Value = serde_json::from_slice(&std::fs::read(&out)?)?;
    assert_eq!(saved.as_array().unwrap().len(), 11);
    Ok(())
}
