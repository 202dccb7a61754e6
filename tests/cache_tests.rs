use std::time::{Duration, SystemTime};

use anyhow::Result;
use serde_json::json;

use zoomeye::cache::{ResultStore, page_cache_key};
use zoomeye::{Kind, Record, SearchResult};

mod test_helpers {
    use super::*;
    use tempfile::TempDir;

    pub fn store(ttl_secs: i64) -> (TempDir, ResultStore) {
        let tmp = tempfile::tempdir().unwrap();
        let store = ResultStore::new(
            tmp.path().join("cache"),
            tmp.path().join("data"),
            chrono::Duration::seconds(ttl_secs),
        );
        (tmp, store)
    }

    pub fn sample(kind: Kind, field: &str) -> SearchResult {
        let mut result = SearchResult::new(kind);
        result.total = 2;
        result.available = 2;
        result.matches = vec![
            Record::try_from(json!({ field: "a", "ip": "1.1.1.1" })).unwrap(),
            Record::try_from(json!({ field: "b", "ip": "2.2.2.2" })).unwrap(),
        ];
        result
    }

    pub fn age_file(path: &std::path::Path, by: Duration) {
        let file = std::fs::File::options().write(true).open(path).unwrap();
        file.set_modified(SystemTime::now() - by).unwrap();
    }
}

use test_helpers::*;

#[tokio::test]
async fn test_page_roundtrip() -> Result<()> {
    let (_tmp, store) = store(3600);
    let key = page_cache_key(Kind::Host, "port:21", 1);
    assert!(store.read_page(&key).await.is_none());

    store.write_page(&key, &sample(Kind::Host, "app")).await?;
    let cached = store.read_page(&key).await.expect("cache hit");
    assert_eq!(cached.total, 2);
    assert_eq!(cached.matches[1].find_string("ip"), "2.2.2.2");
    assert!(!cached.raw.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_expired_page_is_removed_on_lookup() -> Result<()> {
    let (_tmp, store) = store(60);
    let key = page_cache_key(Kind::Host, "port:21", 1);
    store.write_page(&key, &sample(Kind::Host, "app")).await?;
    let path = store.cache_dir().join(&key);
    age_file(&path, Duration::from_secs(120));

    assert!(!store.has_cached(&path).await);
    assert!(!path.exists(), "expired cache file must be deleted");
    assert!(store.read_page(&key).await.is_none());
    Ok(())
}

#[tokio::test]
async fn test_fresh_page_is_kept() -> Result<()> {
    let (_tmp, store) = store(600);
    let key = page_cache_key(Kind::Web, "title:test", 3);
    store.write_page(&key, &sample(Kind::Web, "site")).await?;
    let path = store.cache_dir().join(&key);
    age_file(&path, Duration::from_secs(60));
    assert!(store.has_cached(&path).await);
    Ok(())
}

#[tokio::test]
async fn test_corrupt_page_is_a_miss() -> Result<()> {
    let (_tmp, store) = store(3600);
    let key = page_cache_key(Kind::Host, "dork", 1);
    std::fs::create_dir_all(store.cache_dir())?;
    std::fs::write(store.cache_dir().join(&key), b"{not json")?;
    assert!(store.read_page(&key).await.is_none());
    Ok(())
}

#[tokio::test]
async fn test_save_then_read_local() -> Result<()> {
    let (_tmp, store) = store(3600);
    let mut result = sample(Kind::Host, "app");
    let path = store.save(&result, "host_port%3A21_20").await?;
    assert!(path.is_absolute());
    assert!(!store.data_dir().join("host_port%3A21_20_filtered.json").exists());

    let local = store.read_local("host_port%3A21_20").await.expect("local hit");
    assert_eq!(local.matches.len(), 2);

    result.filter(&["ip"]);
    store.save(&result, "with_filter").await?;
    let filtered: serde_json::Value =
        serde_json::from_slice(&std::fs::read(store.data_dir().join("with_filter_filtered.json"))?)?;
    assert_eq!(filtered[0], json!({ "_index": "1.1.1.1", "ip": "1.1.1.1" }));
    Ok(())
}

#[tokio::test]
async fn test_expired_local_is_ignored_but_kept() -> Result<()> {
    let (_tmp, store) = store(60);
    let path = store.save(&sample(Kind::Host, "app"), "old").await?;
    age_file(&path, Duration::from_secs(3600));
    assert!(store.read_local("old").await.is_none());
    assert!(path.exists());
    Ok(())
}

#[tokio::test]
async fn test_load_infers_kind() -> Result<()> {
    let (_tmp, store) = store(3600);
    let web = store.save(&sample(Kind::Web, "site"), "web_dork_20").await?;
    let host = store.save(&sample(Kind::Host, "app"), "host_dork_20").await?;

    assert_eq!(ResultStore::load(&web).await?.kind, Some(Kind::Web));
    assert_eq!(ResultStore::load(&host).await?.kind, Some(Kind::Host));
    Ok(())
}

#[tokio::test]
async fn test_load_errors_are_returned() {
    let (tmp, _store) = store(3600);
    assert!(ResultStore::load(&tmp.path().join("missing.json")).await.is_err());

    let bad = tmp.path().join("bad.json");
    std::fs::write(&bad, b"[1, 2").unwrap();
    assert!(ResultStore::load(&bad).await.is_err());
}

#[tokio::test]
async fn test_clean_removes_cache_files() -> Result<()> {
    let (_tmp, store) = store(3600);
    assert_eq!(store.clean().await?, 0);
    for page in 1..=3 {
        let key = page_cache_key(Kind::Host, "dork", page);
        store.write_page(&key, &sample(Kind::Host, "app")).await?;
    }
    assert_eq!(store.clean().await?, 3);
    assert!(store.read_page(&page_cache_key(Kind::Host, "dork", 1)).await.is_none());
    Ok(())
}
