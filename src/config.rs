use dotenvy::dotenv;
use once_cell::sync::Lazy;
use std::env;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_PATH: &str = "~/.config/zoomeye/setting";
pub const DEFAULT_CACHE_PATH: &str = "~/.config/zoomeye/cache";
pub const DEFAULT_DATA_PATH: &str = "data";
/// Five days.
pub const DEFAULT_EXPIRED_SECS: u64 = 432_000;
pub const DEFAULT_API_BASE: &str = "https://api.zoomeye.org";

pub static CONFIG: Lazy<Config> = Lazy::new(|| {
    dotenv().ok(); // Load .env file if present
    Config::from_env()
});

#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding the `apikey` / `jwt` credential files.
    pub config_path: PathBuf,
    /// Per-page cache directory.
    pub cache_path: PathBuf,
    /// Full-result local store directory.
    pub data_path: PathBuf,
    pub expired_secs: u64,
    pub api_base: String,
}

impl Config {
    pub fn new(config_path: PathBuf, cache_path: PathBuf, data_path: PathBuf) -> Config {
        Config {
            config_path,
            cache_path,
            data_path,
            expired_secs: DEFAULT_EXPIRED_SECS,
            api_base: DEFAULT_API_BASE.to_string(),
        }
    }

    pub fn from_env() -> Config {
        let expired_secs = env::var("EXPIRED_TIME")
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .unwrap_or(DEFAULT_EXPIRED_SECS);

        Config {
            config_path: expand(&get_env_or_default("ZOOMEYE_CONFIG_PATH", DEFAULT_CONFIG_PATH)),
            cache_path: expand(&get_env_or_default("ZOOMEYE_CACHE_PATH", DEFAULT_CACHE_PATH)),
            data_path: expand(&get_env_or_default("ZOOMEYE_DATA_PATH", DEFAULT_DATA_PATH)),
            expired_secs,
            api_base: get_env_or_default("ZOOMEYE_API_BASE", DEFAULT_API_BASE),
        }
    }

    pub fn ttl(&self) -> chrono::Duration {
        let secs = i64::try_from(self.expired_secs)
            .unwrap_or(i64::MAX)
            .min(i64::MAX / 1000);
        chrono::Duration::seconds(secs)
    }

    /// Creates the config, cache and data directories when they are missing.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        for dir in [&self.config_path, &self.cache_path, &self.data_path] {
            ensure_dir(dir)?;
        }
        Ok(())
    }
}

fn ensure_dir(dir: &Path) -> std::io::Result<()> {
    if dir.is_dir() {
        return Ok(());
    }
    std::fs::create_dir_all(dir)
}

fn expand(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).into_owned())
}

fn get_env_or_default(key: &str, default: &str) -> String {
    env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}
