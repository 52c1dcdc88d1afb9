//! Search configuration
//!
//! Values are layered: built-in defaults, then an optional config file, then
//! `GRANULE_SEARCH__*` environment variables (e.g. `GRANULE_SEARCH__PROVIDER`).

use crate::error::Result;
use crate::subquery::PlanOptions;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_HOST: &str = "cmr.earthdata.nasa.gov";
pub const DEFAULT_SEARCH_PATH: &str = "/search/granules.umm_json_v1_4";
pub const DEFAULT_PROVIDER: &str = "ASF";
/// Largest page CMR serves.
pub const DEFAULT_PAGE_SIZE: usize = 2000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub host: String,
    pub search_path: String,
    pub provider: String,
    pub page_size: usize,
    pub timeout_secs: u64,
    /// Default result cap when the caller gives none.
    pub max_results: Option<usize>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            search_path: DEFAULT_SEARCH_PATH.to_string(),
            provider: DEFAULT_PROVIDER.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            timeout_secs: 30,
            max_results: None,
        }
    }
}

impl SearchConfig {
    /// Load defaults, then `path` if given, then the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);
        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }
        let config = builder
            .add_source(
                Environment::with_prefix("GRANULE_SEARCH")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let loaded: Self = config.try_deserialize()?;
        tracing::debug!(
            host = %loaded.host,
            provider = %loaded.provider,
            "Loaded search configuration"
        );
        Ok(loaded)
    }

    /// Full search endpoint, with exactly one `/` between host and path.
    pub fn search_url(&self) -> String {
        let host = self
            .host
            .trim_start_matches("https://")
            .trim_start_matches("http://")
            .trim_matches('/');
        let path = self.search_path.trim_matches('/');
        format!("https://{}/{}", host, path)
    }

    /// Plan settings, with `max_results` overriding the configured cap.
    pub fn plan_options(&self, max_results: Option<usize>) -> PlanOptions {
        PlanOptions {
            provider: self.provider.clone(),
            page_size: self.page_size,
            max_results: max_results.or(self.max_results),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Mutex, MutexGuard};
    use tempfile::TempDir;

    /// Tests that read or write `GRANULE_SEARCH__*` variables run one at a time.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    const ENV_VARS: [&str; 4] = [
        "GRANULE_SEARCH__HOST",
        "GRANULE_SEARCH__PROVIDER",
        "GRANULE_SEARCH__PAGE_SIZE",
        "GRANULE_SEARCH__MAX_RESULTS",
    ];

    fn env_lock() -> MutexGuard<'static, ()> {
        let guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        for var in ENV_VARS {
            std::env::remove_var(var);
        }
        guard
    }

    fn write_config(dir: &TempDir, name: &str, contents: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_search_url_joins_once() {
        let config = SearchConfig {
            host: "https://cmr.uat.earthdata.nasa.gov/".to_string(),
            search_path: "/search/granules.umm_json_v1_4".to_string(),
            ..SearchConfig::default()
        };
        assert_eq!(
            config.search_url(),
            "https://cmr.uat.earthdata.nasa.gov/search/granules.umm_json_v1_4"
        );
        assert_eq!(
            SearchConfig::default().search_url(),
            "https://cmr.earthdata.nasa.gov/search/granules.umm_json_v1_4"
        );
    }

    #[test]
    fn test_plan_options_prefers_explicit_cap() {
        let config = SearchConfig {
            max_results: Some(50),
            ..SearchConfig::default()
        };
        assert_eq!(config.plan_options(Some(5)).max_results, Some(5));
        assert_eq!(config.plan_options(None).max_results, Some(50));
        assert_eq!(config.plan_options(None).page_size, DEFAULT_PAGE_SIZE);
    }

    #[test]
    fn test_load_defaults() {
        let _guard = env_lock();
        let config = SearchConfig::load(None).unwrap();
        assert_eq!(config, SearchConfig::default());
    }

    #[test]
    fn test_file_overrides_defaults() {
        let _guard = env_lock();
        let dir = TempDir::new().unwrap();
        let path = write_config(
            &dir,
            "search.toml",
            r#"
host = "cmr.uat.earthdata.nasa.gov"
provider = "ASF_UAT"
max_results = 250
"#,
        );

        let config = SearchConfig::load(Some(&path)).unwrap();
        assert_eq!(config.host, "cmr.uat.earthdata.nasa.gov");
        assert_eq!(config.provider, "ASF_UAT");
        assert_eq!(config.max_results, Some(250));
        assert_eq!(config.page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(config.search_path, DEFAULT_SEARCH_PATH);
    }

    #[test]
    fn test_json_file_is_accepted() {
        let _guard = env_lock();
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "search.json", r#"{"page_size": 500, "timeout_secs": 5}"#);

        let config = SearchConfig::load(Some(&path)).unwrap();
        assert_eq!(config.page_size, 500);
        assert_eq!(config.timeout_secs, 5);
        assert_eq!(config.provider, DEFAULT_PROVIDER);
    }

    #[test]
    fn test_environment_overrides_defaults() {
        let _guard = env_lock();
        std::env::set_var("GRANULE_SEARCH__PROVIDER", "XYZ");
        std::env::set_var("GRANULE_SEARCH__PAGE_SIZE", "10");
        std::env::set_var("GRANULE_SEARCH__MAX_RESULTS", "7");

        let config = SearchConfig::load(None);
        for var in ENV_VARS {
            std::env::remove_var(var);
        }

        let config = config.unwrap();
        assert_eq!(config.provider, "XYZ");
        assert_eq!(config.page_size, 10);
        assert_eq!(config.max_results, Some(7));
        assert_eq!(config.host, DEFAULT_HOST);
    }

    #[test]
    fn test_environment_overrides_file() {
        let _guard = env_lock();
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "search.toml", "provider = \"FROM_FILE\"\npage_size = 100\n");
        std::env::set_var("GRANULE_SEARCH__PROVIDER", "FROM_ENV");

        let config = SearchConfig::load(Some(&path));
        for var in ENV_VARS {
            std::env::remove_var(var);
        }

        let config = config.unwrap();
        assert_eq!(config.provider, "FROM_ENV");
        assert_eq!(config.page_size, 100);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let _guard = env_lock();
        let dir = TempDir::new().unwrap();
        let err = SearchConfig::load(Some(&dir.path().join("absent.toml"))).unwrap_err();
        assert!(matches!(err, crate::error::Error::Config(_)));
        assert!(err.is_configuration());
    }
}
