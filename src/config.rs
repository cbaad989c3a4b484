use std::path::PathBuf;

/// Environment variables checked, in order, for the pepy API key
pub const PEPY_KEY_VARS: [&str; 4] = ["PYPI_TOKEN", "PEPY_API_KEY", "PEPY_KEY", "PEPY_TOKEN"];

/// Environment variables checked, in order, for the BigQuery billing project
pub const WAREHOUSE_PROJECT_VARS: [&str; 2] = ["BIGQUERY_PROJECT", "GOOGLE_CLOUD_PROJECT"];

/// Environment variable holding a BigQuery OAuth access token
pub const WAREHOUSE_TOKEN_VAR: &str = "BIGQUERY_ACCESS_TOKEN";

/// Returns the path to the data directory for pkgstats.
/// Uses $XDG_DATA_HOME/pkgstats if XDG_DATA_HOME is set,
/// otherwise falls back to ~/.local/share/pkgstats,
/// or ./pkgstats if neither is available.
pub fn data_dir() -> PathBuf {
    data_dir_with_env(std::env::var("XDG_DATA_HOME").ok(), dirs::home_dir())
}

/// Returns the path to the log file.
pub fn log_path() -> PathBuf {
    data_dir().join(LOG_FILE_NAME)
}

pub const LOG_FILE_NAME: &str = "pkgstats.log";

fn data_dir_with_env(xdg_data_home: Option<String>, home_dir: Option<PathBuf>) -> PathBuf {
    let data_dir = xdg_data_home
        .map(PathBuf::from)
        .or_else(|| home_dir.map(|home| home.join(".local/share")))
        .unwrap_or_else(|| PathBuf::from("."));

    data_dir.join("pkgstats")
}

/// Credentials for the BigQuery REST API
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WarehouseCredentials {
    pub project_id: String,
    pub access_token: String,
}

/// Optional tokens and credentials for upstream providers.
///
/// Built once and handed to the resolver so the fallback chain never reads
/// the process environment itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderConfig {
    pub npm_token: Option<String>,
    pub pepy_api_key: Option<String>,
    pub github_token: Option<String>,
    pub warehouse: Option<WarehouseCredentials>,
}

impl ProviderConfig {
    /// Reads the configuration from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads the configuration through `lookup`; empty values count as unset
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        let first = |names: &[&str]| names.iter().find_map(|name| get(name));

        let warehouse = match (first(&WAREHOUSE_PROJECT_VARS[..]), get(WAREHOUSE_TOKEN_VAR)) {
            (Some(project_id), Some(access_token)) => Some(WarehouseCredentials {
                project_id,
                access_token,
            }),
            _ => None,
        };

        Self {
            npm_token: get("NPM_TOKEN"),
            pepy_api_key: first(&PEPY_KEY_VARS[..]),
            github_token: get("GITHUB_TOKEN"),
            warehouse,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| vars.get(name).cloned()
    }

    #[test]
    fn data_dir_with_env_uses_xdg_data_home_when_set() {
        let path = data_dir_with_env(
            Some("/tmp/test-data".to_string()),
            Some(PathBuf::from("/home/user")),
        );

        assert_eq!(path, PathBuf::from("/tmp/test-data/pkgstats"));
    }

    #[test]
    fn data_dir_with_env_falls_back_to_home_local_share() {
        let path = data_dir_with_env(None, Some(PathBuf::from("/home/user")));

        assert_eq!(path, PathBuf::from("/home/user/.local/share/pkgstats"));
    }

    #[test]
    fn data_dir_with_env_falls_back_to_current_dir_when_no_dirs_available() {
        let path = data_dir_with_env(None, None);
        assert_eq!(path, PathBuf::from("./pkgstats"));
    }

    #[test]
    fn from_lookup_prefers_explicit_pypi_token_for_pepy() {
        let config = ProviderConfig::from_lookup(lookup(&[
            ("PEPY_TOKEN", "third"),
            ("PYPI_TOKEN", "explicit"),
        ]));

        assert_eq!(config.pepy_api_key.as_deref(), Some("explicit"));
    }

    #[test]
    fn from_lookup_walks_pepy_fallback_chain_in_order() {
        let config = ProviderConfig::from_lookup(lookup(&[
            ("PEPY_TOKEN", "third"),
            ("PEPY_KEY", "second"),
            ("PYPI_TOKEN", "  "),
        ]));

        assert_eq!(config.pepy_api_key.as_deref(), Some("second"));
    }

    #[test]
    fn from_lookup_requires_both_warehouse_values() {
        let config = ProviderConfig::from_lookup(lookup(&[("BIGQUERY_PROJECT", "proj")]));
        assert_eq!(config.warehouse, None);

        let config = ProviderConfig::from_lookup(lookup(&[
            ("GOOGLE_CLOUD_PROJECT", "proj"),
            ("BIGQUERY_ACCESS_TOKEN", "ya29.token"),
        ]));
        assert_eq!(
            config.warehouse,
            Some(WarehouseCredentials {
                project_id: "proj".to_string(),
                access_token: "ya29.token".to_string(),
            })
        );
    }

    #[test]
    fn from_lookup_with_empty_environment_is_default() {
        let config = ProviderConfig::from_lookup(|_| None);
        assert_eq!(config, ProviderConfig::default());
    }

    #[test]
    #[serial_test::serial]
    fn from_env_reads_process_environment() {
        // SAFETY: serialized with every other test touching the environment
        unsafe {
            std::env::set_var("NPM_TOKEN", "npm-secret");
            std::env::remove_var("GITHUB_TOKEN");
        }

        let config = ProviderConfig::from_env();

        unsafe {
            std::env::remove_var("NPM_TOKEN");
        }
        assert_eq!(config.npm_token.as_deref(), Some("npm-secret"));
        assert_eq!(config.github_token, None);
    }
}
