use std::time::Duration;

use portfina_core::catalog::{Catalog, FILE_KIND, JOB_KIND};
use portfina_core::error::CoreError;
use portfina_orchestrator::OrchestratorConfig;

/// Errors raised while loading [`DashboardConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("ORCHESTRATOR_URL must start with http:// or https://, got {0}")]
    InvalidUrl(String),

    #[error(transparent)]
    Catalog(#[from] CoreError),
}

/// Console configuration loaded from environment variables.
///
/// All fields have defaults suitable for a local orchestrator.
#[derive(Debug, Clone)]
pub struct DashboardConfig {
    /// Orchestrator base URL (default: `http://localhost:8081`).
    pub orchestrator_url: String,
    /// Seconds between status polls of a watched job (default: `5`).
    pub poll_interval_secs: u64,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Upload file keys, from the comma-separated `FILE_KEYS`.
    pub files: Catalog,
    /// Job keys, from the comma-separated `JOB_KEYS`.
    pub jobs: Catalog,
}

impl DashboardConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                  |
    /// |------------------------|--------------------------|
    /// | `ORCHESTRATOR_URL`     | `http://localhost:8081`  |
    /// | `POLL_INTERVAL_SECS`   | `5`                      |
    /// | `REQUEST_TIMEOUT_SECS` | `30`                     |
    /// | `FILE_KEYS`            | built-in file catalog    |
    /// | `JOB_KEYS`             | built-in job catalog     |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let orchestrator_url = lookup("ORCHESTRATOR_URL")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| "http://localhost:8081".into());
        check_url(&orchestrator_url)?;

        let poll_interval_secs = parse_secs(&lookup, "POLL_INTERVAL_SECS", 5);
        let request_timeout_secs = parse_secs(&lookup, "REQUEST_TIMEOUT_SECS", 30);

        let files = match lookup("FILE_KEYS") {
            Some(list) => Catalog::from_keys(FILE_KIND, &list)?,
            None => Catalog::default_files(),
        };
        let jobs = match lookup("JOB_KEYS") {
            Some(list) => Catalog::from_keys(JOB_KIND, &list)?,
            None => Catalog::default_jobs(),
        };

        Ok(Self {
            orchestrator_url,
            poll_interval_secs,
            request_timeout_secs,
            files,
            jobs,
        })
    }

    /// Point at a different orchestrator, such as one given on the
    /// command line.
    pub fn with_orchestrator_url(mut self, url: impl Into<String>) -> Result<Self, ConfigError> {
        let url = url.into();
        check_url(&url)?;
        self.orchestrator_url = url;
        Ok(self)
    }

    /// The client-side view of this config.
    pub fn orchestrator(&self) -> OrchestratorConfig {
        OrchestratorConfig::new(self.orchestrator_url.clone())
            .with_poll_interval(Duration::from_secs(self.poll_interval_secs))
            .with_request_timeout(Duration::from_secs(self.request_timeout_secs))
            .with_files(self.files.clone())
            .with_jobs(self.jobs.clone())
    }
}

fn check_url(url: &str) -> Result<(), ConfigError> {
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(ConfigError::InvalidUrl(url.to_string()))
    }
}

/// Parse a positive number of seconds, falling back to `default` with a
/// warning on anything else.
fn parse_secs(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: u64) -> u64 {
    match lookup(name) {
        None => default,
        Some(raw) => match raw.trim().parse::<u64>() {
            Ok(secs) if secs > 0 => secs,
            _ => {
                tracing::warn!(var = name, value = %raw, default, "Invalid value, using default");
                default
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let config = DashboardConfig::from_lookup(lookup(&[])).unwrap();

        assert_eq!(config.orchestrator_url, "http://localhost:8081");
        assert_eq!(config.poll_interval_secs, 5);
        assert_eq!(config.request_timeout_secs, 30);
        assert_eq!(config.files.entries().len(), 7);
        assert_eq!(config.jobs.entries().len(), 8);
    }

    #[test]
    fn overrides_are_applied() {
        let config = DashboardConfig::from_lookup(lookup(&[
            ("ORCHESTRATOR_URL", "https://airflow.internal:8443"),
            ("POLL_INTERVAL_SECS", "2"),
            ("JOB_KEYS", "bond_enrichment_dag"),
        ]))
        .unwrap();

        let orchestrator = config.orchestrator();
        assert_eq!(orchestrator.base_url, "https://airflow.internal:8443");
        assert_eq!(orchestrator.poll_interval, Duration::from_secs(2));
        assert_eq!(orchestrator.jobs.entries().len(), 1);
    }

    #[test]
    fn invalid_numbers_fall_back() {
        let config = DashboardConfig::from_lookup(lookup(&[
            ("POLL_INTERVAL_SECS", "soon"),
            ("REQUEST_TIMEOUT_SECS", "0"),
        ]))
        .unwrap();

        assert_eq!(config.poll_interval_secs, 5);
        assert_eq!(config.request_timeout_secs, 30);
    }

    #[test]
    fn non_http_url_is_rejected() {
        let result =
            DashboardConfig::from_lookup(lookup(&[("ORCHESTRATOR_URL", "localhost:8081")]));
        assert_matches!(result, Err(ConfigError::InvalidUrl(_)));
    }

    #[test]
    fn url_override_is_validated() {
        let config = DashboardConfig::from_lookup(lookup(&[])).unwrap();

        let moved = config.clone().with_orchestrator_url("http://10.0.0.5:8081").unwrap();
        assert_eq!(moved.orchestrator_url, "http://10.0.0.5:8081");
        assert_matches!(config.with_orchestrator_url("ftp://x"), Err(ConfigError::InvalidUrl(_)));
    }

    #[test]
    fn empty_key_list_is_rejected() {
        let result = DashboardConfig::from_lookup(lookup(&[("FILE_KEYS", ",")]));
        assert_matches!(result, Err(ConfigError::Catalog(_)));
    }
}
