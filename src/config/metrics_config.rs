//! Metrics environment configuration.
//!
//! The push sink tags every point with where the service runs. NAIS injects
//! these variables in the cluster; locally the defaults apply.

use std::env;

pub const APP_NAME_VAR: &str = "NAIS_APP_NAME";
pub const CLUSTER_NAME_VAR: &str = "NAIS_CLUSTER_NAME";
pub const NAMESPACE_VAR: &str = "NAIS_NAMESPACE";

/// Metrics environment configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsEnvConfig {
    pub application: String,
    pub cluster: String,
    pub namespace: String,
}

impl Default for MetricsEnvConfig {
    fn default() -> Self {
        Self {
            application: "medlemskap-mini".to_string(),
            cluster: "dev-gcp".to_string(),
            namespace: "default".to_string(),
        }
    }
}

impl MetricsEnvConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any variable source; absent keys fall back to the defaults
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            application: lookup(APP_NAME_VAR).unwrap_or(defaults.application),
            cluster: lookup(CLUSTER_NAME_VAR).unwrap_or(defaults.cluster),
            namespace: lookup(NAMESPACE_VAR).unwrap_or(defaults.namespace),
        }
    }

    /// Tags attached to every pushed metric
    pub fn common_tags(&self) -> Vec<(String, String)> {
        vec![
            ("application".to_string(), self.application.clone()),
            ("cluster".to_string(), self.cluster.clone()),
            ("namespace".to_string(), self.namespace.clone()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_metrics_config_defaults() {
        let config = MetricsEnvConfig::from_lookup(|_| None);
        assert_eq!(config.application, "medlemskap-mini");
        assert_eq!(config.cluster, "dev-gcp");
        assert_eq!(config.namespace, "default");
    }

    #[test]
    fn test_metrics_config_reads_nais_variables() {
        let vars: HashMap<&str, &str> = HashMap::from([
            (APP_NAME_VAR, "medlemskap-oppslag"),
            (CLUSTER_NAME_VAR, "prod-gcp"),
        ]);
        let config = MetricsEnvConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string()));
        assert_eq!(config.application, "medlemskap-oppslag");
        assert_eq!(config.cluster, "prod-gcp");
        assert_eq!(config.namespace, "default");
    }

    #[test]
    fn test_common_tags_order() {
        let tags = MetricsEnvConfig::default().common_tags();
        let keys: Vec<&str> = tags.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["application", "cluster", "namespace"]);
    }
}
