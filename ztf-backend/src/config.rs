use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Backend configuration. Every remote endpoint the backend talks to is
/// overridable here, with production defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// None keeps cached query results for the process lifetime.
    #[serde(default)]
    pub cache_ttl_secs: Option<u64>,

    #[serde(default = "default_simbad_base_url")]
    pub simbad_base_url: String,

    #[serde(default = "default_vizier_base_url")]
    pub vizier_base_url: String,

    #[serde(default = "default_cds_mocserver_url")]
    pub cds_mocserver_url: String,

    #[serde(default = "default_ogle_api_url")]
    pub ogle_api_url: String,

    #[serde(default = "default_ogle_light_curve_base_url")]
    pub ogle_light_curve_base_url: String,

    #[serde(default = "default_ztf_api_base_url")]
    pub ztf_api_base_url: String,

    #[serde(default = "default_ztf_periodic_api_url")]
    pub ztf_periodic_api_url: String,

    #[serde(default = "default_features_api_url")]
    pub features_api_url: String,

    #[serde(default = "default_model_fit_api_url")]
    pub model_fit_api_url: String,

    #[serde(default = "default_products_base_url")]
    pub products_base_url: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_simbad_base_url() -> String {
    "http://simbad.u-strasbg.fr".to_string()
}

fn default_vizier_base_url() -> String {
    "http://vizier.u-strasbg.fr".to_string()
}

fn default_cds_mocserver_url() -> String {
    "http://alasky.unistra.fr/MocServer/query".to_string()
}

fn default_ogle_api_url() -> String {
    "http://ogle3.snad.space/api/v1/circle".to_string()
}

fn default_ogle_light_curve_base_url() -> String {
    "http://ogledb.astrouw.edu.pl/~ogle/CVS/images/".to_string()
}

fn default_ztf_api_base_url() -> String {
    "http://db.ztf.snad.space/api/".to_string()
}

fn default_ztf_periodic_api_url() -> String {
    "http://periodic.ztf.snad.space/api/v1/circle".to_string()
}

fn default_features_api_url() -> String {
    "http://features.lc.snad.space".to_string()
}

fn default_model_fit_api_url() -> String {
    "http://localhost:8000/api/v1".to_string()
}

fn default_products_base_url() -> String {
    "https://irsa.ipac.caltech.edu/ibe/data/ztf/".to_string()
}

impl Default for BackendConfig {
    fn default() -> Self {
        toml::from_str("").expect("empty config populates all defaults")
    }
}

impl BackendConfig {
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: BackendConfig = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn cache_ttl(&self) -> Option<Duration> {
        self.cache_ttl_secs.map(Duration::from_secs)
    }
}
