// Configuration loading and management.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const PROD: &str = "prod";
#[allow(dead_code)]
pub const DEV: &str = "dev";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Burrow {
    #[serde(rename = "burrow")]
    pub burrow: BurrowBox,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BurrowBox {
    pub env: String,
    pub logs: Option<Logs>,
    pub runtime: Option<Runtime>,
    pub api: Option<Api>,
    pub storage: Option<StorageConfig>,
    pub proxy: Option<Proxy>,
    pub k8s: Option<K8S>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Logs {
    pub level: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Runtime {
    pub num_cpus: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Api {
    pub name: Option<String>,
    pub port: Option<String>,
}

/// Object-store connection details (spec §6 "Environment variables").
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    pub bucket_name: Option<String>,
    pub bucket_region: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Proxy {
    pub proxy_name: Option<String>,
    #[serde(default, with = "humantime_serde")]
    pub default_timeout: Option<Duration>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Probe {
    #[serde(with = "humantime_serde")]
    pub timeout: Option<Duration>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct K8S {
    pub probe: Probe,
}

pub trait ConfigTrait {
    fn logs(&self) -> Option<&Logs>;
    fn is_prod(&self) -> bool;
    fn runtime(&self) -> &Runtime;
    fn api(&self) -> Option<&Api>;
    fn storage(&self) -> Option<&StorageConfig>;
    fn proxy(&self) -> Option<&Proxy>;
    fn k8s(&self) -> Option<&K8S>;
    /// The `region` metadata tag stamped on cached objects (spec §6):
    /// `AWS_REGION`/`AWS_DEFAULT_REGION`, falling back to the configured
    /// bucket region.
    fn region(&self) -> String;
}

pub type Config = Burrow;

impl ConfigTrait for Config {
    fn logs(&self) -> Option<&Logs> {
        self.burrow.logs.as_ref()
    }

    fn is_prod(&self) -> bool {
        self.burrow.env == PROD
    }

    fn runtime(&self) -> &Runtime {
        self.burrow.runtime.as_ref().unwrap_or(&Runtime { num_cpus: 0 })
    }

    fn api(&self) -> Option<&Api> {
        self.burrow.api.as_ref()
    }

    fn storage(&self) -> Option<&StorageConfig> {
        self.burrow.storage.as_ref()
    }

    fn proxy(&self) -> Option<&Proxy> {
        self.burrow.proxy.as_ref()
    }

    fn k8s(&self) -> Option<&K8S> {
        self.burrow.k8s.as_ref()
    }

    fn region(&self) -> String {
        std::env::var("AWS_REGION")
            .or_else(|_| std::env::var("AWS_DEFAULT_REGION"))
            .ok()
            .or_else(|| self.storage().and_then(|s| s.bucket_region.clone()))
            .unwrap_or_else(|| "unknown".to_string())
    }
}

impl Config {
    /// Loads configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let abs_path = path
            .canonicalize()
            .with_context(|| format!("failed to resolve absolute config filepath: {:?}", path))?;

        let data = std::fs::read_to_string(&abs_path)
            .with_context(|| format!("read config yaml file {:?}", abs_path))?;

        let cfg: Config = serde_yaml::from_str(&data)
            .with_context(|| format!("unmarshal yaml from {:?}", abs_path))?;

        Ok(cfg)
    }
}
