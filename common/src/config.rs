use std::{
    fmt,
    path::{Path, PathBuf},
};

use anyhow::Result;
use serde::{
    de::{self, Visitor},
    Deserialize, Deserializer, Serialize,
};
use thiserror::Error;
use tracing::info;

use crate::exit;

pub const DEFAULT_IMAGE: &str = "factory.talos.dev/nocloud-installer/6adc7e7fba27948460e2231e5272e88b85159da3f3db980551976bf9898ff64b:v1.12.2";
pub const DEFAULT_K8S_VERSION: &str = "1.35.0";
pub const DEFAULT_CONFIG_DIR: &str = "config";

pub const MAX_CONTROL_PLANES: usize = 7;
pub const MAX_WORKERS: usize = 15;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0}")]
    Invalid(String),
}

/// Settings that used to be process-wide defaults. Every entry point takes
/// this explicitly.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub config_dir: PathBuf,
    pub image: String,
    pub k8s_version: String,
    pub verbose: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            config_dir: PathBuf::from(DEFAULT_CONFIG_DIR),
            image: DEFAULT_IMAGE.to_owned(),
            k8s_version: DEFAULT_K8S_VERSION.to_owned(),
            verbose: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterSet {
    #[serde(default = "default_cluster_name", deserialize_with = "scalar_string")]
    pub cluster_name: String,
    #[serde(default, deserialize_with = "scalar_string")]
    pub k8s_version: String,
    #[serde(default, deserialize_with = "scalar_string")]
    pub image: String,
    #[serde(default = "default_iface", deserialize_with = "scalar_string")]
    pub iface: String,
    #[serde(default = "default_cp_count")]
    pub cp_count: usize,
    #[serde(default)]
    pub worker_count: usize,
    #[serde(default, deserialize_with = "scalar_string")]
    pub gateway: String,
    #[serde(default = "default_netmask", deserialize_with = "scalar_string")]
    pub netmask: String,
    #[serde(default = "default_dns1", deserialize_with = "scalar_string")]
    pub dns1: String,
    #[serde(default = "default_dns2", deserialize_with = "scalar_string")]
    pub dns2: String,
    #[serde(default = "default_ntp1", deserialize_with = "scalar_string")]
    pub ntp1: String,
    #[serde(default = "default_ntp2", deserialize_with = "scalar_string")]
    pub ntp2: String,
    #[serde(default = "default_ntp3", deserialize_with = "scalar_string")]
    pub ntp3: String,
    #[serde(default, rename = "useVIP")]
    pub use_vip: bool,
    #[serde(default, rename = "vipIP", deserialize_with = "scalar_string")]
    pub vip_ip: String,
    #[serde(default)]
    pub use_ext_balancer: bool,
    #[serde(default, rename = "extBalancerIP", deserialize_with = "scalar_string")]
    pub ext_balancer_ip: String,
    #[serde(default = "default_disk", deserialize_with = "scalar_string")]
    pub disk: String,
    #[serde(default, rename = "useDRBD")]
    pub use_drbd: bool,
    #[serde(default, rename = "useZFS")]
    pub use_zfs: bool,
    #[serde(default, rename = "useSPL")]
    pub use_spl: bool,
    #[serde(default, rename = "useVFIOPCI")]
    pub use_vfio_pci: bool,
    #[serde(default, rename = "useVFIOIOMMU")]
    pub use_vfio_iommu: bool,
    #[serde(default, rename = "useOVS")]
    pub use_ovs: bool,
    #[serde(default)]
    pub use_mirrors: bool,
    #[serde(default)]
    pub use_max_pods: bool,
}

/// Reads any scalar into a string field. Cluster files are hand written and
/// `netmask: 24` or `k8sVersion: 1.35` arrive as numbers, which a flattened
/// struct would otherwise reject.
fn scalar_string<'de, D: Deserializer<'de>>(de: D) -> Result<String, D::Error> {
    struct Scalar;

    impl<'de> Visitor<'de> for Scalar {
        type Value = String;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a string, number or boolean")
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<String, E> {
            Ok(v.to_owned())
        }

        fn visit_string<E: de::Error>(self, v: String) -> Result<String, E> {
            Ok(v)
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_bool<E: de::Error>(self, v: bool) -> Result<String, E> {
            Ok(v.to_string())
        }

        // `gateway:` with nothing after it
        fn visit_unit<E: de::Error>(self) -> Result<String, E> {
            Ok(String::new())
        }
    }

    de.deserialize_any(Scalar)
}

fn default_cluster_name() -> String {
    "talos-demo".to_owned()
}

fn default_iface() -> String {
    "ens18".to_owned()
}

fn default_cp_count() -> usize {
    1
}

fn default_netmask() -> String {
    "24".to_owned()
}

fn default_dns1() -> String {
    "8.8.8.8".to_owned()
}

fn default_dns2() -> String {
    "8.8.4.4".to_owned()
}

fn default_ntp1() -> String {
    "1.ru.pool.ntp.org".to_owned()
}

fn default_ntp2() -> String {
    "2.ru.pool.ntp.org".to_owned()
}

fn default_ntp3() -> String {
    "3.ru.pool.ntp.org".to_owned()
}

fn default_disk() -> String {
    "/dev/sda".to_owned()
}

impl ParameterSet {
    /// Fills the installer image and Kubernetes version from the run
    /// configuration when the cluster file leaves them blank.
    pub fn fill_defaults(&mut self, run: &RunConfig) {
        if self.image.trim().is_empty() {
            self.image = run.image.clone();
        }
        if self.k8s_version.trim().is_empty() {
            self.k8s_version = run.k8s_version.clone();
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cp_count < 1 || self.cp_count > MAX_CONTROL_PLANES || self.cp_count % 2 == 0 {
            return Err(ConfigError::Invalid(format!(
                "control plane count must be odd and between 1 and {MAX_CONTROL_PLANES}, got {}",
                self.cp_count
            )));
        }
        if self.worker_count > MAX_WORKERS {
            return Err(ConfigError::Invalid(format!(
                "worker count must be between 0 and {MAX_WORKERS}, got {}",
                self.worker_count
            )));
        }
        if self.gateway.trim().is_empty() {
            return Err(ConfigError::Invalid("gateway is required".to_owned()));
        }
        if self.use_vip && self.vip_ip.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "useVIP is set but vipIP is empty".to_owned(),
            ));
        }
        Ok(())
    }

    /// Comma separated balancer list, each entry trimmed. Empty when the
    /// balancer toggle is off or the field is blank.
    pub fn ext_balancer_addresses(&self) -> Vec<String> {
        if !self.use_ext_balancer || self.ext_balancer_ip.is_empty() {
            return Vec::new();
        }
        self.ext_balancer_ip
            .split(',')
            .map(|x| x.trim().to_owned())
            .collect()
    }

    pub fn vip(&self) -> Option<&str> {
        if self.use_vip && !self.vip_ip.is_empty() {
            Some(self.vip_ip.as_str())
        } else {
            None
        }
    }
}

/// The non-interactive input: every parameter plus the node address lists.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ClusterFile {
    #[serde(flatten)]
    pub params: ParameterSet,
    #[serde(default, rename = "cpIPs")]
    pub cp_ips: Vec<String>,
    #[serde(default, rename = "workerIPs")]
    pub worker_ips: Vec<String>,
}

impl ClusterFile {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.params.validate()?;
        check_addresses("control plane", &self.cp_ips, self.params.cp_count)?;
        check_addresses("worker", &self.worker_ips, self.params.worker_count)
    }
}

fn check_addresses(kind: &str, ips: &[String], expected: usize) -> Result<(), ConfigError> {
    if ips.len() != expected {
        return Err(ConfigError::Invalid(format!(
            "expected {expected} {kind} addresses, got {}",
            ips.len()
        )));
    }
    if let Some(i) = ips.iter().position(|x| x.trim().is_empty()) {
        return Err(ConfigError::Invalid(format!(
            "{kind} address {} is empty",
            i + 1
        )));
    }
    Ok(())
}

pub fn parse_cluster_file(file: &Path) -> Result<ClusterFile> {
    let contents = match std::fs::read_to_string(file) {
        Ok(s) => s,
        Err(err) => exit!(err, "Could not read cluster file {}", file.display()),
    };

    let cluster = if file.extension().is_some_and(|x| x == "toml") {
        match toml::from_str::<ClusterFile>(&contents) {
            Ok(c) => c,
            Err(err) => exit!(err, "Could not parse cluster file {}", file.display()),
        }
    } else {
        match serde_yaml::from_str::<ClusterFile>(&contents) {
            Ok(c) => c,
            Err(err) => exit!(err, "Could not parse cluster file {}", file.display()),
        }
    };

    info!("cluster file parsed");
    Ok(cluster)
}
