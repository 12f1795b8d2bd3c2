use std::{
    fs::File,
    io::{BufReader, Read},
};

use serde::{Deserialize, Serialize};

use crate::DevEnvError;

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct DevEnvConfig {
    #[serde(rename = "volumes")]
    pub volume_config: VolumeConfig,
    #[serde(rename = "ingress")]
    pub ingress_config: IngressConfig,
    #[serde(rename = "workload")]
    pub workload_config: WorkloadConfig,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct VolumeConfig {
    pub size: String,
    pub storage_class: Option<String>,
}

impl Default for VolumeConfig {
    fn default() -> Self {
        VolumeConfig {
            size: "10Gi".into(),
            storage_class: None,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct IngressConfig {
    pub domain: String,
    pub class: Option<String>,
    pub tls_secret: Option<String>,
}

impl Default for IngressConfig {
    fn default() -> Self {
        IngressConfig {
            domain: "dev.localhost".into(),
            class: None,
            tls_secret: None,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct WorkloadConfig {
    pub image_pull_policy: String,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        WorkloadConfig {
            image_pull_policy: "IfNotPresent".into(),
        }
    }
}

impl DevEnvConfig {
    pub fn from_path(config_path: &str) -> Result<DevEnvConfig, DevEnvError> {
        let file = File::open(config_path).map_err(|e| DevEnvError {
            message: format!("unable to read file {}: {}", config_path, e),
            code: 500,
        })?;
        let mut file_reader = BufReader::new(file);
        let mut file_buffer = vec![];
        file_reader
            .read_to_end(&mut file_buffer)
            .map_err(|e| DevEnvError {
                message: format!("unable to read file {}: {}", config_path, e),
                code: 500,
            })?;
        DevEnvConfig::from_slice(&file_buffer)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<DevEnvConfig, DevEnvError> {
        toml::from_slice(bytes).map_err(|e| DevEnvError {
            message: format!("config file malformatted: {}", e),
            code: 500,
        })
    }
}
