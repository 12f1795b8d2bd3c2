use serde::{Deserialize, Serialize};

use crate::DevEnvError;

pub const MAX_DEV_VOLUMES: usize = 2;
const DEFAULT_WORKDIR: &str = "/app";
const DEFAULT_PORT: i32 = 8080;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct User {
    pub id: String,
    pub github_id: String,
}

/// Namespace scope of every resource belonging to a user. Rebuilt from the
/// `User` on each call and never stored.
#[derive(Debug, Clone, PartialEq)]
pub struct Space {
    pub id: String,
    pub name: String,
}

impl Space {
    pub fn for_user(user: &User) -> Space {
        Space {
            id: user.id.clone(),
            name: user.github_id.to_lowercase(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct EnvVar {
    pub name: String,
    pub value: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Dev {
    pub name: String,
    pub image: String,
    #[serde(default)]
    pub command: Option<Vec<String>>,
    #[serde(default = "default_workdir")]
    pub workdir: String,
    #[serde(default)]
    pub environment: Vec<EnvVar>,
    #[serde(default = "default_port")]
    pub port: i32,
    #[serde(default)]
    pub volumes: Vec<String>,
}

fn default_workdir() -> String {
    DEFAULT_WORKDIR.into()
}

fn default_port() -> i32 {
    DEFAULT_PORT
}

impl Dev {
    pub fn from_yaml(manifest: &str) -> Result<Dev, DevEnvError> {
        serde_yaml::from_str(manifest).map_err(|e| DevEnvError {
            message: format!("invalid dev manifest: {}", e),
            code: 400,
        })
    }

    pub fn volume_name(&self) -> String {
        format!("pvc-{}-0", self.name)
    }

    pub fn volume_data_name(&self, idx: usize) -> String {
        format!("pvc-{}-{}", self.name, idx + 1)
    }

    pub fn secret_name(&self) -> String {
        format!("{}-secret", self.name)
    }
}
