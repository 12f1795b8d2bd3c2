use std::{collections::BTreeMap, fmt};

use kube::api::ObjectMeta;
use strum_macros::EnumIter;

use crate::model::Space;

pub mod deployments;
pub mod ingresses;
pub mod secrets;
pub mod services;
pub mod volumes;

pub const APP_LABEL: &str = "app";
pub const SPACE_LABEL: &str = "dev-env.io/space";

#[derive(EnumIter, Debug, Clone, Copy, PartialEq)]
pub enum DevEnvResource {
    Secret,
    Pvc,
    Deployment,
    Service,
    Ingress,
}

impl fmt::Display for DevEnvResource {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DevEnvResource::Secret => write!(f, "secret"),
            DevEnvResource::Pvc => write!(f, "pvc"),
            DevEnvResource::Deployment => write!(f, "deployment"),
            DevEnvResource::Service => write!(f, "service"),
            DevEnvResource::Ingress => write!(f, "ingress"),
        }
    }
}

/// Names the resource, places it in the space's namespace and tags it with
/// the owning space, keeping any labels the template already carries.
pub(crate) fn scope_metadata(metadata: &mut ObjectMeta, name: &str, space: &Space) {
    metadata.name = Some(name.to_owned());
    metadata.namespace = Some(space.name.to_owned());
    metadata
        .labels
        .get_or_insert_with(BTreeMap::new)
        .insert(SPACE_LABEL.into(), space.id.to_owned());
}

pub(crate) fn add_label(metadata: &mut ObjectMeta, key: &str, value: &str) {
    metadata
        .labels
        .get_or_insert_with(BTreeMap::new)
        .insert(key.into(), value.into());
}
