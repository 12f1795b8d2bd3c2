use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::Secret;
use rand::{distributions::Alphanumeric, Rng};

use super::{add_label, scope_metadata, DevEnvResource, APP_LABEL};
use crate::{
    model::{Dev, Space},
    template_parser::get_resource_from_template,
    DevEnvError, DevEnvK8sManager,
};

pub const SYNC_API_KEY: &str = "sync-api-key";
pub const DEV_NAME_KEY: &str = "dev-name";
const API_KEY_LEN: usize = 32;

fn generate_api_key() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(API_KEY_LEN)
        .map(char::from)
        .collect()
}

pub fn translate(dev: &Dev, space: &Space) -> Result<Secret, DevEnvError> {
    let mut secret: Secret = get_resource_from_template(DevEnvResource::Secret)?;

    scope_metadata(&mut secret.metadata, &dev.secret_name(), space);
    add_label(&mut secret.metadata, APP_LABEL, &dev.name);
    secret.string_data = Some(BTreeMap::from([
        (SYNC_API_KEY.into(), generate_api_key()),
        (DEV_NAME_KEY.into(), dev.name.to_owned()),
    ]));
    Ok(secret)
}

/// An existing secret is kept so file-sync credentials stay stable across
/// repeated activations.
pub async fn create(dev: &Dev, space: &Space, k8s: &DevEnvK8sManager) -> Result<(), DevEnvError> {
    let secret = translate(dev, space)?;
    k8s.create_resource_if_absent(&space.name, secret, DevEnvResource::Secret)
        .await
}

pub async fn destroy(dev: &Dev, space: &Space, k8s: &DevEnvK8sManager) -> Result<(), DevEnvError> {
    k8s.delete_resource::<Secret>(&space.name, &dev.secret_name(), DevEnvResource::Secret)
        .await
}
