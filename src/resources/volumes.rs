use std::collections::BTreeMap;

use k8s_openapi::{
    api::core::v1::{PersistentVolumeClaim, ResourceRequirements},
    apimachinery::pkg::api::resource::Quantity,
};

use super::{scope_metadata, DevEnvResource};
use crate::{
    config::VolumeConfig, model::Space, template_parser::get_resource_from_template, DevEnvError,
    DevEnvK8sManager,
};

pub fn translate(
    name: &str,
    space: &Space,
    config: &VolumeConfig,
) -> Result<PersistentVolumeClaim, DevEnvError> {
    let mut pvc: PersistentVolumeClaim = get_resource_from_template(DevEnvResource::Pvc)?;

    scope_metadata(&mut pvc.metadata, name, space);
    let spec = pvc.spec.get_or_insert_with(Default::default);
    spec.resources
        .get_or_insert_with(ResourceRequirements::default)
        .requests = Some(BTreeMap::from([(
        "storage".into(),
        Quantity(config.size.to_owned()),
    )]));
    if let Some(storage_class) = &config.storage_class {
        spec.storage_class_name = Some(storage_class.to_owned());
    }
    Ok(pvc)
}

/// Claims are immutable once bound, so an existing claim is reused as is.
pub async fn create(name: &str, space: &Space, k8s: &DevEnvK8sManager) -> Result<(), DevEnvError> {
    let pvc = translate(name, space, &k8s.config().volume_config)?;
    k8s.create_resource_if_absent(&space.name, pvc, DevEnvResource::Pvc)
        .await
}

pub async fn destroy(name: &str, space: &Space, k8s: &DevEnvK8sManager) -> Result<(), DevEnvError> {
    k8s.delete_resource::<PersistentVolumeClaim>(&space.name, name, DevEnvResource::Pvc)
        .await
}
