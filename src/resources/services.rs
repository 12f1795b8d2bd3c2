use std::collections::BTreeMap;

use k8s_openapi::{api::core::v1::Service, apimachinery::pkg::util::intstr::IntOrString};

use super::{add_label, scope_metadata, DevEnvResource, APP_LABEL};
use crate::{
    model::{Dev, Space},
    template_parser::get_resource_from_template,
    DevEnvError, DevEnvK8sManager,
};

pub const SERVICE_PORT: i32 = 80;

pub fn translate(dev: &Dev, space: &Space) -> Result<Service, DevEnvError> {
    let mut service: Service = get_resource_from_template(DevEnvResource::Service)?;

    scope_metadata(&mut service.metadata, &dev.name, space);
    add_label(&mut service.metadata, APP_LABEL, &dev.name);

    let spec = service.spec.get_or_insert_with(Default::default);
    spec.selector = Some(BTreeMap::from([(APP_LABEL.into(), dev.name.to_owned())]));
    for port in spec.ports.iter_mut().flatten() {
        port.port = SERVICE_PORT;
        port.target_port = Some(IntOrString::Int(dev.port));
    }
    Ok(service)
}

/// Creates the service or replaces the live one. The live cluster IP is
/// immutable and is carried over on replace.
pub async fn deploy(
    mut service: Service,
    space: &Space,
    k8s: &DevEnvK8sManager,
) -> Result<(), DevEnvError> {
    let name = service.metadata.name.clone().unwrap_or_default();
    match k8s.get_resource::<Service>(&space.name, &name).await? {
        Some(existing) => {
            service.metadata.resource_version = existing.metadata.resource_version;
            let live_cluster_ip = existing.spec.and_then(|s| s.cluster_ip);
            service.spec.get_or_insert_with(Default::default).cluster_ip = live_cluster_ip;
            k8s.replace_resource(&space.name, service, DevEnvResource::Service)
                .await
        }
        None => {
            k8s.create_resource(&space.name, service, DevEnvResource::Service)
                .await
        }
    }
}

pub async fn destroy(name: &str, space: &Space, k8s: &DevEnvK8sManager) -> Result<(), DevEnvError> {
    k8s.delete_resource::<Service>(&space.name, name, DevEnvResource::Service)
        .await
}
