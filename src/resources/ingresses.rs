use k8s_openapi::api::networking::v1::{Ingress, IngressTLS};

use super::{add_label, scope_metadata, DevEnvResource, APP_LABEL};
use crate::{
    config::IngressConfig,
    model::{Dev, Space},
    template_parser::get_resource_from_template,
    DevEnvError, DevEnvK8sManager,
};

pub fn get_host(dev: &Dev, space: &Space, config: &IngressConfig) -> String {
    format!("{}-{}.{}", dev.name, space.name, config.domain)
}

pub fn translate(dev: &Dev, space: &Space, config: &IngressConfig) -> Result<Ingress, DevEnvError> {
    let mut ingress: Ingress = get_resource_from_template(DevEnvResource::Ingress)?;
    let host = get_host(dev, space, config);

    scope_metadata(&mut ingress.metadata, &dev.name, space);
    add_label(&mut ingress.metadata, APP_LABEL, &dev.name);

    let spec = ingress.spec.get_or_insert_with(Default::default);
    for rule in spec.rules.iter_mut().flatten() {
        rule.host = Some(host.to_owned());
        for path in rule.http.iter_mut().flat_map(|http| http.paths.iter_mut()) {
            if let Some(backend) = path.backend.service.as_mut() {
                backend.name = dev.name.to_owned();
            }
        }
    }
    if let Some(class) = &config.class {
        spec.ingress_class_name = Some(class.to_owned());
    }
    if let Some(tls_secret) = &config.tls_secret {
        spec.tls = Some(vec![IngressTLS {
            hosts: Some(vec![host]),
            secret_name: Some(tls_secret.to_owned()),
        }]);
    }
    Ok(ingress)
}

pub async fn deploy(dev: &Dev, space: &Space, k8s: &DevEnvK8sManager) -> Result<(), DevEnvError> {
    let ingress = translate(dev, space, &k8s.config().ingress_config)?;
    k8s.apply_resource(&space.name, ingress, DevEnvResource::Ingress)
        .await
}

pub async fn destroy(dev: &Dev, space: &Space, k8s: &DevEnvK8sManager) -> Result<(), DevEnvError> {
    k8s.delete_resource::<Ingress>(&space.name, &dev.name, DevEnvResource::Ingress)
        .await
}
