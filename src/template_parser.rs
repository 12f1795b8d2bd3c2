use serde::de::DeserializeOwned;

use crate::{resources::DevEnvResource, DevEnvError};

pub fn get_yaml_from_resource(resource: DevEnvResource) -> &'static str {
    match resource {
        DevEnvResource::Secret => include_str!("../templates/secret.template.yaml"),
        DevEnvResource::Pvc => include_str!("../templates/pvc.template.yaml"),
        DevEnvResource::Deployment => include_str!("../templates/deployment.template.yaml"),
        DevEnvResource::Service => include_str!("../templates/service.template.yaml"),
        DevEnvResource::Ingress => include_str!("../templates/ingress.template.yaml"),
    }
}

pub fn get_resource_from_template<K>(resource: DevEnvResource) -> Result<K, DevEnvError>
where
    K: DeserializeOwned,
{
    let template_str = get_yaml_from_resource(resource);

    serde_yaml::from_str(template_str).map_err(|e| DevEnvError {
        message: format!("unable to parse {} template file: {}", resource, e),
        code: 500,
    })
}
