use std::{collections::BTreeMap, fmt};

use hiro_system_kit::slog;
use k8s_openapi::{
    api::{
        apps::v1::Deployment,
        core::v1::{
            Container, ContainerPort, EnvVar, PersistentVolumeClaimVolumeSource,
            SecretVolumeSource, Volume, VolumeMount,
        },
    },
    apimachinery::pkg::apis::meta::v1::LabelSelector,
};
use strum_macros::EnumIter;

use super::{add_label, scope_metadata, DevEnvResource, APP_LABEL};
use crate::{
    config::WorkloadConfig,
    model::{Dev, Space},
    template_parser::get_resource_from_template,
    DevEnvError, DevEnvK8sManager,
};

pub const MODE_LABEL: &str = "dev-env.io/mode";
pub const MANIFEST_ANNOTATION: &str = "dev-env.io/manifest";
pub const SECRET_MOUNT_PATH: &str = "/var/dev-env/secret";
const IDLE_COMMAND: [&str; 3] = ["sh", "-c", "trap : TERM INT; sleep infinity & wait"];
const SECRET_VOLUME: &str = "dev-secret";

#[derive(EnumIter, Debug, Clone, Copy, PartialEq)]
pub enum WorkloadMode {
    Development,
    Run,
}

impl fmt::Display for WorkloadMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            WorkloadMode::Development => write!(f, "development"),
            WorkloadMode::Run => write!(f, "run"),
        }
    }
}

/// Pod volumes and matching container mounts for development mode: the main
/// claim at the working directory, one data claim per declared path and the
/// environment secret.
fn dev_volumes(dev: &Dev) -> (Vec<Volume>, Vec<VolumeMount>) {
    let mut claims = vec![(dev.volume_name(), dev.workdir.to_owned())];
    for (i, path) in dev.volumes.iter().enumerate() {
        claims.push((dev.volume_data_name(i), path.to_owned()));
    }

    let mut volumes = vec![];
    let mut mounts = vec![];
    for (claim, mount_path) in claims {
        volumes.push(Volume {
            name: claim.to_owned(),
            persistent_volume_claim: Some(PersistentVolumeClaimVolumeSource {
                claim_name: claim.to_owned(),
                read_only: None,
            }),
            ..Default::default()
        });
        mounts.push(VolumeMount {
            name: claim,
            mount_path,
            ..Default::default()
        });
    }

    volumes.push(Volume {
        name: SECRET_VOLUME.into(),
        secret: Some(SecretVolumeSource {
            secret_name: Some(dev.secret_name()),
            ..Default::default()
        }),
        ..Default::default()
    });
    mounts.push(VolumeMount {
        name: SECRET_VOLUME.into(),
        mount_path: SECRET_MOUNT_PATH.into(),
        read_only: Some(true),
        ..Default::default()
    });
    (volumes, mounts)
}

pub fn translate(
    dev: &Dev,
    space: &Space,
    mode: WorkloadMode,
    config: &WorkloadConfig,
) -> Result<Deployment, DevEnvError> {
    let mut deployment: Deployment = get_resource_from_template(DevEnvResource::Deployment)?;
    let mode_str = mode.to_string();

    scope_metadata(&mut deployment.metadata, &dev.name, space);
    add_label(&mut deployment.metadata, APP_LABEL, &dev.name);
    add_label(&mut deployment.metadata, MODE_LABEL, &mode_str);

    let manifest = serde_json::to_string(dev).map_err(|e| DevEnvError {
        message: format!("failed to serialize dev manifest {}: {}", dev.name, e),
        code: 500,
    })?;
    deployment
        .metadata
        .annotations
        .get_or_insert_with(BTreeMap::new)
        .insert(MANIFEST_ANNOTATION.into(), manifest);

    let spec = deployment.spec.get_or_insert_with(Default::default);
    spec.selector = LabelSelector {
        match_labels: Some(BTreeMap::from([(APP_LABEL.into(), dev.name.to_owned())])),
        ..Default::default()
    };

    let pod_metadata = spec.template.metadata.get_or_insert_with(Default::default);
    add_label(pod_metadata, APP_LABEL, &dev.name);
    add_label(pod_metadata, MODE_LABEL, &mode_str);

    let pod_spec = spec.template.spec.get_or_insert_with(Default::default);
    let mut container: Container = pod_spec.containers.pop().unwrap_or_default();
    container.name = dev.name.to_owned();
    container.image = Some(dev.image.to_owned());
    container.image_pull_policy = Some(config.image_pull_policy.to_owned());
    container.working_dir = Some(dev.workdir.to_owned());
    container.ports = Some(vec![ContainerPort {
        name: Some("http".into()),
        container_port: dev.port,
        ..Default::default()
    }]);
    container.env = Some(
        dev.environment
            .iter()
            .map(|e| EnvVar {
                name: e.name.to_owned(),
                value: Some(e.value.to_owned()),
                ..Default::default()
            })
            .collect(),
    );

    match mode {
        WorkloadMode::Development => {
            let (volumes, mounts) = dev_volumes(dev);
            container.command = Some(IDLE_COMMAND.iter().map(|s| s.to_string()).collect());
            container.volume_mounts = Some(mounts);
            pod_spec.volumes = Some(volumes);
        }
        WorkloadMode::Run => {
            container.command = dev.command.to_owned();
            container.volume_mounts = None;
            pod_spec.volumes = None;
        }
    }
    pod_spec.containers = vec![container];

    Ok(deployment)
}

pub async fn dev_on(dev: &Dev, space: &Space, k8s: &DevEnvK8sManager) -> Result<(), DevEnvError> {
    let deployment = translate(
        dev,
        space,
        WorkloadMode::Development,
        &k8s.config().workload_config,
    )?;
    k8s.apply_resource(&space.name, deployment, DevEnvResource::Deployment)
        .await
}

pub async fn run(dev: &Dev, space: &Space, k8s: &DevEnvK8sManager) -> Result<(), DevEnvError> {
    let deployment = translate(dev, space, WorkloadMode::Run, &k8s.config().workload_config)?;
    k8s.apply_resource(&space.name, deployment, DevEnvResource::Deployment)
        .await
}

/// Reads the dev manifest recorded on the live workload. Falls back to the
/// given `dev` when there is no workload or it carries no usable manifest.
pub async fn get_dev(dev: &Dev, space: &Space, k8s: &DevEnvK8sManager) -> Dev {
    let context = format!("DEV: {}, NAMESPACE: {}", dev.name, space.name);
    let deployment = match k8s
        .get_resource::<Deployment>(&space.name, &dev.name)
        .await
    {
        Ok(Some(deployment)) => deployment,
        Ok(None) | Err(_) => {
            k8s.ctx().try_log(|logger| {
                slog::warn!(logger, "no live workload, using given manifest {}", context)
            });
            return dev.to_owned();
        }
    };

    let manifest = deployment
        .metadata
        .annotations
        .as_ref()
        .and_then(|annotations| annotations.get(MANIFEST_ANNOTATION));
    match manifest.map(|m| serde_json::from_str::<Dev>(m)) {
        Some(Ok(live_dev)) => live_dev,
        Some(Err(e)) => {
            k8s.ctx().try_log(|logger| {
                slog::warn!(
                    logger,
                    "unreadable manifest on live workload {}, ERROR: {}",
                    context,
                    e
                )
            });
            dev.to_owned()
        }
        None => {
            k8s.ctx().try_log(|logger| {
                slog::warn!(logger, "live workload has no manifest {}", context)
            });
            dev.to_owned()
        }
    }
}

pub async fn destroy(dev: &Dev, space: &Space, k8s: &DevEnvK8sManager) -> Result<(), DevEnvError> {
    k8s.delete_resource::<Deployment>(&space.name, &dev.name, DevEnvResource::Deployment)
        .await
}
