use hiro_system_kit::slog;

use crate::{
    client::ClientSource,
    config::DevEnvConfig,
    model::{Dev, Space, User, MAX_DEV_VOLUMES},
    resources::{deployments, ingresses, secrets, services, volumes},
    Context, DevEnvError, DevEnvK8sManager,
};

/// Lifecycle of a user's development environments.
///
/// Every operation resolves a fresh cluster client from the injected
/// `ClientSource` and then runs its steps strictly in order. The first
/// failing step ends the operation and its error is returned as is; steps
/// already applied are left in place.
#[derive(Clone)]
pub struct DevEnvironments {
    client_source: ClientSource,
    config: DevEnvConfig,
    ctx: Context,
}

impl DevEnvironments {
    pub fn new(client_source: ClientSource, config: DevEnvConfig, ctx: &Context) -> Self {
        DevEnvironments {
            client_source,
            config,
            ctx: ctx.to_owned(),
        }
    }

    async fn k8s_manager(&self) -> Result<DevEnvK8sManager, DevEnvError> {
        match self.client_source.get().await {
            Ok(client) => Ok(DevEnvK8sManager::new(
                client,
                self.config.to_owned(),
                &self.ctx,
            )),
            Err(e) => {
                let msg = format!("error getting k8s client: {}", e.message);
                self.ctx.try_log(|logger| slog::error!(logger, "{}", msg));
                Err(DevEnvError {
                    message: msg,
                    code: e.code,
                })
            }
        }
    }

    /// Provisions secrets, volumes, the development workload, its service and
    /// its ingress.
    pub async fn dev_mode_on(&self, user: &User, dev: &Dev) -> Result<(), DevEnvError> {
        if dev.volumes.len() > MAX_DEV_VOLUMES {
            let msg = format!("the maximum number of volumes is {}", MAX_DEV_VOLUMES);
            self.ctx
                .try_log(|logger| slog::warn!(logger, "{}, DEV: {}", msg, dev.name));
            return Err(DevEnvError {
                message: msg,
                code: 400,
            });
        }
        let space = Space::for_user(user);
        let k8s = self.k8s_manager().await?;
        self.ctx.try_log(|logger| {
            slog::info!(
                logger,
                "activating dev mode DEV: {}, NAMESPACE: {}",
                dev.name,
                space.name
            )
        });

        secrets::create(dev, &space, &k8s).await?;

        volumes::create(&dev.volume_name(), &space, &k8s).await?;
        for i in 0..dev.volumes.len() {
            volumes::create(&dev.volume_data_name(i), &space, &k8s).await?;
        }

        deployments::dev_on(dev, &space, &k8s).await?;

        let service = services::translate(dev, &space)?;
        services::deploy(service, &space, &k8s).await?;

        ingresses::deploy(dev, &space, &k8s).await?;

        Ok(())
    }

    /// Runs the manifest's image with its own command. Secrets and volumes
    /// are never touched.
    pub async fn run_image(&self, user: &User, dev: &Dev) -> Result<(), DevEnvError> {
        let space = Space::for_user(user);
        let k8s = self.k8s_manager().await?;
        self.ctx.try_log(|logger| {
            slog::info!(
                logger,
                "running image DEV: {}, IMAGE: {}, NAMESPACE: {}",
                dev.name,
                dev.image,
                space.name
            )
        });

        deployments::run(dev, &space, &k8s).await?;

        let service = services::translate(dev, &space)?;
        services::deploy(service, &space, &k8s).await?;

        ingresses::deploy(dev, &space, &k8s).await?;

        Ok(())
    }

    /// Tears the environment down, ingress first and secrets last, using the
    /// manifest recorded on the live workload rather than the given `dev`.
    pub async fn dev_mode_off(
        &self,
        user: &User,
        dev: &Dev,
        remove_volumes: bool,
    ) -> Result<(), DevEnvError> {
        let space = Space::for_user(user);
        let k8s = self.k8s_manager().await?;
        // TODO: honour remove_volumes once callers agree on keeping claims between sessions
        self.ctx.try_log(|logger| {
            slog::info!(
                logger,
                "deactivating dev mode DEV: {}, NAMESPACE: {}, REMOVE_VOLUMES: {}",
                dev.name,
                space.name,
                remove_volumes
            )
        });

        let dev = deployments::get_dev(dev, &space, &k8s).await;

        ingresses::destroy(&dev, &space, &k8s).await?;

        services::destroy(&dev.name, &space, &k8s).await?;

        deployments::destroy(&dev, &space, &k8s).await?;

        volumes::destroy(&dev.volume_name(), &space, &k8s).await?;
        for i in 0..dev.volumes.len() {
            volumes::destroy(&dev.volume_data_name(i), &space, &k8s).await?;
        }

        secrets::destroy(&dev, &space, &k8s).await?;

        Ok(())
    }
}
