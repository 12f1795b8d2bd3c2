use hiro_system_kit::{slog, Logger};
use k8s_openapi::NamespaceResourceScope;
use kube::{
    api::{Api, DeleteParams, PostParams},
    Client,
};
use serde::{de::DeserializeOwned, Serialize};
use std::fmt;

pub mod app;
pub mod client;
pub mod config;
pub mod model;
pub mod resources;
mod template_parser;

pub use app::DevEnvironments;
pub use client::ClientSource;
use config::DevEnvConfig;
use resources::DevEnvResource;

#[derive(Debug, Clone, PartialEq)]
pub struct DevEnvError {
    pub message: String,
    pub code: u16,
}

impl fmt::Display for DevEnvError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for DevEnvError {}

#[derive(Clone)]
pub struct Context {
    pub logger: Option<Logger>,
    pub tracer: bool,
}

impl Context {
    pub fn empty() -> Context {
        Context {
            logger: None,
            tracer: false,
        }
    }

    pub fn try_log<F>(&self, closure: F)
    where
        F: FnOnce(&Logger),
    {
        if let Some(ref logger) = self.logger {
            closure(logger)
        }
    }
}

fn split_kube_error(e: kube::Error) -> (String, u16) {
    match e {
        kube::Error::Api(api_error) => (api_error.message, api_error.code),
        e => (e.to_string(), 500),
    }
}

/// Namespaced fetch/create/replace/delete against one resolved cluster client.
/// Every call logs its progress and maps failures into a `DevEnvError`.
#[derive(Clone)]
pub struct DevEnvK8sManager {
    client: Client,
    config: DevEnvConfig,
    ctx: Context,
}

impl DevEnvK8sManager {
    pub fn new(client: Client, config: DevEnvConfig, ctx: &Context) -> DevEnvK8sManager {
        DevEnvK8sManager {
            client,
            config,
            ctx: ctx.to_owned(),
        }
    }

    pub fn config(&self) -> &DevEnvConfig {
        &self.config
    }

    pub fn ctx(&self) -> &Context {
        &self.ctx
    }

    pub async fn get_resource<K: kube::Resource<Scope = NamespaceResourceScope>>(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<K>, DevEnvError>
    where
        <K as kube::Resource>::DynamicType: Default,
        K: Clone,
        K: DeserializeOwned,
        K: std::fmt::Debug,
    {
        let resource_api: Api<K> = Api::namespaced(self.client.to_owned(), namespace);

        let resource_details = format!(
            "RESOURCE: {}, NAME: {}, NAMESPACE: {}",
            K::kind(&Default::default()),
            name,
            namespace
        );
        self.ctx
            .try_log(|logger| slog::info!(logger, "fetching {}", resource_details));

        match resource_api.get_opt(name).await {
            Ok(Some(r)) => {
                self.ctx.try_log(|logger| {
                    slog::info!(logger, "successfully fetched {}", resource_details)
                });
                Ok(Some(r))
            }
            Ok(None) => {
                self.ctx.try_log(|logger| {
                    slog::info!(logger, "resource not found {}", resource_details)
                });
                Ok(None)
            }
            Err(e) => {
                let (msg, code) = split_kube_error(e);
                let msg = format!("failed to fetch {}, ERROR: {}", resource_details, msg);
                self.ctx.try_log(|logger| slog::error!(logger, "{}", msg));
                Err(DevEnvError { message: msg, code })
            }
        }
    }

    pub async fn create_resource<K: kube::Resource<Scope = NamespaceResourceScope>>(
        &self,
        namespace: &str,
        resource: K,
        resource_type: DevEnvResource,
    ) -> Result<(), DevEnvError>
    where
        <K as kube::Resource>::DynamicType: Default,
        K: Clone,
        K: DeserializeOwned,
        K: std::fmt::Debug,
        K: Serialize,
    {
        let resource_api: Api<K> = Api::namespaced(self.client.to_owned(), namespace);
        let pp = PostParams::default();

        let resource_details = self.resource_details(&resource, resource_type, namespace);
        self.ctx
            .try_log(|logger| slog::info!(logger, "creating {}", resource_details));

        match resource_api.create(&pp, &resource).await {
            Ok(_) => {
                self.ctx.try_log(|logger| {
                    slog::info!(logger, "successfully created {}", resource_details)
                });
                Ok(())
            }
            Err(e) => {
                let (msg, code) = split_kube_error(e);
                let msg = format!("failed to create {}, ERROR: {}", resource_details, msg);
                self.ctx.try_log(|logger| slog::error!(logger, "{}", msg));
                Err(DevEnvError { message: msg, code })
            }
        }
    }

    pub async fn replace_resource<K: kube::Resource<Scope = NamespaceResourceScope>>(
        &self,
        namespace: &str,
        resource: K,
        resource_type: DevEnvResource,
    ) -> Result<(), DevEnvError>
    where
        <K as kube::Resource>::DynamicType: Default,
        K: Clone,
        K: DeserializeOwned,
        K: std::fmt::Debug,
        K: Serialize,
    {
        let resource_api: Api<K> = Api::namespaced(self.client.to_owned(), namespace);
        let pp = PostParams::default();

        let name = resource.meta().name.clone().unwrap_or_default();
        let resource_details = self.resource_details(&resource, resource_type, namespace);
        self.ctx
            .try_log(|logger| slog::info!(logger, "updating {}", resource_details));

        match resource_api.replace(&name, &pp, &resource).await {
            Ok(_) => {
                self.ctx.try_log(|logger| {
                    slog::info!(logger, "successfully updated {}", resource_details)
                });
                Ok(())
            }
            Err(e) => {
                let (msg, code) = split_kube_error(e);
                let msg = format!("failed to update {}, ERROR: {}", resource_details, msg);
                self.ctx.try_log(|logger| slog::error!(logger, "{}", msg));
                Err(DevEnvError { message: msg, code })
            }
        }
    }

    /// Creates the resource, or replaces the live one carrying over its
    /// `resourceVersion`.
    pub async fn apply_resource<K: kube::Resource<Scope = NamespaceResourceScope>>(
        &self,
        namespace: &str,
        mut resource: K,
        resource_type: DevEnvResource,
    ) -> Result<(), DevEnvError>
    where
        <K as kube::Resource>::DynamicType: Default,
        K: Clone,
        K: DeserializeOwned,
        K: std::fmt::Debug,
        K: Serialize,
    {
        let name = resource.meta().name.clone().unwrap_or_default();
        match self.get_resource::<K>(namespace, &name).await? {
            Some(existing) => {
                resource.meta_mut().resource_version = existing.meta().resource_version.clone();
                self.replace_resource(namespace, resource, resource_type)
                    .await
            }
            None => {
                self.create_resource(namespace, resource, resource_type)
                    .await
            }
        }
    }

    /// Creates the resource unless one with the same name already exists,
    /// in which case the live one is left untouched.
    pub async fn create_resource_if_absent<K: kube::Resource<Scope = NamespaceResourceScope>>(
        &self,
        namespace: &str,
        resource: K,
        resource_type: DevEnvResource,
    ) -> Result<(), DevEnvError>
    where
        <K as kube::Resource>::DynamicType: Default,
        K: Clone,
        K: DeserializeOwned,
        K: std::fmt::Debug,
        K: Serialize,
    {
        let name = resource.meta().name.clone().unwrap_or_default();
        match self.get_resource::<K>(namespace, &name).await? {
            Some(_) => {
                self.ctx.try_log(|logger| {
                    slog::info!(
                        logger,
                        "keeping existing RESOURCE: {}, NAME: {}, NAMESPACE: {}",
                        resource_type,
                        name,
                        namespace
                    )
                });
                Ok(())
            }
            None => {
                self.create_resource(namespace, resource, resource_type)
                    .await
            }
        }
    }

    /// Deletes the named resource. A resource that is already gone counts
    /// as deleted.
    pub async fn delete_resource<K: kube::Resource<Scope = NamespaceResourceScope>>(
        &self,
        namespace: &str,
        resource_name: &str,
        resource_type: DevEnvResource,
    ) -> Result<(), DevEnvError>
    where
        <K as kube::Resource>::DynamicType: Default,
        K: Clone,
        K: DeserializeOwned,
        K: std::fmt::Debug,
    {
        let api: Api<K> = Api::namespaced(self.client.to_owned(), namespace);
        let dp = DeleteParams::default();

        let resource_details = format!(
            "RESOURCE: {}, NAME: {}, NAMESPACE: {}",
            resource_type, resource_name, namespace
        );
        self.ctx
            .try_log(|logger| slog::info!(logger, "deleting {}", resource_details));
        match api.delete(resource_name, &dp).await {
            Ok(_) => {
                self.ctx.try_log(|logger| {
                    slog::info!(logger, "successfully deleted {}", resource_details)
                });
                Ok(())
            }
            Err(kube::Error::Api(api_error)) if api_error.code == 404 => {
                self.ctx.try_log(|logger| {
                    slog::info!(logger, "already deleted {}", resource_details)
                });
                Ok(())
            }
            Err(e) => {
                let (msg, code) = split_kube_error(e);
                let msg = format!("failed to delete {}, ERROR: {}", resource_details, msg);
                self.ctx.try_log(|logger| slog::error!(logger, "{}", msg));
                Err(DevEnvError { message: msg, code })
            }
        }
    }

    fn resource_details<K: kube::Resource>(
        &self,
        resource: &K,
        resource_type: DevEnvResource,
        namespace: &str,
    ) -> String {
        let name = match resource.meta().name.as_ref() {
            Some(name) => name.as_str(),
            None => {
                self.ctx.try_log(|logger| {
                    slog::warn!(
                        logger,
                        "resource does not have a name field. it really should"
                    )
                });
                "no-name"
            }
        };
        format!(
            "RESOURCE: {}, NAME: {}, NAMESPACE: {}",
            resource_type, name, namespace
        )
    }
}

#[cfg(test)]
mod tests;
