use std::path::PathBuf;

use hyper::{body::Bytes, Body, Request, Response};
use kube::{
    config::{KubeConfigOptions, Kubeconfig},
    Client, Config,
};
use tower::BoxError;

use crate::DevEnvError;

/// Where a cluster client comes from. Resolved again on every lifecycle
/// call, so a `Fixed` client is only cloned, never rebuilt.
#[derive(Clone)]
pub enum ClientSource {
    /// In-cluster service account, falling back to the default kubeconfig.
    Infer,
    Kubeconfig(PathBuf),
    Fixed(Client),
}

impl ClientSource {
    pub fn from_service<S, B, T>(service: S, default_namespace: T) -> ClientSource
    where
        S: tower::Service<Request<Body>, Response = Response<B>> + Send + 'static,
        S::Future: Send + 'static,
        S::Error: Into<BoxError>,
        B: http_body::Body<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
        T: Into<String>,
    {
        ClientSource::Fixed(Client::new(service, default_namespace))
    }

    pub async fn get(&self) -> Result<Client, DevEnvError> {
        match self {
            ClientSource::Infer => Client::try_default().await.map_err(client_error),
            ClientSource::Kubeconfig(path) => {
                let kubeconfig = Kubeconfig::read_from(path).map_err(client_error)?;
                let config =
                    Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                        .await
                        .map_err(client_error)?;
                Client::try_from(config).map_err(client_error)
            }
            ClientSource::Fixed(client) => Ok(client.clone()),
        }
    }
}

fn client_error<E: std::fmt::Display>(e: E) -> DevEnvError {
    DevEnvError {
        message: e.to_string(),
        code: 500,
    }
}
