use std::collections::HashMap;

use async_trait::async_trait;
use bollard::{
    Docker,
    container::{
        Config as ContainerConfig, CreateContainerOptions, InspectContainerOptions,
        RemoveContainerOptions, StartContainerOptions,
    },
    image::CreateImageOptions,
    models::{HostConfig, PortBinding, RestartPolicy, RestartPolicyNameEnum},
};
use futures_util::stream::StreamExt;
use tracing::{debug, error, info, warn};

use super::{
    error::RuntimeError,
    types::{Action, Config, DockerResult},
};

/// Container engine operations the worker needs.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Pull, create and start a container. The result carries the container id.
    async fn run(&self, config: &Config) -> Result<DockerResult, RuntimeError>;

    /// Stop and remove a container along with its volumes.
    ///
    /// Returns [`RuntimeError::NotFound`] without touching anything when the
    /// container does not exist.
    async fn stop(&self, container_id: &str) -> Result<DockerResult, RuntimeError>;
}

#[derive(Debug, Clone)]
pub struct DockerClient {
    client: Docker,
}

impl DockerClient {
    pub fn new() -> Result<Self, RuntimeError> {
        let client = Docker::connect_with_local_defaults().map_err(RuntimeError::Connect)?;
        Ok(DockerClient { client })
    }

    async fn pull_image(&self, image: &str) -> Result<(), RuntimeError> {
        info!(image, "Pulling image");

        let (from_image, tag) = split_image_reference(image);
        let mut stream = self.client.create_image(
            Some(CreateImageOptions {
                from_image: from_image.to_string(),
                tag: tag.to_string(),
                ..Default::default()
            }),
            None,
            None,
        );

        while let Some(msg) = stream.next().await {
            match msg {
                Ok(info) => {
                    if let Some(status) = info.status {
                        debug!(
                            image,
                            layer = info.id.as_deref().unwrap_or(""),
                            progress = info.progress.as_deref().unwrap_or(""),
                            "{}",
                            status
                        );
                    }
                }
                Err(e) => {
                    error!(image, error = %e, "Image pull failed");
                    return Err(RuntimeError::docker(Action::Pull, image, e));
                }
            }
        }

        info!(image, "Image pulled");
        Ok(())
    }
}

#[async_trait]
impl ContainerRuntime for DockerClient {
    async fn run(&self, config: &Config) -> Result<DockerResult, RuntimeError> {
        self.pull_image(&config.image).await?;

        let host_config = HostConfig {
            restart_policy: Some(RestartPolicy {
                name: Some(restart_policy_name(&config.restart_policy)),
                maximum_retry_count: None,
            }),
            memory: Some(config.memory),
            nano_cpus: Some(config.nano_cpus()),
            publish_all_ports: Some(true),
            port_bindings: port_bindings(config),
            ..Default::default()
        };

        let container_config = ContainerConfig {
            image: Some(config.image.clone()),
            env: Some(config.env.clone()),
            cmd: if config.cmd.is_empty() {
                None
            } else {
                Some(config.cmd.clone())
            },
            attach_stdin: Some(config.attach_stdin),
            attach_stdout: Some(config.attach_stdout),
            attach_stderr: Some(config.attach_stderr),
            tty: Some(false),
            exposed_ports: Some(
                config
                    .exposed_ports
                    .iter()
                    .map(|port| (port.clone(), HashMap::new()))
                    .collect(),
            ),
            host_config: Some(host_config),
            ..Default::default()
        };

        let options = Some(CreateContainerOptions {
            name: config.name.clone(),
            ..Default::default()
        });

        let container_id = match self.client.create_container(options, container_config).await {
            Ok(resp) => {
                for warning in &resp.warnings {
                    warn!(container_id = %resp.id, "{}", warning);
                }
                info!(container_id = %resp.id, name = %config.name, "Container created");
                resp.id
            }
            Err(e) => {
                error!(image = %config.image, error = %e, "Error creating container");
                return Err(RuntimeError::docker(Action::Create, &config.image, e));
            }
        };

        if let Err(e) = self
            .client
            .start_container(&container_id, None::<StartContainerOptions<String>>)
            .await
        {
            error!(%container_id, error = %e, "Error starting container");
            return Err(RuntimeError::docker(Action::Start, &container_id, e));
        }

        info!(%container_id, name = %config.name, "Container started");
        Ok(DockerResult::success(&container_id, Action::Start))
    }

    async fn stop(&self, container_id: &str) -> Result<DockerResult, RuntimeError> {
        match self
            .client
            .inspect_container(container_id, None::<InspectContainerOptions>)
            .await
        {
            Ok(_) => {}
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 404, ..
            }) => {
                warn!(container_id, "Container not found, nothing to stop");
                return Err(RuntimeError::NotFound(container_id.to_string()));
            }
            Err(e) => return Err(RuntimeError::docker(Action::Inspect, container_id, e)),
        }

        info!(container_id, "Stopping container");
        self.client
            .stop_container(container_id, None)
            .await
            .map_err(|e| RuntimeError::docker(Action::Stop, container_id, e))?;

        self.client
            .remove_container(
                container_id,
                Some(RemoveContainerOptions {
                    v: true,
                    link: false,
                    force: false,
                }),
            )
            .await
            .map_err(|e| RuntimeError::docker(Action::Remove, container_id, e))?;

        info!(container_id, "Container stopped and removed");
        Ok(DockerResult::success(container_id, Action::Stop))
    }
}

fn restart_policy_name(policy: &str) -> RestartPolicyNameEnum {
    policy.parse().unwrap_or(RestartPolicyNameEnum::NO)
}

fn port_bindings(config: &Config) -> Option<HashMap<String, Option<Vec<PortBinding>>>> {
    if config.port_bindings.is_empty() {
        return None;
    }

    Some(
        config
            .port_bindings
            .iter()
            .map(|(container_port, host_port)| {
                (
                    container_port.clone(),
                    Some(vec![PortBinding {
                        host_ip: None,
                        host_port: Some(host_port.clone()),
                    }]),
                )
            })
            .collect(),
    )
}

/// Splits `repo[:tag]` so an untagged reference pulls `latest` instead of
/// every tag. Digest references are passed through whole.
fn split_image_reference(image: &str) -> (&str, &str) {
    if image.contains('@') {
        return (image, "");
    }

    let name_start = image.rfind('/').map_or(0, |i| i + 1);
    match image[name_start..].rfind(':') {
        Some(i) => (&image[..name_start + i], &image[name_start + i + 1..]),
        None => (image, "latest"),
    }
}
