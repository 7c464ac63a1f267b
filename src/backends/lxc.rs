use serde::Deserialize;
use std::{collections::BTreeMap as Map, path::Path};

use crate::{
    error::{Error, Result},
    executor::Executor,
    models::{
        ContainerName, ContainerNetworkStatus, Fingerprint, ImageAlias, NetworkInterface,
    },
    services::ContainerBackend,
};

#[derive(Debug, Deserialize)]
struct ListedContainer {
    name: String,
    state: Option<ListedState>,
}

#[derive(Debug, Deserialize)]
struct ListedState {
    #[serde(default)]
    status: String,
    network: Option<Map<String, NetworkInterface>>,
}

/// Drives LXD through its `lxc` command line client.
pub struct LxcBackend {
    executor: Executor,
}

impl LxcBackend {
    pub fn new<P: Into<String>>(program: P) -> LxcBackend {
        LxcBackend {
            executor: Executor::new(program),
        }
    }

    fn lxc(&self, args: &[&str]) -> Result<()> {
        self.executor.run(args)
    }
}

impl Default for LxcBackend {
    fn default() -> Self {
        LxcBackend::new("lxc")
    }
}

impl ContainerBackend for LxcBackend {
    fn begin_build(&mut self, alias: &ImageAlias) {
        self.executor.set_log_prefix(format!("[{}] ", alias));
    }

    fn launch_container(&mut self, image: &str, name: &ContainerName) -> Result<()> {
        self.lxc(&["launch", image, &name.0])
    }

    fn container_status(&mut self, name: &ContainerName) -> Result<ContainerNetworkStatus> {
        let args = ["list", "--format=json", name.0.as_str()];
        let stdout = self.executor.output(&args)?;

        parse_status(&stdout, name).map_err(|reason| Error::InvalidOutput {
            command: self.executor.command_line(&args),
            reason,
        })
    }

    fn exec_shell(&mut self, name: &ContainerName, command: &str) -> Result<()> {
        self.lxc(&["exec", &name.0, "--", "/bin/sh", "-c", command])
    }

    fn stop_container(&mut self, name: &ContainerName) -> Result<()> {
        self.lxc(&["stop", &name.0])
    }

    fn publish_container(&mut self, name: &ContainerName, alias: &ImageAlias) -> Result<()> {
        let alias = format!("--alias={}", alias.0);
        self.lxc(&["publish", &alias, &name.0])
    }

    fn remove_container(&mut self, name: &ContainerName, force: bool) -> Result<()> {
        if force {
            self.lxc(&["delete", "--force", &name.0])
        } else {
            self.lxc(&["delete", &name.0])
        }
    }

    fn export_image(&mut self, alias: &ImageAlias, directory: &Path) -> Result<()> {
        let directory = path_arg(directory)?;
        self.lxc(&["image", "export", &alias.0, directory])
    }

    fn import_image(&mut self, archive: &Path, alias: &ImageAlias) -> Result<()> {
        let archive = path_arg(archive)?;
        let alias = format!("--alias={}", alias.0);
        self.lxc(&["image", "import", &alias, archive])
    }

    fn remove_image(&mut self, fingerprint: &Fingerprint) -> Result<()> {
        self.lxc(&["image", "delete", &fingerprint.0])
    }
}

fn path_arg(path: &Path) -> Result<&str> {
    path.to_str().ok_or_else(|| {
        Error::Configuration(format!("path {} is not valid utf-8", path.display()))
    })
}

/// `lxc list NAME` filters by prefix, so the exact name is picked out of the reply.
fn parse_status(
    stdout: &[u8],
    name: &ContainerName,
) -> std::result::Result<ContainerNetworkStatus, String> {
    let listed: Vec<ListedContainer> =
        serde_json::from_slice(stdout).map_err(|err| err.to_string())?;

    let container = listed
        .into_iter()
        .find(|container| container.name == name.0)
        .ok_or_else(|| format!("container {} is not listed", name))?;

    let status = match container.state {
        Some(state) => ContainerNetworkStatus {
            running: state.status == "Running",
            interfaces: state.network.unwrap_or_default(),
        },
        None => ContainerNetworkStatus::default(),
    };

    Ok(status)
}
