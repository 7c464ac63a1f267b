use std::path::Path;

use crate::{
    error::Result,
    models::{BuildSpec, ContainerName, ContainerNetworkStatus, Fingerprint, ImageAlias},
};

pub trait SpecFrontend {
    fn build_spec(&mut self, document: &[u8]) -> anyhow::Result<BuildSpec>;
}

/// The verbs a container runtime has to provide to build images.
pub trait ContainerBackend {
    /// Called before a build's first verb; what the backend logs afterwards
    /// belongs to the build of `alias`.
    fn begin_build(&mut self, _alias: &ImageAlias) {}

    fn launch_container(&mut self, image: &str, name: &ContainerName) -> Result<()>;

    fn container_status(&mut self, name: &ContainerName) -> Result<ContainerNetworkStatus>;

    /// Runs `command` with the guest's `/bin/sh`, streaming its output.
    fn exec_shell(&mut self, name: &ContainerName, command: &str) -> Result<()>;

    fn stop_container(&mut self, name: &ContainerName) -> Result<()>;

    fn publish_container(&mut self, name: &ContainerName, alias: &ImageAlias) -> Result<()>;

    fn remove_container(&mut self, name: &ContainerName, force: bool) -> Result<()>;

    fn export_image(&mut self, alias: &ImageAlias, directory: &Path) -> Result<()>;

    fn import_image(&mut self, archive: &Path, alias: &ImageAlias) -> Result<()>;

    fn remove_image(&mut self, fingerprint: &Fingerprint) -> Result<()>;
}
