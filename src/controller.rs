use log::{info, warn};
use number_prefix::NumberPrefix;
use std::fmt;
use tempfile::TempDir;

use crate::{
    archive,
    error::Result,
    models::{BuildSpec, ContainerName, ImageAlias},
    network::{self, NetworkWait},
    provision,
    services::ContainerBackend,
};

const REWRITTEN_ARCHIVE: &str = "output.tar.gz";

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BuildState {
    Created,
    Launched,
    NetworkReady,
    Provisioned,
    Published,
    TemplatesInjected,
    Done,
    Failed,
}

impl fmt::Display for BuildState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BuildState::Created => "created",
            BuildState::Launched => "launched",
            BuildState::NetworkReady => "network ready",
            BuildState::Provisioned => "provisioned",
            BuildState::Published => "published",
            BuildState::TemplatesInjected => "templates injected",
            BuildState::Done => "done",
            BuildState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Builds images by provisioning a throwaway container and publishing it.
pub struct Controller {
    backend: Box<dyn ContainerBackend>,
    network_wait: NetworkWait,
    state: BuildState,
}

impl Controller {
    pub fn init<B>(backend: B, network_wait: NetworkWait) -> Controller
    where
        B: 'static + ContainerBackend,
    {
        Controller {
            backend: Box::new(backend),
            network_wait,
            state: BuildState::Created,
        }
    }

    /// The state the last build reached.
    pub fn state(&self) -> BuildState {
        self.state
    }

    /// Builds `spec` and imports the result under `spec.alias`.
    ///
    /// The build container is force-deleted on every path out of here unless
    /// it was already deleted after publishing.
    pub fn build(&mut self, spec: &BuildSpec) -> Result<()> {
        self.state = BuildState::Created;
        let result = self.prepare_and_build(spec);

        if let Err(err) = &result {
            warn!("[{}] build failed after state {}: {}", spec.alias, self.state, err);
            self.state = BuildState::Failed;
        }
        result
    }

    fn prepare_and_build(&mut self, spec: &BuildSpec) -> Result<()> {
        spec.validate()?;
        self.network_wait.validate()?;

        let container = ContainerName::generate()?;
        self.backend.begin_build(&spec.alias);
        self.build_image(spec, &container)
    }

    fn build_image(&mut self, spec: &BuildSpec, container: &ContainerName) -> Result<()> {
        let alias = &spec.alias;

        info!("[{}] launching {} from {}", alias, container, spec.base_image);
        self.backend.launch_container(&spec.base_image, container)?;
        self.transition(alias, BuildState::Launched);

        let mut deleted = false;
        let published = self.provision_and_publish(spec, container, &mut deleted);

        if !deleted {
            if let Err(err) = self.backend.remove_container(container, true) {
                warn!("[{}] deleting build container {}: {}", alias, container, err);
            }
        }
        published?;

        if !spec.templates.is_empty() {
            self.update_image_templates(spec)?;
            self.transition(alias, BuildState::TemplatesInjected);
        }

        self.transition(alias, BuildState::Done);
        Ok(())
    }

    fn provision_and_publish(
        &mut self,
        spec: &BuildSpec,
        container: &ContainerName,
        deleted: &mut bool,
    ) -> Result<()> {
        let alias = &spec.alias;

        network::wait_for_network(
            self.backend.as_mut(),
            alias,
            container,
            &self.network_wait,
        )?;
        self.transition(alias, BuildState::NetworkReady);

        provision::run_commands(self.backend.as_mut(), alias, container, &spec.commands)?;
        self.transition(alias, BuildState::Provisioned);

        self.backend.stop_container(container)?;
        self.backend.publish_container(container, alias)?;
        self.backend.remove_container(container, false)?;
        *deleted = true;
        self.transition(alias, BuildState::Published);

        Ok(())
    }

    /// Exports the published image, adds the spec's templates to it and
    /// imports it over the same alias, removing the superseded image.
    fn update_image_templates(&mut self, spec: &BuildSpec) -> Result<()> {
        let alias = &spec.alias;
        let scratch = TempDir::new()?;

        self.backend.export_image(alias, scratch.path())?;
        let exported = archive::locate_export(scratch.path())?;

        info!("[{}] updating metadata/templates in {}", alias, exported.path.display());
        let output = scratch.path().join(REWRITTEN_ARCHIVE);
        let summary = archive::rewrite(&exported.path, &output, &spec.templates)?;
        log_rewrite(alias, &summary);

        self.backend.import_image(&output, alias)?;
        self.backend.remove_image(&exported.fingerprint)?;

        scratch.close()?;
        Ok(())
    }

    fn transition(&mut self, alias: &ImageAlias, state: BuildState) {
        info!("[{}] {} -> {}", alias, self.state, state);
        self.state = state;
    }
}

fn log_rewrite(alias: &ImageAlias, summary: &archive::RewriteSummary) {
    let size = match NumberPrefix::binary(summary.compressed_size as f32) {
        NumberPrefix::Standalone(bytes) => format!("{} bytes", bytes),
        NumberPrefix::Prefixed(prefix, n) => format!("{:.1} {}B", n, prefix),
    };
    info!(
        "[{}] rewrote image: {} entries copied, {} templates added ({})",
        alias, summary.entries_copied, summary.templates_added, size
    );
}
