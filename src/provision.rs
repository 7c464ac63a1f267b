use log::info;

use crate::{
    error::{Error, Result},
    models::{ContainerName, ImageAlias},
    services::ContainerBackend,
};

/// Runs each command in the container in order, stopping at the first failure.
///
/// Commands run as `exec <command>` under the guest's shell, so they get a shell
/// environment and their exit status reaches us unmasked.
pub fn run_commands<B: ContainerBackend + ?Sized>(
    backend: &mut B,
    alias: &ImageAlias,
    container: &ContainerName,
    commands: &[String],
) -> Result<()> {
    for (index, command) in commands.iter().enumerate() {
        info!(
            "[{}] provisioning step {}/{}: {}",
            alias,
            index + 1,
            commands.len(),
            command
        );

        backend
            .exec_shell(container, &format!("exec {}", command))
            .map_err(|source| Error::Provisioning {
                container: container.clone(),
                command: command.clone(),
                source: Box::new(source),
            })?;
    }

    Ok(())
}
