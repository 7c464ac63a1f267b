use log::{debug, info};
use std::{thread, time::Duration};

use crate::{
    error::{Error, Result},
    models::{ContainerName, ContainerNetworkStatus, ImageAlias},
    services::ContainerBackend,
};

/// How long to wait for a build container to get an address, and how often to look.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NetworkWait {
    pub timeout: Duration,
    pub interval: Duration,
}

impl NetworkWait {
    /// A zero interval would poll without ever advancing towards the timeout.
    pub fn validate(&self) -> Result<()> {
        if self.interval == Duration::from_secs(0) {
            return Err(Error::Configuration(
                "network poll interval must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

impl Default for NetworkWait {
    fn default() -> Self {
        NetworkWait {
            timeout: Duration::from_secs(60),
            interval: Duration::from_secs(1),
        }
    }
}

/// A container is ready once a non-loopback interface is up with a global IPv4 address.
pub fn is_network_ready(status: &ContainerNetworkStatus) -> bool {
    if !status.running {
        return false;
    }

    status.interfaces.iter().any(|(name, interface)| {
        name != "lo"
            && interface.state == "up"
            && interface
                .addresses
                .iter()
                .any(|address| address.family == "inet" && address.scope == "global")
    })
}

pub fn wait_for_network<B: ContainerBackend + ?Sized>(
    backend: &mut B,
    alias: &ImageAlias,
    container: &ContainerName,
    wait: &NetworkWait,
) -> Result<()> {
    wait.validate()?;
    info!("[{}] waiting for network connectivity in {}", alias, container);

    let mut elapsed = Duration::from_secs(0);
    loop {
        let status = backend.container_status(container)?;
        if is_network_ready(&status) {
            debug!("[{}] {} is online after {:?}", alias, container, elapsed);
            return Ok(());
        }

        if elapsed + wait.interval > wait.timeout {
            break;
        }
        thread::sleep(wait.interval);
        elapsed += wait.interval;
    }

    Err(Error::Timeout {
        container: container.clone(),
        timeout: wait.timeout,
    })
}
