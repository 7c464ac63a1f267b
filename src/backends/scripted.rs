//! A container backend that follows a script instead of talking to a runtime,
//! recording every call it receives.

use std::{
    cell::RefCell,
    collections::VecDeque,
    fs,
    path::{Path, PathBuf},
    rc::Rc,
};

use crate::{
    error::{Error, Result},
    models::{ContainerName, ContainerNetworkStatus, Fingerprint, ImageAlias},
    services::ContainerBackend,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Call {
    Launch(String, ContainerName),
    Status(ContainerName),
    Exec(ContainerName, String),
    Stop(ContainerName),
    Publish(ContainerName, ImageAlias),
    Remove(ContainerName, bool),
    Export(ImageAlias, PathBuf),
    Import(PathBuf, ImageAlias),
    RemoveImage(Fingerprint),
}

#[derive(Default)]
pub struct Script {
    /// Statuses returned by successive queries; the last one repeats.
    pub statuses: VecDeque<ContainerNetworkStatus>,
    /// Shell commands that exit non-zero.
    pub failing_commands: Vec<String>,
    /// Files written into the export directory: (file name, contents).
    pub export: Vec<(String, Vec<u8>)>,
    pub fail_publish: bool,
    pub fail_remove: bool,
}

#[derive(Default)]
pub struct Recording {
    pub calls: Vec<Call>,
    /// Contents of every archive handed to `import_image`, read at import time.
    pub imported: Vec<Vec<u8>>,
}

impl Recording {
    pub fn count(&self, matches: impl Fn(&Call) -> bool) -> usize {
        self.calls.iter().filter(|call| matches(call)).count()
    }
}

pub struct ScriptedBackend {
    script: Script,
    recording: Rc<RefCell<Recording>>,
}

impl ScriptedBackend {
    pub fn new(script: Script) -> (ScriptedBackend, Rc<RefCell<Recording>>) {
        let recording = Rc::new(RefCell::new(Recording::default()));
        let backend = ScriptedBackend {
            script,
            recording: recording.clone(),
        };
        (backend, recording)
    }

    fn record(&self, call: Call) {
        self.recording.borrow_mut().calls.push(call);
    }
}

fn scripted_failure(verb: &str) -> Error {
    Error::InvalidOutput {
        command: format!("scripted {}", verb),
        reason: "scripted failure".into(),
    }
}

impl ContainerBackend for ScriptedBackend {
    fn launch_container(&mut self, image: &str, name: &ContainerName) -> Result<()> {
        self.record(Call::Launch(image.to_owned(), name.clone()));
        Ok(())
    }

    fn container_status(&mut self, name: &ContainerName) -> Result<ContainerNetworkStatus> {
        self.record(Call::Status(name.clone()));
        let status = if self.script.statuses.len() > 1 {
            self.script.statuses.pop_front()
        } else {
            self.script.statuses.front().cloned()
        };
        Ok(status.unwrap_or_default())
    }

    fn exec_shell(&mut self, name: &ContainerName, command: &str) -> Result<()> {
        self.record(Call::Exec(name.clone(), command.to_owned()));
        if self.script.failing_commands.iter().any(|c| c == command) {
            return Err(scripted_failure("exec"));
        }
        Ok(())
    }

    fn stop_container(&mut self, name: &ContainerName) -> Result<()> {
        self.record(Call::Stop(name.clone()));
        Ok(())
    }

    fn publish_container(&mut self, name: &ContainerName, alias: &ImageAlias) -> Result<()> {
        self.record(Call::Publish(name.clone(), alias.clone()));
        if self.script.fail_publish {
            return Err(scripted_failure("publish"));
        }
        Ok(())
    }

    fn remove_container(&mut self, name: &ContainerName, force: bool) -> Result<()> {
        self.record(Call::Remove(name.clone(), force));
        if self.script.fail_remove {
            return Err(scripted_failure("delete"));
        }
        Ok(())
    }

    fn export_image(&mut self, alias: &ImageAlias, directory: &Path) -> Result<()> {
        self.record(Call::Export(alias.clone(), directory.to_owned()));
        for (name, contents) in self.script.export.iter() {
            fs::write(directory.join(name), contents)?;
        }
        Ok(())
    }

    fn import_image(&mut self, archive: &Path, alias: &ImageAlias) -> Result<()> {
        self.record(Call::Import(archive.to_owned(), alias.clone()));
        let contents = fs::read(archive)?;
        self.recording.borrow_mut().imported.push(contents);
        Ok(())
    }

    fn remove_image(&mut self, fingerprint: &Fingerprint) -> Result<()> {
        self.record(Call::RemoveImage(fingerprint.clone()));
        Ok(())
    }
}
