use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap as Map, fmt};

use crate::error::{Error, Result};

pub const CONTAINER_NAME_PREFIX: &str = "lxd-image-builder-";

#[derive(Clone, Debug, Hash, PartialOrd, Ord, PartialEq, Eq)]
pub struct ContainerName(pub String);

impl ContainerName {
    /// Generates a build container name from 16 random bytes, so concurrent
    /// builds never need to agree on names.
    pub fn generate() -> Result<ContainerName> {
        let mut random = [0u8; 16];
        OsRng.try_fill_bytes(&mut random).map_err(Error::Randomness)?;
        Ok(ContainerName(format!(
            "{}{}",
            CONTAINER_NAME_PREFIX,
            hex::encode(random)
        )))
    }
}

impl fmt::Display for ContainerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, Default, Hash, PartialOrd, Ord, PartialEq, Eq)]
pub struct ImageAlias(pub String);

impl fmt::Display for ImageAlias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, Hash, PartialOrd, Ord, PartialEq, Eq)]
pub struct Fingerprint(pub String);

impl Fingerprint {
    /// `lxc image export` names its output after the image fingerprint, so the
    /// fingerprint is everything before the first '.' of the exported file name.
    pub fn from_export_name(name: &str) -> Result<Fingerprint> {
        match name.find('.') {
            Some(index) if index > 0 => Ok(Fingerprint(name[..index].to_owned())),
            _ => Err(Error::InvalidExportName(name.to_owned())),
        }
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An LXD image template, as referenced from an image's metadata.yaml.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Template {
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub properties: Map<String, String>,

    pub template: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub when: Vec<String>,

    /// Path of the file inside the guest that the template renders to.
    #[serde(skip)]
    pub path: String,

    /// Body of the template, stored under templates/ in the image.
    #[serde(skip)]
    pub content: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BuildSpec {
    pub base_image: String,
    pub alias: ImageAlias,
    pub templates: Vec<Template>,
    pub commands: Vec<String>,
}

impl BuildSpec {
    pub fn validate(&self) -> Result<()> {
        if self.base_image.is_empty() {
            return Err(Error::Configuration("base image must be set".into()));
        }
        if self.alias.0.is_empty() {
            return Err(Error::Configuration("alias must be set".into()));
        }
        for template in self.templates.iter() {
            if template.template.is_empty() {
                return Err(Error::Configuration(format!(
                    "template for {:?} has no name",
                    template.path
                )));
            }
            if !template.path.starts_with('/') {
                return Err(Error::Configuration(format!(
                    "template {:?} must have an absolute path, got {:?}",
                    template.template, template.path
                )));
            }
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ContainerNetworkStatus {
    pub running: bool,
    pub interfaces: Map<String, NetworkInterface>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct NetworkInterface {
    #[serde(default)]
    pub addresses: Vec<InterfaceAddress>,
    #[serde(default)]
    pub state: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct InterfaceAddress {
    pub family: String,
    pub scope: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn spec() -> BuildSpec {
        BuildSpec {
            base_image: "images:centos/7".into(),
            alias: ImageAlias("centos7-base".into()),
            templates: vec![],
            commands: vec!["yum -y update".into()],
        }
    }

    #[test]
    fn generated_names_are_unique_and_well_formed() {
        let names = (0..10_000)
            .map(|_| ContainerName::generate().unwrap().0)
            .collect::<Vec<_>>();

        for name in names.iter() {
            let suffix = name
                .strip_prefix(CONTAINER_NAME_PREFIX)
                .expect("missing prefix");
            assert_eq!(suffix.len(), 32);
            assert!(suffix
                .chars()
                .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
        }

        let unique = names.iter().collect::<HashSet<_>>();
        assert_eq!(unique.len(), names.len());
    }

    #[test]
    fn entropy_failure_is_reported_not_raised() {
        let source = std::io::Error::new(std::io::ErrorKind::Other, "getrandom: ENOSYS");
        let err = Error::Randomness(rand::Error::new(source));

        assert!(err.to_string().contains("container name"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn fingerprint_is_taken_before_the_first_dot() {
        let fingerprint = Fingerprint::from_export_name("5a2b1c.tar.gz").unwrap();
        assert_eq!(fingerprint, Fingerprint("5a2b1c".into()));
    }

    #[test]
    fn fingerprint_needs_a_dot() {
        assert!(matches!(
            Fingerprint::from_export_name("rootfs"),
            Err(Error::InvalidExportName(_))
        ));
        assert!(Fingerprint::from_export_name(".tar.gz").is_err());
    }

    #[test]
    fn validate_accepts_complete_spec() {
        spec().validate().unwrap();
    }

    #[test]
    fn validate_requires_base_and_alias() {
        let mut no_base = spec();
        no_base.base_image.clear();
        assert!(matches!(no_base.validate(), Err(Error::Configuration(_))));

        let mut no_alias = spec();
        no_alias.alias.0.clear();
        assert!(matches!(no_alias.validate(), Err(Error::Configuration(_))));
    }

    #[test]
    fn validate_rejects_relative_template_path() {
        let mut spec = spec();
        spec.templates.push(Template {
            template: "motd.tpl".into(),
            path: "etc/motd".into(),
            ..Default::default()
        });
        assert!(matches!(spec.validate(), Err(Error::Configuration(_))));
    }

    #[test]
    fn template_serializes_only_metadata_fields() {
        let template = Template {
            properties: Map::new(),
            template: "hostname.tpl".into(),
            when: vec!["create".into()],
            path: "/etc/hostname".into(),
            content: "{{ container.name }}".into(),
        };
        let value = serde_yaml::to_value(&template).unwrap();
        let mapping = value.as_mapping().unwrap();

        assert_eq!(mapping.len(), 2);
        assert_eq!(
            mapping.get(&"template".into()),
            Some(&serde_yaml::Value::from("hostname.tpl"))
        );
        assert!(mapping.get(&"path".into()).is_none());
        assert!(mapping.get(&"content".into()).is_none());
        assert!(mapping.get(&"properties".into()).is_none());
    }
}
