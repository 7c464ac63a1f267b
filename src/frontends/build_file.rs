use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap as Map;

use crate::{
    models::{BuildSpec, ImageAlias, Template},
    services::SpecFrontend,
    templates::cloud_init_templates,
};

#[derive(Debug, Deserialize)]
struct BuildFile {
    #[serde(default)]
    base: String,

    #[serde(default)]
    alias: String,

    /// `None` when the key is missing entirely; an empty list is kept as is.
    templates: Option<Vec<TemplateEntry>>,

    #[serde(default)]
    commands: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct TemplateEntry {
    #[serde(default)]
    properties: Map<String, String>,

    template: String,

    #[serde(default)]
    when: Vec<String>,

    path: String,

    #[serde(default)]
    content: String,
}

impl From<TemplateEntry> for Template {
    fn from(entry: TemplateEntry) -> Self {
        Template {
            properties: entry.properties,
            template: entry.template,
            when: entry.when,
            path: entry.path,
            content: entry.content,
        }
    }
}

/// Reads build specs from YAML build files.
pub struct BuildFileFrontend;

impl BuildFileFrontend {
    pub fn new() -> BuildFileFrontend {
        BuildFileFrontend
    }
}

impl Default for BuildFileFrontend {
    fn default() -> Self {
        BuildFileFrontend::new()
    }
}

impl SpecFrontend for BuildFileFrontend {
    fn build_spec(&mut self, document: &[u8]) -> Result<BuildSpec> {
        let file: BuildFile =
            serde_yaml::from_slice(document).context("unmarshalling spec from YAML")?;

        let templates = match file.templates {
            Some(templates) => templates.into_iter().map(Template::from).collect(),
            None => cloud_init_templates(),
        };

        let spec = BuildSpec {
            base_image: file.base,
            alias: ImageAlias(file.alias),
            templates,
            commands: file.commands,
        };
        spec.validate()?;

        Ok(spec)
    }
}
