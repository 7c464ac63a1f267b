//! Built-in cloud-init templates, used when a build document doesn't list
//! any templates of its own.

use std::collections::BTreeMap as Map;

use crate::models::Template;

const CLOUD_INIT_SEED_DIR: &str = "/var/lib/cloud/seed/nocloud-net";

const CLOUD_INIT_META_TEMPLATE: &str = r#"#cloud-config
instance-id: {{ container.name }}
local-hostname: {{ container.name }}
{{ config_get("user.meta-data", "") }}"#;

const CLOUD_INIT_NETWORK_TEMPLATE: &str = r#"{% if config_get("user.network-config", "") == "" %}version: 1
config:
    - type: physical
      name: eth0
      subnets:
          - type: {% if config_get("user.network_mode", "") == "link-local" %}manual{% else %}dhcp{% endif %}
            control: auto{% else %}{{ config_get("user.network-config", "") }}{% endif %}"#;

const CLOUD_INIT_USER_TEMPLATE: &str = r#"{{ config_get("user.user-data", properties.default) }}"#;

const CLOUD_INIT_VENDOR_TEMPLATE: &str =
    r#"{{ config_get("user.vendor-data", properties.default) }}"#;

const EMPTY_CLOUD_CONFIG: &str = "#cloud-config\n{}";

pub fn cloud_init_templates() -> Vec<Template> {
    vec![
        seed_template("cloud-init-meta.tpl", "meta-data", CLOUD_INIT_META_TEMPLATE, false),
        seed_template(
            "cloud-init-network.tpl",
            "network-config",
            CLOUD_INIT_NETWORK_TEMPLATE,
            false,
        ),
        seed_template("cloud-init-user.tpl", "user-data", CLOUD_INIT_USER_TEMPLATE, true),
        seed_template(
            "cloud-init-vendor.tpl",
            "vendor-data",
            CLOUD_INIT_VENDOR_TEMPLATE,
            true,
        ),
    ]
}

fn seed_template(name: &str, seed_file: &str, content: &str, default_config: bool) -> Template {
    let mut properties = Map::new();
    if default_config {
        properties.insert("default".to_owned(), EMPTY_CLOUD_CONFIG.to_owned());
    }

    Template {
        properties,
        template: name.to_owned(),
        when: vec!["create".to_owned(), "copy".to_owned()],
        path: format!("{}/{}", CLOUD_INIT_SEED_DIR, seed_file),
        content: content.to_owned(),
    }
}
