use anyhow::{Context as AnyhowContext, Result};
use dialoguer::Password;
use prowlarr::{Client, Connection};
use secrecy::SecretString;

use crate::Context;
use crate::cli::{DumpConfigArgs, DumpFormat};
use crate::config::InstanceConfig;
use crate::settings::{NoLinks, Settings, SyncContext, strip_nulls};
use crate::ui;

pub fn run(ctx: &Context, args: DumpConfigArgs) -> Result<()> {
    let api_key = match args.api_key {
        Some(api_key) => api_key,
        None => Password::new()
            .with_prompt("Prowlarr API key (leave empty to discover it)")
            .allow_empty_password(true)
            .interact()
            .context("Failed to read the API key")?,
    };
    let api_key = Some(api_key)
        .filter(|key| !key.trim().is_empty())
        .map(SecretString::from);

    let connection = Connection::from_url(&args.url, api_key)?;
    let credentials = connection
        .resolve()
        .with_context(|| format!("Unable to connect to {}", connection.host_url()))?;
    if ctx.verbose > 0 {
        ui::info(&format!(
            "Prowlarr {} at {}",
            credentials.version,
            credentials.host_url()
        ));
    }

    let instance = dump(credentials.client(), &credentials.version, connection)?;
    print!("{}", render(&instance, args.format)?);
    Ok(())
}

/// Read the remote settings into an instance record for `connection`.
fn dump(client: &Client, version: &str, connection: Connection) -> Result<InstanceConfig> {
    let ctx = SyncContext::new(client, version, &NoLinks);
    let settings = Settings::from_remote(&ctx).context("Failed to read the remote configuration")?;
    Ok(InstanceConfig {
        hostname: connection.hostname,
        port: connection.port,
        protocol: connection.protocol,
        url_base: connection.url_base,
        api_key: None,
        version: None,
        settings,
    })
}

/// Serialize an instance record. TOML has no null, so unset attributes are
/// left out of it.
pub(crate) fn render(instance: &InstanceConfig, format: DumpFormat) -> Result<String> {
    let value = serde_json::to_value(instance).context("Failed to serialize configuration")?;
    match format {
        DumpFormat::Toml => {
            toml::to_string_pretty(&strip_nulls(value)).context("Failed to render TOML")
        }
        DumpFormat::Yaml => serde_yaml::to_string(&value).context("Failed to render YAML"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::testing::{self, client};
    use crate::settings::{TAG_PATH, tags::TagsSettings};
    use prowlarr::Protocol;
    use serde_json::json;

    fn instance() -> InstanceConfig {
        let mut instance = InstanceConfig {
            url_base: Some("/prowlarr".to_string()),
            ..InstanceConfig::default()
        };
        instance.settings.tags = TagsSettings {
            definitions: ["anime".to_string()].into_iter().collect(),
        };
        instance
    }

    #[test]
    fn test_render_toml_reloads() {
        let rendered = render(&instance(), DumpFormat::Toml).unwrap();
        assert!(rendered.contains("hostname = \"prowlarr\""));
        assert!(!rendered.contains("api_key"));

        let mut reloaded: crate::config::Config = toml::from_str(&rendered).unwrap();
        reloaded.validate().unwrap();
        assert_eq!(reloaded.instance.url_base.as_deref(), Some("/prowlarr"));
        assert_eq!(reloaded.instance.settings.tags, instance().settings.tags);
        assert_eq!(reloaded.instance.settings.ui.0["theme"], json!("light"));
    }

    #[test]
    fn test_render_yaml() {
        let rendered = render(&instance(), DumpFormat::Yaml).unwrap();
        assert!(rendered.contains("hostname: prowlarr"));
        assert!(rendered.contains("- anime"));
    }

    #[test]
    fn test_dump_reads_remote_settings() {
        let mock = testing::instance(&[(TAG_PATH, json!([{"id": 1, "label": "anime"}]))]);
        let client = client(&mock);
        let connection = Connection::from_url("https://prowlarr.example.com", None).unwrap();

        let instance = dump(&client, "1.13.3.4273", connection).unwrap();

        assert_eq!(instance.protocol, Protocol::Https);
        assert_eq!(instance.port, 443);
        assert_eq!(instance.settings.tags.definitions.len(), 1);
        assert_eq!(instance.settings.ui.0["theme"], json!("auto"));
        assert!(mock.writes().is_empty());
    }
}
