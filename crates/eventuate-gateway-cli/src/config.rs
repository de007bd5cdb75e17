use std::path::PathBuf;

use eventuate_gateway_core::DEFAULT_GATEWAY_URL;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewaySettings {
    #[serde(default = "default_url")]
    pub url: String,
    /// Session token; when set, the API key pair is not used
    #[serde(default)]
    pub jwt_token: Option<String>,
    #[serde(default)]
    pub debug: bool,
    /// Saved describe-stacks output; when unset, CloudFormation is queried
    #[serde(default)]
    pub outputs_file: Option<PathBuf>,
}

fn default_url() -> String {
    DEFAULT_GATEWAY_URL.to_string()
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            url: default_url(),
            jwt_token: None,
            debug: false,
            outputs_file: None,
        }
    }
}

impl GatewaySettings {
    pub fn validate(&self) -> Result<(), String> {
        let url = self.url.trim();
        if url.is_empty() {
            return Err("url must not be empty".into());
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(format!("url must be an http(s) URL, got \"{url}\""));
        }
        Ok(())
    }

    pub fn log_level(&self) -> &'static str {
        if self.debug { "debug" } else { "info" }
    }
}

pub mod loader {
    use super::GatewaySettings;
    use config::{Config, ConfigBuilder, Environment, File, builder::DefaultState};
    use eventuate_gateway_core::ManifestCustom;
    use std::path::PathBuf;

    const DEFAULT_FILE: &str = "eventuate-gateway.toml";

    fn default_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(DEFAULT_FILE)];
        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".eventuate-gateway").join("config.toml"));
        }
        paths
    }

    fn manifest_defaults(
        mut builder: ConfigBuilder<DefaultState>,
        custom: &ManifestCustom,
    ) -> Result<ConfigBuilder<DefaultState>, config::ConfigError> {
        if let Some(url) = &custom.eventuate_gateway_url {
            builder = builder.set_default("url", url.as_str())?;
        }
        if let Some(token) = &custom.eventuate_gateway_jwt_token {
            builder = builder.set_default("jwt_token", token.as_str())?;
        }
        if let Some(debug) = custom.eventuate_gateway_debug {
            builder = builder.set_default("debug", debug)?;
        }
        Ok(builder)
    }

    /// Loads settings: manifest `custom` block, then the settings file, then
    /// `EVENTUATE_GATEWAY__*` environment variables.
    pub fn load_settings(path: Option<&str>, custom: &ManifestCustom) -> Result<GatewaySettings, String> {
        let builder = manifest_defaults(Config::builder(), custom)
            .map_err(|e| format!("config build error: {e}"))?;

        let builder = match path {
            Some(p) => builder.add_source(File::from(PathBuf::from(p)).required(true)),
            None => match default_paths().into_iter().find(|p| p.exists()) {
                Some(p) => builder.add_source(File::from(p)),
                None => builder,
            },
        };

        // Environment variable overrides, e.g., EVENTUATE_GATEWAY__URL=http://localhost:8080
        let builder = builder.add_source(
            Environment::with_prefix("EVENTUATE_GATEWAY")
                .try_parsing(true)
                .separator("__"),
        );

        let cfg = builder
            .build()
            .map_err(|e| format!("config build error: {e}"))?;
        let settings: GatewaySettings = cfg
            .try_deserialize()
            .map_err(|e| format!("config deserialize error: {e}"))?;
        settings.validate()?;
        Ok(settings)
    }
}
