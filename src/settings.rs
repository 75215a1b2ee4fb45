//! Persisted user settings.
//!
//! A small JSON file holding the Azure OpenAI connection, the prompt
//! customisation and the smart-processing toggle, so the CLI does not need
//! them on every invocation. Unknown keys are ignored and missing keys take
//! their defaults, so older and newer files both load.

use crate::config::ConversionConfigBuilder;
use crate::error::PdfSightError;
use crate::prompts::{with_instruction, DEFAULT_CAPTION_PROMPT, DETAILED_DESCRIPTION_PROMPT};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Provider name used when the Azure fields are filled in.
pub const AZURE_PROVIDER: &str = "azure";

#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub azure_openai_endpoint: String,
    pub azure_openai_api_key: String,
    /// Deployment name; doubles as the model identifier.
    pub azure_openai_deployment: String,
    pub azure_openai_api_version: String,
    /// Model used when the deployment name is empty.
    pub llm_model: String,
    /// Prepend `custom_prompt` to the caption prompt.
    pub use_custom_prompt: bool,
    pub custom_prompt: String,
    /// Run the presence check before captioning.
    pub smart_pdf_processing: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            azure_openai_endpoint: String::new(),
            azure_openai_api_key: String::new(),
            azure_openai_deployment: String::new(),
            azure_openai_api_version: "2024-08-01-preview".to_string(),
            llm_model: "gpt-4o".to_string(),
            use_custom_prompt: false,
            custom_prompt: DETAILED_DESCRIPTION_PROMPT.to_string(),
            smart_pdf_processing: true,
        }
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let key = if self.azure_openai_api_key.is_empty() {
            ""
        } else {
            "<redacted>"
        };
        f.debug_struct("Settings")
            .field("azure_openai_endpoint", &self.azure_openai_endpoint)
            .field("azure_openai_api_key", &key)
            .field("azure_openai_deployment", &self.azure_openai_deployment)
            .field("azure_openai_api_version", &self.azure_openai_api_version)
            .field("llm_model", &self.llm_model)
            .field("use_custom_prompt", &self.use_custom_prompt)
            .field("custom_prompt", &self.custom_prompt)
            .field("smart_pdf_processing", &self.smart_pdf_processing)
            .finish()
    }
}

impl Settings {
    /// `<config dir>/pdfsight/settings.json`, if the platform has a config dir.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("pdfsight").join("settings.json"))
    }

    /// Load settings from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, PdfSightError> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No settings at {}; using defaults", path.display());
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(PdfSightError::SettingsIo {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        serde_json::from_str(&raw).map_err(|e| PdfSightError::SettingsParse {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })
    }

    /// Write settings to `path` atomically, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), PdfSightError> {
        let io_err = |source| PdfSightError::SettingsIo {
            path: path.to_path_buf(),
            source,
        };

        let parent = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(parent).map_err(io_err)?;

        let json = serde_json::to_string_pretty(self)
            .map_err(|e| PdfSightError::Internal(format!("settings serialisation: {e}")))?;

        let mut tmp = tempfile::NamedTempFile::new_in(parent).map_err(io_err)?;
        tmp.write_all(json.as_bytes()).map_err(io_err)?;
        tmp.persist(path).map_err(|e| io_err(e.error))?;

        info!("Settings saved to {}", path.display());
        Ok(())
    }

    /// Endpoint, key and deployment are all filled in.
    pub fn azure_configured(&self) -> bool {
        !self.azure_openai_endpoint.trim().is_empty()
            && !self.azure_openai_api_key.trim().is_empty()
            && !self.azure_openai_deployment.trim().is_empty()
    }

    /// Model identifier: the deployment name, else `llm_model`.
    pub fn model(&self) -> &str {
        let deployment = self.azure_openai_deployment.trim();
        if deployment.is_empty() {
            self.llm_model.trim()
        } else {
            deployment
        }
    }

    /// The caption prompt these settings ask for.
    pub fn prompt(&self) -> String {
        if self.use_custom_prompt {
            with_instruction(&self.custom_prompt, DEFAULT_CAPTION_PROMPT)
        } else {
            DEFAULT_CAPTION_PROMPT.to_string()
        }
    }

    /// Export the Azure connection as `AZURE_OPENAI_*` environment variables
    /// for the provider factory. Variables already set are left alone.
    pub fn apply_to_env(&self) {
        let pairs = [
            ("AZURE_OPENAI_ENDPOINT", &self.azure_openai_endpoint),
            ("AZURE_OPENAI_API_KEY", &self.azure_openai_api_key),
            ("AZURE_OPENAI_DEPLOYMENT", &self.azure_openai_deployment),
            ("AZURE_OPENAI_API_VERSION", &self.azure_openai_api_version),
        ];
        for (name, value) in pairs {
            if value.trim().is_empty() || std::env::var_os(name).is_some() {
                continue;
            }
            std::env::set_var(name, value.trim());
        }
    }

    /// Carry these settings onto a config builder.
    ///
    /// The Azure provider is selected only when fully configured; otherwise
    /// whatever provider the builder already has is kept.
    pub fn apply_to(&self, builder: ConversionConfigBuilder) -> ConversionConfigBuilder {
        let mut builder = builder
            .smart_detection(self.smart_pdf_processing)
            .prompt(self.prompt());
        if self.azure_configured() {
            builder = builder.provider_name(AZURE_PROVIDER).model(self.model());
        }
        builder
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConversionConfig;

    #[test]
    fn defaults_match_gui() {
        let s = Settings::default();
        assert_eq!(s.azure_openai_api_version, "2024-08-01-preview");
        assert_eq!(s.llm_model, "gpt-4o");
        assert!(s.smart_pdf_processing);
        assert!(!s.azure_configured());
    }

    #[test]
    fn missing_and_unknown_fields() {
        let s: Settings =
            serde_json::from_str(r#"{"llm_model":"gpt-4.1","enable_plugins":true}"#).unwrap();
        assert_eq!(s.llm_model, "gpt-4.1");
        assert!(s.smart_pdf_processing);
        assert_eq!(s.azure_openai_api_version, "2024-08-01-preview");
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        let s = Settings {
            azure_openai_endpoint: "https://res.openai.azure.com".into(),
            azure_openai_api_key: "k".into(),
            azure_openai_deployment: "vision".into(),
            smart_pdf_processing: false,
            ..Default::default()
        };
        s.save(&path).unwrap();
        assert_eq!(Settings::load(&path).unwrap(), s);
    }

    #[test]
    fn missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let s = Settings::load(&dir.path().join("absent.json")).unwrap();
        assert_eq!(s, Settings::default());
    }

    #[test]
    fn malformed_file_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            Settings::load(&path),
            Err(PdfSightError::SettingsParse { .. })
        ));
    }

    #[test]
    fn debug_redacts_key() {
        let s = Settings {
            azure_openai_api_key: "sk-secret".into(),
            ..Default::default()
        };
        let shown = format!("{s:?}");
        assert!(!shown.contains("sk-secret"));
        assert!(shown.contains("<redacted>"));
    }

    #[test]
    fn custom_prompt_is_prepended() {
        let s = Settings {
            use_custom_prompt: true,
            custom_prompt: "Answer in Chinese.".into(),
            ..Default::default()
        };
        assert_eq!(s.prompt(), format!("Answer in Chinese.\n\n{DEFAULT_CAPTION_PROMPT}"));
        assert_eq!(Settings::default().prompt(), DEFAULT_CAPTION_PROMPT);
    }

    #[test]
    fn apply_to_builder() {
        let s = Settings {
            azure_openai_endpoint: "https://res.openai.azure.com".into(),
            azure_openai_api_key: "k".into(),
            azure_openai_deployment: "vision-4o".into(),
            smart_pdf_processing: false,
            ..Default::default()
        };
        let config = s.apply_to(ConversionConfig::builder()).build().unwrap();
        assert!(!config.smart_detection);
        assert_eq!(config.provider_name.as_deref(), Some(AZURE_PROVIDER));
        assert_eq!(config.model.as_deref(), Some("vision-4o"));

        let unconfigured = Settings::default()
            .apply_to(ConversionConfig::builder())
            .build()
            .unwrap();
        assert!(unconfigured.provider_name.is_none());
    }
}
