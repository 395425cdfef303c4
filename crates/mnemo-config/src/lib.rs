//! Configuration models and file loading for mnemo.

mod error;
mod model;

/// Public error type returned by config loading APIs.
pub use error::ConfigError;
/// Configuration schema models.
pub use model::*;

use log::debug;
use std::path::Path;

/// Load a config file (JSON5) from disk.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<MnemoConfig, ConfigError> {
    let path = path.as_ref();
    debug!("loading config (path={})", path.display());
    let contents = std::fs::read_to_string(path)?;
    let config: MnemoConfig = json5::from_str(&contents)?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::{MnemoConfig, load_from_path};
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[test]
    fn load_from_path_applies_defaults() {
        let root = tempdir().expect("tempdir");
        let path = root.path().join("mnemo.json5");
        std::fs::write(
            &path,
            r#"{
                // comments are allowed
                embedding: { model: "all-minilm" },
                orchestrator: { process_every: 3 },
            }"#,
        )
        .expect("write");

        let config = load_from_path(&path).expect("load");
        assert_eq!(config.embedding.model, "all-minilm");
        assert_eq!(config.orchestrator.process_every, 3);
        assert_eq!(config.retention.max_age_days, 90);
    }

    #[test]
    fn load_from_path_rejects_invalid_cadence() {
        let root = tempdir().expect("tempdir");
        let path = root.path().join("mnemo.json5");
        std::fs::write(&path, r#"{ orchestrator: { process_every: 0 } }"#).expect("write");
        assert_eq!(load_from_path(&path).is_err(), true);
    }

    #[test]
    fn builder_overrides_sections() {
        let config = MnemoConfig::builder()
            .orchestrator(crate::OrchestratorConfig {
                process_every: 7,
                ..Default::default()
            })
            .build();
        assert_eq!(config.orchestrator.process_every, 7);
    }
}
