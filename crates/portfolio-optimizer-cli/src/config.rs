//! CLI settings: engine tunables plus the replaceable default payload.

use portfolio_optimizer_core::universe::DefaultPayload;
use portfolio_optimizer_core::EngineConfig;
use serde::Deserialize;

use crate::input;

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(flatten)]
    engine: EngineConfig,
    /// Universe and presets to use instead of the built-in ones.
    #[serde(default)]
    defaults_file: Option<String>,
}

pub struct Settings {
    pub engine: EngineConfig,
    pub payload: DefaultPayload,
}

/// Load settings from `path`, or fall back to the built-in defaults.
pub fn load(path: Option<&str>) -> Result<Settings, Box<dyn std::error::Error>> {
    let file: ConfigFile = match path {
        Some(p) => input::file::read_input(p)?,
        None => ConfigFile::default(),
    };
    file.engine.validate()?;

    let payload = match &file.defaults_file {
        Some(p) => input::file::read_input(p)?,
        None => DefaultPayload::builtin(),
    };
    tracing::debug!(
        config = path.unwrap_or("<defaults>"),
        assets = payload.universe.len(),
        presets = payload.presets.len(),
        "settings loaded"
    );

    Ok(Settings {
        engine: file.engine,
        payload,
    })
}
