use clap::Subcommand;
use focusboard_core::{Config, ConfigError};

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print one setting (e.g. "timer.default_duration_min")
    Get {
        /// Dotted key
        key: String,
    },
    /// Change one setting (e.g. "timer.strict_transitions true")
    Set {
        /// Dotted key
        key: String,
        /// New value, parsed to the setting's type
        value: String,
    },
    /// Print every setting as JSON
    List,
    /// Restore the default settings
    Reset,
}

fn lookup(config: &Config, key: &str) -> Result<String, ConfigError> {
    config
        .get(key)
        .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))
}

/// Apply `key = value` and return the setting as it now reads back.
fn update(config: &mut Config, key: &str, value: &str) -> Result<String, Box<dyn std::error::Error>> {
    config.apply(key, value)?;
    Ok(lookup(config, key)?)
}

pub fn run(action: ConfigAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        ConfigAction::Get { key } => {
            println!("{}", lookup(&Config::load()?, &key)?);
        }
        ConfigAction::Set { key, value } => {
            let mut config = Config::load()?;
            let stored = update(&mut config, &key, &value)?;
            config.save()?;
            println!("{key} = {stored}");
        }
        ConfigAction::List => {
            println!("{}", serde_json::to_string_pretty(&Config::load()?)?);
        }
        ConfigAction::Reset => {
            Config::default().save()?;
            println!("config reset to defaults");
        }
    }
    Ok(())
}
