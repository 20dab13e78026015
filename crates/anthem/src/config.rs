//! Flag-aware wrappers over `anthem_config`.
//!
//! The single boundary where CLI flags, the config file, and credential
//! sources meet to produce a `ControllerConfig`.

use std::time::Duration;

use anthem_config::Config;
use anthem_core::ControllerConfig;

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| config.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

/// Load the config file and translate the active profile plus global
/// flags into a `ControllerConfig`. Returns the profile name alongside.
pub fn resolve(global: &GlobalOpts) -> Result<(String, ControllerConfig), CliError> {
    let cfg = anthem_config::load_config()?;
    let name = active_profile_name(global, &cfg);

    let Some(profile) = cfg.profiles.get(&name) else {
        let mut names: Vec<&str> = cfg.profiles.keys().map(String::as_str).collect();
        names.sort_unstable();
        return Err(CliError::ProfileNotFound {
            available: if names.is_empty() {
                "(none)".into()
            } else {
                names.join(", ")
            },
            path: anthem_config::config_path().display().to_string(),
            name,
        });
    };

    let mut config = anthem_config::profile_to_controller_config(profile, &name)?;

    // Flag > profile > defaults
    let timeout = global
        .timeout
        .or(profile.timeout)
        .unwrap_or(cfg.defaults.timeout);
    config.timeout = Duration::from_secs(timeout);
    if let Some(ref id) = global.customer_id {
        config.customer_id = Some(id.clone());
    }

    Ok((name, config))
}
