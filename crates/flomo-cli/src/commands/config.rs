use std::path::PathBuf;

use flomo_core::util::mask_secret;

use crate::config::{default_config_path, CliConfig, Settings};
use crate::error::CliError;

pub fn run_config(
    token: Option<&str>,
    show: bool,
    cli_db_path: Option<PathBuf>,
) -> Result<(), CliError> {
    let mut config = CliConfig::load()?;

    if let Some(token) = token {
        config.set_token(token)?;
        let path = config.save()?;
        println!("Token saved to {}", path.display());
    }

    if show || token.is_none() {
        let settings = Settings::resolve(cli_db_path, &config);
        for line in format_config_lines(&settings) {
            println!("{line}");
        }
    }

    Ok(())
}

pub fn format_config_lines(settings: &Settings) -> Vec<String> {
    vec![
        format!("Config file: {}", default_config_path().display()),
        format!("Database: {}", settings.db_path.display()),
        format!(
            "Token: {}",
            settings
                .token
                .as_deref()
                .map_or_else(|| "(not set)".to_string(), mask_secret)
        ),
        format!(
            "API base URL: {}",
            settings
                .api_base_url
                .as_deref()
                .unwrap_or(flomo_core::remote::DEFAULT_API_BASE_URL)
        ),
    ]
}
