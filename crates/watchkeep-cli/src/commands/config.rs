use crate::output::{Output, OutputFormat};
use crate::ConfigCommands;
use color_eyre::Result;
use serde_json::json;
use watchkeep_config::{Config, PathManager};

pub fn run_config(cmd: ConfigCommands, output: &Output) -> Result<()> {
    match cmd {
        ConfigCommands::Show => show_config(output),
        ConfigCommands::Init => init_config(output),
    }
}

fn show_config(output: &Output) -> Result<()> {
    let paths = PathManager::default();
    let path = paths.config_file();
    let config = Config::load_or_default(&path);

    if matches!(output.format(), OutputFormat::Json | OutputFormat::JsonPretty) {
        output.json(&json!({
            "path": path.display().to_string(),
            "exists": path.exists(),
            "cache": {
                "page_size": config.cache.page_size,
                "progress_ttl_seconds": config.cache.progress_ttl_seconds,
                "history_ttl_seconds": config.cache.history_ttl_seconds,
                "watchlist_ttl_seconds": config.cache.watchlist_ttl_seconds,
                "owner_key": config.cache.owner_key,
            },
            "logging": {
                "level": config.logging.level,
                "json": config.logging.json,
                "file": config.logging.file.as_ref().map(|f| f.display().to_string()),
            },
        }));
        return Ok(());
    }

    if !path.exists() {
        output.warn(format!(
            "No config file at {} (showing defaults)",
            path.display()
        ));
    } else {
        output.info(format!("Config file: {}", path.display()));
    }

    let rendered = toml::to_string_pretty(&config)
        .map_err(|e| color_eyre::eyre::eyre!("Failed to render configuration: {}", e))?;
    output.println(rendered);
    Ok(())
}

fn init_config(output: &Output) -> Result<()> {
    let paths = PathManager::default();
    let path = paths.config_file();

    if path.exists() {
        output.warn(format!("Config file already exists: {}", path.display()));
        return Ok(());
    }

    let config = Config::default();
    config
        .save_to_file(&path)
        .map_err(|e| color_eyre::eyre::eyre!("Failed to write config file: {}", e))?;
    output.success(format!("Wrote default config: {}", path.display()));
    Ok(())
}
