use crate::output::{Output, OutputFormat};
use color_eyre::Result;
use comfy_table::{presets::UTF8_FULL, Cell, Table};
use serde_json::json;
use watchkeep_config::PathManager;
use watchkeep_core::CacheClass;
use watchkeep_source::EnvelopeStore;

pub fn run_status(output: &Output) -> Result<()> {
    let paths = PathManager::default();
    let store = EnvelopeStore::new(&paths.cache_dir())
        .map_err(|e| color_eyre::eyre::eyre!("Failed to open cache directory: {}", e))?;

    let mut rows = Vec::new();
    for class in CacheClass::all() {
        let key = class.store_key();
        let info = store
            .describe(&key)
            .map_err(|e| color_eyre::eyre::eyre!("Failed to inspect cache entry {}: {}", key, e))?;
        rows.push((key, info));
    }

    if matches!(output.format(), OutputFormat::Json | OutputFormat::JsonPretty) {
        let entries: Vec<_> = rows
            .iter()
            .map(|(key, info)| match info {
                Some(info) => json!({
                    "class": key,
                    "items": info.item_count,
                    "stored_at": info.stored_at.to_rfc3339(),
                    "ttl_seconds": info.ttl_seconds,
                    "expired": info.expired,
                }),
                None => json!({ "class": key, "items": null }),
            })
            .collect();
        output.json(&json!({ "cache_dir": paths.cache_dir().display().to_string(), "entries": entries }));
        return Ok(());
    }

    output.info(format!("Cache directory: {}", paths.cache_dir().display()));

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Class", "Items", "Stored at", "TTL", "State"]);
    for (key, info) in rows {
        match info {
            Some(info) => {
                let state = if info.expired { "expired" } else { "fresh" };
                table.add_row(vec![
                    Cell::new(key),
                    Cell::new(info.item_count),
                    Cell::new(info.stored_at.format("%Y-%m-%d %H:%M:%S UTC")),
                    Cell::new(format_ttl(info.ttl_seconds)),
                    Cell::new(state),
                ]);
            }
            None => {
                table.add_row(vec![
                    Cell::new(key),
                    Cell::new("-"),
                    Cell::new("-"),
                    Cell::new("-"),
                    Cell::new("absent"),
                ]);
            }
        }
    }
    output.println(table.to_string());
    Ok(())
}

fn format_ttl(seconds: i64) -> String {
    if seconds % 3600 == 0 {
        format!("{}h", seconds / 3600)
    } else if seconds % 60 == 0 {
        format!("{}m", seconds / 60)
    } else {
        format!("{}s", seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_ttl() {
        assert_eq!(format_ttl(21600), "6h");
        assert_eq!(format_ttl(90), "90s");
        assert_eq!(format_ttl(120), "2m");
    }
}
