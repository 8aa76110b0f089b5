use crate::output::Output;
use color_eyre::Result;
use watchkeep_config::PathManager;
use watchkeep_core::CacheClass;
use watchkeep_models::WatchlistCategory;
use watchkeep_source::EnvelopeStore;

pub fn run_clear(
    all: bool,
    progress: bool,
    history: bool,
    watchlists: bool,
    output: &Output,
) -> Result<()> {
    let paths = PathManager::default();
    let store = EnvelopeStore::new(&paths.cache_dir())
        .map_err(|e| color_eyre::eyre::eyre!("Failed to open cache directory: {}", e))?;

    if all {
        store
            .clear_all()
            .map_err(|e| color_eyre::eyre::eyre!("Failed to clear cache: {}", e))?;
        output.success(format!("Cleared all cache entries: {}", paths.cache_dir().display()));
        return Ok(());
    }

    let mut cleared_anything = false;

    if progress {
        clear_class(&store, CacheClass::Progress, output)?;
        cleared_anything = true;
    }

    if history {
        clear_class(&store, CacheClass::MovieHistory, output)?;
        cleared_anything = true;
    }

    if watchlists {
        for category in WatchlistCategory::all() {
            clear_class(&store, CacheClass::Watchlist(category), output)?;
        }
        cleared_anything = true;
    }

    if !cleared_anything {
        output.warn("No clear option specified. Use --progress, --history, --watchlists, or --all");
        output.println("\nExample: watchkeep clear --progress");
    }

    Ok(())
}

fn clear_class(store: &EnvelopeStore, class: CacheClass, output: &Output) -> Result<()> {
    let key = class.store_key();
    store
        .clear(&key)
        .map_err(|e| color_eyre::eyre::eyre!("Failed to clear cache entry {}: {}", key, e))?;
    output.success(format!("Cleared cache entry: {}", key));
    Ok(())
}
