use std::path::Path;

use anyhow::{Context, Result};
use csa_memory::{Episode, EpisodeStore};

pub fn run(path: &Path) -> Result<()> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let episode: Episode = serde_json::from_str(&contents)
        .with_context(|| format!("{} is not a valid episode document", path.display()))?;

    let root = csa_config::paths::memory_dir(Some("episodic-memory"))?;
    let store = EpisodeStore::new(root)?;
    let id = store.import_episode(episode)?;
    println!("imported {} as {id}", path.display());
    Ok(())
}
