use std::path::Path;

use anyhow::{Result, anyhow};
use csa_memory::EpisodeStore;

pub fn run(id: &str, path: &Path) -> Result<()> {
    let root = csa_config::paths::memory_dir(Some("episodic-memory"))?;
    let store = EpisodeStore::new(root)?;
    let episode = store
        .get_episode(id)
        .ok_or_else(|| anyhow!("no episode matching id '{id}'"))?;

    let json = serde_json::to_vec_pretty(&episode)?;
    std::fs::write(path, json)?;
    println!("exported {id} to {}", path.display());
    Ok(())
}
