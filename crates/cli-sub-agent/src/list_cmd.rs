use anyhow::Result;
use csa_memory::EpisodeStore;

pub fn run(episode_type: Option<&str>, tag: Option<&str>) -> Result<()> {
    let root = csa_config::paths::memory_dir(Some("episodic-memory"))?;
    let store = EpisodeStore::new(root)?;
    let entries = store.list(episode_type, tag);

    if entries.is_empty() {
        println!("no episodes found");
        return Ok(());
    }

    for entry in entries {
        println!(
            "{}\t{}\t{}\t{}",
            entry.id,
            entry.timestamp.to_rfc3339(),
            entry.episode_type,
            entry.title
        );
    }
    Ok(())
}
