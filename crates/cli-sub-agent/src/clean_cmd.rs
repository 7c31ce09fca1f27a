use anyhow::Result;
use csa_memory::EpisodeStore;
use csa_session::SessionStore;

pub fn run(days: i64) -> Result<()> {
    let episode_store = EpisodeStore::new(csa_config::paths::memory_dir(Some("episodic-memory"))?)?;
    let episodes_removed = episode_store.cleanup_old(days)?;

    let session_store = SessionStore::new(csa_config::paths::session_dir()?)?;
    let sessions_removed = session_store.cleanup_old_sessions(days * 24)?;

    println!("removed {episodes_removed} episode(s), {sessions_removed} session(s)");
    Ok(())
}
