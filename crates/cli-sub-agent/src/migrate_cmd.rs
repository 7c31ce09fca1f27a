use anyhow::Result;
use csa_config::paths;

/// Ensure every directory named in the on-disk filesystem layout exists
/// under the resolved project root, and that `index.json` documents are
/// present wherever a store expects one. Idempotent: running this against
/// an already-current layout is a no-op.
pub fn run() -> Result<()> {
    paths::logs_dir()?;
    paths::metrics_dir()?;
    paths::session_dir()?;
    paths::approvals_dir()?;
    paths::config_dir()?;
    let episodic = paths::memory_dir(Some("episodic-memory"))?;
    let pending_updates = paths::memory_dir(Some("pending-updates"))?;

    // Touching each store's constructor creates its index.json if missing,
    // which is the only schema migration this layout currently needs.
    csa_memory::EpisodeStore::new(episodic)?;
    csa_updates::PendingUpdateStore::new(pending_updates)?;

    println!("project layout is current under {}", paths::resolve_project_root()?.display());
    Ok(())
}
