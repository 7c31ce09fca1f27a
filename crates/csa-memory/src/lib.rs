//! Episode Store: the content-addressed episodic memory log used to learn
//! from past requests. One canonical JSON file per episode, an
//! append-only JSONL audit trail, and a trimmed secondary index for
//! relevance search.

pub mod episode;
pub mod index;
pub mod store;

pub use episode::{
    AgentRecord, Episode, EpisodeType, Outcome, Relationship, RelationshipKind, determine_type,
    extract_keywords, generate_title,
};
pub use index::{EpisodeIndex, IndexEntry, MAX_INDEX_ENTRIES};
pub use store::EpisodeStore;
