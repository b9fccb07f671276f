use std::path::PathBuf;

/// Work item handed from watch ingestion to the processing worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewImages {
    /// Path reported by the filesystem event.
    pub trigger: PathBuf,
    /// Result of re-globbing the trigger path.
    pub matches: Vec<PathBuf>,
}
