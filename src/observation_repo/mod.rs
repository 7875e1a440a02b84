// Last-known-good games document on disk. Whole-document replace, never merged.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{instrument, warn};

use crate::models::{GameState, GamesDocument};

pub struct ObservationRepo {
    path: PathBuf,
}

impl ObservationRepo {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Missing or corrupt documents load as empty; neither is an error.
    #[instrument(skip(self), fields(repo = "observation", operation = "load"))]
    pub async fn load(&self) -> GamesDocument {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return GamesDocument::default(),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "games document unreadable; starting empty");
                return GamesDocument::default();
            }
        };
        match serde_json::from_slice(&bytes) {
            Ok(doc) => doc,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "games document corrupt; starting empty");
                GamesDocument::default()
            }
        }
    }

    /// Write to `<path>.tmp` then rename over the target.
    #[instrument(skip(self, doc), fields(repo = "observation", operation = "save", games_count = doc.games.len()))]
    pub async fn save(&self, doc: &GamesDocument) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_vec_pretty(doc)?;
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        tokio::fs::write(&tmp, &json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

/// True iff some title's player count differs from the previous document.
/// A title absent from the previous document counts as changed.
pub fn should_persist(new_states: &[GameState], old_states: &[GameState]) -> bool {
    let mut old: HashMap<&str, u64> = HashMap::with_capacity(old_states.len());
    for g in old_states {
        old.entry(g.name.as_str()).or_insert(g.player_count);
    }
    new_states
        .iter()
        .any(|g| old.get(g.name.as_str()) != Some(&g.player_count))
}
