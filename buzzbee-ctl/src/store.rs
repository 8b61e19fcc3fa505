use std::{io, path::PathBuf};

use anyhow::Context;
use buzzbee_client::{SessionStore, StoredSession};

/// Keeps the session in a JSON file, so it survives between invocations
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: PathBuf) -> FileStore {
        FileStore { path }
    }
}

impl SessionStore for FileStore {
    fn load(&mut self) -> anyhow::Result<Option<StoredSession>> {
        let data = match std::fs::read(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("reading {}", self.path.display()))
            }
        };
        serde_json::from_slice(&data)
            .map(Some)
            .with_context(|| format!("parsing session file {}", self.path.display()))
    }

    fn save(&mut self, session: &StoredSession) -> anyhow::Result<()> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("creating directory {}", dir.display()))?;
        }
        let data = serde_json::to_vec_pretty(session).context("serializing session")?;
        std::fs::write(&self.path, data)
            .with_context(|| format!("writing {}", self.path.display()))
    }

    fn clear(&mut self) -> anyhow::Result<()> {
        match std::fs::remove_file(&self.path) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => {
                Err(e).with_context(|| format!("removing {}", self.path.display()))
            }
            _ => Ok(()),
        }
    }
}
