use std::path::PathBuf;

use async_trait::async_trait;
use tracing::debug;

#[async_trait]
pub trait PersonaStore: Send + Sync {
    /// Persona text to prepend to questions, if one is configured.
    async fn persona(&self) -> Option<String>;
}

/// Reads the persona file on every lookup so edits apply without a restart.
pub struct FilePersonaStore {
    path: PathBuf,
}

impl FilePersonaStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FilePersonaStore { path: path.into() }
    }
}

#[async_trait]
impl PersonaStore for FilePersonaStore {
    async fn persona(&self) -> Option<String> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => {
                let trimmed = content.trim();
                if trimmed.is_empty() {
                    debug!("Persona file {} is empty", self.path.display());
                    None
                } else {
                    debug!("Persona loaded from {}", self.path.display());
                    Some(trimmed.to_string())
                }
            }
            Err(err) => {
                debug!("No persona at {}: {err}", self.path.display());
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[tokio::test]
    async fn reads_and_trims_persona_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "\n  Kamu adalah asisten yang ramah.  \n").expect("write persona");

        let store = FilePersonaStore::new(file.path());
        assert_eq!(
            store.persona().await.as_deref(),
            Some("Kamu adalah asisten yang ramah.")
        );
    }

    #[tokio::test]
    async fn missing_or_blank_file_yields_no_persona() {
        let dir = tempfile::tempdir().expect("temp dir");
        let missing = FilePersonaStore::new(dir.path().join("persona.txt"));
        assert_eq!(missing.persona().await, None);

        let blank_path = dir.path().join("blank.txt");
        std::fs::write(&blank_path, "   \n").expect("write blank");
        assert_eq!(FilePersonaStore::new(blank_path).persona().await, None);
    }
}
