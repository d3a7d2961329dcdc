use super::document::ScenarioDocument;
use crate::error::DraftError;
use bincode::config::standard;
use bincode::serde::{decode_from_slice, encode_to_vec};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info};

const DRAFT_EXTENSION: &str = "draft";

/// Unsaved work kept on disk after the backend refused it.
///
/// The scenario is stored as JSON text: its field bags are free-form and
/// bincode cannot decode self-describing values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Draft {
    pub bot_id: String,
    pub token: Option<String>,
    document_json: String,
    /// Seconds since the Unix epoch.
    pub saved_at: u64,
}

impl Draft {
    pub fn new(
        bot_id: impl Into<String>,
        token: Option<String>,
        document: &ScenarioDocument,
    ) -> Result<Self, DraftError> {
        let document_json =
            serde_json::to_string(document).map_err(|e| DraftError::Codec(e.to_string()))?;
        let saved_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        Ok(Self {
            bot_id: bot_id.into(),
            token,
            document_json,
            saved_at,
        })
    }

    pub fn document(&self) -> Result<ScenarioDocument, DraftError> {
        serde_json::from_str(&self.document_json).map_err(|e| DraftError::Codec(e.to_string()))
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, DraftError> {
        encode_to_vec(self, standard()).map_err(|e| DraftError::Codec(e.to_string()))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DraftError> {
        decode_from_slice(bytes, standard())
            .map(|(draft, _)| draft)
            .map_err(|e| DraftError::Codec(e.to_string()))
    }
}

/// One bincode file per bot under a directory.
#[derive(Debug, Clone)]
pub struct DraftStore {
    dir: PathBuf,
}

impl DraftStore {
    /// Open (and create if needed) a draft directory.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, DraftError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| io_error(&dir, source))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, bot_id: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", file_stem(bot_id), DRAFT_EXTENSION))
    }

    /// Reads the draft at `path` and checks it belongs to `bot_id`.
    fn read_checked(&self, path: &Path, bot_id: &str) -> Result<Draft, DraftError> {
        let bytes = fs::read(path).map_err(|source| io_error(path, source))?;
        let draft = Draft::from_bytes(&bytes)?;
        if draft.bot_id != bot_id {
            return Err(DraftError::BotMismatch {
                expected: bot_id.to_string(),
                found: draft.bot_id,
            });
        }
        Ok(draft)
    }

    /// Replace any earlier draft for the same bot.
    pub fn save(&self, draft: &Draft) -> Result<PathBuf, DraftError> {
        let path = self.path_for(&draft.bot_id);
        fs::write(&path, draft.to_bytes()?).map_err(|source| io_error(&path, source))?;
        info!(bot_id = %draft.bot_id, path = %path.display(), "Draft saved locally");
        Ok(path)
    }

    pub fn load(&self, bot_id: &str) -> Result<Option<Draft>, DraftError> {
        let path = self.path_for(bot_id);
        if !path.exists() {
            return Ok(None);
        }
        self.read_checked(&path, bot_id).map(Some)
    }

    /// Returns whether a draft existed. A file that no longer decodes is
    /// removed; one holding another bot's draft is left alone.
    pub fn discard(&self, bot_id: &str) -> Result<bool, DraftError> {
        let path = self.path_for(bot_id);
        if !path.exists() {
            return Ok(false);
        }
        match self.read_checked(&path, bot_id) {
            Ok(_) | Err(DraftError::Codec(_)) => {}
            Err(e) => return Err(e),
        }
        fs::remove_file(&path).map_err(|source| io_error(&path, source))?;
        debug!(bot_id = %bot_id, "Draft discarded");
        Ok(true)
    }

    /// Bot ids of every readable draft, sorted.
    pub fn list(&self) -> Result<Vec<String>, DraftError> {
        let entries = fs::read_dir(&self.dir).map_err(|source| io_error(&self.dir, source))?;
        let mut bots = Vec::new();
        for entry in entries {
            let path = entry.map_err(|source| io_error(&self.dir, source))?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(DRAFT_EXTENSION) {
                continue;
            }
            let bytes = fs::read(&path).map_err(|source| io_error(&path, source))?;
            if let Ok(draft) = Draft::from_bytes(&bytes) {
                bots.push(draft.bot_id);
            }
        }
        bots.sort();
        Ok(bots)
    }
}

/// File stem for a bot id. ASCII letters, digits, `-` and `_` are kept; every
/// other byte becomes `%XX`, so distinct ids never share a file.
fn file_stem(bot_id: &str) -> String {
    let mut stem = String::with_capacity(bot_id.len());
    for byte in bot_id.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
            stem.push(char::from(byte));
        } else {
            stem.push_str(&format!("%{:02X}", byte));
        }
    }
    stem
}

fn io_error(path: &Path, source: std::io::Error) -> DraftError {
    DraftError::Io {
        path: path.display().to_string(),
        source,
    }
}
