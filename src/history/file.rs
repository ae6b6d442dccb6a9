//! JSON-lines history store
//!
//! One file per session under a base directory, one record per line. Each
//! record goes to disk in a single blocking write that runs to completion even
//! when the caller stops waiting. A torn last line (crash mid-write) is skipped
//! on read and cut off before the next append.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::core::{CompanionError, Result};
use crate::history::{ConversationMessage, HistoryStore};

/// Longest file stem used as-is; longer escaped ids are hashed
const MAX_FILE_STEM: usize = 200;

/// History persisted as `<dir>/<session>.jsonl`
#[derive(Debug)]
pub struct FileHistoryStore {
    dir: PathBuf,
    /// Held by readers and for the whole of every write
    write_lock: Arc<Mutex<()>>,
}

impl FileHistoryStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File backing a session; ids are escaped so they cannot leave `dir`
    ///
    /// Escaped ids longer than a safe file name keep a readable prefix and end
    /// in `~<sha256>`. `~` is always escaped, so hashed names never collide
    /// with plain ones.
    pub fn session_path(&self, session_id: &str) -> PathBuf {
        let mut stem = String::with_capacity(session_id.len());
        for c in session_id.chars() {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                stem.push(c);
            } else {
                for byte in c.to_string().bytes() {
                    stem.push_str(&format!("%{:02X}", byte));
                }
            }
        }

        if stem.len() > MAX_FILE_STEM {
            let digest = Sha256::digest(session_id.as_bytes());
            let hash = hex_encode(&digest);
            // escaped stems are ASCII, any byte index is a char boundary
            stem.truncate(MAX_FILE_STEM - hash.len() - 1);
            stem.push('~');
            stem.push_str(&hash);
        }

        stem.push_str(".jsonl");
        self.dir.join(stem)
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

fn history_err(action: &str, path: &Path, e: std::io::Error) -> CompanionError {
    CompanionError::history(format!("cannot {} {}: {}", action, path.display(), e))
}

/// Cut a trailing partial line so the next record starts on its own line
fn truncate_torn_tail(file: &File, path: &Path) -> Result<()> {
    let len = file
        .metadata()
        .map_err(|e| history_err("stat", path, e))?
        .len();
    if len == 0 {
        return Ok(());
    }

    let mut reader = File::open(path).map_err(|e| history_err("open", path, e))?;
    let mut last = [0u8; 1];
    reader
        .seek(SeekFrom::End(-1))
        .and_then(|_| reader.read_exact(&mut last))
        .map_err(|e| history_err("read", path, e))?;
    if last[0] == b'\n' {
        return Ok(());
    }

    let content = std::fs::read(path).map_err(|e| history_err("read", path, e))?;
    let keep = content
        .iter()
        .rposition(|&b| b == b'\n')
        .map_or(0, |end| end + 1);
    warn!(
        path = %path.display(),
        dropped = content.len() - keep,
        "truncating torn history record"
    );
    file.set_len(keep as u64)
        .map_err(|e| history_err("truncate", path, e))?;
    Ok(())
}

fn write_record(dir: &Path, path: &Path, line: &[u8]) -> Result<()> {
    std::fs::create_dir_all(dir).map_err(|e| history_err("create", dir, e))?;

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| history_err("open", path, e))?;
    truncate_torn_tail(&file, path)?;
    file.write_all(line)
        .map_err(|e| history_err("write", path, e))?;
    file.flush().map_err(|e| history_err("write", path, e))?;
    Ok(())
}

#[async_trait]
impl HistoryStore for FileHistoryStore {
    async fn append(&self, session_id: &str, message: ConversationMessage) -> Result<()> {
        let mut line = serde_json::to_string(&message)?;
        line.push('\n');

        let dir = self.dir.clone();
        let path = self.session_path(session_id);
        let guard = self.write_lock.clone().lock_owned().await;

        let task_path = path.clone();
        tokio::task::spawn_blocking(move || {
            let _guard = guard;
            write_record(&dir, &task_path, line.as_bytes())
        })
        .await
        .map_err(|e| CompanionError::history(format!("history write task failed: {}", e)))??;

        debug!(session_id, path = %path.display(), "appended history record");
        Ok(())
    }

    async fn read_all(&self, session_id: &str) -> Result<Vec<ConversationMessage>> {
        let path = self.session_path(session_id);
        let content = {
            let _guard = self.write_lock.lock().await;
            match fs::read(&path).await {
                Ok(content) => content,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
                Err(e) => return Err(history_err("read", &path, e)),
            }
        };

        let complete = match content.iter().rposition(|&b| b == b'\n') {
            Some(end) => &content[..=end],
            None => &content[..0],
        };
        if complete.len() < content.len() {
            warn!(
                session_id,
                path = %path.display(),
                "ignoring torn trailing history record"
            );
        }

        let text = std::str::from_utf8(complete).map_err(|e| {
            CompanionError::history(format!("cannot decode {}: {}", path.display(), e))
        })?;
        text.lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).map_err(CompanionError::from))
            .collect()
    }

    async fn release(&self, session_id: &str) -> Result<()> {
        let path = self.session_path(session_id);
        let _guard = self.write_lock.lock().await;
        if !fs::try_exists(&path).await? {
            return Ok(());
        }
        let file = fs::OpenOptions::new().append(true).open(&path).await?;
        file.sync_all().await?;
        Ok(())
    }
}
