//! Append-only JSONL transcript of every turn, one file per session.
//!
//! This is the forensic record: every inbound message and outbound response
//! lands here, with file locking so concurrent writers cannot interleave.

use std::{
    fs::{self, File, OpenOptions},
    io::{BufRead, BufReader, Write},
    path::PathBuf,
};

use fd_lock::RwLock;

use crate::{
    error::{Error, Result},
    key::SessionKey,
};

pub struct TranscriptLog {
    pub base_dir: PathBuf,
}

impl TranscriptLog {
    pub fn new(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    fn path_for(&self, key: &SessionKey) -> PathBuf {
        self.base_dir.join(format!("{}.jsonl", key.to_filename()))
    }

    /// Append an entry as a single line to the session transcript.
    pub async fn append(&self, key: &SessionKey, entry: &serde_json::Value) -> Result<()> {
        let path = self.path_for(key);
        let line = serde_json::to_string(entry)?;

        tokio::task::spawn_blocking(move || -> Result<()> {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            let file = OpenOptions::new().create(true).append(true).open(&path)?;
            let mut lock = RwLock::new(file);
            let mut guard = lock
                .write()
                .map_err(|e| Error::lock_failed(e.to_string()))?;
            writeln!(*guard, "{line}")?;
            Ok(())
        })
        .await??;

        Ok(())
    }

    /// Read the last N entries from a session transcript.
    pub async fn read_last_n(&self, key: &SessionKey, n: usize) -> Result<Vec<serde_json::Value>> {
        let path = self.path_for(key);

        tokio::task::spawn_blocking(move || -> Result<Vec<serde_json::Value>> {
            if !path.exists() {
                return Ok(vec![]);
            }
            let file = File::open(&path)?;
            let reader = BufReader::new(file);
            let mut all: Vec<serde_json::Value> = Vec::new();
            for line in reader.lines() {
                let line = line?;
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                match serde_json::from_str(trimmed) {
                    Ok(val) => all.push(val),
                    Err(e) => {
                        tracing::warn!("skipping malformed transcript line: {e}");
                    },
                }
            }
            let start = all.len().saturating_sub(n);
            Ok(all[start..].to_vec())
        })
        .await?
    }
}

#[cfg(test)]
mod tests {
    use {super::*, serde_json::json, voltaic_common::types::ChannelType};

    fn temp_log() -> (TranscriptLog, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let log = TranscriptLog::new(dir.path().to_path_buf());
        (log, dir)
    }

    fn key() -> SessionKey {
        SessionKey::new(ChannelType::Whatsapp, "+15550001", "+15550001")
    }

    #[tokio::test]
    async fn append_and_read() {
        let (log, _dir) = temp_log();

        log.append(&key(), &json!({"direction": "inbound", "body": "hello"}))
            .await
            .unwrap();
        log.append(&key(), &json!({"direction": "outbound", "body": "hi"}))
            .await
            .unwrap();

        let entries = log.read_last_n(&key(), 10).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0]["direction"], "inbound");
        assert_eq!(entries[1]["direction"], "outbound");
    }

    #[tokio::test]
    async fn read_missing_is_empty() {
        let (log, _dir) = temp_log();
        assert!(log.read_last_n(&key(), 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn read_last_n_tails() {
        let (log, _dir) = temp_log();
        for i in 0..10 {
            log.append(&key(), &json!({"i": i})).await.unwrap();
        }
        let last3 = log.read_last_n(&key(), 3).await.unwrap();
        assert_eq!(last3.len(), 3);
        assert_eq!(last3[0]["i"], 7);
        assert_eq!(last3[2]["i"], 9);
    }
}
