use crate::db::api::{CheckStore, SimilarCheck, StoreStats, StoredCheck};
use crate::db::index::{normalize_claim, InMemoryIndex};
use crate::models::{FactCheckResult, Id, IsoDateTime};
use anyhow::anyhow;
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::{info, warn};

/// Append-only log of completed checks, one `{json}\t{sha256}` line each.
///
/// The index is rebuilt from the log on open; lines whose checksum does not
/// match (torn writes, hand edits) are skipped.
pub struct WalCheckStore {
    path: PathBuf,
    index: Mutex<InMemoryIndex>,
    wal: Mutex<BufWriter<File>>,
}

impl WalCheckStore {
    pub fn open(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let index = replay(&path)?;
        info!(path = %path.display(), checks = index.len(), "check store opened");
        Ok(Self {
            path,
            index: Mutex::new(index),
            wal: Mutex::new(BufWriter::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_wal(&self, check: &StoredCheck) -> anyhow::Result<()> {
        let payload = serde_json::to_string(check)?;
        let line = format!("{payload}\t{}\n", sha256_hex(&payload));
        let mut wal = lock(&self.wal)?;
        wal.write_all(line.as_bytes())?;
        wal.flush()?;
        Ok(())
    }

    fn index(&self) -> anyhow::Result<MutexGuard<'_, InMemoryIndex>> {
        lock(&self.index)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> anyhow::Result<MutexGuard<'_, T>> {
    mutex.lock().map_err(|_| anyhow!("check store lock poisoned"))
}

fn replay(path: &Path) -> anyhow::Result<InMemoryIndex> {
    let mut index = InMemoryIndex::default();
    let reader = BufReader::new(File::open(path)?);
    for (number, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match parse_line(&line) {
            Some(check) => index.insert(check),
            None => warn!(line = number + 1, "skipping corrupt check store line"),
        }
    }
    Ok(index)
}

fn parse_line(line: &str) -> Option<StoredCheck> {
    let (payload, checksum) = line.trim_end().rsplit_once('\t')?;
    if sha256_hex(payload) != checksum {
        return None;
    }
    serde_json::from_str(payload).ok()
}

fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

#[async_trait]
impl CheckStore for WalCheckStore {
    async fn store(
        &self,
        claim: &str,
        result: &FactCheckResult,
        human_reviewed: bool,
        duration: Duration,
    ) -> anyhow::Result<StoredCheck> {
        let check = StoredCheck {
            id: Id::new(),
            claim: claim.to_string(),
            claim_normalized: normalize_claim(claim),
            result: result.clone(),
            human_reviewed,
            created_at: IsoDateTime::now(),
            duration_secs: duration.as_secs_f64(),
        };
        self.write_wal(&check)?;
        self.index()?.insert(check.clone());
        info!(id = %check.id, verdict = %result.overall_verdict, human_reviewed, "check stored");
        Ok(check)
    }

    async fn find_exact(&self, claim: &str) -> anyhow::Result<Option<StoredCheck>> {
        Ok(self.index()?.find_exact(&normalize_claim(claim)))
    }

    async fn find_similar(&self, claim: &str, limit: usize) -> anyhow::Result<Vec<SimilarCheck>> {
        Ok(self.index()?.find_similar(&normalize_claim(claim), limit))
    }

    async fn recent(&self, limit: usize) -> anyhow::Result<Vec<StoredCheck>> {
        Ok(self.index()?.recent(limit))
    }

    async fn stats(&self) -> anyhow::Result<StoreStats> {
        Ok(self.index()?.stats())
    }
}
