//! Hash-chained audit log
//!
//! Each entry commits to its predecessor's hash, so editing or dropping an
//! entry breaks [`MemoryAuditLog::verify_integrity`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::error::{StoreError, StoreResult};
use crate::store::AuditSink;

const GENESIS_HASH: [u8; 32] = [0u8; 32];

/// Audit event as submitted by a pipeline step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    pub tenant_id: String,
    pub action: String,
    pub subject_id: String,
    pub detail: Value,
}

impl AuditRecord {
    #[must_use]
    pub fn new(tenant_id: impl Into<String>, action: impl Into<String>, subject_id: impl ToString) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            action: action.into(),
            subject_id: subject_id.to_string(),
            detail: Value::Null,
        }
    }

    #[inline]
    #[must_use]
    pub fn with_detail(mut self, detail: Value) -> Self {
        self.detail = detail;
        self
    }
}

/// Stored, chained audit entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub sequence: u64,
    pub tenant_id: String,
    pub action: String,
    pub subject_id: String,
    pub detail: Value,
    pub recorded_at: DateTime<Utc>,
    #[serde(with = "hex_hash")]
    pub prev_hash: [u8; 32],
    #[serde(with = "hex_hash")]
    pub hash: [u8; 32],
}

#[derive(Debug, Default)]
pub struct MemoryAuditLog {
    inner: Mutex<Vec<AuditEntry>>,
}

impl MemoryAuditLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, record: AuditRecord) -> u64 {
        let mut guard = self.inner.lock();
        let prev_hash = guard.last().map_or(GENESIS_HASH, |e| e.hash);
        let mut entry = AuditEntry {
            sequence: guard.len() as u64,
            tenant_id: record.tenant_id,
            action: record.action,
            subject_id: record.subject_id,
            detail: record.detail,
            recorded_at: Utc::now(),
            prev_hash,
            hash: GENESIS_HASH,
        };
        entry.hash = compute_hash(&entry);
        let sequence = entry.sequence;
        tracing::debug!(sequence, action = %entry.action, subject = %entry.subject_id, "audit entry appended");
        guard.push(entry);
        sequence
    }

    #[must_use]
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.inner.lock().clone()
    }

    /// Entries recorded for `action`
    #[must_use]
    pub fn entries_for(&self, action: &str) -> Vec<AuditEntry> {
        self.inner.lock().iter().filter(|e| e.action == action).cloned().collect()
    }

    /// Walk the chain from genesis
    ///
    /// # Errors
    /// Returns `StoreError::Integrity` at the first entry whose link or hash
    /// does not match
    pub fn verify_integrity(&self) -> StoreResult<()> {
        let guard = self.inner.lock();
        let mut prev = GENESIS_HASH;
        for entry in guard.iter() {
            if entry.prev_hash != prev || entry.hash != compute_hash(entry) {
                return Err(StoreError::Integrity {
                    sequence: entry.sequence,
                });
            }
            prev = entry.hash;
        }
        Ok(())
    }

    #[cfg(test)]
    fn tamper(&self, sequence: usize, action: &str) {
        if let Some(entry) = self.inner.lock().get_mut(sequence) {
            entry.action = action.to_string();
        }
    }
}

#[async_trait]
impl AuditSink for MemoryAuditLog {
    async fn record(&self, record: AuditRecord) -> StoreResult<u64> {
        Ok(self.append(record))
    }
}

fn compute_hash(entry: &AuditEntry) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(entry.sequence.to_le_bytes());
    hasher.update(entry.tenant_id.as_bytes());
    hasher.update([0]);
    hasher.update(entry.action.as_bytes());
    hasher.update([0]);
    hasher.update(entry.subject_id.as_bytes());
    hasher.update([0]);
    hasher.update(entry.detail.to_string().as_bytes());
    hasher.update([0]);
    hasher.update(entry.recorded_at.timestamp_nanos_opt().unwrap_or_default().to_le_bytes());
    hasher.update(entry.prev_hash);
    hasher.finalize().into()
}

mod hex_hash {
    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S: Serializer>(hash: &[u8; 32], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(hash))
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<[u8; 32], D::Error> {
        let raw = String::deserialize(deserializer)?;
        let mut out = [0u8; 32];
        hex::decode_to_slice(raw, &mut out).map_err(serde::de::Error::custom)?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn chain_links_and_verifies() {
        let log = MemoryAuditLog::new();
        assert_eq!(log.append(AuditRecord::new("t", "backfill.completed", "src-1")), 0);
        assert_eq!(
            log.append(AuditRecord::new("t", "deployment.created", "dep-1").with_detail(json!({"demoted": 0}))),
            1
        );

        let entries = log.entries();
        assert_eq!(entries[0].prev_hash, GENESIS_HASH);
        assert_eq!(entries[1].prev_hash, entries[0].hash);
        assert!(log.verify_integrity().is_ok());
        assert_eq!(log.entries_for("deployment.created").len(), 1);
    }

    #[test]
    fn tampering_is_detected() {
        let log = MemoryAuditLog::new();
        log.append(AuditRecord::new("t", "a", "1"));
        log.append(AuditRecord::new("t", "b", "2"));
        log.tamper(0, "rewritten");

        assert_eq!(log.verify_integrity(), Err(StoreError::Integrity { sequence: 0 }));
    }

    #[test]
    fn hashes_serialize_as_hex() {
        let log = MemoryAuditLog::new();
        log.append(AuditRecord::new("t", "a", "1"));
        let entry = log.entries().remove(0);

        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["prevHash"], json!("0".repeat(64)));
        let back: AuditEntry = serde_json::from_value(value).unwrap();
        assert_eq!(back, entry);
    }
}
