use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use calma_booking::hold::{HoldJournal, JournalRecord};
use calma_booking::models::{Hold, HoldStatus};
use uuid::Uuid;

/// Append-only JSONL write-ahead log for holds. Holds are transient
/// (TTL-bounded) so the journal is the only durability they get: on
/// restart, `replay` reconstructs whatever was still pending.
pub struct FileHoldJournal {
    path: PathBuf,
    file: Mutex<File>,
}

impl FileHoldJournal {
    pub fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Fold the log into the set of holds still pending at the end of it.
    pub fn replay(path: impl AsRef<Path>) -> std::io::Result<Vec<Hold>> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Vec::new());
        }
        let reader = BufReader::new(File::open(path)?);
        let mut holds: HashMap<Uuid, Hold> = HashMap::new();
        for (line_no, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<JournalRecord>(&line) {
                Ok(JournalRecord::Created(hold)) => {
                    holds.insert(hold.id, hold);
                }
                Ok(JournalRecord::Transitioned { hold_id, status, .. }) => {
                    if let Some(hold) = holds.get_mut(&hold_id) {
                        hold.status = status;
                    }
                }
                Err(err) => {
                    // A torn tail line from a crash mid-append is expected;
                    // anything else is worth surfacing.
                    tracing::warn!(line = line_no + 1, %err, "skipping unreadable journal line");
                }
            }
        }
        Ok(holds
            .into_values()
            .filter(|hold| hold.status == HoldStatus::Pending)
            .collect())
    }
}

impl HoldJournal for FileHoldJournal {
    fn append(&self, record: &JournalRecord) {
        let mut file = self.file.lock().unwrap();
        let result = serde_json::to_string(record)
            .map_err(std::io::Error::other)
            .and_then(|line| writeln!(file, "{}", line).and_then(|_| file.flush()));
        if let Err(err) = result {
            tracing::error!(%err, path = %self.path.display(), "failed to append hold journal record");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use calma_booking::models::{CompositionItem, ServiceSelection};
    use chrono::{Duration, TimeZone, Utc};

    fn sample_hold(status: HoldStatus) -> Hold {
        let start = Utc.with_ymd_and_hms(2026, 3, 2, 14, 0, 0).unwrap();
        Hold {
            id: Uuid::new_v4(),
            client_id: "client-x".to_string(),
            items: vec![CompositionItem {
                selection: ServiceSelection {
                    service_id: Uuid::new_v4(),
                    quantity: 1,
                    sequence_index: 0,
                },
                start_time: start,
                end_time: start + Duration::minutes(30),
                blocked_until: start + Duration::minutes(30),
                staff_id: Uuid::new_v4(),
                resource_ids: vec![Uuid::new_v4()],
                resource_units: vec![(calma_catalog::ResourceType::Room, 1)],
                price_cents: 8000,
            }],
            claims: Vec::new(),
            total_cents: 8000,
            status,
            created_at: start - Duration::hours(6),
            expires_at: start - Duration::hours(6) + Duration::minutes(10),
        }
    }

    #[test]
    fn test_replay_keeps_only_pending_holds() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("holds.jsonl");
        let journal = FileHoldJournal::open(&path).unwrap();

        let pending = sample_hold(HoldStatus::Pending);
        let released = sample_hold(HoldStatus::Pending);
        journal.append(&JournalRecord::Created(pending.clone()));
        journal.append(&JournalRecord::Created(released.clone()));
        journal.append(&JournalRecord::Transitioned {
            hold_id: released.id,
            status: HoldStatus::Released,
            at: Utc::now(),
        });

        let recovered = FileHoldJournal::replay(&path).unwrap();
        assert_eq!(recovered.len(), 1);
        assert_eq!(recovered[0].id, pending.id);
    }

    #[test]
    fn test_replay_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let recovered = FileHoldJournal::replay(dir.path().join("absent.jsonl")).unwrap();
        assert!(recovered.is_empty());
    }

    #[test]
    fn test_replay_skips_torn_tail_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("holds.jsonl");
        let journal = FileHoldJournal::open(&path).unwrap();
        journal.append(&JournalRecord::Created(sample_hold(HoldStatus::Pending)));
        {
            let mut file = OpenOptions::new().append(true).open(&path).unwrap();
            write!(file, "{{\"Created\":{{\"id\":\"trunc").unwrap();
        }
        let recovered = FileHoldJournal::replay(&path).unwrap();
        assert_eq!(recovered.len(), 1);
    }
}
