//! File-backed storage for host (development) builds.
//!
//! All four records live in one small file. Writes are staged in memory
//! and committed by `flush`, which rewrites the file and verifies it by
//! reading back — a crash between flushes loses at most the unflushed
//! staged writes ("last flushed state wins").
//!
//! File layout: a magic line, then for each present record
//! `[key:1][len:4 LE][bytes:len]`.

use super::{RecordId, StorageBackend, StoreError};
use log::{debug, info};
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;

/// Magic prefix identifying the store file format.
const MAGIC: &[u8] = b"WSTA1\n";

/// Host storage backend over a single file.
pub struct FileBackend {
    path: PathBuf,
    records: [Option<Vec<u8>>; 4],
    dirty: bool,
}

impl FileBackend {
    /// Get the default store path, `~/.wifi-station/records.db`.
    pub fn default_path() -> Result<PathBuf, StoreError> {
        let home = std::env::var("HOME")
            .map_err(|_| StoreError::StorageUnavailable("HOME not set".to_string()))?;
        Ok(PathBuf::from(home).join(".wifi-station").join("records.db"))
    }

    /// Open an existing store file or create a new empty one.
    ///
    /// Fails with [`StoreError::StorageUnavailable`] when the file cannot
    /// be read, created, or parsed as a store container.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        match fs::read(&path) {
            Ok(contents) => {
                let records = parse_container(&contents).map_err(|reason| {
                    StoreError::StorageUnavailable(format!(
                        "{} is not a store file: {}",
                        path.display(),
                        reason
                    ))
                })?;
                debug!("Opened store file {:?}", path);
                Ok(Self {
                    path,
                    records,
                    dirty: false,
                })
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                let backend = Self {
                    path,
                    records: Default::default(),
                    dirty: false,
                };
                // Prove the resource can be created before reporting success.
                backend.write_container().map_err(|e| {
                    StoreError::StorageUnavailable(format!(
                        "cannot create {}: {}",
                        backend.path.display(),
                        e
                    ))
                })?;
                info!("Created new store file {:?}", backend.path);
                Ok(backend)
            }
            Err(e) => Err(StoreError::StorageUnavailable(format!(
                "cannot open {}: {}",
                path.display(),
                e
            ))),
        }
    }

    fn write_container(&self) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let encoded = encode_container(&self.records);
        let mut file = fs::File::create(&self.path)?;
        file.write_all(&encoded)?;
        file.sync_all()?;

        // Read back and verify to catch silent write failures
        let read_back = fs::read(&self.path)?;
        if read_back != encoded {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "store verification failed: wrote {} bytes, read {} bytes",
                    encoded.len(),
                    read_back.len()
                ),
            ));
        }
        Ok(())
    }
}

impl StorageBackend for FileBackend {
    fn read(&mut self, record: RecordId) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.records[record.key() as usize].clone())
    }

    fn write(&mut self, record: RecordId, bytes: &[u8]) -> Result<(), StoreError> {
        self.records[record.key() as usize] = Some(bytes.to_vec());
        self.dirty = true;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), StoreError> {
        if !self.dirty {
            return Ok(());
        }
        self.write_container()
            .map_err(|e| StoreError::Io(format!("flush to {}: {}", self.path.display(), e)))?;
        self.dirty = false;
        Ok(())
    }
}

fn encode_container(records: &[Option<Vec<u8>>; 4]) -> Vec<u8> {
    let mut out = Vec::from(MAGIC);
    for record in RecordId::ALL {
        if let Some(bytes) = &records[record.key() as usize] {
            out.push(record.key());
            out.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
            out.extend_from_slice(bytes);
        }
    }
    out
}

fn parse_container(contents: &[u8]) -> Result<[Option<Vec<u8>>; 4], String> {
    let rest = contents
        .strip_prefix(MAGIC)
        .ok_or_else(|| "bad magic".to_string())?;

    let mut records: [Option<Vec<u8>>; 4] = Default::default();
    let mut cursor = rest;
    while !cursor.is_empty() {
        if cursor.len() < 5 {
            return Err("truncated record header".to_string());
        }
        let key = cursor[0];
        if key > 3 {
            return Err(format!("unknown record key {}", key));
        }
        let len = u32::from_le_bytes([cursor[1], cursor[2], cursor[3], cursor[4]]) as usize;
        cursor = &cursor[5..];
        if cursor.len() < len {
            return Err(format!("truncated record {} body", key));
        }
        records[key as usize] = Some(cursor[..len].to_vec());
        cursor = &cursor[len..];
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::atomic::{AtomicU32, Ordering};

    // Counter to ensure unique test files even in parallel execution
    static TEST_COUNTER: AtomicU32 = AtomicU32::new(0);

    fn unique_store_path() -> PathBuf {
        let id = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
        let pid = std::process::id();
        env::temp_dir().join(format!("wifi-station-test-{}-{}.db", pid, id))
    }

    #[test]
    fn test_open_creates_file() {
        let path = unique_store_path();
        let backend = FileBackend::open(&path).unwrap();
        assert!(path.exists());
        drop(backend);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_flush_then_reopen_round_trip() {
        let path = unique_store_path();
        {
            let mut backend = FileBackend::open(&path).unwrap();
            backend
                .write(RecordId::StationProfiles, b"{'home': 'pw1'}")
                .unwrap();
            backend.write(RecordId::ActiveConnection, b"home").unwrap();
            backend.flush().unwrap();
        }
        let mut reopened = FileBackend::open(&path).unwrap();
        assert_eq!(
            reopened.read(RecordId::StationProfiles).unwrap().as_deref(),
            Some("{'home': 'pw1'}".as_bytes())
        );
        assert_eq!(
            reopened.read(RecordId::ActiveConnection).unwrap().as_deref(),
            Some("home".as_bytes())
        );
        assert_eq!(reopened.read(RecordId::ApIdentity).unwrap(), None);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_unflushed_write_not_persisted() {
        let path = unique_store_path();
        {
            let mut backend = FileBackend::open(&path).unwrap();
            backend.write(RecordId::ApSettings, b"{'max_client/s': 4}").unwrap();
            // Dropped without flush: last flushed state (empty) wins.
        }
        let mut reopened = FileBackend::open(&path).unwrap();
        assert_eq!(reopened.read(RecordId::ApSettings).unwrap(), None);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_garbage_file_is_unavailable() {
        let path = unique_store_path();
        fs::write(&path, b"not a store").unwrap();
        assert!(matches!(
            FileBackend::open(&path),
            Err(StoreError::StorageUnavailable(_))
        ));
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_truncated_file_is_unavailable() {
        let path = unique_store_path();
        let mut contents = Vec::from(MAGIC);
        contents.extend_from_slice(&[0, 200, 0, 0, 0]); // claims 200 bytes, has none
        fs::write(&path, &contents).unwrap();
        assert!(matches!(
            FileBackend::open(&path),
            Err(StoreError::StorageUnavailable(_))
        ));
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_empty_payload_distinct_from_missing() {
        let path = unique_store_path();
        {
            let mut backend = FileBackend::open(&path).unwrap();
            backend.write(RecordId::ActiveConnection, b"").unwrap();
            backend.flush().unwrap();
        }
        let mut reopened = FileBackend::open(&path).unwrap();
        assert_eq!(
            reopened.read(RecordId::ActiveConnection).unwrap().as_deref(),
            Some("".as_bytes())
        );
        let _ = fs::remove_file(&path);
    }
}
