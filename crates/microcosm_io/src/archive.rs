use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use microcosm_core::EventSink;
use microcosm_data::WorldEvent;
use tracing::warn;

use crate::error::Result;

/// Append-only JSONL archive of world events, one event per line.
///
/// Complements the SQLite store: the archive is a flat replayable
/// transcript that survives schema changes and is cheap to tail.
pub struct EventArchive {
    file: Mutex<Option<BufWriter<File>>>,
    dir: PathBuf,
}

impl EventArchive {
    pub fn new_at<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_owned();
        if !dir.exists() {
            std::fs::create_dir_all(&dir)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(dir.join("events.jsonl"))?;
        Ok(Self {
            file: Mutex::new(Some(BufWriter::new(file))),
            dir,
        })
    }

    /// Archive that discards everything, for runs without persistence.
    #[must_use]
    pub fn new_dummy() -> Self {
        Self {
            file: Mutex::new(None),
            dir: PathBuf::new(),
        }
    }

    pub fn append(&self, event: &WorldEvent) -> Result<()> {
        let mut guard = self.file.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(ref mut file) = *guard {
            let json = serde_json::to_string(event)?;
            writeln!(file, "{json}")?;
            file.flush()?;
        }
        Ok(())
    }

    /// Reads the archive back, skipping lines that no longer parse.
    pub fn replay(&self) -> Result<Vec<WorldEvent>> {
        let file = match File::open(self.dir.join("events.jsonl")) {
            Ok(f) => f,
            Err(_) => return Ok(Vec::new()),
        };
        let reader = BufReader::new(file);
        let mut events = Vec::new();
        for line in reader.lines().map_while(std::result::Result::ok) {
            if let Ok(event) = serde_json::from_str::<WorldEvent>(&line) {
                events.push(event);
            }
        }
        Ok(events)
    }
}

impl EventSink for EventArchive {
    fn record(&self, event: &WorldEvent) {
        if let Err(e) = self.append(event) {
            warn!("failed to archive event {}: {e}", event.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use microcosm_data::{EventOutcome, EventType};

    #[test]
    fn test_dummy_archive_discards() {
        let archive = EventArchive::new_dummy();
        let event = WorldEvent::new(1, EventType::Action, EventOutcome::Accepted);
        archive.append(&event).unwrap();
        assert!(archive.replay().unwrap().is_empty());
    }

    #[test]
    fn test_append_and_replay() {
        let dir = std::env::temp_dir().join(format!("microcosm-archive-{}", uuid::Uuid::new_v4()));
        let archive = EventArchive::new_at(&dir).unwrap();
        for i in 1..=3u64 {
            let mut event = WorldEvent::new(i, EventType::Action, EventOutcome::Accepted);
            event.id = i as i64;
            archive.append(&event).unwrap();
        }
        let events = archive.replay().unwrap();
        assert_eq!(events.len(), 3);
        assert_eq!(events[2].tick, 3);
        std::fs::remove_dir_all(&dir).ok();
    }
}
