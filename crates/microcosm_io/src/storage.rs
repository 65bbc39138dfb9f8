//! Durable storage behind a background worker thread.
//!
//! The simulation never touches SQLite directly. A dedicated thread
//! owns the connection and drains a command channel, so database
//! latency cannot stall the tick loop. Writes are fire-and-forget;
//! reads reply over a per-call channel.

use std::path::Path;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use microcosm_core::EventSink;
use microcosm_data::{EventOutcome, EventType, Position, WorldEvent};
use microcosm_observer::{BudgetLedger, Tier};
use rusqlite::{params, Connection};
use tracing::error;
use uuid::Uuid;

use crate::error::{IoError, Result};

/// How long blocking reads wait for the worker before giving up.
const REPLY_TIMEOUT: Duration = Duration::from_secs(5);

/// Soft controls read once per loop iteration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Controls {
    pub pause: bool,
    pub speed: f64,
}

impl Default for Controls {
    fn default() -> Self {
        Self {
            pause: false,
            speed: 1.0,
        }
    }
}

/// Filter for event queries. Unset fields do not constrain.
#[derive(Debug, Clone, Default)]
pub struct EventQuery {
    pub since_id: Option<i64>,
    pub actor_id: Option<Uuid>,
    pub event_type: Option<EventType>,
    pub tick_min: Option<u64>,
    pub tick_max: Option<u64>,
    /// Center and radius; pre-filtered by bounding box in SQL, exact
    /// distance applied in application code.
    pub near: Option<(f64, f64, f64, f64)>,
    pub limit: Option<usize>,
}

/// Commands for the background storage thread.
enum StorageCommand {
    RecordEvent(Box<WorldEvent>),
    QueryEvents(EventQuery, Sender<Vec<WorldEvent>>),
    SetControl { key: &'static str, value: String },
    GetControls(Sender<Controls>),
    LedgerSpent(NaiveDate, Tier, Sender<i64>),
    LedgerRecord(NaiveDate, Tier, i64),
    LedgerPurge { keep_days: i64 },
    Stop,
}

/// Handle to the persistent SQLite backend.
pub struct StorageManager {
    sender: Sender<StorageCommand>,
}

impl StorageManager {
    /// Opens (or creates) the database at `path` and spawns the worker.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::spawn(Connection::open(path).map_err(|e| IoError::database(e.to_string()))?)
    }

    /// Ephemeral database, used in tests.
    pub fn in_memory() -> Result<Self> {
        Self::spawn(Connection::open_in_memory().map_err(|e| IoError::database(e.to_string()))?)
    }

    fn spawn(conn: Connection) -> Result<Self> {
        init_db(&conn).map_err(|e| IoError::database(e.to_string()))?;
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;");
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || run_worker(conn, &rx));
        Ok(Self { sender: tx })
    }

    /// Queues an event row; never blocks.
    pub fn record_event(&self, event: &WorldEvent) {
        let _ = self
            .sender
            .send(StorageCommand::RecordEvent(Box::new(event.clone())));
    }

    /// Runs a filtered event query, blocking until the worker replies.
    pub fn query_events(&self, query: EventQuery) -> Result<Vec<WorldEvent>> {
        let (tx, rx) = mpsc::channel();
        self.sender
            .send(StorageCommand::QueryEvents(query, tx))
            .map_err(|e| IoError::worker_gone(e.to_string()))?;
        rx.recv_timeout(REPLY_TIMEOUT)
            .map_err(|e| IoError::worker_gone(e.to_string()))
    }

    pub fn set_pause(&self, pause: bool) {
        let _ = self.sender.send(StorageCommand::SetControl {
            key: "pause",
            value: pause.to_string(),
        });
    }

    pub fn set_speed(&self, speed: f64) {
        let _ = self.sender.send(StorageCommand::SetControl {
            key: "speed",
            value: speed.to_string(),
        });
    }

    /// Reads the pause flag and speed multiplier.
    pub fn controls(&self) -> Result<Controls> {
        let (tx, rx) = mpsc::channel();
        self.sender
            .send(StorageCommand::GetControls(tx))
            .map_err(|e| IoError::worker_gone(e.to_string()))?;
        rx.recv_timeout(REPLY_TIMEOUT)
            .map_err(|e| IoError::worker_gone(e.to_string()))
    }

    /// Deletes ledger rows older than `keep_days`.
    pub fn purge_ledger(&self, keep_days: i64) {
        let _ = self.sender.send(StorageCommand::LedgerPurge { keep_days });
    }

    /// An [`EventSink`] that forwards committed events to this store.
    #[must_use]
    pub fn sink(&self) -> StorageEventSink {
        StorageEventSink {
            sender: self.sender.clone(),
        }
    }

    /// A [`BudgetLedger`] backed by this store.
    #[must_use]
    pub fn ledger(&self) -> SqliteLedger {
        SqliteLedger {
            sender: self.sender.clone(),
        }
    }

    pub fn stop(&self) {
        let _ = self.sender.send(StorageCommand::Stop);
    }
}

/// Forwards committed events to the storage worker.
pub struct StorageEventSink {
    sender: Sender<StorageCommand>,
}

impl EventSink for StorageEventSink {
    fn record(&self, event: &WorldEvent) {
        let _ = self
            .sender
            .send(StorageCommand::RecordEvent(Box::new(event.clone())));
    }
}

/// Daily-spend ledger persisted in SQLite.
///
/// Reads block briefly on the worker; if the worker is gone the read
/// fails closed, reporting the budget as exhausted so no further
/// metered calls go out.
pub struct SqliteLedger {
    sender: Sender<StorageCommand>,
}

impl BudgetLedger for SqliteLedger {
    fn spent(&self, day: NaiveDate, tier: Tier) -> i64 {
        let (tx, rx) = mpsc::channel();
        if self
            .sender
            .send(StorageCommand::LedgerSpent(day, tier, tx))
            .is_err()
        {
            return i64::MAX;
        }
        rx.recv_timeout(REPLY_TIMEOUT).unwrap_or(i64::MAX)
    }

    fn record(&self, day: NaiveDate, tier: Tier, cents: i64) {
        let _ = self
            .sender
            .send(StorageCommand::LedgerRecord(day, tier, cents));
    }
}

fn init_db(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS world_events (
            id INTEGER PRIMARY KEY,
            tick INTEGER NOT NULL,
            actor_id TEXT,
            event_type TEXT NOT NULL,
            action TEXT,
            params TEXT NOT NULL,
            result TEXT NOT NULL,
            reason TEXT,
            x REAL, y REAL, z REAL,
            importance REAL NOT NULL,
            created_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_events_tick ON world_events(tick);
        CREATE INDEX IF NOT EXISTS idx_events_actor ON world_events(actor_id);
        CREATE INDEX IF NOT EXISTS idx_events_type ON world_events(event_type);
        CREATE TABLE IF NOT EXISTS control_keys (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS budget_ledger (
            day TEXT NOT NULL,
            tier TEXT NOT NULL,
            cents INTEGER NOT NULL,
            PRIMARY KEY (day, tier)
        );",
    )
}

fn run_worker(mut conn: Connection, rx: &Receiver<StorageCommand>) {
    while let Ok(cmd) = rx.recv() {
        match cmd {
            StorageCommand::RecordEvent(event) => insert_event(&mut conn, &event),
            StorageCommand::QueryEvents(query, reply_tx) => {
                let _ = reply_tx.send(select_events(&conn, &query));
            }
            StorageCommand::SetControl { key, value } => {
                let _ = conn.execute(
                    "INSERT INTO control_keys (key, value) VALUES (?1, ?2)
                     ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                    params![key, value],
                );
            }
            StorageCommand::GetControls(reply_tx) => {
                let _ = reply_tx.send(read_controls(&conn));
            }
            StorageCommand::LedgerSpent(day, tier, reply_tx) => {
                let spent: i64 = conn
                    .query_row(
                        "SELECT cents FROM budget_ledger WHERE day = ?1 AND tier = ?2",
                        params![day.to_string(), tier.as_str()],
                        |row| row.get(0),
                    )
                    .unwrap_or(0);
                let _ = reply_tx.send(spent);
            }
            StorageCommand::LedgerRecord(day, tier, cents) => {
                let _ = conn.execute(
                    "INSERT INTO budget_ledger (day, tier, cents) VALUES (?1, ?2, ?3)
                     ON CONFLICT(day, tier) DO UPDATE SET cents = cents + excluded.cents",
                    params![day.to_string(), tier.as_str(), cents],
                );
            }
            StorageCommand::LedgerPurge { keep_days } => {
                let cutoff = (Utc::now().date_naive()
                    - chrono::Duration::days(keep_days))
                .to_string();
                let _ = conn.execute(
                    "DELETE FROM budget_ledger WHERE day < ?1",
                    params![cutoff],
                );
            }
            StorageCommand::Stop => break,
        }
    }
}

fn insert_event(conn: &mut Connection, event: &WorldEvent) {
    let (x, y, z) = match event.position {
        Some(p) => (Some(p.x), Some(p.y), Some(p.z)),
        None => (None, None, None),
    };
    let result = conn.execute(
        "INSERT INTO world_events
            (id, tick, actor_id, event_type, action, params, result, reason,
             x, y, z, importance, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        params![
            event.id,
            event.tick,
            event.actor_id.map(|id| id.to_string()),
            event.event_type.as_str(),
            event.action,
            event.params.to_string(),
            outcome_str(event.result),
            event.reason,
            x,
            y,
            z,
            event.importance,
            event.created_at.to_rfc3339(),
        ],
    );
    if let Err(e) = result {
        error!("failed to persist event {}: {e}", event.id);
    }
}

fn select_events(conn: &Connection, query: &EventQuery) -> Vec<WorldEvent> {
    let mut sql = String::from(
        "SELECT id, tick, actor_id, event_type, action, params, result, reason,
                x, y, z, importance, created_at
         FROM world_events WHERE 1=1",
    );
    let mut args: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
    if let Some(since) = query.since_id {
        sql.push_str(" AND id > ?");
        args.push(Box::new(since));
    }
    if let Some(actor) = query.actor_id {
        sql.push_str(" AND actor_id = ?");
        args.push(Box::new(actor.to_string()));
    }
    if let Some(event_type) = query.event_type {
        sql.push_str(" AND event_type = ?");
        args.push(Box::new(event_type.as_str().to_string()));
    }
    if let Some(min) = query.tick_min {
        sql.push_str(" AND tick >= ?");
        args.push(Box::new(min as i64));
    }
    if let Some(max) = query.tick_max {
        sql.push_str(" AND tick <= ?");
        args.push(Box::new(max as i64));
    }
    if let Some((cx, cy, cz, r)) = query.near {
        sql.push_str(" AND x BETWEEN ? AND ? AND y BETWEEN ? AND ? AND z BETWEEN ? AND ?");
        args.push(Box::new(cx - r));
        args.push(Box::new(cx + r));
        args.push(Box::new(cy - r));
        args.push(Box::new(cy + r));
        args.push(Box::new(cz - r));
        args.push(Box::new(cz + r));
    }
    sql.push_str(" ORDER BY id ASC");
    if let Some(limit) = query.limit {
        sql.push_str(" LIMIT ?");
        args.push(Box::new(limit as i64));
    }

    let mut stmt = match conn.prepare(&sql) {
        Ok(s) => s,
        Err(e) => {
            error!("event query failed to prepare: {e}");
            return Vec::new();
        }
    };
    let params = rusqlite::params_from_iter(args.iter().map(|a| a.as_ref()));
    let rows = stmt.query_map(params, row_to_event);
    let mut events: Vec<WorldEvent> = match rows {
        Ok(iter) => iter.filter_map(std::result::Result::ok).collect(),
        Err(e) => {
            error!("event query failed: {e}");
            return Vec::new();
        }
    };

    // Exact Euclidean distance, applied after the box pre-filter.
    if let Some((cx, cy, cz, r)) = query.near {
        let center = Position::new(cx, cy, cz);
        events.retain(|e| {
            e.position
                .is_some_and(|p| p.distance(&center) <= r)
        });
    }
    events
}

fn row_to_event(row: &rusqlite::Row<'_>) -> rusqlite::Result<WorldEvent> {
    let actor_id: Option<String> = row.get(2)?;
    let event_type: String = row.get(3)?;
    let params: String = row.get(5)?;
    let result: String = row.get(6)?;
    let x: Option<f64> = row.get(8)?;
    let y: Option<f64> = row.get(9)?;
    let z: Option<f64> = row.get(10)?;
    let created_at: String = row.get(12)?;
    Ok(WorldEvent {
        id: row.get(0)?,
        tick: row.get::<_, i64>(1)? as u64,
        actor_id: actor_id.and_then(|s| Uuid::parse_str(&s).ok()),
        event_type: parse_event_type(&event_type),
        action: row.get(4)?,
        params: serde_json::from_str(&params).unwrap_or(serde_json::Value::Null),
        result: parse_outcome(&result),
        reason: row.get(7)?,
        position: match (x, y, z) {
            (Some(x), Some(y), Some(z)) => Some(Position::new(x, y, z)),
            _ => None,
        },
        importance: row.get(11)?,
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
    })
}

fn read_controls(conn: &Connection) -> Controls {
    let mut controls = Controls::default();
    let mut stmt = match conn.prepare("SELECT key, value FROM control_keys") {
        Ok(s) => s,
        Err(_) => return controls,
    };
    let rows = stmt.query_map([], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    });
    if let Ok(iter) = rows {
        for (key, value) in iter.filter_map(std::result::Result::ok) {
            match key.as_str() {
                "pause" => controls.pause = value == "true",
                "speed" => {
                    if let Ok(speed) = value.parse() {
                        controls.speed = speed;
                    }
                }
                _ => {}
            }
        }
    }
    controls
}

fn outcome_str(outcome: EventOutcome) -> &'static str {
    match outcome {
        EventOutcome::Accepted => "accepted",
        EventOutcome::Rejected => "rejected",
        EventOutcome::Info => "info",
    }
}

fn parse_outcome(s: &str) -> EventOutcome {
    match s {
        "accepted" => EventOutcome::Accepted,
        "rejected" => EventOutcome::Rejected,
        _ => EventOutcome::Info,
    }
}

fn parse_event_type(s: &str) -> EventType {
    match s {
        "action" => EventType::Action,
        "speech" => EventType::Speech,
        "death" => EventType::Death,
        "birth" => EventType::Birth,
        "intervention" => EventType::Intervention,
        "narration" => EventType::Narration,
        _ => EventType::System,
    }
}
