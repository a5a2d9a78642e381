use std::{
    path::{Path, PathBuf},
    sync::{mpsc, Arc, Mutex},
    thread::{self, JoinHandle},
};

use anyhow::{anyhow, Context, Result};
use log::{error, info};
use rusqlite::{params, Connection, OptionalExtension};
use tokio::sync::oneshot;

mod migrations;

use migrations::run_migrations;

type StoreTask = Box<dyn FnOnce(&mut Connection) + Send + 'static>;

enum StoreCommand {
    Execute(StoreTask),
    Shutdown,
}

struct KvStoreInner {
    sender: mpsc::Sender<StoreCommand>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for KvStoreInner {
    fn drop(&mut self) {
        let mut guard = match self.worker.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Some(handle) = guard.take() {
            if let Err(err) = self.sender.send(StoreCommand::Shutdown) {
                error!("Failed to send shutdown to store thread: {err}");
            }
            if let Err(join_err) = handle.join() {
                error!("Failed to join store thread: {join_err:?}");
            }
        }
    }
}

/// Key-value store backed by SQLite. A single worker thread owns the
/// connection and runs submitted closures in order, so every compound
/// read-modify-write submitted as one closure is atomic with respect to
/// every other caller.
#[derive(Clone)]
pub struct KvStore {
    inner: Arc<KvStoreInner>,
    db_path: Arc<Option<PathBuf>>,
}

impl KvStore {
    pub fn new(db_path: PathBuf) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create store directory {}", parent.display()))?;
        }

        Self::spawn(Some(db_path))
    }

    /// Volatile store for sessions where no durable storage is available.
    pub fn in_memory() -> Result<Self> {
        Self::spawn(None)
    }

    fn spawn(db_path: Option<PathBuf>) -> Result<Self> {
        let (command_tx, command_rx) = mpsc::channel::<StoreCommand>();
        let (ready_tx, ready_rx) = mpsc::channel();
        let path_for_thread = db_path.clone();

        let worker = thread::Builder::new()
            .name("gaveltime-store".into())
            .spawn(move || {
                let open_result = match &path_for_thread {
                    Some(path) => Connection::open(path),
                    None => Connection::open_in_memory(),
                };
                let mut conn = match open_result {
                    Ok(connection) => connection,
                    Err(err) => {
                        let _ = ready_tx
                            .send(Err(anyhow::Error::new(err).context("failed to open store")));
                        return;
                    }
                };

                if path_for_thread.is_some() {
                    if let Err(err) = conn.pragma_update(None, "journal_mode", "WAL") {
                        error!("Failed to enable WAL mode: {err}");
                    }
                }

                let init_result = run_migrations(&mut conn).context("failed to run store migrations");
                if ready_tx.send(init_result).is_err() {
                    error!("Store initialization receiver dropped before ready signal");
                    return;
                }

                while let Ok(command) = command_rx.recv() {
                    match command {
                        StoreCommand::Execute(task) => {
                            task(&mut conn);
                        }
                        StoreCommand::Shutdown => break,
                    }
                }

                info!("Store thread shutting down");
            })
            .with_context(|| "failed to spawn store worker thread")?;

        ready_rx
            .recv()
            .context("store worker exited before signaling readiness")??;

        match &db_path {
            Some(path) => info!("Store initialized at {}", path.display()),
            None => info!("Store initialized in memory"),
        }

        Ok(Self {
            inner: Arc::new(KvStoreInner {
                sender: command_tx,
                worker: Mutex::new(Some(worker)),
            }),
            db_path: Arc::new(db_path),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    pub async fn execute<F, T>(&self, task: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let sender = self.inner.sender.clone();
        let (reply_tx, reply_rx) = oneshot::channel();

        let command = StoreCommand::Execute(Box::new(move |conn| {
            let result = task(conn);
            if reply_tx.send(result).is_err() {
                error!("Store caller dropped before receiving result");
            }
        }));

        sender
            .send(command)
            .map_err(|err| anyhow!("failed to send command to store thread: {err}"))?;

        reply_rx
            .await
            .map_err(|_| anyhow!("store thread terminated unexpectedly"))?
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        let key = key.to_string();
        self.execute(move |conn| {
            let value = conn
                .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                    row.get::<_, String>(0)
                })
                .optional()
                .with_context(|| "failed to read key")?;
            Ok(value)
        })
        .await
    }

    pub async fn put(&self, key: &str, value: String) -> Result<()> {
        let key = key.to_string();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO kv (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![key, value],
            )
            .with_context(|| "failed to write key")?;
            Ok(())
        })
        .await
    }

    pub async fn delete(&self, key: &str) -> Result<()> {
        let key = key.to_string();
        self.execute(move |conn| {
            conn.execute("DELETE FROM kv WHERE key = ?1", params![key])
                .with_context(|| "failed to delete key")?;
            Ok(())
        })
        .await
    }

    pub async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        let pattern = format!("{}%", prefix.replace('%', "\\%").replace('_', "\\_"));
        self.execute(move |conn| {
            let mut stmt = conn
                .prepare("SELECT key FROM kv WHERE key LIKE ?1 ESCAPE '\\' ORDER BY key")?;
            let mut rows = stmt.query(params![pattern])?;
            let mut keys = Vec::new();
            while let Some(row) = rows.next()? {
                keys.push(row.get::<_, String>(0)?);
            }
            Ok(keys)
        })
        .await
    }

    /// Atomic read-modify-write for one key. The closure sees the current
    /// value (if any) and returns the replacement; `None` deletes the key.
    /// Runs entirely on the worker thread, so concurrent callers cannot
    /// interleave between the read and the write.
    pub async fn update<F>(&self, key: &str, f: F) -> Result<()>
    where
        F: FnOnce(Option<String>) -> Result<Option<String>> + Send + 'static,
    {
        let key = key.to_string();
        self.execute(move |conn| {
            let current = conn
                .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                    row.get::<_, String>(0)
                })
                .optional()?;

            match f(current)? {
                Some(next) => {
                    conn.execute(
                        "INSERT INTO kv (key, value) VALUES (?1, ?2)
                         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                        params![key, next],
                    )?;
                }
                None => {
                    conn.execute("DELETE FROM kv WHERE key = ?1", params![key])?;
                }
            }
            Ok(())
        })
        .await
    }
}
