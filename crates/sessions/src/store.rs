use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::Context;
use models::{DocumentSession, Error, ErrorCode};

const ALIAS_FILE: &str = "aliases.json";

/// SessionStore persists one JSON file per session, named by session id,
/// plus a per-directory alias index (`aliases.json`, group -> alias ->
/// session id). Writes are whole-file replacements performed on the blocking
/// worker pool so the request scheduler stays responsive.
pub struct SessionStore {
    dir: PathBuf,
    // group -> alias -> session_id
    aliases: Mutex<BTreeMap<String, BTreeMap<String, String>>>,
}

impl SessionStore {
    pub fn open(dir: &Path) -> anyhow::Result<Arc<SessionStore>> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating sessions directory {}", dir.display()))?;

        let alias_path = dir.join(ALIAS_FILE);
        let aliases = if alias_path.exists() {
            let raw = std::fs::read_to_string(&alias_path)
                .with_context(|| format!("reading {}", alias_path.display()))?;
            match serde_json::from_str(&raw) {
                Ok(map) => map,
                Err(error) => {
                    tracing::warn!(?error, "session alias index is malformed; resetting");
                    BTreeMap::new()
                }
            }
        } else {
            BTreeMap::new()
        };

        tracing::info!(dir = %dir.display(), "session store opened");
        Ok(Arc::new(SessionStore {
            dir: dir.to_path_buf(),
            aliases: Mutex::new(aliases),
        }))
    }

    /// Persist a session, replacing any previous file.
    pub async fn save(self: &Arc<Self>, session: DocumentSession) -> Result<(), Error> {
        let this = self.clone();
        run_blocking(move || {
            let path = this.session_path(&session.session_id);
            let body = serde_json::to_vec_pretty(&session)
                .map_err(|err| store_error(format!("failed to encode session: {err}")))?;
            std::fs::write(&path, body)
                .map_err(|err| store_error(format!("failed to write session: {err}")))?;
            tracing::debug!(session_id = %session.session_id, "session persisted");
            Ok(())
        })
        .await
    }

    /// Load a session. A missing file is absence, not an error; malformed
    /// JSON surfaces as an error.
    pub async fn load(
        self: &Arc<Self>,
        session_id: &str,
    ) -> Result<Option<DocumentSession>, Error> {
        let this = self.clone();
        let session_id = session_id.to_string();
        run_blocking(move || {
            let path = this.session_path(&session_id);
            let raw = match std::fs::read_to_string(&path) {
                Ok(raw) => raw,
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
                Err(err) => {
                    return Err(store_error(format!("failed to read session: {err}")));
                }
            };
            let session = serde_json::from_str(&raw).map_err(|err| {
                store_error(format!("session file {session_id} is malformed: {err}"))
            })?;
            Ok(Some(session))
        })
        .await
    }

    /// Remove a session file if it exists.
    pub async fn delete(self: &Arc<Self>, session_id: &str) -> Result<(), Error> {
        let this = self.clone();
        let session_id = session_id.to_string();
        run_blocking(move || {
            let path = this.session_path(&session_id);
            match std::fs::remove_file(&path) {
                Ok(()) => {
                    tracing::info!(%session_id, "session deleted");
                    Ok(())
                }
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(err) => Err(store_error(format!("failed to delete session: {err}"))),
            }
        })
        .await
    }

    /// Stems of every session file in the directory.
    pub async fn list(self: &Arc<Self>) -> Result<Vec<String>, Error> {
        let this = self.clone();
        run_blocking(move || {
            let entries = std::fs::read_dir(&this.dir)
                .map_err(|err| store_error(format!("failed to list sessions: {err}")))?;
            let mut stems = Vec::new();
            for entry in entries.flatten() {
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) != Some("json") {
                    continue;
                }
                let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                    continue;
                };
                if stem == "aliases" {
                    continue;
                }
                stems.push(stem.to_string());
            }
            stems.sort();
            Ok(stems)
        })
        .await
    }

    /// Reserve `alias` for `session_id` within `group`. Fails with
    /// `INVALID_OPERATION` when the alias is malformed or taken.
    pub fn register_alias(&self, alias: &str, session_id: &str, group: &str) -> Result<(), Error> {
        let alias = models::Alias::parse(alias)?;
        let mut aliases = self.lock_aliases();
        let group_map = aliases.entry(group.to_string()).or_default();
        if group_map.contains_key(alias.as_str()) {
            return Err(Error::new(
                ErrorCode::InvalidOperation,
                format!("alias '{alias}' is already in use within group '{group}'"),
            ));
        }
        group_map.insert(alias.as_str().to_string(), session_id.to_string());
        self.persist_aliases(&aliases)
    }

    /// Drop every alias pointing at `session_id` within `group`. Idempotent.
    pub fn unregister_session(&self, session_id: &str, group: &str) -> Result<(), Error> {
        let mut aliases = self.lock_aliases();
        if let Some(group_map) = aliases.get_mut(group) {
            group_map.retain(|_, sid| sid != session_id);
        }
        self.persist_aliases(&aliases)
    }

    /// Look up an alias within `group`.
    pub fn resolve_alias(&self, alias: &str, group: &str) -> Option<String> {
        self.lock_aliases().get(group)?.get(alias).cloned()
    }

    fn session_path(&self, session_id: &str) -> PathBuf {
        self.dir.join(format!("{session_id}.json"))
    }

    fn lock_aliases(
        &self,
    ) -> std::sync::MutexGuard<'_, BTreeMap<String, BTreeMap<String, String>>> {
        self.aliases.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn persist_aliases(
        &self,
        aliases: &BTreeMap<String, BTreeMap<String, String>>,
    ) -> Result<(), Error> {
        let body = serde_json::to_vec_pretty(aliases)
            .map_err(|err| store_error(format!("failed to encode alias index: {err}")))?;
        std::fs::write(self.dir.join(ALIAS_FILE), body)
            .map_err(|err| store_error(format!("failed to write alias index: {err}")))
    }
}

fn store_error(message: String) -> Error {
    Error::new(ErrorCode::UnexpectedError, message)
}

async fn run_blocking<T, F>(f: F) -> Result<T, Error>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, Error> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|err| store_error(format!("session task failed: {err}")))?
}
