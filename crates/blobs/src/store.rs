use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Context;
use models::{BlobExtra, BlobMeta, Error, ErrorCode};

use crate::AliasIndex;

const CATALOG_FILE: &str = "metadata.json";
const LOCK_FILE: &str = ".lock";

/// BlobStore is content-addressed storage for rendered documents and plot
/// images: one `{guid}.{ext}` content file per blob plus a single JSON
/// metadata catalogue, which is the source of truth for group, format, age
/// and extra fields.
///
/// The mutex guards only the catalogue and alias maps; content-file writes
/// happen outside it. A crash between content write and catalogue update
/// leaves a stray file which the next purge reaps.
pub struct BlobStore {
    dir: PathBuf,
    lock_stale: Duration,
    state: Mutex<State>,
}

#[derive(Debug, Default)]
struct State {
    catalog: BTreeMap<String, BlobMeta>,
    aliases: AliasIndex,
}

impl State {
    fn rebuild_aliases(&mut self) {
        self.aliases.clear();
        for (guid, meta) in &self.catalog {
            for alias in &meta.extra.aliases {
                if let Err(error) = self.aliases.register(alias, guid, &meta.group) {
                    tracing::warn!(%guid, alias, ?error, "dropping unusable alias from index");
                }
            }
        }
    }
}

impl BlobStore {
    /// Open (creating if needed) a store rooted at `dir`. A malformed
    /// catalogue is reset to empty with a warning rather than failing open.
    pub fn open(dir: &Path, lock_stale: Duration) -> anyhow::Result<Arc<BlobStore>> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating storage directory {}", dir.display()))?;

        let catalog_path = dir.join(CATALOG_FILE);
        let catalog = if catalog_path.exists() {
            let raw = std::fs::read_to_string(&catalog_path)
                .with_context(|| format!("reading {}", catalog_path.display()))?;
            match serde_json::from_str::<BTreeMap<String, BlobMeta>>(&raw) {
                Ok(catalog) => catalog,
                Err(error) => {
                    tracing::warn!(?error, "metadata catalogue is malformed; resetting to empty");
                    BTreeMap::new()
                }
            }
        } else {
            BTreeMap::new()
        };

        let mut state = State {
            catalog,
            aliases: AliasIndex::default(),
        };
        state.rebuild_aliases();

        tracing::info!(dir = %dir.display(), blobs = state.catalog.len(), "blob store opened");
        Ok(Arc::new(BlobStore {
            dir: dir.to_path_buf(),
            lock_stale,
            state: Mutex::new(state),
        }))
    }

    /// Persist bytes under a fresh GUID. The content file is written first,
    /// then the catalogue is updated and fsynced.
    pub async fn save(
        self: &Arc<Self>,
        bytes: Vec<u8>,
        format: String,
        group: String,
        extra: BlobExtra,
    ) -> Result<String, Error> {
        let this = self.clone();
        run_blocking(move || this.save_sync(&bytes, &format, &group, extra)).await
    }

    /// Fetch a blob by GUID or alias. Returns `None` on a miss, and
    /// `ACCESS_DENIED` when a caller group is given and differs from the
    /// stored group.
    pub async fn get(
        self: &Arc<Self>,
        identifier: String,
        group: Option<String>,
    ) -> Result<Option<(Vec<u8>, String)>, Error> {
        let this = self.clone();
        run_blocking(move || this.get_sync(&identifier, group.as_deref())).await
    }

    /// Delete a blob by GUID or alias, with the same resolution and
    /// permission rules as `get`.
    pub async fn delete(
        self: &Arc<Self>,
        identifier: String,
        group: Option<String>,
    ) -> Result<bool, Error> {
        let this = self.clone();
        run_blocking(move || this.delete_sync(&identifier, group.as_deref())).await
    }

    /// Delete blobs older than `age_days` (0 deletes everything within the
    /// group filter), dropping orphaned metadata and stray files in the same
    /// pass. Returns the number of removals.
    pub async fn purge(
        self: &Arc<Self>,
        age_days: u32,
        group: Option<String>,
    ) -> Result<usize, Error> {
        let this = self.clone();
        run_blocking(move || this.purge_sync(age_days, group.as_deref())).await
    }

    /// Delete oldest-first until the group's (or global) total size is at
    /// most `max_mb`. Guarded by a stale-aware lock file so concurrent prune
    /// runs exclude each other.
    pub async fn prune_size(
        self: &Arc<Self>,
        max_mb: u64,
        group: Option<String>,
    ) -> Result<usize, Error> {
        let this = self.clone();
        run_blocking(move || this.prune_size_sync(max_mb, group.as_deref())).await
    }

    pub fn save_sync(
        &self,
        bytes: &[u8],
        format: &str,
        group: &str,
        extra: BlobExtra,
    ) -> Result<String, Error> {
        let guid = uuid::Uuid::new_v4().to_string();
        let format = format.to_lowercase();
        let path = self.content_path(&guid, &format);

        std::fs::write(&path, bytes).map_err(|err| {
            storage_error(format!("failed to write blob {}: {err}", path.display()))
        })?;

        let meta = BlobMeta {
            guid: guid.clone(),
            format: format.clone(),
            group: group.to_string(),
            size: bytes.len() as u64,
            created_at: models::timestamp_now(),
            extra,
        };

        let mut state = self.lock_state();
        for alias in meta.extra.aliases.clone() {
            state.aliases.register(&alias, &guid, group)?;
        }
        state.catalog.insert(guid.clone(), meta);
        self.persist_catalog(&state)?;
        drop(state);

        tracing::info!(%guid, format, group, size = bytes.len(), "blob saved");
        Ok(guid)
    }

    pub fn get_sync(
        &self,
        identifier: &str,
        group: Option<&str>,
    ) -> Result<Option<(Vec<u8>, String)>, Error> {
        let (guid, meta) = {
            let state = self.lock_state();
            let Some(guid) = resolve_in(&state, identifier, group) else {
                return Ok(None);
            };
            let Some(meta) = state.catalog.get(&guid).cloned() else {
                return Ok(None);
            };
            (guid, meta)
        };

        if let Some(group) = group {
            if meta.group != group {
                return Err(permission_denied(&guid, &meta.group, group));
            }
        }

        let path = self.content_path(&guid, &meta.format);
        match std::fs::read(&path) {
            Ok(bytes) => Ok(Some((bytes, meta.format))),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(%guid, path = %path.display(), "blob content missing (orphaned metadata)");
                Ok(None)
            }
            Err(err) => Err(storage_error(format!(
                "failed to read blob {}: {err}",
                path.display()
            ))),
        }
    }

    pub fn delete_sync(&self, identifier: &str, group: Option<&str>) -> Result<bool, Error> {
        let mut state = self.lock_state();
        let Some(guid) = resolve_in(&state, identifier, group) else {
            return Ok(false);
        };
        let Some(meta) = state.catalog.get(&guid).cloned() else {
            return Ok(false);
        };
        if let Some(group) = group {
            if meta.group != group {
                return Err(permission_denied(&guid, &meta.group, group));
            }
        }

        for alias in &meta.extra.aliases {
            state.aliases.unregister(alias, &meta.group);
        }
        state.catalog.remove(&guid);
        self.persist_catalog(&state)?;
        drop(state);

        let path = self.content_path(&guid, &meta.format);
        if let Err(err) = std::fs::remove_file(&path) {
            if err.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(%guid, ?err, "failed to remove blob content file");
            }
        }
        tracing::info!(%guid, group = meta.group, "blob deleted");
        Ok(true)
    }

    pub fn exists_sync(&self, identifier: &str, group: Option<&str>) -> bool {
        let state = self.lock_state();
        let Some(guid) = resolve_in(&state, identifier, group) else {
            return false;
        };
        let Some(meta) = state.catalog.get(&guid) else {
            return false;
        };
        if let Some(group) = group {
            if meta.group != group {
                return false;
            }
        }
        self.content_path(&guid, &meta.format).exists()
    }

    /// All GUIDs, optionally filtered by group, in sorted order.
    pub fn list(&self, group: Option<&str>) -> Vec<String> {
        let state = self.lock_state();
        state
            .catalog
            .values()
            .filter(|m| group.map_or(true, |g| m.group == g))
            .map(|m| m.guid.clone())
            .collect()
    }

    /// Catalogue records, optionally filtered by group.
    pub fn list_meta(&self, group: Option<&str>) -> Vec<BlobMeta> {
        let state = self.lock_state();
        state
            .catalog
            .values()
            .filter(|m| group.map_or(true, |g| m.group == g))
            .cloned()
            .collect()
    }

    pub fn metadata(&self, guid: &str) -> Option<BlobMeta> {
        self.lock_state().catalog.get(guid).cloned()
    }

    /// Resolve a GUID-or-alias to a GUID within `group`.
    pub fn resolve(&self, identifier: &str, group: &str) -> Option<String> {
        let state = self.lock_state();
        resolve_in(&state, identifier, Some(group))
    }

    /// The alias registered for `guid`, if any.
    pub fn alias_of(&self, guid: &str) -> Option<String> {
        self.lock_state().aliases.alias_of(guid).map(String::from)
    }

    /// Register an alias for an existing blob of the same group, persisting
    /// it into the blob's metadata.
    pub fn register_alias(&self, alias: &str, guid: &str, group: &str) -> Result<(), Error> {
        let mut state = self.lock_state();
        let Some(meta) = state.catalog.get(guid) else {
            return Err(Error::new(
                ErrorCode::InvalidOperation,
                format!("cannot alias unknown blob '{guid}'"),
            ));
        };
        if meta.group != group {
            return Err(Error::new(
                ErrorCode::InvalidOperation,
                format!("cannot alias blob '{guid}' outside its owning group"),
            ));
        }
        state.aliases.register(alias, guid, group)?;
        let meta = state.catalog.get_mut(guid).expect("checked above");
        meta.extra.aliases.push(alias.to_string());
        self.persist_catalog(&state)
    }

    /// Remove an alias registration. Idempotent.
    pub fn unregister_alias(&self, alias: &str, group: &str) -> Result<bool, Error> {
        let mut state = self.lock_state();
        let Some(guid) = state.aliases.list(group).get(alias).cloned() else {
            return Ok(false);
        };
        state.aliases.unregister(alias, group);
        if let Some(meta) = state.catalog.get_mut(&guid) {
            meta.extra.aliases.retain(|a| a != alias);
        }
        self.persist_catalog(&state)?;
        Ok(true)
    }

    pub fn purge_sync(&self, age_days: u32, group: Option<&str>) -> Result<usize, Error> {
        let cutoff = chrono::Utc::now() - chrono::Duration::days(i64::from(age_days));
        tracing::info!(age_days, ?group, "starting purge");

        let mut removed = 0usize;
        let mut doomed: Vec<(String, String)> = Vec::new();

        {
            let mut state = self.lock_state();
            let guids: Vec<String> = state
                .catalog
                .values()
                .filter(|m| group.map_or(true, |g| m.group == g))
                .filter(|m| age_days == 0 || m.created_before(cutoff))
                .map(|m| m.guid.clone())
                .collect();

            for guid in guids {
                let meta = state.catalog.remove(&guid).expect("listed above");
                for alias in &meta.extra.aliases {
                    state.aliases.unregister(alias, &meta.group);
                }
                doomed.push((guid, meta.format));
                removed += 1;
            }
            self.persist_catalog(&state)?;
        }

        for (guid, format) in &doomed {
            let path = self.content_path(guid, format);
            if let Err(err) = std::fs::remove_file(&path) {
                if err.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(%guid, ?err, "failed to remove purged blob file");
                }
            }
        }

        // Reap stray content files: GUID-named files with no catalogue entry.
        // Group filters leave strays alone, since a stray has no known group.
        if group.is_none() {
            removed += self.reap_strays(age_days, cutoff)?;
        }

        tracing::info!(removed, age_days, ?group, "purge completed");
        Ok(removed)
    }

    fn reap_strays(
        &self,
        age_days: u32,
        cutoff: chrono::DateTime<chrono::Utc>,
    ) -> Result<usize, Error> {
        let known: std::collections::BTreeSet<String> = {
            let state = self.lock_state();
            state.catalog.keys().cloned().collect()
        };

        let entries = std::fs::read_dir(&self.dir)
            .map_err(|err| storage_error(format!("failed to scan storage directory: {err}")))?;

        let mut removed = 0usize;
        for entry in entries.flatten() {
            let path = entry.path();
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if models::parse_guid(stem).is_none() || known.contains(stem) {
                continue;
            }
            let old_enough = age_days == 0
                || entry
                    .metadata()
                    .and_then(|m| m.modified())
                    .map(|mtime| chrono::DateTime::<chrono::Utc>::from(mtime) < cutoff)
                    .unwrap_or(true);
            if old_enough {
                if std::fs::remove_file(&path).is_ok() {
                    tracing::debug!(path = %path.display(), "reaped stray blob file");
                    removed += 1;
                }
            }
        }
        Ok(removed)
    }

    pub fn prune_size_sync(&self, max_mb: u64, group: Option<&str>) -> Result<usize, Error> {
        let _guard = PruneLock::acquire(&self.dir.join(LOCK_FILE), self.lock_stale)?;
        let max_bytes = max_mb * 1024 * 1024;

        let mut candidates: Vec<BlobMeta> = self.list_meta(group);
        candidates.sort_by(|a, b| a.created_at.cmp(&b.created_at));

        let mut total: u64 = candidates.iter().map(|m| m.size).sum();
        let mut removed = 0usize;

        for meta in candidates {
            if total <= max_bytes {
                break;
            }
            if self.delete_sync(&meta.guid, None)? {
                total = total.saturating_sub(meta.size);
                removed += 1;
            }
        }

        tracing::info!(removed, max_mb, ?group, "size prune completed");
        Ok(removed)
    }

    fn content_path(&self, guid: &str, format: &str) -> PathBuf {
        self.dir.join(format!("{guid}.{format}"))
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, State> {
        // A poisoned lock means a prior panic mid-update; the catalogue on
        // disk is still consistent, so continue with the in-memory view.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn persist_catalog(&self, state: &State) -> Result<(), Error> {
        let path = self.dir.join(CATALOG_FILE);
        let body = serde_json::to_vec_pretty(&state.catalog)
            .map_err(|err| storage_error(format!("failed to encode catalogue: {err}")))?;

        let mut file = std::fs::File::create(&path)
            .map_err(|err| storage_error(format!("failed to write catalogue: {err}")))?;
        file.write_all(&body)
            .and_then(|()| file.sync_all())
            .map_err(|err| storage_error(format!("failed to write catalogue: {err}")))?;
        Ok(())
    }
}

fn resolve_in(state: &State, identifier: &str, group: Option<&str>) -> Option<String> {
    if let Some(guid) = models::parse_guid(identifier) {
        return Some(guid);
    }
    state.aliases.resolve(identifier, group?)
}

fn permission_denied(guid: &str, stored: &str, caller: &str) -> Error {
    Error::new(
        ErrorCode::AccessDenied,
        format!("blob '{guid}' belongs to group '{stored}', caller group is '{caller}'"),
    )
}

fn storage_error(message: String) -> Error {
    Error::new(ErrorCode::UnexpectedError, message)
}

async fn run_blocking<T, F>(f: F) -> Result<T, Error>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, Error> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|err| storage_error(format!("storage task failed: {err}")))?
}

/// Holds the prune lock file for the duration of a prune run. A lock older
/// than the stale age is broken with a warning.
struct PruneLock {
    path: PathBuf,
}

impl PruneLock {
    fn acquire(path: &Path, stale: Duration) -> Result<PruneLock, Error> {
        for attempt in 0..2 {
            match std::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(path)
            {
                Ok(mut file) => {
                    let _ = write!(file, "{}", std::process::id());
                    return Ok(PruneLock {
                        path: path.to_path_buf(),
                    });
                }
                Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {
                    let age = std::fs::metadata(path)
                        .and_then(|m| m.modified())
                        .ok()
                        .and_then(|mtime| mtime.elapsed().ok());
                    match age {
                        Some(age) if age > stale && attempt == 0 => {
                            tracing::warn!(path = %path.display(), ?age, "breaking stale prune lock");
                            let _ = std::fs::remove_file(path);
                        }
                        _ => {
                            return Err(Error::new(
                                ErrorCode::InvalidOperation,
                                "another prune run holds the storage lock",
                            ))
                        }
                    }
                }
                Err(err) => {
                    return Err(storage_error(format!("failed to acquire prune lock: {err}")))
                }
            }
        }
        Err(Error::new(
            ErrorCode::InvalidOperation,
            "another prune run holds the storage lock",
        ))
    }
}

impl Drop for PruneLock {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}
