// Fetch-retry coordinator.
// Refreshes the file listing across connectivity, the local cache, and bounded backoff retries,
// and owns the optimistic-upload / confirmed-removal mutations of that listing.

use std::collections::HashSet;
use std::future::Future;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tracing::{debug, error, info, warn};

use crate::cache::{CacheEntry, ListingCache};
use crate::config::Config;
use crate::connectivity::Connectivity;
use crate::error::{Result, StashError};
use crate::preview::mime_for_name;
use crate::storage::{FileRecord, RemoteStore};

use super::events::{Listing, Notice, SyncEvent};
use super::retry::{RetryPhase, RetryPolicy, RetryState};
use super::scheduler::{Scheduler, Task};

/// Per-user coordinator settings.
#[derive(Debug, Clone)]
pub struct CoordinatorSettings {
    pub user_id: String,
    pub retry: RetryPolicy,
    /// Bound on each remote call before it counts as a network failure.
    pub request_timeout: Duration,
}

impl CoordinatorSettings {
    pub fn from_config(config: &Config, user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            retry: RetryPolicy {
                base_delay: config.retry_delay,
                max_retries: config.max_retries,
            },
            request_timeout: config.request_timeout,
        }
    }
}

/// Mutable state, only ever locked between awaits.
#[derive(Debug, Default)]
struct SyncState {
    files: Vec<FileRecord>,
    retry: RetryState,
    offline_reported: bool,
}

struct Inner {
    remote: Arc<dyn RemoteStore>,
    connectivity: Arc<dyn Connectivity>,
    scheduler: Arc<dyn Scheduler>,
    cache: ListingCache,
    user_id: String,
    policy: RetryPolicy,
    request_timeout: Duration,
    events: mpsc::UnboundedSender<SyncEvent>,
    state: Mutex<SyncState>,
}

/// Keeps one user's file listing in sync with the remote store.
///
/// Consistency differs by operation: [`upload`](Self::upload) updates the local
/// listing optimistically from what the client already knows, while
/// [`remove`](Self::remove) only changes it after the remote store confirms the
/// deletion. Between a refresh and a concurrent upload or removal, the last
/// completed write wins.
///
/// Dropping the coordinator cancels any pending retry and the connectivity watcher.
pub struct Coordinator {
    inner: Arc<Inner>,
    watcher: Mutex<Option<AbortHandle>>,
}

impl Coordinator {
    /// Create a coordinator and the receiver for its events.
    ///
    /// The in-memory listing starts from whatever the cache last held, fresh or not.
    pub fn new(
        remote: Arc<dyn RemoteStore>,
        connectivity: Arc<dyn Connectivity>,
        scheduler: Arc<dyn Scheduler>,
        cache: ListingCache,
        settings: CoordinatorSettings,
    ) -> (Self, mpsc::UnboundedReceiver<SyncEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let files = cache.load().map(|entry| entry.files).unwrap_or_default();

        let inner = Inner {
            remote,
            connectivity,
            scheduler,
            cache,
            user_id: settings.user_id,
            policy: settings.retry,
            request_timeout: settings.request_timeout,
            events,
            state: Mutex::new(SyncState {
                files,
                ..SyncState::default()
            }),
        };

        let coordinator = Self {
            inner: Arc::new(inner),
            watcher: Mutex::new(None),
        };
        (coordinator, rx)
    }

    pub fn user_id(&self) -> &str {
        &self.inner.user_id
    }

    /// Current in-memory listing.
    pub fn files(&self) -> Vec<FileRecord> {
        self.inner.state().files.clone()
    }

    pub fn find(&self, file_id: &str) -> Option<FileRecord> {
        self.inner
            .state()
            .files
            .iter()
            .find(|file| file.id == file_id)
            .cloned()
    }

    pub fn phase(&self) -> RetryPhase {
        self.inner.state().retry.phase()
    }

    pub fn attempt_count(&self) -> u32 {
        self.inner.state().retry.attempt_count()
    }

    /// Object key for one of the user's files.
    pub fn object_path(&self, name: &str) -> String {
        self.inner.object_path(name)
    }

    /// Refresh the listing.
    ///
    /// Any pending retry is cancelled first. Offline, only cached data (fresh or
    /// stale) is returned. Online, a fresh cache is returned as-is unless
    /// `force_remote` is set; otherwise the remote listing is fetched. A network
    /// failure schedules a background retry and returns the best interim listing.
    /// A forced refresh also leaves the terminal state reached after exhausting retries.
    pub async fn refresh(&self, force_remote: bool) -> Result<Listing> {
        self.inner.refresh(force_remote).await
    }

    /// Upload `content` to `target_path` and add it to the listing without re-fetching.
    ///
    /// Optimistic: the new record's id (when the remote omits one), timestamps,
    /// and etag are local values until the next refresh.
    pub async fn upload(
        &self,
        content: Vec<u8>,
        target_path: &str,
        content_type: &str,
    ) -> Result<FileRecord> {
        let inner = &self.inner;
        if inner.connectivity.is_connected() == Some(false) {
            return Err(StashError::Offline);
        }

        let size_bytes = content.len() as u64;
        let descriptor = inner
            .with_timeout(inner.remote.upload(target_path, content, content_type))
            .await?;
        let record = FileRecord::uploaded(
            descriptor.id,
            target_path,
            size_bytes,
            content_type,
            Utc::now(),
        );

        let files = {
            let mut state = inner.state();
            match state.files.iter_mut().find(|file| file.id == record.id) {
                Some(existing) => *existing = record.clone(),
                None => state.files.push(record.clone()),
            }
            state.files.clone()
        };
        inner.persist_local(&files);

        info!(name = %record.name, size = size_bytes, "Uploaded file");
        inner.emit(SyncEvent::Updated(Listing::local(files)));
        Ok(record)
    }

    /// Upload a local file under `<user_id>/<epoch millis>_<file name>`.
    pub async fn upload_path(&self, local: &Path) -> Result<FileRecord> {
        let name = local
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| StashError::Other(format!("Not a file: {}", local.display())))?;
        let content = tokio::fs::read(local).await?;
        let target_path = self.object_path(&format!("{}_{}", Utc::now().timestamp_millis(), name));
        self.upload(content, &target_path, mime_for_name(&name)).await
    }

    /// Delete a file remotely, then drop it from the listing.
    ///
    /// Pessimistic: the local listing and cache are untouched unless the remote
    /// store confirms the deletion.
    pub async fn remove(&self, file_id: &str) -> Result<()> {
        let inner = &self.inner;
        let record = self
            .find(file_id)
            .ok_or_else(|| StashError::UnknownFile(file_id.to_string()))?;
        if inner.connectivity.is_connected() == Some(false) {
            return Err(StashError::Offline);
        }

        let path = inner.object_path(&record.name);
        inner.with_timeout(inner.remote.remove(&path)).await?;

        let files = {
            let mut state = inner.state();
            state.files.retain(|file| file.id != file_id);
            state.files.clone()
        };
        inner.persist_local(&files);

        info!(name = %record.name, "Removed file");
        inner.emit(SyncEvent::Updated(Listing::local(files)));
        Ok(())
    }

    /// Cancel the pending retry timer, if any.
    pub fn cancel_pending(&self) -> bool {
        self.inner.state().retry.cancel_pending()
    }

    /// Refresh whenever connectivity changes, publishing each outcome as an event.
    ///
    /// Replaces any watcher started earlier. Must be called within a tokio runtime.
    pub fn watch_connectivity(&self) {
        let inner = Arc::clone(&self.inner);
        let mut rx = inner.connectivity.subscribe();

        let task = tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let connected = *rx.borrow_and_update();
                inner.emit(SyncEvent::Connectivity(connected));
                match inner.refresh(false).await {
                    Ok(listing) => inner.emit(SyncEvent::Updated(listing)),
                    Err(e) => debug!(error = %e, "Refresh after connectivity change failed"),
                }
            }
        });

        let mut watcher = self.watcher.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = watcher.replace(task.abort_handle()) {
            previous.abort();
        }
    }
}

impl Drop for Coordinator {
    fn drop(&mut self) {
        let watcher = self
            .watcher
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(watcher) = watcher {
            watcher.abort();
        }
        if self.inner.state().retry.cancel_pending() {
            debug!("Cancelled pending retry on teardown");
        }
    }
}

impl Inner {
    fn state(&self) -> MutexGuard<'_, SyncState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: SyncEvent) {
        // A closed channel means the view is gone; nothing left to tell.
        let _ = self.events.send(event);
    }

    fn object_path(&self, name: &str) -> String {
        format!("{}/{}", self.user_id, name)
    }

    async fn with_timeout<T, F>(&self, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match tokio::time::timeout(self.request_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(StashError::NetworkFailure(format!(
                "request timed out after {}s",
                self.request_timeout.as_secs_f32()
            ))),
        }
    }

    fn persist_local(&self, files: &[FileRecord]) {
        if let Err(e) = self.cache.write(files) {
            warn!(error = %e, "Failed to persist file listing");
        }
    }

    async fn refresh(self: &Arc<Self>, force_remote: bool) -> Result<Listing> {
        let terminal = {
            let mut state = self.state();
            state.retry.cancel_pending();
            if force_remote && state.retry.is_terminal() {
                info!("Forced refresh, resetting retries");
                state.retry.reset();
            }
            state.retry.is_terminal()
        };

        let connected = self.connectivity.is_connected();
        let cached = self.cache.load();

        if connected == Some(false) {
            return match cached {
                Some(entry) => {
                    debug!(fresh = entry.fresh, "Offline, serving cached listing");
                    Ok(self.serve_cached(entry))
                }
                None => {
                    self.report_offline();
                    Err(StashError::Offline)
                }
            };
        }
        self.state().offline_reported = false;

        if !force_remote {
            if let Some(entry) = cached.as_ref().filter(|entry| entry.fresh) {
                debug!(count = entry.files.len(), "Serving fresh cached listing");
                return Ok(self.serve_cached(entry.clone()));
            }
        }

        if terminal {
            return match cached {
                Some(entry) => Ok(self.serve_cached(entry)),
                None => Err(StashError::RetriesExhausted {
                    attempts: self.policy.max_retries + 1,
                }),
            };
        }

        self.state().retry.begin_fetch();
        self.fetch(None, cached).await
    }

    fn serve_cached(&self, entry: CacheEntry) -> Listing {
        self.state().files = entry.files.clone();
        Listing::cached(entry)
    }

    fn report_offline(&self) {
        let first = {
            let mut state = self.state();
            !std::mem::replace(&mut state.offline_reported, true)
        };
        if first {
            info!("Offline with no cached listing");
            self.emit(SyncEvent::Notice(Notice::Offline));
        }
    }

    /// One remote listing attempt. `timer_id` is set when running as a scheduled retry.
    async fn fetch(
        self: &Arc<Self>,
        timer_id: Option<u64>,
        cached: Option<CacheEntry>,
    ) -> Result<Listing> {
        let outcome = self.with_timeout(self.remote.list(&self.user_id)).await;

        match outcome {
            Ok(files) => Ok(self.apply_remote(files, timer_id)),
            Err(err) if err.is_retryable() => self.schedule_retry(err, timer_id, cached),
            Err(err) => {
                {
                    let mut state = self.state();
                    if let Some(id) = timer_id {
                        state.retry.release(id);
                    }
                    state.retry.record_rejection();
                }
                warn!(error = %err, "Listing request rejected");
                let message = match &err {
                    StashError::RemoteRejected { message, .. } => message.clone(),
                    other => other.to_string(),
                };
                self.emit(SyncEvent::Notice(Notice::RemoteRejected(message)));
                Err(err)
            }
        }
    }

    fn apply_remote(&self, files: Vec<FileRecord>, timer_id: Option<u64>) -> Listing {
        let files = dedupe_by_id(files);
        if let Err(e) = self.cache.write(&files) {
            warn!(error = %e, "Failed to cache file listing");
        }

        {
            let mut state = self.state();
            if let Some(id) = timer_id {
                state.retry.release(id);
            }
            state.retry.record_success();
            state.files = files.clone();
        }

        info!(count = files.len(), "Refreshed file listing");
        let listing = Listing::network(files);
        if timer_id.is_some() {
            self.emit(SyncEvent::Updated(listing.clone()));
        }
        listing
    }

    fn schedule_retry(
        self: &Arc<Self>,
        err: StashError,
        timer_id: Option<u64>,
        cached: Option<CacheEntry>,
    ) -> Result<Listing> {
        let mut state = self.state();
        if let Some(id) = timer_id {
            state.retry.release(id);
        }

        match state.retry.record_failure(&self.policy) {
            Some(retry) => {
                let id = state.retry.next_timer_id();
                let handle = self.scheduler.schedule(retry.delay, self.retry_task(id));
                state.retry.arm(id, handle);
                drop(state);

                warn!(
                    attempt = retry.attempt,
                    max = retry.max_retries,
                    delay_ms = retry.delay.as_millis() as u64,
                    error = %err,
                    "Listing fetch failed, retry scheduled"
                );
                self.emit(SyncEvent::RetryScheduled(retry));
                Ok(Listing::interim(cached, retry))
            }
            None => {
                let attempts = state.retry.attempt_count() + 1;
                drop(state);

                error!(attempts, error = %err, "Giving up on listing fetch");
                self.emit(SyncEvent::Notice(Notice::RetriesExhausted { attempts }));
                Err(StashError::RetriesExhausted { attempts })
            }
        }
    }

    fn retry_task(self: &Arc<Self>, timer_id: u64) -> Task {
        let inner = Arc::clone(self);
        Box::pin(async move {
            inner.run_retry(timer_id).await;
        })
    }

    async fn run_retry(self: Arc<Self>, timer_id: u64) {
        {
            let mut state = self.state();
            if !state.retry.is_current(timer_id) {
                debug!(timer_id, "Skipping superseded retry");
                return;
            }
            if self.connectivity.is_connected() == Some(false) {
                // The connectivity watcher refreshes once the network is back
                state.retry.release(timer_id);
                state.retry.record_rejection();
                debug!(timer_id, "Offline, dropping scheduled retry");
                return;
            }
            state.retry.begin_fetch();
        }

        debug!(timer_id, "Running scheduled retry");
        // Outcomes are published as events from inside fetch
        let _ = self.fetch(Some(timer_id), None).await;
    }
}

/// Keep the first record for each id so ids stay unique within a listing.
fn dedupe_by_id(files: Vec<FileRecord>) -> Vec<FileRecord> {
    let mut seen = HashSet::new();
    files
        .into_iter()
        .filter(|file| seen.insert(file.id.clone()))
        .collect()
}
