//! Preference file hot-reload
//!
//! Watches the preferences file for edits made outside the running engine
//! (another instance, a text editor) and reports them through a channel.

use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver};
use std::time::{Duration, Instant};

use crate::store::StoreError;

/// Default debounce window
const DEBOUNCE_MS: u64 = 100;

/// Events emitted by the preference watcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreferenceEvent {
    /// The preferences file was written or replaced
    Changed,
    /// The watcher reported an error
    WatchError(String),
}

/// Watches a single preferences file
pub struct PreferenceWatcher {
    _watcher: RecommendedWatcher,
    receiver: Receiver<PreferenceEvent>,
    debounce: Duration,
    last_change: Option<Instant>,
}

impl std::fmt::Debug for PreferenceWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreferenceWatcher")
            .field("debounce", &self.debounce)
            .finish_non_exhaustive()
    }
}

impl PreferenceWatcher {
    /// Watch `path`. The parent directory is watched so that editors which
    /// replace the file by rename are still noticed.
    pub fn new(path: &Path) -> Result<Self, StoreError> {
        PreferenceWatcherBuilder::new().build(path)
    }

    fn with_debounce(path: &Path, debounce: Duration) -> Result<Self, StoreError> {
        let (tx, rx) = mpsc::channel();
        let target: PathBuf = path.to_path_buf();
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
            match res {
                Ok(event) => {
                    if (event.kind.is_modify() || event.kind.is_create())
                        && event.paths.iter().any(|p| p == &target)
                    {
                        let _ = tx.send(PreferenceEvent::Changed);
                    }
                }
                Err(e) => {
                    log::error!("Preference watch error: {:?}", e);
                    let _ = tx.send(PreferenceEvent::WatchError(e.to_string()));
                }
            }
        })
        .map_err(|e| StoreError::Watch(e.to_string()))?;

        watcher
            .watch(&dir, RecursiveMode::NonRecursive)
            .map_err(|e| StoreError::Watch(e.to_string()))?;
        log::info!("Watching {:?} for preference changes", dir);

        Ok(Self {
            _watcher: watcher,
            receiver: rx,
            debounce,
            last_change: None,
        })
    }

    /// Poll for an event without blocking. Bursts of change notifications
    /// inside the debounce window collapse into one.
    pub fn poll(&mut self) -> Option<PreferenceEvent> {
        while let Ok(event) = self.receiver.try_recv() {
            match event {
                PreferenceEvent::Changed => {
                    let now = Instant::now();
                    if let Some(last) = self.last_change {
                        if now.duration_since(last) < self.debounce {
                            continue;
                        }
                    }
                    self.last_change = Some(now);
                    return Some(PreferenceEvent::Changed);
                }
                other => return Some(other),
            }
        }
        None
    }
}

/// Builder for a [`PreferenceWatcher`] with custom options
pub struct PreferenceWatcherBuilder {
    debounce_ms: u64,
}

impl Default for PreferenceWatcherBuilder {
    fn default() -> Self {
        Self {
            debounce_ms: DEBOUNCE_MS,
        }
    }
}

impl PreferenceWatcherBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set debounce duration in milliseconds
    pub fn debounce_ms(mut self, ms: u64) -> Self {
        self.debounce_ms = ms;
        self
    }

    pub fn build(self, path: &Path) -> Result<PreferenceWatcher, StoreError> {
        PreferenceWatcher::with_debounce(path, Duration::from_millis(self.debounce_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_watcher_builder_default() {
        let builder = PreferenceWatcherBuilder::new();
        assert_eq!(builder.debounce_ms, 100);
    }

    #[test]
    fn test_watcher_builder_fluent() {
        let builder = PreferenceWatcherBuilder::new().debounce_ms(250);
        assert_eq!(builder.debounce_ms, 250);
    }

    #[test]
    fn test_watch_error_event() {
        let event = PreferenceEvent::WatchError("gone".to_string());
        match event {
            PreferenceEvent::WatchError(msg) => assert_eq!(msg, "gone"),
            _ => panic!("Expected WatchError"),
        }
    }

    #[test]
    fn test_new_watcher_has_no_pending_events() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("preferences.toml");
        let mut watcher = PreferenceWatcher::new(&path).unwrap();
        assert_eq!(watcher.poll(), None);
    }
}
