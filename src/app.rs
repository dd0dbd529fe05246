// App state and main event loop.
// Manages tabs, modals, keyboard input, and results from background sync work.

use std::collections::VecDeque;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use ratatui::prelude::*;
use tokio::sync::mpsc;

use filestash::error::StashError;
use filestash::storage::FileRecord;
use filestash::sync::{Coordinator, Listing, Notice, SyncEvent};
use filestash::transfer::{Preview, Transfers};

use crate::state::{ConsoleLog, ConsoleMessage, FilesTabState, LoadingState};
use crate::ui;

/// Active tab in the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tab {
    #[default]
    Files,
    Console,
}

impl Tab {
    pub fn title(&self) -> &'static str {
        match self {
            Tab::Files => "Files",
            Tab::Console => "Console",
        }
    }

    pub fn next(&self) -> Self {
        match self {
            Tab::Files => Tab::Console,
            Tab::Console => Tab::Files,
        }
    }
}

/// Overlay dialog, at most one at a time.
#[derive(Debug, Clone, Default)]
pub enum Modal {
    #[default]
    None,
    /// Local path of a file to upload.
    Upload { input: String },
    ConfirmDelete { file: FileRecord },
    Preview {
        name: String,
        preview: LoadingState<Preview>,
    },
    Notice(Notice),
}

/// Result of a background operation.
#[derive(Debug)]
enum AppMessage {
    Refreshed(Result<Listing, StashError>),
    Uploaded(Result<FileRecord, StashError>),
    Removed {
        name: String,
        result: Result<(), StashError>,
    },
    PreviewReady {
        name: String,
        result: Result<Preview, StashError>,
    },
    Downloaded {
        name: String,
        result: Result<PathBuf, StashError>,
    },
}

/// Main application state.
pub struct App {
    pub active_tab: Tab,
    pub files: FilesTabState,
    pub console: ConsoleLog,
    pub modal: Modal,
    pub show_help: bool,
    pub should_quit: bool,
    pub user_label: String,
    notices: VecDeque<Notice>,
    coordinator: Arc<Coordinator>,
    transfers: Arc<Transfers>,
    download_dir: PathBuf,
    sync_events: mpsc::UnboundedReceiver<SyncEvent>,
    tx: mpsc::UnboundedSender<AppMessage>,
    rx: mpsc::UnboundedReceiver<AppMessage>,
}

impl App {
    pub fn new(
        coordinator: Arc<Coordinator>,
        transfers: Arc<Transfers>,
        sync_events: mpsc::UnboundedReceiver<SyncEvent>,
        download_dir: PathBuf,
        user_label: String,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            active_tab: Tab::default(),
            files: FilesTabState::default(),
            console: ConsoleLog::default(),
            modal: Modal::None,
            show_help: false,
            should_quit: false,
            user_label,
            notices: VecDeque::new(),
            coordinator,
            transfers,
            download_dir,
            sync_events,
            tx,
            rx,
        }
    }

    /// Main event loop. Must run inside a tokio runtime.
    pub fn run(&mut self, terminal: &mut Terminal<impl Backend>) -> io::Result<()> {
        self.spawn_refresh(false);

        while !self.should_quit {
            self.drain_background();
            terminal.draw(|frame| ui::draw(frame, self))?;
            self.handle_events()?;
        }
        Ok(())
    }

    fn drain_background(&mut self) {
        while let Ok(event) = self.sync_events.try_recv() {
            self.handle_sync_event(event);
        }
        while let Ok(message) = self.rx.try_recv() {
            self.handle_message(message);
        }
    }

    fn handle_sync_event(&mut self, event: SyncEvent) {
        match event {
            SyncEvent::Updated(listing) => {
                self.console.push(ConsoleMessage::info(format!(
                    "Listing updated ({} files, {})",
                    listing.files.len(),
                    listing.source.label()
                )));
                self.files.apply_listing(listing);
            }
            SyncEvent::RetryScheduled(retry) => {
                self.console.push(ConsoleMessage::warn(format!(
                    "Fetch failed, retry {}/{} in {}s",
                    retry.attempt,
                    retry.max_retries,
                    retry.delay.as_secs_f32()
                )));
                self.files.retry = Some(retry);
            }
            SyncEvent::Connectivity(connected) => {
                let text = match connected {
                    Some(false) => "Connection lost",
                    _ => "Connection restored",
                };
                self.console.push(ConsoleMessage::info(text));
                self.files.connected = connected;
            }
            SyncEvent::Notice(notice) => {
                self.console.push(ConsoleMessage::from_notice(&notice));
                if let Notice::RetriesExhausted { .. } = notice {
                    self.files.set_error(notice.message());
                }
                self.show_notice(notice);
            }
        }
    }

    fn handle_message(&mut self, message: AppMessage) {
        match message {
            AppMessage::Refreshed(Ok(listing)) => self.files.apply_listing(listing),
            AppMessage::Refreshed(Err(e)) => {
                // Offline, exhausted and rejected refreshes already raised a notice
                self.console.push(ConsoleMessage::warn(format!("Refresh: {}", e)));
                self.files.set_error(e.to_string());
            }
            AppMessage::Uploaded(result) => {
                self.files.activity = None;
                match result {
                    Ok(file) => {
                        self.console
                            .push(ConsoleMessage::info(format!("Uploaded {}", file.name)));
                    }
                    Err(e) => self.report_failure("Upload failed", &e),
                }
            }
            AppMessage::Removed { name, result } => {
                self.files.activity = None;
                match result {
                    Ok(()) => self
                        .console
                        .push(ConsoleMessage::info(format!("Deleted {}", name))),
                    Err(e) => self.report_failure(&format!("Delete of {} failed", name), &e),
                }
            }
            AppMessage::PreviewReady { name, result } => {
                if let Err(e) = &result {
                    self.console.push(ConsoleMessage::error(format!(
                        "Preview of {} failed: {}",
                        name, e
                    )));
                }
                // The user may have closed the dialog while the URL was being signed
                if let Modal::Preview {
                    name: open,
                    preview,
                } = &mut self.modal
                {
                    if *open == name {
                        *preview = match result {
                            Ok(p) => LoadingState::Loaded(p),
                            Err(e) => LoadingState::Error(e.to_string()),
                        };
                    }
                }
            }
            AppMessage::Downloaded { name, result } => {
                self.files.activity = None;
                match result {
                    Ok(path) => self.console.push(ConsoleMessage::info(format!(
                        "Saved {} to {}",
                        name,
                        path.display()
                    ))),
                    Err(e) => self.report_failure(&format!("Download of {} failed", name), &e),
                }
            }
        }
    }

    fn report_failure(&mut self, context: &str, error: &StashError) {
        self.console
            .push(ConsoleMessage::error(format!("{}: {}", context, error)));
        let notice = match error {
            StashError::Offline => Notice::Offline,
            StashError::RemoteRejected { message, .. } => Notice::RemoteRejected(message.clone()),
            other => Notice::RemoteRejected(format!("{}: {}", context, other)),
        };
        self.show_notice(notice);
    }

    fn show_notice(&mut self, notice: Notice) {
        if matches!(self.modal, Modal::None) {
            self.modal = Modal::Notice(notice);
        } else {
            self.notices.push_back(notice);
        }
    }

    fn close_modal(&mut self) {
        self.modal = match self.notices.pop_front() {
            Some(notice) => Modal::Notice(notice),
            None => Modal::None,
        };
    }

    fn spawn_refresh(&mut self, force_remote: bool) {
        self.files.set_loading();
        let coordinator = Arc::clone(&self.coordinator);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = coordinator.refresh(force_remote).await;
            let _ = tx.send(AppMessage::Refreshed(result));
        });
    }

    fn spawn_upload(&mut self, input: &str) {
        let path = expand_home(input.trim());
        self.files.activity = Some(format!("Uploading {}", path.display()));
        let coordinator = Arc::clone(&self.coordinator);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = coordinator.upload_path(&path).await;
            let _ = tx.send(AppMessage::Uploaded(result));
        });
    }

    fn spawn_remove(&mut self, file: FileRecord) {
        self.files.activity = Some(format!("Deleting {}", file.name));
        let coordinator = Arc::clone(&self.coordinator);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = coordinator.remove(&file.id).await;
            let _ = tx.send(AppMessage::Removed {
                name: file.name,
                result,
            });
        });
    }

    fn spawn_preview(&mut self, file: FileRecord) {
        self.modal = Modal::Preview {
            name: file.name.clone(),
            preview: LoadingState::Loading,
        };
        let transfers = Arc::clone(&self.transfers);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = transfers.preview(&file).await;
            let _ = tx.send(AppMessage::PreviewReady {
                name: file.name,
                result,
            });
        });
    }

    fn spawn_download(&mut self, file: FileRecord) {
        self.files.activity = Some(format!("Downloading {}", file.name));
        let transfers = Arc::clone(&self.transfers);
        let dir = self.download_dir.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = transfers.download(&file, &dir).await;
            let _ = tx.send(AppMessage::Downloaded {
                name: file.name,
                result,
            });
        });
    }

    /// Handle keyboard and other events.
    #[allow(clippy::collapsible_if)]
    fn handle_events(&mut self) -> io::Result<()> {
        if event::poll(std::time::Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    self.handle_key(key);
                }
            }
        }
        Ok(())
    }

    fn handle_key(&mut self, key: KeyEvent) {
        if self.show_help {
            if matches!(key.code, KeyCode::Esc | KeyCode::Char('?')) {
                self.show_help = false;
            }
            return;
        }

        if !matches!(self.modal, Modal::None) {
            self.handle_modal_key(key);
            return;
        }

        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Char('?') => self.show_help = true,
            KeyCode::Tab | KeyCode::BackTab => {
                self.active_tab = self.active_tab.next();
                if self.active_tab == Tab::Console {
                    self.console.mark_read();
                }
            }
            _ => match self.active_tab {
                Tab::Files => self.handle_files_key(key),
                Tab::Console => match key.code {
                    KeyCode::Down | KeyCode::Char('j') => self.console.scroll_down(),
                    KeyCode::Up | KeyCode::Char('k') => self.console.scroll_up(),
                    _ => {}
                },
            },
        }
    }

    fn handle_files_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Down | KeyCode::Char('j') => self.files.select_next(),
            KeyCode::Up | KeyCode::Char('k') => self.files.select_prev(),
            KeyCode::Char('r') => self.spawn_refresh(true),
            KeyCode::Char('u') => {
                self.modal = Modal::Upload {
                    input: String::new(),
                }
            }
            KeyCode::Char('x') | KeyCode::Delete => {
                if let Some(file) = self.files.selected_item().cloned() {
                    self.modal = Modal::ConfirmDelete { file };
                }
            }
            KeyCode::Char('p') | KeyCode::Enter => {
                if let Some(file) = self.files.selected_item().cloned() {
                    self.spawn_preview(file);
                }
            }
            KeyCode::Char('s') => {
                if let Some(file) = self.files.selected_item().cloned() {
                    self.spawn_download(file);
                }
            }
            _ => {}
        }
    }

    fn handle_modal_key(&mut self, key: KeyEvent) {
        match std::mem::take(&mut self.modal) {
            Modal::Upload { mut input } => match key.code {
                KeyCode::Esc => self.close_modal(),
                KeyCode::Enter if !input.trim().is_empty() => {
                    self.close_modal();
                    self.spawn_upload(&input);
                }
                KeyCode::Backspace => {
                    input.pop();
                    self.modal = Modal::Upload { input };
                }
                KeyCode::Char(c) => {
                    input.push(c);
                    self.modal = Modal::Upload { input };
                }
                _ => self.modal = Modal::Upload { input },
            },
            Modal::ConfirmDelete { file } => match key.code {
                KeyCode::Char('y') | KeyCode::Enter => {
                    self.close_modal();
                    self.spawn_remove(file);
                }
                KeyCode::Char('n') | KeyCode::Esc => self.close_modal(),
                _ => self.modal = Modal::ConfirmDelete { file },
            },
            Modal::Preview { name, preview } => match key.code {
                KeyCode::Esc | KeyCode::Enter | KeyCode::Char('q') => self.close_modal(),
                KeyCode::Char('s') => {
                    let file = self
                        .files
                        .files()
                        .iter()
                        .find(|file| file.name == name)
                        .cloned();
                    self.close_modal();
                    if let Some(file) = file {
                        self.spawn_download(file);
                    }
                }
                _ => self.modal = Modal::Preview { name, preview },
            },
            Modal::Notice(notice) => match key.code {
                KeyCode::Esc | KeyCode::Enter | KeyCode::Char(' ') => self.close_modal(),
                _ => self.modal = Modal::Notice(notice),
            },
            Modal::None => {}
        }
    }
}

/// Expand a leading `~/` to the home directory.
fn expand_home(input: &str) -> PathBuf {
    if let Some(rest) = input.strip_prefix("~/") {
        if let Some(dirs) = directories::UserDirs::new() {
            return dirs.home_dir().join(rest);
        }
    }
    Path::new(input).to_path_buf()
}
