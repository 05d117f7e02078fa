//! Library service consumed by the viewer

use crate::database::{GameRecord, GameStore};
use crate::locator::LibraryLocator;
use crate::scanner::{EnrichReport, ScanOrchestrator, ScanOutcome};
use crate::{AppId, LibraryError};
use echogl_catalog::CatalogClient;
use echogl_config::{Credentials, EchoConfig};
use echogl_covers::{CoverCache, CoverKind};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Notifications for the presentation layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LibraryEvent {
    ScanStarted,
    ScanFinished(Vec<GameRecord>),
    EnrichFinished(EnrichReport),
    CoverResolved {
        id: AppId,
        kind: CoverKind,
        path: Option<PathBuf>,
    },
    GameLaunched(AppId),
}

/// Hands a URL to whatever handles it on this system
pub trait UrlOpener: Send + Sync {
    fn open(&self, url: &str) -> Result<(), LibraryError>;
}

/// Opens URLs with the OS default handler
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemUrlOpener;

impl SystemUrlOpener {
    #[cfg(windows)]
    fn command(url: &str) -> Result<Command, LibraryError> {
        let mut cmd = Command::new("cmd");
        cmd.args(["/C", "start", "", url]);
        Ok(cmd)
    }

    #[cfg(target_os = "macos")]
    fn command(url: &str) -> Result<Command, LibraryError> {
        let mut cmd = Command::new("open");
        cmd.arg(url);
        Ok(cmd)
    }

    #[cfg(not(any(windows, target_os = "macos")))]
    fn command(url: &str) -> Result<Command, LibraryError> {
        if let Ok(path) = which::which("xdg-open") {
            let mut cmd = Command::new(path);
            cmd.arg(url);
            return Ok(cmd);
        }
        if let Ok(path) = which::which("gio") {
            let mut cmd = Command::new(path);
            cmd.args(["open", url]);
            return Ok(cmd);
        }
        Err(LibraryError::Launch("no URL opener found (xdg-open, gio)".to_string()))
    }
}

impl UrlOpener for SystemUrlOpener {
    fn open(&self, url: &str) -> Result<(), LibraryError> {
        let mut cmd = Self::command(url)?;
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::null());
        cmd.stderr(Stdio::null());

        let mut child = cmd
            .spawn()
            .map_err(|e| LibraryError::Launch(format!("cannot open {}: {}", url, e)))?;

        // Reap the opener without blocking the caller
        std::thread::spawn(move || child.wait());
        Ok(())
    }
}

/// URL that asks the Steam client to start a game
pub fn launch_url(id: AppId) -> String {
    format!("steam://rungameid/{}", id)
}

/// The game library: scanning, enrichment, covers and launching
pub struct GameLibrary {
    orchestrator: ScanOrchestrator,
    credentials: Option<Credentials>,
    enrich_after_scan: bool,
    events: mpsc::UnboundedSender<LibraryEvent>,
    opener: Box<dyn UrlOpener>,
}

impl GameLibrary {
    /// Build the library from configuration.
    ///
    /// A database that cannot be opened disables persistence rather than
    /// failing startup.
    pub fn open(config: &EchoConfig) -> Result<(Self, mpsc::UnboundedReceiver<LibraryEvent>), LibraryError> {
        let store = GameStore::open_or_disconnected(config.database_path());
        let covers = CoverCache::new(config.covers_dir(), &config.covers)?;
        let catalog = CatalogClient::new(&config.catalog)?;
        let locator = LibraryLocator::for_host(&config.scan.extra_library_dirs);

        let orchestrator = ScanOrchestrator::new(store, covers, catalog, locator);
        Ok(Self::new(
            orchestrator,
            config.credentials(),
            config.scan.enrich_after_scan,
        ))
    }

    pub fn new(
        orchestrator: ScanOrchestrator,
        credentials: Option<Credentials>,
        enrich_after_scan: bool,
    ) -> (Self, mpsc::UnboundedReceiver<LibraryEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let library = Self {
            orchestrator,
            credentials,
            enrich_after_scan,
            events,
            opener: Box::new(SystemUrlOpener),
        };
        (library, receiver)
    }

    /// Replace the URL opener used by [`GameLibrary::launch`]
    pub fn with_opener(mut self, opener: impl UrlOpener + 'static) -> Self {
        self.opener = Box::new(opener);
        self
    }

    pub fn set_enrich_after_scan(&mut self, enabled: bool) {
        self.enrich_after_scan = enabled;
    }

    pub fn orchestrator(&self) -> &ScanOrchestrator {
        &self.orchestrator
    }

    fn emit(&self, event: LibraryEvent) {
        if self.events.send(event).is_err() {
            tracing::debug!("No listener for library events");
        }
    }

    /// Scan the libraries, then enrich when credentials are configured
    pub async fn start_scan(&mut self) -> Result<ScanOutcome, LibraryError> {
        self.emit(LibraryEvent::ScanStarted);

        let outcome = self.orchestrator.scan().await?;
        self.emit(LibraryEvent::ScanFinished(outcome.games.clone()));

        if !self.enrich_after_scan {
            return Ok(outcome);
        }

        match self.credentials.clone() {
            Some(credentials) => match self.orchestrator.enrich(&credentials).await {
                Ok(report) => self.emit(LibraryEvent::EnrichFinished(report)),
                Err(e) => tracing::warn!("Enrichment skipped: {}", e),
            },
            None => tracing::info!("No catalog credentials configured, skipping enrichment"),
        }

        Ok(outcome)
    }

    /// Enrich the records of the last scan
    pub async fn enrich(&mut self) -> Result<EnrichReport, LibraryError> {
        let credentials = self.credentials.clone().ok_or(LibraryError::NoCredentials)?;
        let report = self.orchestrator.enrich(&credentials).await?;
        self.emit(LibraryEvent::EnrichFinished(report.clone()));
        Ok(report)
    }

    pub fn get_all_games(&self) -> Vec<GameRecord> {
        self.orchestrator.store().get_all().unwrap_or_else(|e| {
            tracing::error!("Failed to load games: {}", e);
            Vec::new()
        })
    }

    pub fn get_game(&self, id: AppId) -> Option<GameRecord> {
        self.orchestrator.store().get_by_id(id).unwrap_or_else(|e| {
            tracing::error!("Failed to load game {}: {}", id, e);
            None
        })
    }

    /// Resolve a cover in the background.
    ///
    /// With `prefer_cache` the path stored on the record is used when the
    /// file still exists. The result is also sent as
    /// [`LibraryEvent::CoverResolved`].
    pub fn request_cover(&self, id: AppId, kind: CoverKind, prefer_cache: bool) -> JoinHandle<Option<PathBuf>> {
        let stored = if prefer_cache {
            self.get_game(id)
                .and_then(|game| match kind {
                    CoverKind::Thumbnail => game.cover_thumbnail_path,
                    CoverKind::Detail => game.cover_detail_path,
                })
                .map(PathBuf::from)
        } else {
            None
        };

        let covers = self.orchestrator.covers().clone();
        let events = self.events.clone();

        tokio::spawn(async move {
            let path = match stored.filter(|path| path.is_file()) {
                Some(path) => Some(path),
                None => covers.resolve(id, kind).await,
            };

            if events
                .send(LibraryEvent::CoverResolved {
                    id,
                    kind,
                    path: path.clone(),
                })
                .is_err()
            {
                tracing::debug!("No listener for cover {} {}", id, kind);
            }
            path
        })
    }

    /// Remember a resolved cover on the game's record
    pub fn record_cover(&mut self, id: AppId, kind: CoverKind, path: &Path) -> Result<(), LibraryError> {
        let game = self.get_game(id).ok_or(LibraryError::GameNotFound(id))?;
        let path = path.to_string_lossy().into_owned();

        let (thumbnail, detail) = match kind {
            CoverKind::Thumbnail => (Some(path.as_str()), game.cover_detail_path.as_deref()),
            CoverKind::Detail => (game.cover_thumbnail_path.as_deref(), Some(path.as_str())),
        };

        self.orchestrator.store_mut().update_covers(id, thumbnail, detail)
    }

    /// Ask the Steam client to start a game
    pub fn launch(&self, id: AppId) -> Result<(), LibraryError> {
        let url = launch_url(id);
        tracing::info!("Launching {} via {}", id, url);

        self.opener.open(&url)?;
        self.emit(LibraryEvent::GameLaunched(id));
        Ok(())
    }

    /// Close the store
    pub fn shutdown(&mut self) -> Result<(), LibraryError> {
        tracing::info!("Shutting down game library");
        self.orchestrator.shutdown()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_launch_url() {
        assert_eq!(launch_url(440), "steam://rungameid/440");
    }
}
