//! Library scanning and catalog enrichment

use crate::database::{GameRecord, GameStore, MetadataUpdate, UpsertOutcome};
use crate::locator::{LibraryLocator, LibraryRoot};
use crate::manifest::{GameManifest, read_manifest};
use crate::LibraryError;
use echogl_catalog::CatalogClient;
use echogl_config::Credentials;
use echogl_covers::{CoverCache, CoverKind};
use serde::Serialize;
use std::fmt;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

/// Where the orchestrator is in its scan/enrich cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanPhase {
    Idle,
    Scanning,
    Scanned,
    Enriching,
}

impl fmt::Display for ScanPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScanPhase::Idle => "idle",
            ScanPhase::Scanning => "scanning",
            ScanPhase::Scanned => "scanned",
            ScanPhase::Enriching => "enriching",
        };
        f.write_str(name)
    }
}

type SharedPhase = Arc<Mutex<ScanPhase>>;

fn lock(phase: &SharedPhase) -> MutexGuard<'_, ScanPhase> {
    phase.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Holds the phase of a running pass and settles it on drop, so a pass
/// whose future is dropped mid-await does not stay busy forever
struct PhaseGuard {
    phase: SharedPhase,
    on_drop: ScanPhase,
}

impl PhaseGuard {
    fn enter(phase: &SharedPhase, active: ScanPhase, on_drop: ScanPhase) -> Self {
        *lock(phase) = active;
        Self {
            phase: Arc::clone(phase),
            on_drop,
        }
    }

    fn finish(mut self, phase: ScanPhase) {
        self.on_drop = phase;
    }
}

impl Drop for PhaseGuard {
    fn drop(&mut self) {
        *lock(&self.phase) = self.on_drop;
    }
}

/// Result of a library scan
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanReport {
    pub roots: usize,
    pub manifests_seen: usize,
    pub games_found: usize,
    pub games_added: usize,
    pub games_updated: usize,
    pub skipped: usize,
    pub errors: Vec<String>,
    pub duration_ms: u64,
}

/// A finished scan: the report plus every stored record
#[derive(Debug, Clone, Default)]
pub struct ScanOutcome {
    pub report: ScanReport,
    pub games: Vec<GameRecord>,
}

/// Result of an enrichment pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EnrichReport {
    pub candidates: usize,
    pub enriched: usize,
    pub skipped: usize,
    pub not_found: usize,
    pub failed: usize,
    pub duration_ms: u64,
}

/// Drives scans and enrichment passes over one store
pub struct ScanOrchestrator {
    store: GameStore,
    covers: CoverCache,
    catalog: CatalogClient,
    locator: LibraryLocator,
    phase: SharedPhase,
}

impl ScanOrchestrator {
    pub fn new(store: GameStore, covers: CoverCache, catalog: CatalogClient, locator: LibraryLocator) -> Self {
        Self {
            store,
            covers,
            catalog,
            locator,
            phase: Arc::new(Mutex::new(ScanPhase::Idle)),
        }
    }

    pub fn phase(&self) -> ScanPhase {
        *lock(&self.phase)
    }

    pub fn store(&self) -> &GameStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut GameStore {
        &mut self.store
    }

    pub fn covers(&self) -> &CoverCache {
        &self.covers
    }

    /// Discover installed titles, fetch their covers and store them
    pub async fn scan(&mut self) -> Result<ScanOutcome, LibraryError> {
        let phase = self.phase();
        if !matches!(phase, ScanPhase::Idle | ScanPhase::Scanned) {
            return Err(LibraryError::InvalidPhase {
                operation: "scan",
                phase,
            });
        }

        let guard = PhaseGuard::enter(&self.phase, ScanPhase::Scanning, ScanPhase::Idle);
        let start = Instant::now();
        let mut report = ScanReport::default();

        let roots = self.locator.locate();
        report.roots = roots.len();
        tracing::info!("Scanning {} library root(s)", roots.len());

        for root in &roots {
            self.scan_root(root, &mut report).await;
        }

        let games = self.store.get_all().unwrap_or_else(|e| {
            tracing::error!("Failed to load games after scan: {}", e);
            report.errors.push(e.to_string());
            Vec::new()
        });

        report.duration_ms = start.elapsed().as_millis() as u64;
        guard.finish(ScanPhase::Scanned);

        tracing::info!(
            "Scan complete: {} found, {} added, {} updated, {} skipped, {} error(s) in {}ms",
            report.games_found,
            report.games_added,
            report.games_updated,
            report.skipped,
            report.errors.len(),
            report.duration_ms
        );

        Ok(ScanOutcome { report, games })
    }

    async fn scan_root(&mut self, root: &LibraryRoot, report: &mut ScanReport) {
        let manifests = match root.manifests() {
            Ok(manifests) => manifests,
            Err(e) => {
                tracing::warn!("{}", e);
                report.errors.push(e.to_string());
                return;
            }
        };

        tracing::debug!("{} manifest(s) in {}", manifests.len(), root.path().display());

        for manifest_path in manifests {
            report.manifests_seen += 1;

            let Some(manifest) = GameManifest::resolve(read_manifest(&manifest_path), root.path()) else {
                tracing::warn!("Skipping {}: no app id", manifest_path.display());
                report.skipped += 1;
                continue;
            };

            report.games_found += 1;
            self.store_manifest(&manifest, &manifest_path, report).await;
        }
    }

    async fn store_manifest(&mut self, manifest: &GameManifest, source: &Path, report: &mut ScanReport) {
        tracing::debug!(
            "Found {} ({}) in {}",
            manifest.name,
            manifest.app_id,
            source.display()
        );

        let (thumbnail, detail) = tokio::join!(
            self.covers.resolve(manifest.app_id, CoverKind::Thumbnail),
            self.covers.resolve(manifest.app_id, CoverKind::Detail),
        );

        let record = GameRecord::from_scan(manifest.app_id, &manifest.name, manifest.install_path_display())
            .with_covers(
                thumbnail.map(|p| p.to_string_lossy().into_owned()),
                detail.map(|p| p.to_string_lossy().into_owned()),
            );

        match self.store.upsert_scan(&record) {
            Ok(UpsertOutcome::Inserted) => report.games_added += 1,
            Ok(UpsertOutcome::Refreshed) => report.games_updated += 1,
            Ok(UpsertOutcome::Skipped) => {}
            Err(e) => {
                tracing::error!("Failed to store {} ({}): {}", manifest.name, manifest.app_id, e);
                report.errors.push(format!("{}: {}", manifest.app_id, e));
            }
        }
    }

    /// Attach catalog data to every stored game that has none yet
    pub async fn enrich(&mut self, credentials: &Credentials) -> Result<EnrichReport, LibraryError> {
        let phase = self.phase();
        if phase != ScanPhase::Scanned {
            return Err(LibraryError::InvalidPhase {
                operation: "enrich",
                phase,
            });
        }

        // back to Idle however the pass ends
        let _guard = PhaseGuard::enter(&self.phase, ScanPhase::Enriching, ScanPhase::Idle);
        self.run_enrichment(credentials).await
    }

    async fn run_enrichment(&mut self, credentials: &Credentials) -> Result<EnrichReport, LibraryError> {
        let start = Instant::now();

        let token = self
            .catalog
            .authenticate(&credentials.client_id, &credentials.client_secret)
            .await
            .ok_or(LibraryError::Auth)?;

        let games = self.store.get_all()?;
        let mut report = EnrichReport {
            candidates: games.len(),
            ..EnrichReport::default()
        };
        tracing::info!("Enriching {} game(s)", games.len());

        for game in games {
            if game.is_enriched() {
                report.skipped += 1;
                continue;
            }

            let Some(found) = self.catalog.lookup(&token, &credentials.client_id, game.id).await else {
                tracing::debug!("No catalog entry for {} ({})", game.name, game.id);
                report.not_found += 1;
                continue;
            };

            let cover_path = match (&game.cover_path, found.cover_url()) {
                (Some(existing), _) => Some(existing.clone()),
                (None, Some(url)) => self
                    .covers
                    .resolve_catalog_cover(url, &game.name)
                    .await
                    .map(|p| p.to_string_lossy().into_owned()),
                (None, None) => None,
            };

            let update = MetadataUpdate {
                catalog_id: found.id,
                summary: found.summary.clone(),
                genres: non_empty(found.genre_list()),
                platforms: non_empty(found.platform_list()),
                cover_path,
            };

            match self.store.update_metadata(game.id, &update) {
                Ok(()) => {
                    tracing::debug!("Enriched {} ({}) as catalog #{}", game.name, game.id, found.id);
                    report.enriched += 1;
                }
                Err(e) => {
                    tracing::error!("Failed to store catalog data for {} ({}): {}", game.name, game.id, e);
                    report.failed += 1;
                }
            }
        }

        report.duration_ms = start.elapsed().as_millis() as u64;
        tracing::info!(
            "Enrichment complete: {} enriched, {} skipped, {} not found, {} failed in {}ms",
            report.enriched,
            report.skipped,
            report.not_found,
            report.failed,
            report.duration_ms
        );

        Ok(report)
    }

    /// Close the store; later calls become no-ops
    pub fn shutdown(&mut self) -> Result<(), LibraryError> {
        *lock(&self.phase) = ScanPhase::Idle;
        self.store.close()
    }
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() { None } else { Some(s) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use echogl_config::{CatalogSettings, CoverSettings};
    use std::time::Duration;
    use tempfile::TempDir;

    fn orchestrator(dir: &TempDir, locator: LibraryLocator) -> ScanOrchestrator {
        // Unroutable endpoints: every network call fails fast
        orchestrator_at(dir, locator, "http://127.0.0.1:9")
    }

    fn orchestrator_at(dir: &TempDir, locator: LibraryLocator, base: &str) -> ScanOrchestrator {
        let covers = CoverSettings {
            cdn_base: base.to_string(),
            legacy_cdn_base: base.to_string(),
            retry_attempts: 1,
            retry_delay_ms: 0,
            timeout_secs: 1,
            ..CoverSettings::default()
        };
        let catalog = CatalogSettings {
            token_url: format!("{}/token", base),
            api_url: base.to_string(),
            timeout_secs: 1,
            ..CatalogSettings::default()
        };

        ScanOrchestrator::new(
            GameStore::in_memory().unwrap(),
            CoverCache::new(dir.path().join("covers"), &covers).unwrap(),
            CatalogClient::new(&catalog).unwrap(),
            locator,
        )
    }

    fn credentials() -> Credentials {
        Credentials {
            client_id: "id".to_string(),
            client_secret: "secret".to_string(),
        }
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(ScanPhase::Enriching.to_string(), "enriching");
    }

    #[tokio::test]
    async fn test_enrich_requires_scan() {
        let dir = TempDir::new().unwrap();
        let mut orchestrator = orchestrator(&dir, LibraryLocator::default());

        let err = orchestrator.enrich(&credentials()).await.unwrap_err();
        assert!(matches!(
            err,
            LibraryError::InvalidPhase {
                operation: "enrich",
                phase: ScanPhase::Idle
            }
        ));
        assert_eq!(orchestrator.phase(), ScanPhase::Idle);
    }

    #[tokio::test]
    async fn test_empty_scan() {
        let dir = TempDir::new().unwrap();
        let mut orchestrator = orchestrator(&dir, LibraryLocator::default());

        let outcome = orchestrator.scan().await.unwrap();
        assert_eq!(outcome.report.roots, 0);
        assert!(outcome.games.is_empty());
        assert_eq!(orchestrator.phase(), ScanPhase::Scanned);

        // Rescanning from Scanned is allowed
        orchestrator.scan().await.unwrap();
        assert_eq!(orchestrator.phase(), ScanPhase::Scanned);
    }

    #[tokio::test]
    async fn test_auth_failure_returns_to_idle() {
        let dir = TempDir::new().unwrap();
        let mut orchestrator = orchestrator(&dir, LibraryLocator::default());
        orchestrator.scan().await.unwrap();

        let err = orchestrator.enrich(&credentials()).await.unwrap_err();
        assert!(matches!(err, LibraryError::Auth));
        assert_eq!(orchestrator.phase(), ScanPhase::Idle);
    }

    #[tokio::test]
    async fn test_unreadable_manifest_is_skipped() {
        let dir = TempDir::new().unwrap();
        let steamapps = dir.path().join("lib").join("steamapps");
        std::fs::create_dir_all(&steamapps).unwrap();
        std::fs::write(steamapps.join("appmanifest_1.acf"), "\"name\" \"No Id\"").unwrap();
        std::fs::write(steamapps.join("appmanifest_2.acf"), "\"appid\" \"2\"").unwrap();

        let mut orchestrator = orchestrator(&dir, LibraryLocator::new(Vec::new(), vec![steamapps]));
        let outcome = orchestrator.scan().await.unwrap();

        assert_eq!(outcome.report.manifests_seen, 2);
        assert_eq!(outcome.report.skipped, 1);
        assert_eq!(outcome.report.games_added, 1);
        assert_eq!(outcome.games.len(), 1);
        assert_eq!(outcome.games[0].name, "App 2");
        assert_eq!(outcome.games[0].cover_thumbnail_path, None);
    }

    /// Accepts connections and never answers them
    async fn silent_endpoint() -> (tokio::net::TcpListener, String) {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        (listener, base)
    }

    #[tokio::test]
    async fn test_interrupted_scan_returns_to_idle() {
        let dir = TempDir::new().unwrap();
        let steamapps = dir.path().join("lib").join("steamapps");
        std::fs::create_dir_all(&steamapps).unwrap();
        std::fs::write(steamapps.join("appmanifest_440.acf"), "\"appid\" \"440\"").unwrap();

        let (listener, base) = silent_endpoint().await;
        let mut orchestrator = orchestrator_at(&dir, LibraryLocator::new(Vec::new(), vec![steamapps]), &base);

        let interrupted = tokio::time::timeout(Duration::from_millis(100), orchestrator.scan()).await;
        assert!(interrupted.is_err());
        assert_eq!(orchestrator.phase(), ScanPhase::Idle);

        // the endpoint goes away, so the next scan finishes without covers
        drop(listener);
        let outcome = orchestrator.scan().await.unwrap();
        assert_eq!(outcome.games.len(), 1);
        assert_eq!(orchestrator.phase(), ScanPhase::Scanned);
    }

    #[tokio::test]
    async fn test_interrupted_enrich_returns_to_idle() {
        let dir = TempDir::new().unwrap();
        let (_listener, base) = silent_endpoint().await;
        let mut orchestrator = orchestrator_at(&dir, LibraryLocator::default(), &base);
        orchestrator.scan().await.unwrap();

        let interrupted =
            tokio::time::timeout(Duration::from_millis(100), orchestrator.enrich(&credentials())).await;
        assert!(interrupted.is_err());
        assert_eq!(orchestrator.phase(), ScanPhase::Idle);

        orchestrator.scan().await.unwrap();
        assert_eq!(orchestrator.phase(), ScanPhase::Scanned);
    }
}
