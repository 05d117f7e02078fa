//! Integration tests for the cover cache against a local HTTP stub

use echogl_config::CoverSettings;
use echogl_covers::{CoverCache, CoverKind};
use echogl_test_utils::{StubResponse, StubServer, jpeg_bytes};
use std::time::Duration;
use tempfile::TempDir;

const RETRY_DELAY_MS: u64 = 60;

/// Cover cache pointed at a stub CDN
struct CoverTestEnv {
    temp_dir: TempDir,
    server: StubServer,
    cache: CoverCache,
}

impl CoverTestEnv {
    async fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let server = StubServer::start().await.expect("Failed to start stub server");

        let settings = CoverSettings {
            cdn_base: server.base_url(),
            legacy_cdn_base: format!("{}/legacy", server.base_url()),
            timeout_secs: 5,
            retry_attempts: 3,
            retry_delay_ms: RETRY_DELAY_MS,
            ..CoverSettings::default()
        };
        let cache = CoverCache::new(temp_dir.path().join("covers"), &settings)
            .expect("Failed to create cover cache");

        Self {
            temp_dir,
            server,
            cache,
        }
    }
}

fn dimensions(path: &std::path::Path) -> (u32, u32) {
    let image = image::open(path).unwrap();
    (image.width(), image.height())
}

#[tokio::test]
async fn test_thumbnail_falls_back_to_second_candidate() {
    let env = CoverTestEnv::new().await;
    let first = "/steam/apps/440/library_600x900.jpg";
    let second = "/steam/apps/440/capsule_231x87.jpg";
    env.server.get(first, StubResponse::status(404));
    env.server.get(second, StubResponse::jpeg(jpeg_bytes(231, 87)));

    let path = env.cache.resolve(440, CoverKind::Thumbnail).await.unwrap();

    assert_eq!(path, env.cache.cached_path(440, CoverKind::Thumbnail));
    assert_eq!(dimensions(&path), (180, 270));

    let requests = env.server.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].path, first);
    assert_eq!(requests[1].path, second);
}

#[tokio::test]
async fn test_first_success_skips_later_candidates() {
    let env = CoverTestEnv::new().await;
    env.server.get(
        "/steam/apps/620/library_600x900.jpg",
        StubResponse::jpeg(jpeg_bytes(600, 900)),
    );
    env.server.get(
        "/steam/apps/620/capsule_231x87.jpg",
        StubResponse::jpeg(jpeg_bytes(231, 87)),
    );

    assert!(env.cache.resolve(620, CoverKind::Thumbnail).await.is_some());
    assert_eq!(env.server.hits("/steam/apps/620/capsule_231x87.jpg"), 0);
}

#[tokio::test]
async fn test_detail_keeps_native_resolution() {
    let env = CoverTestEnv::new().await;
    env.server.get("/steam/apps/570/library_hero.jpg", StubResponse::status(500));
    env.server.get(
        "/legacy/steam/apps/570/header.jpg",
        StubResponse::jpeg(jpeg_bytes(460, 215)),
    );

    let path = env.cache.resolve(570, CoverKind::Detail).await.unwrap();

    assert!(path.ends_with("570_detail.jpg"));
    assert_eq!(dimensions(&path), (460, 215));
}

#[tokio::test]
async fn test_cache_hit_avoids_network() {
    let env = CoverTestEnv::new().await;
    env.server.get(
        "/steam/apps/10/library_hero.jpg",
        StubResponse::jpeg(jpeg_bytes(32, 16)),
    );

    let first = env.cache.resolve(10, CoverKind::Detail).await.unwrap();
    let requests_after_first = env.server.requests().len();
    let second = env.cache.resolve(10, CoverKind::Detail).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(requests_after_first, 1);
    assert_eq!(env.server.requests().len(), 1);
}

#[tokio::test]
async fn test_retry_bound_when_every_candidate_fails() {
    let env = CoverTestEnv::new().await;
    let first = "/steam/apps/99/library_600x900.jpg";
    let second = "/steam/apps/99/capsule_231x87.jpg";

    let result = env.cache.resolve(99, CoverKind::Thumbnail).await;

    assert!(result.is_none());
    assert!(!env.cache.cached_path(99, CoverKind::Thumbnail).exists());

    let requests = env.server.requests();
    assert_eq!(env.server.hits(first), 3);
    assert_eq!(env.server.hits(second), 3);
    assert_eq!(requests.len(), 6);

    // Each sweep tries both candidates in order, separated by the delay
    let delay = Duration::from_millis(RETRY_DELAY_MS);
    for sweep in requests.chunks(2) {
        assert_eq!(sweep[0].path, first);
        assert_eq!(sweep[1].path, second);
    }
    for pair in requests.chunks(2).collect::<Vec<_>>().windows(2) {
        let gap = pair[1][0].received_at.duration_since(pair[0][1].received_at);
        assert!(gap >= delay, "sweeps only {:?} apart", gap);
    }
}

#[tokio::test]
async fn test_transient_failure_recovers_on_next_sweep() {
    let env = CoverTestEnv::new().await;
    env.server.route(
        "GET",
        "/steam/apps/5/library_hero.jpg",
        vec![
            StubResponse::status(503),
            StubResponse::jpeg(jpeg_bytes(40, 20)),
        ],
    );

    let path = env.cache.resolve(5, CoverKind::Detail).await;

    assert!(path.is_some());
    assert_eq!(env.server.hits("/steam/apps/5/library_hero.jpg"), 2);
    assert_eq!(env.server.hits("/legacy/steam/apps/5/header.jpg"), 1);
}

#[tokio::test]
async fn test_corrupt_payload_leaves_cache_untouched() {
    let env = CoverTestEnv::new().await;
    env.server.get(
        "/steam/apps/77/library_hero.jpg",
        StubResponse::ok("image/jpeg", b"<html>not a jpeg</html>".to_vec()),
    );

    let result = env.cache.resolve(77, CoverKind::Detail).await;

    assert!(result.is_none());
    assert_eq!(env.server.requests().len(), 1);
    let leftovers: Vec<_> = std::fs::read_dir(env.cache.covers_dir())
        .unwrap()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_file())
        .collect();
    assert!(leftovers.is_empty());
}

#[tokio::test]
async fn test_catalog_cover_is_streamed_to_sanitized_name() {
    let env = CoverTestEnv::new().await;
    let body = b"raw catalog bytes, stored as received".to_vec();
    env.server.get("/igdb/co1abc.jpg", StubResponse::jpeg(body.clone()));

    let path = env
        .cache
        .resolve_catalog_cover(&env.server.url("/igdb/co1abc.jpg"), "Team Fortress 2")
        .await
        .unwrap();

    assert!(path.ends_with("catalog/teamfortress2.jpg"));
    assert_eq!(std::fs::read(&path).unwrap(), body);
}

#[tokio::test]
async fn test_catalog_cover_retry_bound() {
    let env = CoverTestEnv::new().await;
    env.server.get("/igdb/missing.jpg", StubResponse::status(404));

    let result = env
        .cache
        .resolve_catalog_cover(&env.server.url("/igdb/missing.jpg"), "Portal")
        .await;

    assert!(result.is_none());
    assert_eq!(env.server.hits("/igdb/missing.jpg"), 3);
    assert!(env.cache.catalog_path("Portal").is_some_and(|p| !p.exists()));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_resolves_of_one_cover_both_succeed() {
    let env = CoverTestEnv::new().await;
    let body = jpeg_bytes(1920, 620);

    for app_id in 900..905u32 {
        env.server.get(
            &format!("/steam/apps/{}/library_hero.jpg", app_id),
            StubResponse::jpeg(body.clone()),
        );

        let first = tokio::spawn({
            let cache = env.cache.clone();
            async move { cache.resolve(app_id, CoverKind::Detail).await }
        });
        let second = tokio::spawn({
            let cache = env.cache.clone();
            async move { cache.resolve(app_id, CoverKind::Detail).await }
        });

        let first = first.await.unwrap();
        let second = second.await.unwrap();
        let target = env.cache.cached_path(app_id, CoverKind::Detail);

        assert_eq!(first.as_ref(), Some(&target), "first resolve of {}", app_id);
        assert_eq!(second.as_ref(), Some(&target), "second resolve of {}", app_id);
        assert_eq!(dimensions(&target), (1920, 620));
    }

    let leftovers: Vec<_> = std::fs::read_dir(env.temp_dir.path().join("covers"))
        .unwrap()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_name().to_string_lossy().ends_with(".partial"))
        .collect();
    assert!(leftovers.is_empty());
}
