//! Integration tests for the catalog client against a local HTTP stub

use echogl_catalog::{AccessToken, CatalogClient};
use echogl_config::CatalogSettings;
use echogl_test_utils::{StubResponse, StubServer};

const TF2_ROW: &str = r#"[{
    "id": 15,
    "game": {
        "id": 2600,
        "name": "Team Fortress 2",
        "summary": "Class-based shooter.",
        "cover": {"id": 1, "url": "//images.example.com/x.jpg"},
        "genres": [{"id": 5, "name": "Shooter"}],
        "platforms": [{"id": 6, "name": "PC (Microsoft Windows)"}, {"id": 14, "name": "Mac"}]
    }
}]"#;

fn client_for(server: &StubServer) -> CatalogClient {
    let settings = CatalogSettings {
        token_url: server.url("/oauth2/token"),
        api_url: server.url("/v4"),
        timeout_secs: 5,
        ..CatalogSettings::default()
    };
    CatalogClient::new(&settings).expect("Failed to create catalog client")
}

#[tokio::test]
async fn test_authenticate_posts_client_credentials() {
    let server = StubServer::start().await.unwrap();
    server.post(
        "/oauth2/token",
        StubResponse::json(r#"{"access_token": "tok-123", "expires_in": 5000, "token_type": "bearer"}"#),
    );
    let client = client_for(&server);

    let token = client.authenticate("my-id", "my-secret").await.unwrap();

    assert_eq!(token.as_str(), "tok-123");
    let request = &server.requests_to("/oauth2/token")[0];
    assert_eq!(request.method, "POST");
    assert!(request.header("content-type").unwrap().contains("x-www-form-urlencoded"));
    assert!(request.body.contains("client_id=my-id"));
    assert!(request.body.contains("client_secret=my-secret"));
    assert!(request.body.contains("grant_type=client_credentials"));
}

#[tokio::test]
async fn test_authenticate_rejects_non_success() {
    let server = StubServer::start().await.unwrap();
    server.post("/oauth2/token", StubResponse::status(401));
    let client = client_for(&server);

    assert!(client.authenticate("bad", "creds").await.is_none());
}

#[tokio::test]
async fn test_lookup_uses_cross_reference() {
    let server = StubServer::start().await.unwrap();
    server.post("/v4/external_games", StubResponse::json(TF2_ROW));
    let client = client_for(&server);

    let game = client
        .lookup(&AccessToken::new("tok"), "my-id", 440)
        .await
        .unwrap();

    assert_eq!(game.id, 2600);
    assert_eq!(game.name.as_deref(), Some("Team Fortress 2"));
    assert_eq!(game.genre_list(), "Shooter");
    assert_eq!(game.platform_list(), "PC (Microsoft Windows), Mac");
    assert_eq!(game.cover_url(), Some("//images.example.com/x.jpg"));
    assert_eq!(server.hits("/v4/games"), 0);

    let request = &server.requests_to("/v4/external_games")[0];
    assert_eq!(request.header("client-id"), Some("my-id"));
    assert_eq!(request.header("authorization"), Some("Bearer tok"));
    assert!(request.body.contains("where uid = \"440\" & category = 1;"));
}

#[tokio::test]
async fn test_lookup_falls_back_to_search() {
    let server = StubServer::start().await.unwrap();
    server.post("/v4/external_games", StubResponse::json("[]"));
    server.post(
        "/v4/games",
        StubResponse::json(r#"[{"id": 99, "name": "Some Game", "genres": [{"name": "Indie"}]}]"#),
    );
    let client = client_for(&server);

    let game = client
        .lookup(&AccessToken::new("tok"), "my-id", 123)
        .await
        .unwrap();

    assert_eq!(game.id, 99);
    assert_eq!(game.genre_list(), "Indie");

    let requests = server.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].path, "/v4/external_games");
    assert_eq!(requests[1].path, "/v4/games");
    assert!(requests[1].body.contains("search \"123\"; limit 1;"));
}

#[tokio::test]
async fn test_lookup_failure_is_no_data() {
    let server = StubServer::start().await.unwrap();
    server.post("/v4/external_games", StubResponse::status(500));
    server.post("/v4/games", StubResponse::status(429));
    let client = client_for(&server);

    let game = client.lookup(&AccessToken::new("tok"), "my-id", 5).await;

    assert!(game.is_none());
    assert_eq!(server.hits("/v4/external_games"), 1);
    assert_eq!(server.hits("/v4/games"), 1);
}

#[tokio::test]
async fn test_lookup_empty_everywhere() {
    let server = StubServer::start().await.unwrap();
    server.post("/v4/external_games", StubResponse::json("[]"));
    server.post("/v4/games", StubResponse::json("[]"));
    let client = client_for(&server);

    assert!(client.lookup(&AccessToken::new("tok"), "id", 1).await.is_none());
}

#[tokio::test]
async fn test_malformed_json_is_no_data() {
    let server = StubServer::start().await.unwrap();
    server.post("/v4/external_games", StubResponse::json("{not json"));
    server.post("/v4/games", StubResponse::json("[]"));
    let client = client_for(&server);

    assert!(client.lookup(&AccessToken::new("tok"), "id", 1).await.is_none());
    assert_eq!(server.hits("/v4/games"), 1);
}
