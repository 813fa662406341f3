use mockito::Matcher;
use serde_json::json;
use uniform_http::client::{ReqwestTransport, RuntimeCapabilities};
use uniform_http::protocol::{integrity_for, IntegrityAlgorithm, RedirectMode, ReferrerPolicy};
use uniform_http::{CallConfig, Client, HttpError, Request, RequestConfig};

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn request(config: RequestConfig) -> Request {
    Request::with_config(config, RuntimeCapabilities::native()).unwrap()
}

#[tokio::test]
async fn test_follow_redirect() {
    init_tracing();
    let mut server = mockito::Server::new_async().await;
    let _old = server
        .mock("GET", "/old")
        .with_status(302)
        .with_header("location", "/new")
        .create_async()
        .await;
    let new = server
        .mock("GET", "/new")
        .with_status(200)
        .with_body("done")
        .create_async()
        .await;

    let client = Client::new();
    let response = client.get(format!("{}/old", server.url())).await.unwrap();

    new.assert_async().await;
    assert_eq!(response.status, 200);
    assert!(response.redirected);
    assert_eq!(response.url, format!("{}/new", server.url()));
    assert_eq!(response.text(), "done");
}

#[tokio::test]
async fn test_manual_redirect_returns_3xx() {
    let mut server = mockito::Server::new_async().await;
    let _old = server
        .mock("GET", "/old")
        .with_status(301)
        .with_header("location", "/new")
        .create_async()
        .await;
    let new = server.mock("GET", "/new").expect(0).create_async().await;

    let mut call = CallConfig::url(format!("{}/old", server.url()));
    call.redirect = Some(RedirectMode::Manual);
    let response = Client::new().get(call).await.unwrap();

    new.assert_async().await;
    assert_eq!(response.status, 301);
    assert!(!response.ok);
    assert!(!response.redirected);
    assert_eq!(response.header("location"), Some("/new"));
}

#[tokio::test]
async fn test_error_redirect_is_rejected() {
    let mut server = mockito::Server::new_async().await;
    let _old = server
        .mock("GET", "/old")
        .with_status(307)
        .with_header("location", "/new")
        .create_async()
        .await;

    let mut call = CallConfig::url(format!("{}/old", server.url()));
    call.redirect = Some(RedirectMode::Error);
    let result = Client::new().get(call).await;

    match result {
        Err(HttpError::Transport(message)) => {
            assert!(message.starts_with("Refused to redirect"));
            assert!(message.ends_with("/new"));
        }
        other => panic!("expected a transport error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_subresource_integrity() {
    let mut server = mockito::Server::new_async().await;
    let _script = server
        .mock("GET", "/app.js")
        .with_body("console.log(1)")
        .expect(2)
        .create_async()
        .await;
    let url = format!("{}/app.js", server.url());
    let transport = ReqwestTransport::new();

    let mut good = request(RequestConfig {
        url: url.clone(),
        sri: Some(integrity_for(IntegrityAlgorithm::Sha256, b"console.log(1)")),
        ..Default::default()
    });
    assert!(good.send(&transport).await.is_ok());

    let mut bad = request(RequestConfig {
        url,
        sri: Some(integrity_for(IntegrityAlgorithm::Sha256, b"tampered")),
        ..Default::default()
    });
    let result = bad.send(&transport).await;
    assert!(matches!(result, Err(HttpError::Transport(_))));
}

#[tokio::test]
async fn test_credentials_and_json_body_reach_server() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/items")
        .match_header("authorization", "Basic dXNlcjpwYXNz")
        .match_header("content-type", "application/json")
        .match_body(Matcher::Json(json!({ "name": "x" })))
        .with_status(201)
        .create_async()
        .await;

    let mut request = request(RequestConfig {
        url: format!("{}/items", server.url()),
        method: Some("POST".to_string()),
        body: Some(json!({ "name": "x" }).into()),
        username: Some("user".to_string()),
        password: Some("pass".to_string()),
        ..Default::default()
    });
    let response = request.send(&ReqwestTransport::new()).await.unwrap();

    mock.assert_async().await;
    assert_eq!(response.status, 201);
    assert!(response.ok);
}

#[tokio::test]
async fn test_credentials_in_url_become_basic_auth() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/secure")
        .match_header("authorization", "Basic dXNlcjpwYXNz")
        .create_async()
        .await;

    let url = server.url().replacen("http://", "http://user:pass@", 1);
    Client::new().get(format!("{}/secure", url)).await.unwrap();
    mock.assert_async().await;
}

#[tokio::test]
async fn test_referer_follows_policy() {
    let mut server = mockito::Server::new_async().await;
    let with_origin = server
        .mock("GET", "/a")
        .match_header("referer", "https://app.example.com/")
        .create_async()
        .await;
    let without = server
        .mock("GET", "/b")
        .match_header("referer", Matcher::Missing)
        .create_async()
        .await;

    let mut call = CallConfig::url(format!("{}/a", server.url()));
    call.referrer = Some("https://app.example.com/page".to_string());
    call.referrer_policy = Some(ReferrerPolicy::Origin);
    Client::new().get(call).await.unwrap();
    with_origin.assert_async().await;

    // https to http is a downgrade under the default policy
    let mut call = CallConfig::url(format!("{}/b", server.url()));
    call.referrer = Some("https://app.example.com/page".to_string());
    Client::new().get(call).await.unwrap();
    without.assert_async().await;
}

#[tokio::test]
async fn test_safe_method_body_is_not_sent() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/search")
        .match_header("content-type", Matcher::Missing)
        .match_body("")
        .create_async()
        .await;

    let mut call = CallConfig::url(format!("{}/search", server.url()));
    call.body = Some("q=1".into());
    Client::new().get(call).await.unwrap();
    mock.assert_async().await;
}

#[tokio::test]
async fn test_head_and_status_text() {
    let mut server = mockito::Server::new_async().await;
    let _missing = server
        .mock("HEAD", "/gone")
        .with_status(404)
        .create_async()
        .await;

    let response = Client::new()
        .head(format!("{}/gone", server.url()))
        .await
        .unwrap();
    assert_eq!(response.status, 404);
    assert_eq!(response.status_text, "Not Found");
    assert!(!response.ok);
    assert!(!response.has_body());
}

#[tokio::test]
async fn test_connection_failure_is_transport_error() {
    let result = Client::new().get("http://127.0.0.1:9/unreachable").await;
    assert!(result.map_err(|e| e.is_transport()).unwrap_err());
}
