mod common;

use axum::extract::Multipart;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::Router;
use imageforge::config::ProxyConfig;
use imageforge::remote::{self, RemoveBgClient, API_KEY_HEADER, FAILURE_MESSAGE, ROUTE};
use imageforge::{ForgeError, ProxyCredential, SourceFile, ToolKind, ToolPage};
use std::net::SocketAddr;
use tokio::net::TcpListener;

const KEY: &str = "test-key";
const CUTOUT: &[u8] = b"\x89PNG\r\n\x1a\nfake cutout";

async fn spawn(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

/// Stand-in for the upstream API: requires the key, an `image_file` part and
/// `size=auto`
async fn fake_upstream(headers: HeaderMap, mut multipart: Multipart) -> axum::response::Response {
    if headers.get(API_KEY_HEADER).and_then(|v| v.to_str().ok()) != Some(KEY) {
        return (
            StatusCode::FORBIDDEN,
            r#"{"errors":[{"title":"API Key invalid","code":"auth_failed"}]}"#,
        )
            .into_response();
    }

    let mut image = None;
    let mut size = None;
    while let Some(field) = multipart.next_field().await.unwrap() {
        match field.name() {
            Some("image_file") => {
                let content_type = field.content_type().map(str::to_string);
                image = Some((content_type, field.bytes().await.unwrap()));
            }
            Some("size") => size = Some(field.text().await.unwrap()),
            _ => {}
        }
    }

    match (image, size.as_deref()) {
        (Some((Some(ct), bytes)), Some("auto")) if ct == "image/png" && !bytes.is_empty() => {
            CUTOUT.into_response()
        }
        _ => (StatusCode::BAD_REQUEST, "missing image_file").into_response(),
    }
}

async fn spawn_proxy(key: &str) -> SocketAddr {
    let upstream = spawn(Router::new().route("/removebg", post(fake_upstream))).await;
    let config = ProxyConfig {
        upstream_url: format!("http://{}/removebg", upstream),
        api_key: ProxyCredential::new(key),
        ..ProxyConfig::default()
    };
    spawn(remote::router(&config)).await
}

fn upload() -> SourceFile {
    SourceFile::new(
        common::encode(&common::gradient(32, 32), image::ImageFormat::Png),
        "image/png",
    )
}

#[tokio::test]
async fn relays_upload_and_returns_png() {
    let proxy = spawn_proxy(KEY).await;
    let client = RemoveBgClient::new(format!("http://{}{}", proxy, ROUTE));

    let result = client.remove_background(&upload()).await.unwrap();
    assert_eq!(result.bytes, CUTOUT);
    assert_eq!(result.media_type, "image/png");
    assert_eq!(result.filename, "background-removed.png");
}

#[tokio::test]
async fn proxy_sets_png_content_type() {
    let proxy = spawn_proxy(KEY).await;
    let form = reqwest::multipart::Form::new()
        .part(
            "image_file",
            reqwest::multipart::Part::bytes(upload().bytes)
                .file_name("photo.png")
                .mime_str("image/png")
                .unwrap(),
        )
        .text("size", "auto");

    let response = reqwest::Client::new()
        .post(format!("http://{}{}", proxy, ROUTE))
        .multipart(form)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert_eq!(
        response.headers()[reqwest::header::CONTENT_TYPE],
        "image/png"
    );
    assert_eq!(&response.bytes().await.unwrap()[..], CUTOUT);
}

#[tokio::test]
async fn upstream_failure_is_generic_json() {
    let proxy = spawn_proxy("wrong-key").await;
    let form = reqwest::multipart::Form::new()
        .part(
            "image_file",
            reqwest::multipart::Part::bytes(upload().bytes)
                .mime_str("image/png")
                .unwrap(),
        )
        .text("size", "auto");

    let response = reqwest::Client::new()
        .post(format!("http://{}{}", proxy, ROUTE))
        .multipart(form)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), reqwest::StatusCode::INTERNAL_SERVER_ERROR);
    let body: serde_json::Value =
        serde_json::from_slice(&response.bytes().await.unwrap()).unwrap();
    assert_eq!(body, serde_json::json!({ "error": FAILURE_MESSAGE }));
    assert!(!body.to_string().contains("auth_failed"));
}

#[tokio::test]
async fn missing_key_reaches_upstream_unauthenticated() {
    let proxy = spawn_proxy("").await;
    let client = RemoveBgClient::new(format!("http://{}{}", proxy, ROUTE));

    let err = client.remove_background(&upload()).await.unwrap_err();
    assert!(matches!(err, ForgeError::Api(_)));
}

#[tokio::test]
async fn non_multipart_body_is_generic_json() {
    let proxy = spawn_proxy(KEY).await;
    let response = reqwest::Client::new()
        .post(format!("http://{}{}", proxy, ROUTE))
        .body("just text")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), reqwest::StatusCode::INTERNAL_SERVER_ERROR);
    let body: serde_json::Value =
        serde_json::from_slice(&response.bytes().await.unwrap()).unwrap();
    assert_eq!(body["error"], FAILURE_MESSAGE);
}

#[tokio::test]
async fn unreachable_upstream_is_generic_json() {
    // Bind then drop to get a port nothing listens on
    let dead = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let dead_addr = dead.local_addr().unwrap();
    drop(dead);

    let config = ProxyConfig {
        upstream_url: format!("http://{}/removebg", dead_addr),
        api_key: ProxyCredential::new(KEY),
        ..ProxyConfig::default()
    };
    let proxy = spawn(remote::router(&config)).await;
    let client = RemoveBgClient::new(format!("http://{}{}", proxy, ROUTE));

    let err = client.remove_background(&upload()).await.unwrap_err();
    assert!(matches!(err, ForgeError::Api(_)));
}

#[tokio::test]
async fn client_can_call_upstream_directly_with_key() {
    let upstream = spawn(Router::new().route("/removebg", post(fake_upstream))).await;
    let client = RemoveBgClient::new(format!("http://{}/removebg", upstream))
        .with_credential(ProxyCredential::new(KEY));

    let result = client.remove_background(&upload()).await.unwrap();
    assert_eq!(result.bytes, CUTOUT);
}

#[tokio::test]
async fn page_reports_generic_failure() {
    let proxy = spawn_proxy("wrong-key").await;
    let client = RemoveBgClient::new(format!("http://{}{}", proxy, ROUTE));

    let mut page = ToolPage::new(ToolKind::BackgroundRemover);
    assert!(!page.run_remote(&client).await);

    page.select_file(upload());
    assert!(page.run_remote(&client).await);
    assert_eq!(
        page.error(),
        Some("Background removal failed. Check API key or file.")
    );
    assert!(page.result().is_none());
    assert!(!page.is_busy());
}

#[tokio::test]
async fn page_publishes_remote_result() {
    let proxy = spawn_proxy(KEY).await;
    let client = RemoveBgClient::new(format!("http://{}{}", proxy, ROUTE));

    let mut page = ToolPage::new(ToolKind::BackgroundRemover);
    page.select_file(upload());
    assert!(page.run_remote(&client).await);

    let (name, bytes) = page.download().unwrap();
    assert_eq!(name, "background-removed.png");
    assert_eq!(bytes, CUTOUT);
}
