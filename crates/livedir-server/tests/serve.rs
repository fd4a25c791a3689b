//! End-to-end tests: real watcher, real files, in-process router.

use std::fs;
use std::path::Path;
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::http::{Request, StatusCode, header};
use axum::response::Response;
use futures::StreamExt;
use livedir_server::{
    App, InjectAnchor, InjectionPolicy, LIVE_RELOAD_PATH, Server, ServerConfig,
};
use pretty_assertions::assert_eq;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tower::ServiceExt;

const DEBOUNCE: Duration = Duration::from_millis(100);
const RECEIVE_TIMEOUT: Duration = Duration::from_secs(5);

const INDEX_HTML: &str = "<html><head><title>Site</title></head><body><h1>Hello</h1></body></html>";

fn site() -> tempfile::TempDir {
    let temp_dir = tempfile::tempdir().unwrap();
    fs::write(temp_dir.path().join("index.html"), INDEX_HTML).unwrap();
    fs::write(temp_dir.path().join("style.css"), "body { color: black; }").unwrap();
    temp_dir
}

fn config(root: &Path) -> ServerConfig {
    ServerConfig {
        port: 0,
        root: root.to_path_buf(),
        debounce: DEBOUNCE,
        ..ServerConfig::default()
    }
}

async fn get(app: &App, uri: &str) -> Response {
    app.router()
        .oneshot(Request::get(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

async fn body_string(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// Open the reload stream and return its body frames.
async fn connect(app: &App) -> impl futures::Stream<Item = Result<Bytes, axum::Error>> + Unpin {
    let response = get(app, LIVE_RELOAD_PATH).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "text/event-stream");
    assert_eq!(response.headers()["x-accel-buffering"], "no");
    response.into_body().into_data_stream()
}

async fn next_frame(
    stream: &mut (impl futures::Stream<Item = Result<Bytes, axum::Error>> + Unpin),
    wait: Duration,
) -> Option<String> {
    let frame = tokio::time::timeout(wait, stream.next()).await.ok()??;
    Some(String::from_utf8(frame.unwrap().to_vec()).unwrap())
}

/// Let the backend settle after registering watches or creating directories.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(200)).await;
}

#[tokio::test]
async fn test_index_is_served_with_snippet() {
    let site = site();
    let app = App::new(&config(site.path())).unwrap();

    let response = get(&app, "/").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/html; charset=utf-8"
    );
    assert_eq!(response.headers()["x-content-type-options"], "nosniff");
    assert_eq!(response.headers()[header::CACHE_CONTROL], "no-cache");

    let body = body_string(response).await;
    assert!(body.contains("<h1>Hello</h1>"));
    assert_eq!(body.matches(LIVE_RELOAD_PATH).count(), 1);
    assert!(body.find(LIVE_RELOAD_PATH).unwrap() < body.find("</body>").unwrap());
}

#[tokio::test]
async fn test_head_anchor_policy() {
    let site = site();
    let app = App::new(&ServerConfig {
        injection: InjectionPolicy {
            anchor: InjectAnchor::HeadOpen,
            cache_bust: false,
        },
        ..config(site.path())
    })
    .unwrap();

    let body = body_string(get(&app, "/index.html").await).await;

    assert!(body.starts_with("<html><head><script>"));
    assert!(body.find(LIVE_RELOAD_PATH).unwrap() < body.find("<title>").unwrap());
}

#[tokio::test]
async fn test_non_html_is_served_untouched() {
    let site = site();
    let app = App::new(&config(site.path())).unwrap();

    let response = get(&app, "/style.css").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "text/css");
    assert_eq!(body_string(response).await, "body { color: black; }");
}

#[tokio::test]
async fn test_directory_without_index_is_not_found() {
    let site = site();
    fs::create_dir(site.path().join("assets")).unwrap();
    let app = App::new(&config(site.path())).unwrap();

    let response = get(&app, "/assets/").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_missing_file_is_not_found() {
    let site = site();
    let app = App::new(&config(site.path())).unwrap();

    assert_eq!(get(&app, "/missing.html").await.status(), StatusCode::NOT_FOUND);
    assert_eq!(get(&app, "/missing.css").await.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_traversal_outside_root_is_rejected() {
    let outer = tempfile::tempdir().unwrap();
    fs::write(outer.path().join("secret.html"), "secret").unwrap();
    let root = outer.path().join("site");
    fs::create_dir(&root).unwrap();
    let app = App::new(&config(&root)).unwrap();

    let response = get(&app, "/%2e%2e/secret.html").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_css_change_sends_exactly_one_reload() {
    let site = site();
    let app = App::new(&config(site.path())).unwrap();
    let mut stream = connect(&app).await;
    assert_eq!(app.broadcaster().client_count(), 1);
    settle().await;

    fs::write(site.path().join("style.css"), "body { color: red; }").unwrap();

    assert_eq!(
        next_frame(&mut stream, RECEIVE_TIMEOUT).await.as_deref(),
        Some("data: reload\n\n")
    );
    assert_eq!(next_frame(&mut stream, DEBOUNCE * 5).await, None);
}

#[tokio::test]
async fn test_burst_of_writes_coalesces() {
    let site = site();
    let app = App::new(&config(site.path())).unwrap();
    let mut stream = connect(&app).await;
    settle().await;

    for i in 0..5 {
        fs::write(site.path().join("style.css"), format!("/* {i} */")).unwrap();
        fs::write(site.path().join("index.html"), format!("{INDEX_HTML}<!-- {i} -->")).unwrap();
    }

    assert_eq!(
        next_frame(&mut stream, RECEIVE_TIMEOUT).await.as_deref(),
        Some("data: reload\n\n")
    );
    assert_eq!(next_frame(&mut stream, DEBOUNCE * 5).await, None);
}

#[tokio::test]
async fn test_excluded_change_sends_nothing() {
    let site = site();
    fs::create_dir(site.path().join("node_modules")).unwrap();
    let app = App::new(&config(site.path())).unwrap();
    let mut stream = connect(&app).await;
    settle().await;

    fs::write(site.path().join("node_modules/dep.js"), "x").unwrap();

    assert_eq!(next_frame(&mut stream, DEBOUNCE * 5).await, None);
}

#[tokio::test]
async fn test_new_subdirectory_is_watched() {
    let site = site();
    let app = App::new(&config(site.path())).unwrap();
    let mut stream = connect(&app).await;
    settle().await;

    let blog = site.path().join("blog");
    fs::create_dir(&blog).unwrap();
    fs::write(blog.join("post.html"), "<body>draft</body>").unwrap();

    // Creation itself reloads.
    assert!(next_frame(&mut stream, RECEIVE_TIMEOUT).await.is_some());
    settle().await;
    while next_frame(&mut stream, DEBOUNCE * 2).await.is_some() {}

    fs::write(blog.join("post.html"), "<body>published</body>").unwrap();

    assert_eq!(
        next_frame(&mut stream, RECEIVE_TIMEOUT).await.as_deref(),
        Some("data: reload\n\n")
    );

    let body = body_string(get(&app, "/blog/post.html").await).await;
    assert!(body.starts_with("<body>published<script>"));
}

#[tokio::test]
async fn test_every_client_is_notified() {
    let site = site();
    let app = App::new(&config(site.path())).unwrap();
    let mut first = connect(&app).await;
    let mut second = connect(&app).await;
    assert_eq!(app.broadcaster().client_count(), 2);
    settle().await;

    fs::write(site.path().join("style.css"), "body { color: blue; }").unwrap();

    assert!(next_frame(&mut first, RECEIVE_TIMEOUT).await.is_some());
    assert!(next_frame(&mut second, RECEIVE_TIMEOUT).await.is_some());
}

#[tokio::test]
async fn test_dropped_stream_deregisters_client() {
    let site = site();
    let app = App::new(&config(site.path())).unwrap();

    let stream = connect(&app).await;
    assert_eq!(app.broadcaster().client_count(), 1);

    drop(stream);
    assert_eq!(app.broadcaster().client_count(), 0);
}

#[tokio::test]
async fn test_graceful_shutdown_closes_reload_streams() {
    let site = site();
    let server = Server::bind(&config(site.path())).await.unwrap();
    let addr = server.local_addr().unwrap();

    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let running = tokio::spawn(server.run_until(async move {
        let _ = stop_rx.await;
    }));

    let mut socket = tokio::net::TcpStream::connect(addr).await.unwrap();
    socket
        .write_all(b"GET /__livereload HTTP/1.1\r\nHost: localhost\r\n\r\n")
        .await
        .unwrap();

    let mut head = vec![0; 1024];
    let n = socket.read(&mut head).await.unwrap();
    let head = String::from_utf8_lossy(&head[..n]);
    assert!(head.starts_with("HTTP/1.1 200 OK"), "{head}");
    assert!(head.contains("text/event-stream"));

    stop_tx.send(()).unwrap();

    let result = tokio::time::timeout(RECEIVE_TIMEOUT, running)
        .await
        .expect("server did not shut down")
        .unwrap();
    assert!(result.is_ok());
}
