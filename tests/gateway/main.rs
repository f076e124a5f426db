// Gateway protocol over a real HTTP server backed by a temporary directory.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokio::io::AsyncReadExt;
use treesync::checksum::checksum_bytes;
use treesync::gateway::{build_router, HttpEndpoint, LocalStore};
use treesync::sync::Endpoint;
use treesync::timefmt::parse_http_date;
use treesync::{ResourcePath, SyncEngine, SyncError, SyncOptions};

const MODIFIED: &str = "Tue, 03 Mar 2020 10:00:00 GMT";

struct Gateway {
    dir: TempDir,
    addr: SocketAddr,
}

impl Gateway {
    async fn start() -> Self {
        let dir = TempDir::new().unwrap();
        let router = build_router(Arc::new(LocalStore::new(dir.path())));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        Gateway { dir, addr }
    }

    fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    fn endpoint(&self) -> HttpEndpoint {
        HttpEndpoint::new(&self.url()).unwrap()
    }

    fn root(&self) -> &Path {
        self.dir.path()
    }

    fn write(&self, rel: &str, data: &[u8]) {
        let full = self.root().join(rel);
        std::fs::create_dir_all(full.parent().unwrap()).unwrap();
        std::fs::write(full, data).unwrap();
    }
}

fn p(s: &str) -> ResourcePath {
    ResourcePath::parse(s).unwrap()
}

async fn staged(data: &[u8]) -> (TempDir, tokio::fs::File) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("staged");
    std::fs::write(&path, data).unwrap();
    let file = tokio::fs::File::open(&path).await.unwrap();
    (dir, file)
}

async fn download(
    endpoint: &HttpEndpoint,
    path: &str,
) -> treesync::Result<(Vec<u8>, Option<String>)> {
    let dir = TempDir::new().unwrap();
    let file_path = dir.path().join("download");
    let mut file = tokio::fs::File::create(&file_path).await.unwrap();
    let result = endpoint.download(&p(path), &mut file).await?;
    let mut data = Vec::new();
    tokio::fs::File::open(&file_path)
        .await
        .unwrap()
        .read_to_end(&mut data)
        .await
        .unwrap();
    assert_eq!(result.bytes, data.len() as u64);
    Ok((data, result.last_modified))
}

fn fast_options() -> SyncOptions {
    SyncOptions {
        workers: 4,
        poll_interval: Duration::from_millis(10),
        quiescence_polls: 50,
        gate_interval: Duration::from_millis(5),
        staging_dir: None,
    }
}

#[tokio::test]
async fn test_ping() {
    let gateway = Gateway::start().await;
    let body = reqwest::get(format!("{}/ping", gateway.url()))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    let body: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["message"], "pong");
}

#[tokio::test]
async fn test_stat_dir() {
    let gateway = Gateway::start().await;
    gateway.write("a/x.txt", b"x");
    let endpoint = gateway.endpoint();

    assert!(endpoint.stat_dir(&p("/")).await.unwrap().is_some());
    assert!(endpoint.stat_dir(&p("/a/")).await.unwrap().is_some());
    assert!(endpoint.stat_dir(&p("/missing/")).await.unwrap().is_none());
    // A content is not a directory.
    assert!(endpoint.stat_dir(&p("/a/x.txt/")).await.unwrap().is_none());
}

#[tokio::test]
async fn test_stat_content_reports_checksum() {
    let gateway = Gateway::start().await;
    gateway.write("a/x.txt", b"hello world");
    let endpoint = gateway.endpoint();

    let stat = endpoint.stat_content(&p("/a/x.txt")).await.unwrap().unwrap();
    assert_eq!(stat.size, Some(11));
    assert_eq!(stat.checksum, Some(checksum_bytes(b"hello world")));
    assert!(stat.last_modified.is_some());

    assert!(endpoint.stat_content(&p("/a/y.txt")).await.unwrap().is_none());
    assert!(endpoint.stat_content(&p("/a")).await.unwrap().is_none());
}

#[tokio::test]
async fn test_list_sorted_dirs_first() {
    let gateway = Gateway::start().await;
    gateway.write("b.txt", b"b");
    gateway.write("a.txt", b"a");
    gateway.write("z/inner.txt", b"z");
    gateway.write("m/inner.txt", b"m");
    let endpoint = gateway.endpoint();

    let entries = endpoint.list(&p("/")).await.unwrap();
    let names: Vec<_> = entries.iter().map(|e| e.as_str()).collect();
    assert_eq!(names, vec!["/m/", "/z/", "/a.txt", "/b.txt"]);

    let raw = reqwest::get(format!("{}/", gateway.url()))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(raw.ends_with("/b.txt\n\n"));
}

#[tokio::test]
async fn test_list_missing_dir_is_protocol_error() {
    let gateway = Gateway::start().await;
    let err = gateway.endpoint().list(&p("/nope/")).await.unwrap_err();
    assert!(matches!(err, SyncError::Protocol { status: 404, .. }));
}

#[tokio::test]
async fn test_make_dir() {
    let gateway = Gateway::start().await;
    let endpoint = gateway.endpoint();

    endpoint.make_dir(&p("/a/b/c/"), true).await.unwrap();
    assert!(gateway.root().join("a/b/c").is_dir());

    // Existing directory.
    endpoint.make_dir(&p("/a/"), false).await.unwrap();

    let err = endpoint.make_dir(&p("/x/y/"), false).await.unwrap_err();
    assert!(matches!(err, SyncError::Protocol { .. }));
    assert!(!gateway.root().join("x").exists());
}

#[tokio::test]
async fn test_make_dir_over_content_is_rejected() {
    let gateway = Gateway::start().await;
    gateway.write("f", b"file");
    let err = gateway.endpoint().make_dir(&p("/f/"), true).await.unwrap_err();
    assert!(matches!(err, SyncError::Protocol { status: 400, .. }));
}

#[tokio::test]
async fn test_upload_then_download() {
    let gateway = Gateway::start().await;
    let endpoint = gateway.endpoint();
    endpoint.make_dir(&p("/docs/"), false).await.unwrap();

    let (_guard, file) = staged(b"some content").await;
    endpoint
        .upload(&p("/docs/note.txt"), file, Some(MODIFIED))
        .await
        .unwrap();

    assert_eq!(
        std::fs::read(gateway.root().join("docs/note.txt")).unwrap(),
        b"some content"
    );
    let (data, last_modified) = download(&endpoint, "/docs/note.txt").await.unwrap();
    assert_eq!(data, b"some content");
    assert_eq!(last_modified.as_deref(), Some(MODIFIED));
}

#[tokio::test]
async fn test_large_content_round_trip() {
    let gateway = Gateway::start().await;
    let endpoint = gateway.endpoint();
    // Above axum's 2 MB default body limit.
    let data: Vec<u8> = (0..5 * 1024 * 1024u32).map(|i| (i % 251) as u8).collect();

    let (_guard, file) = staged(&data).await;
    endpoint
        .upload(&p("/large.bin"), file, Some(MODIFIED))
        .await
        .unwrap();

    assert_eq!(std::fs::read(gateway.root().join("large.bin")).unwrap(), data);
    let (downloaded, last_modified) = download(&endpoint, "/large.bin").await.unwrap();
    assert_eq!(downloaded.len(), data.len());
    assert!(downloaded == data);
    assert_eq!(last_modified.as_deref(), Some(MODIFIED));
}

#[tokio::test]
async fn test_upload_sets_mtime() {
    let gateway = Gateway::start().await;
    let endpoint = gateway.endpoint();

    let (_guard, file) = staged(b"dated").await;
    endpoint.upload(&p("/dated.txt"), file, Some(MODIFIED)).await.unwrap();

    let meta = std::fs::metadata(gateway.root().join("dated.txt")).unwrap();
    let mtime = filetime::FileTime::from_last_modification_time(&meta);
    let expected = parse_http_date(MODIFIED).unwrap();
    assert_eq!(mtime.unix_seconds(), expected.timestamp());
}

#[tokio::test]
async fn test_upload_without_last_modified() {
    let gateway = Gateway::start().await;
    let (_guard, file) = staged(b"now").await;
    gateway
        .endpoint()
        .upload(&p("/now.txt"), file, None)
        .await
        .unwrap();
    assert_eq!(std::fs::read(gateway.root().join("now.txt")).unwrap(), b"now");
}

#[tokio::test]
async fn test_upload_with_bad_last_modified_is_rejected() {
    let gateway = Gateway::start().await;
    let response = reqwest::Client::new()
        .put(format!("{}/bad.txt", gateway.url()))
        .header("Last-Modified", "yesterday-ish")
        .body("data")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
    assert!(!gateway.root().join("bad.txt").exists());
}

#[tokio::test]
async fn test_upload_into_missing_dir_fails() {
    let gateway = Gateway::start().await;
    let (_guard, file) = staged(b"orphan").await;
    let err = gateway
        .endpoint()
        .upload(&p("/nowhere/orphan.txt"), file, None)
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::Protocol { status: 500, .. }));
}

#[tokio::test]
async fn test_download_missing_content() {
    let gateway = Gateway::start().await;
    let err = download(&gateway.endpoint(), "/missing.txt").await.unwrap_err();
    assert!(matches!(err, SyncError::Protocol { status: 404, .. }));
}

#[tokio::test]
async fn test_names_needing_escapes() {
    let gateway = Gateway::start().await;
    let endpoint = gateway.endpoint();
    endpoint.make_dir(&p("/my docs/"), false).await.unwrap();

    let (_guard, file) = staged(b"odd").await;
    endpoint
        .upload(&p("/my docs/q?#%.txt"), file, None)
        .await
        .unwrap();

    assert!(gateway.root().join("my docs/q?#%.txt").is_file());
    let entries = endpoint.list(&p("/my docs/")).await.unwrap();
    assert_eq!(entries, vec![p("/my docs/q?#%.txt")]);
}

#[tokio::test]
async fn test_unreachable_gateway_is_transport_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let endpoint = HttpEndpoint::new(&format!("http://{}", addr)).unwrap();
    let err = endpoint.stat_dir(&p("/")).await.unwrap_err();
    assert!(matches!(err, SyncError::Transport { .. }));
}

#[tokio::test]
async fn test_sync_between_gateways() {
    let source = Gateway::start().await;
    source.write("x.txt", b"top");
    source.write("a/b.txt", b"nested");
    source.write("a/c/d.bin", &[0u8, 159, 146, 150]);
    source.write("with space/e.txt", b"spaced");
    std::fs::create_dir_all(source.root().join("empty")).unwrap();
    let target = Gateway::start().await;
    target.write("a/b.txt", b"stale");

    let engine = SyncEngine::new(
        Arc::new(source.endpoint()),
        Arc::new(target.endpoint()),
        fast_options(),
    );
    let report = engine.run().await;

    for rel in ["x.txt", "a/b.txt", "a/c/d.bin", "with space/e.txt"] {
        assert_eq!(
            std::fs::read(target.root().join(rel)).unwrap(),
            std::fs::read(source.root().join(rel)).unwrap(),
            "{}",
            rel
        );
        let source_mtime = filetime::FileTime::from_last_modification_time(
            &std::fs::metadata(source.root().join(rel)).unwrap(),
        );
        let target_mtime = filetime::FileTime::from_last_modification_time(
            &std::fs::metadata(target.root().join(rel)).unwrap(),
        );
        assert_eq!(source_mtime.unix_seconds(), target_mtime.unix_seconds());
    }
    assert!(target.root().join("empty").is_dir());
    assert_eq!(report.contents_transferred, 4);
    assert_eq!(report.paths_left, 0);

    let again = engine.run().await;
    assert_eq!(again.contents_transferred, 0);
    assert_eq!(again.contents_in_sync, 4);
    assert_eq!(again.dirs_created, 0);
}
