use std::io::{Read, Write};
use std::net::TcpStream;
use std::thread;
use std::time::Duration;

use mio::Poll;
use weblog::{LogLevel, Logger};
use webserv::config::{LocationConfig, ServerConfig};
use webserv::server::Server;

fn location(path: &str, methods: &[&str]) -> LocationConfig {
    LocationConfig {
        path: path.to_string(),
        methods: methods.iter().map(|m| m.to_string()).collect(),
        ..Default::default()
    }
}

fn start_server(configs: Vec<ServerConfig>) {
    thread::spawn(move || {
        let poll = Poll::new().unwrap();
        let logger = Logger::new(LogLevel::Error).quiet();
        let mut server = Server::new(configs, logger, &poll).unwrap();
        server.run(poll).unwrap();
    });
    // Give the listener time to bind.
    thread::sleep(Duration::from_millis(300));
}

/// One-shot exchange; the server closes the connection because the client
/// never asks for keep-alive.
fn send_and_read(port: u16, request: &[u8]) -> String {
    let mut stream = TcpStream::connect(("127.0.0.1", port)).expect("connect failed");
    stream
        .set_read_timeout(Some(Duration::from_secs(3)))
        .unwrap();
    stream.write_all(request).unwrap();
    let mut buf = Vec::new();
    let _ = stream.read_to_end(&mut buf);
    String::from_utf8_lossy(&buf).into_owned()
}

#[test]
fn test_static_get() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("index.html"), "hello").unwrap();

    let cfg = ServerConfig {
        port: 8191,
        root: dir.path().to_str().unwrap().to_string(),
        locations: vec![location("/", &["GET"])],
        ..Default::default()
    };
    start_server(vec![cfg]);

    let res = send_and_read(8191, b"GET /index.html HTTP/1.1\r\nHost: x\r\n\r\n");
    assert!(res.starts_with("HTTP/1.1 200 OK\r\n"), "got: {res}");
    assert!(res.contains("Content-Length: 5\r\n"));
    assert!(res.ends_with("hello"));
}

#[test]
fn test_index_file_served_for_directory() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("index.html"), "front page").unwrap();

    let cfg = ServerConfig {
        port: 8192,
        root: dir.path().to_str().unwrap().to_string(),
        locations: vec![location("/", &["GET"])],
        ..Default::default()
    };
    start_server(vec![cfg]);

    let res = send_and_read(8192, b"GET / HTTP/1.1\r\nHost: x\r\n\r\n");
    assert!(res.starts_with("HTTP/1.1 200 OK\r\n"), "got: {res}");
    assert!(res.ends_with("front page"));
}

#[test]
fn test_autoindex_listing() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("alpha.txt"), "a").unwrap();
    std::fs::write(dir.path().join("beta.txt"), "bb").unwrap();

    let mut root_loc = location("/", &["GET"]);
    root_loc.autoindex = true;
    let cfg = ServerConfig {
        port: 8193,
        root: dir.path().to_str().unwrap().to_string(),
        locations: vec![root_loc],
        ..Default::default()
    };
    start_server(vec![cfg]);

    let res = send_and_read(8193, b"GET / HTTP/1.1\r\nHost: x\r\n\r\n");
    assert!(res.starts_with("HTTP/1.1 200 OK\r\n"), "got: {res}");
    assert!(res.contains("Content-Type: text/html"));
    assert!(res.contains("alpha.txt"));
    assert!(res.contains("beta.txt"));
    assert!(res.contains("Delete"));
}

#[test]
fn test_autoindex_disabled_is_forbidden() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("file.txt"), "x").unwrap();

    let cfg = ServerConfig {
        port: 8194,
        root: dir.path().to_str().unwrap().to_string(),
        locations: vec![location("/", &["GET"])],
        ..Default::default()
    };
    start_server(vec![cfg]);

    // No index.html and autoindex off.
    let res = send_and_read(8194, b"GET / HTTP/1.1\r\nHost: x\r\n\r\n");
    assert!(res.starts_with("HTTP/1.1 403 Forbidden\r\n"), "got: {res}");
}

#[test]
fn test_method_not_allowed() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = ServerConfig {
        port: 8195,
        root: dir.path().to_str().unwrap().to_string(),
        locations: vec![location("/api", &["GET"])],
        ..Default::default()
    };
    start_server(vec![cfg]);

    let res = send_and_read(8195, b"DELETE /api HTTP/1.1\r\nHost: x\r\n\r\n");
    assert!(
        res.starts_with("HTTP/1.1 405 Method Not Allowed\r\n"),
        "got: {res}"
    );
}

#[test]
fn test_body_limit_enforced() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = ServerConfig {
        port: 8196,
        root: dir.path().to_str().unwrap().to_string(),
        client_max_body_size: 10,
        locations: vec![location("/", &["GET", "POST"])],
        ..Default::default()
    };
    start_server(vec![cfg]);

    let body = "z".repeat(100);
    let req = format!(
        "POST / HTTP/1.1\r\nHost: x\r\nContent-Length: {}\r\n\r\n{}",
        body.len(),
        body
    );
    let res = send_and_read(8196, req.as_bytes());
    assert!(
        res.starts_with("HTTP/1.1 413 Payload Too Large\r\n"),
        "got: {res}"
    );
}

#[test]
fn test_keep_alive_two_requests_in_order() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("one.html"), "first").unwrap();
    std::fs::write(dir.path().join("two.html"), "second").unwrap();

    let cfg = ServerConfig {
        port: 8197,
        root: dir.path().to_str().unwrap().to_string(),
        locations: vec![location("/", &["GET"])],
        ..Default::default()
    };
    start_server(vec![cfg]);

    let mut stream = TcpStream::connect(("127.0.0.1", 8197)).unwrap();
    stream
        .set_read_timeout(Some(Duration::from_secs(3)))
        .unwrap();
    stream
        .write_all(
            b"GET /one.html HTTP/1.1\r\nHost: x\r\nConnection: keep-alive\r\n\r\n\
              GET /two.html HTTP/1.1\r\nHost: x\r\nConnection: close\r\n\r\n",
        )
        .unwrap();

    let mut buf = Vec::new();
    let _ = stream.read_to_end(&mut buf);
    let res = String::from_utf8_lossy(&buf).into_owned();

    assert_eq!(res.matches("HTTP/1.1 200 OK").count(), 2, "got: {res}");
    let first = res.find("first").expect("first body missing");
    let second = res.find("second").expect("second body missing");
    assert!(first < second, "responses out of order: {res}");
    assert!(res.contains("Connection: keep-alive"));
    assert!(res.contains("Connection: close"));
}

#[test]
fn test_delete_semantics() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("victim.txt"), "bye").unwrap();
    std::fs::create_dir(dir.path().join("subdir")).unwrap();

    let cfg = ServerConfig {
        port: 8198,
        root: dir.path().to_str().unwrap().to_string(),
        locations: vec![location("/", &["GET", "DELETE"])],
        ..Default::default()
    };
    start_server(vec![cfg]);

    let res = send_and_read(8198, b"DELETE /victim.txt HTTP/1.1\r\nHost: x\r\n\r\n");
    assert!(res.starts_with("HTTP/1.1 200 OK\r\n"), "got: {res}");
    assert!(!dir.path().join("victim.txt").exists());

    let res = send_and_read(8198, b"DELETE /victim.txt HTTP/1.1\r\nHost: x\r\n\r\n");
    assert!(res.starts_with("HTTP/1.1 404 Not Found\r\n"), "got: {res}");

    let res = send_and_read(8198, b"DELETE /subdir HTTP/1.1\r\nHost: x\r\n\r\n");
    assert!(res.starts_with("HTTP/1.1 403 Forbidden\r\n"), "got: {res}");
}

#[test]
fn test_multipart_upload() {
    let dir = tempfile::tempdir().unwrap();
    let mut upload_loc = location("/upload", &["GET", "POST"]);
    upload_loc.client_max_body_size = Some(1024 * 1024);
    let cfg = ServerConfig {
        port: 8199,
        root: dir.path().to_str().unwrap().to_string(),
        locations: vec![upload_loc, location("/", &["GET"])],
        ..Default::default()
    };
    start_server(vec![cfg]);

    let body = "--XBOUND\r\n\
                Content-Disposition: form-data; name=\"f\"; filename=\"a.txt\"\r\n\
                Content-Type: text/plain\r\n\
                \r\n\
                xyz\r\n\
                --XBOUND--\r\n";
    let req = format!(
        "POST /upload HTTP/1.1\r\nHost: x\r\n\
         Content-Type: multipart/form-data; boundary=XBOUND\r\n\
         Content-Length: {}\r\n\r\n{}",
        body.len(),
        body
    );

    let res = send_and_read(8199, req.as_bytes());
    assert!(res.starts_with("HTTP/1.1 201 Created\r\n"), "got: {res}");
    assert!(res.contains("File uploaded successfully"));

    let saved = dir.path().join("upload").join("a.txt");
    assert_eq!(std::fs::read_to_string(&saved).unwrap(), "xyz");
}

#[test]
fn test_redirect_location() {
    let dir = tempfile::tempdir().unwrap();
    let mut old_loc = location("/old", &["GET"]);
    old_loc.redirect = Some((301, "/static".to_string()));
    let cfg = ServerConfig {
        port: 8200,
        root: dir.path().to_str().unwrap().to_string(),
        locations: vec![old_loc],
        ..Default::default()
    };
    start_server(vec![cfg]);

    let res = send_and_read(8200, b"GET /old HTTP/1.1\r\nHost: x\r\n\r\n");
    assert!(
        res.starts_with("HTTP/1.1 301 Moved Permanently\r\n"),
        "got: {res}"
    );
    assert!(res.contains("Location: /static\r\n"));
}

#[test]
fn test_cookies_emitted() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("index.html"), "hi").unwrap();
    let cfg = ServerConfig {
        port: 8201,
        root: dir.path().to_str().unwrap().to_string(),
        locations: vec![location("/", &["GET"])],
        ..Default::default()
    };
    start_server(vec![cfg]);

    let res = send_and_read(8201, b"GET / HTTP/1.1\r\nHost: x\r\n\r\n");
    assert!(res.contains("Set-Cookie: server=webserv/1.0"), "got: {res}");
    assert!(res.contains("Set-Cookie: visits=1"));
    assert!(res.contains("Set-Cookie: session_id="));
}

#[test]
fn test_put_is_accepted_noop() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = ServerConfig {
        port: 8202,
        root: dir.path().to_str().unwrap().to_string(),
        locations: vec![location("/", &["GET", "PUT"])],
        ..Default::default()
    };
    start_server(vec![cfg]);

    let res = send_and_read(
        8202,
        b"PUT /anything HTTP/1.1\r\nHost: x\r\nContent-Length: 4\r\n\r\ndata",
    );
    assert!(res.starts_with("HTTP/1.1 200 OK\r\n"), "got: {res}");
    assert!(!dir.path().join("anything").exists());
}

#[test]
fn test_unknown_path_is_404() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = ServerConfig {
        port: 8203,
        root: dir.path().to_str().unwrap().to_string(),
        locations: vec![location("/", &["GET"])],
        ..Default::default()
    };
    start_server(vec![cfg]);

    let res = send_and_read(8203, b"GET /missing.html HTTP/1.1\r\nHost: x\r\n\r\n");
    assert!(res.starts_with("HTTP/1.1 404 Not Found\r\n"), "got: {res}");
}

#[test]
fn test_post_echo() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = ServerConfig {
        port: 8204,
        root: dir.path().to_str().unwrap().to_string(),
        locations: vec![location("/", &["GET", "POST"])],
        ..Default::default()
    };
    start_server(vec![cfg]);

    let res = send_and_read(
        8204,
        b"POST /note HTTP/1.1\r\nHost: x\r\nContent-Length: 9\r\n\r\nping pong",
    );
    assert!(res.starts_with("HTTP/1.1 200 OK\r\n"), "got: {res}");
    assert!(res.ends_with("ping pong"));
}
