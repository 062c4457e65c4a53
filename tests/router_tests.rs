use webserv::config::{LocationConfig, ServerConfig};
use webserv::http::request::Method;
use webserv::router::{self, RoutingError};

fn location(path: &str, methods: &[&str]) -> LocationConfig {
    LocationConfig {
        path: path.to_string(),
        methods: methods.iter().map(|m| m.to_string()).collect(),
        ..Default::default()
    }
}

fn server_with(locations: Vec<LocationConfig>) -> ServerConfig {
    ServerConfig {
        locations,
        ..Default::default()
    }
}

#[test]
fn test_exact_match_beats_prefix() {
    let cfg = server_with(vec![
        location("/", &["GET"]),
        location("/files", &["GET"]),
    ]);

    let found = router::find_location(&cfg, "/files").unwrap();
    assert_eq!(found.path, "/files");
}

#[test]
fn test_longest_prefix_wins() {
    let cfg = server_with(vec![
        location("/a", &["GET"]),
        location("/a/b", &["GET"]),
        location("/", &["GET"]),
    ]);

    let found = router::find_location(&cfg, "/a/b/c").unwrap();
    assert_eq!(found.path, "/a/b");
}

#[test]
fn test_suffix_pattern_has_priority() {
    let cfg = server_with(vec![
        location("/", &["GET"]),
        location("/scripts", &["GET"]),
        location("~ .py$", &["GET", "POST"]),
    ]);

    let found = router::find_location(&cfg, "/scripts/run.py").unwrap();
    assert_eq!(found.path, "~ .py$");

    // The anchor marker is ignored for matching but the suffix must hold.
    let found = router::find_location(&cfg, "/scripts/readme.txt").unwrap();
    assert_eq!(found.path, "/scripts");
}

#[test]
fn test_no_location_configured() {
    let cfg = server_with(vec![location("/api", &["GET"])]);
    assert!(router::find_location(&cfg, "/other").is_none());
    assert_eq!(
        router::route(&cfg, "/other", &Method::GET).unwrap_err(),
        RoutingError::NotFound
    );
}

#[test]
fn test_method_allowlist() {
    let cfg = server_with(vec![location("/api", &["GET"])]);

    assert!(router::route(&cfg, "/api", &Method::GET).is_ok());
    assert_eq!(
        router::route(&cfg, "/api", &Method::DELETE).unwrap_err(),
        RoutingError::MethodNotAllowed
    );
    assert_eq!(
        router::route(&cfg, "/api", &Method::POST).unwrap_err(),
        RoutingError::MethodNotAllowed
    );
}

#[test]
fn test_vhost_selection_by_host_header() {
    let mut one = ServerConfig::default();
    one.server_names = vec!["one.example".to_string()];
    let mut two = ServerConfig::default();
    two.server_names = vec!["two.example".to_string()];

    let configs = vec![one, two];
    let candidates = vec![0, 1];

    assert_eq!(
        router::resolve_server(&configs, &candidates, Some("two.example")),
        1
    );
    // The port part of the Host header is ignored.
    assert_eq!(
        router::resolve_server(&configs, &candidates, Some("two.example:8080")),
        1
    );
}

#[test]
fn test_vhost_falls_back_to_first_declared() {
    let mut one = ServerConfig::default();
    one.server_names = vec!["one.example".to_string()];
    let mut two = ServerConfig::default();
    two.server_names = vec!["two.example".to_string()];

    let configs = vec![one, two];
    let candidates = vec![0, 1];

    assert_eq!(
        router::resolve_server(&configs, &candidates, Some("unknown.example")),
        0
    );
    assert_eq!(router::resolve_server(&configs, &candidates, None), 0);
}

#[test]
fn test_body_limit_inheritance() {
    let mut loc = location("/upload", &["POST"]);
    loc.client_max_body_size = Some(64);
    let cfg = server_with(vec![loc, location("/", &["GET"])]);

    let upload = router::find_location(&cfg, "/upload").unwrap();
    assert_eq!(cfg.body_limit(Some(upload)), 64);

    let root = router::find_location(&cfg, "/").unwrap();
    assert_eq!(cfg.body_limit(Some(root)), cfg.client_max_body_size);
    assert_eq!(cfg.body_limit(None), cfg.client_max_body_size);
}

#[test]
fn test_effective_root_and_index() {
    let mut loc = location("/files", &["GET"]);
    loc.root = "/srv/files".to_string();
    loc.index = vec!["main.html".to_string()];
    let cfg = server_with(vec![loc, location("/", &["GET"])]);

    let files = router::find_location(&cfg, "/files/x").unwrap();
    assert_eq!(cfg.effective_root(files), "/srv/files");
    assert_eq!(cfg.effective_index(files), ["main.html".to_string()]);

    let root = router::find_location(&cfg, "/x").unwrap();
    assert_eq!(cfg.effective_root(root), cfg.root);
    assert_eq!(cfg.effective_index(root), cfg.index.as_slice());
}
