use webserv::config::parser::parse_size;
use webserv::config::parse_config;

#[test]
fn test_minimal_server_block() {
    let conf = "
server {
    host 0.0.0.0
    port 8080
}
";
    let configs = parse_config(conf).expect("should parse");
    assert_eq!(configs.len(), 1);
    assert_eq!(configs[0].host, "0.0.0.0");
    assert_eq!(configs[0].port, 8080);
    assert_eq!(configs[0].index, vec!["index.html".to_string()]);
}

#[test]
fn test_full_server_block() {
    let conf = r#"
# main virtual host
server {
    host 127.0.0.1
    port 9090
    server_name example.com www.example.com
    root /var/www/example
    index index.html index.htm
    client_timeout 30
    client_max_body_size 2m
    error_page 404 /404.html
    error_page 500 /500.html
    secure_cookies on

    cgi {
        .py /usr/bin/python3;
        sh /bin/sh;
    }

    location / {
        allowed_methods GET POST DELETE
        autoindex on
    }

    location /api {
        root /var/www/api
        client_max_body_size 512k
        cgi_pass /usr/bin/python3
    }

    location /old {
        return 301 https://example.com/new
    }
}
"#;
    let configs = parse_config(conf).expect("should parse");
    let server = &configs[0];

    assert_eq!(server.host, "127.0.0.1");
    assert_eq!(server.port, 9090);
    assert_eq!(
        server.server_names,
        vec!["example.com".to_string(), "www.example.com".to_string()]
    );
    assert_eq!(server.root, "/var/www/example");
    assert_eq!(
        server.index,
        vec!["index.html".to_string(), "index.htm".to_string()]
    );
    assert_eq!(server.client_timeout, 30);
    assert_eq!(server.client_max_body_size, 2 * 1024 * 1024);
    assert_eq!(server.error_pages.get(&404).unwrap(), "/404.html");
    assert_eq!(server.error_pages.get(&500).unwrap(), "/500.html");
    assert!(server.secure_cookies);

    // Extensions are normalized to carry the leading dot.
    assert_eq!(server.cgi_handlers.get(".py").unwrap(), "/usr/bin/python3");
    assert_eq!(server.cgi_handlers.get(".sh").unwrap(), "/bin/sh");

    assert_eq!(server.locations.len(), 3);
    let root_loc = &server.locations[0];
    assert_eq!(root_loc.path, "/");
    assert_eq!(
        root_loc.methods,
        vec!["GET".to_string(), "POST".to_string(), "DELETE".to_string()]
    );
    assert!(root_loc.autoindex);

    let api_loc = &server.locations[1];
    assert_eq!(api_loc.root, "/var/www/api");
    assert_eq!(api_loc.client_max_body_size, Some(512 * 1024));
    assert_eq!(api_loc.cgi_pass, "/usr/bin/python3");

    let old_loc = &server.locations[2];
    assert_eq!(
        old_loc.redirect,
        Some((301, "https://example.com/new".to_string()))
    );
}

#[test]
fn test_multiple_servers() {
    let conf = "
server {
    port 8081
    server_name one
}
server {
    port 8082
    server_name two
}
";
    let configs = parse_config(conf).expect("should parse");
    assert_eq!(configs.len(), 2);
    assert_eq!(configs[0].server_names, vec!["one".to_string()]);
    assert_eq!(configs[1].server_names, vec!["two".to_string()]);
}

#[test]
fn test_semicolon_terminators_accepted() {
    let conf = "
server {
    host 127.0.0.1;
    port 8083;
    root ./www;
}
";
    let configs = parse_config(conf).expect("should parse");
    assert_eq!(configs[0].port, 8083);
    assert_eq!(configs[0].root, "./www");
}

#[test]
fn test_suffix_location_pattern_is_preserved() {
    let conf = "
server {
    port 8084
    location ~ .py$ {
        cgi_pass /usr/bin/python3
    }
}
";
    let configs = parse_config(conf).expect("should parse");
    assert_eq!(configs[0].locations[0].path, "~ .py$");
}

#[test]
fn test_rejects_top_level_garbage() {
    assert!(parse_config("listen 8080\n").is_err());
}

#[test]
fn test_rejects_unknown_directive() {
    let conf = "
server {
    port 8085
    proxy_pass http://upstream
}
";
    let err = parse_config(conf).unwrap_err();
    assert!(err.message.contains("proxy_pass"));
    assert!(err.loc.is_some());
}

#[test]
fn test_rejects_bad_port() {
    assert!(parse_config("server { port 0 }").is_err());
    assert!(parse_config("server { port 70000 }").is_err());
}

#[test]
fn test_rejects_bad_redirect_code() {
    let conf = "
server {
    port 8086
    location /x {
        return 303 /y
    }
}
";
    assert!(parse_config(conf).is_err());
}

#[test]
fn test_rejects_bad_error_page_code() {
    assert!(parse_config("server { error_page 42 /x.html }").is_err());
}

#[test]
fn test_rejects_empty_config() {
    assert!(parse_config("").is_err());
    assert!(parse_config("# just a comment\n").is_err());
}

#[test]
fn test_allowed_methods_filters_unknown_tokens() {
    let conf = "
server {
    port 8087
    location / {
        allowed_methods GET BREW POST
    }
}
";
    let configs = parse_config(conf).expect("should parse");
    assert_eq!(
        configs[0].locations[0].methods,
        vec!["GET".to_string(), "POST".to_string()]
    );
}

#[test]
fn test_parse_size_suffixes() {
    assert_eq!(parse_size("100").unwrap(), 100);
    assert_eq!(parse_size("2k").unwrap(), 2048);
    assert_eq!(parse_size("2K").unwrap(), 2048);
    assert_eq!(parse_size("10m").unwrap(), 10 * 1024 * 1024);
    assert_eq!(parse_size("1G").unwrap(), 1024 * 1024 * 1024);
    assert_eq!(parse_size("1gb").unwrap(), 1024 * 1024 * 1024);
    assert!(parse_size("10x").is_err());
    assert!(parse_size("").is_err());
}
