use std::collections::HashMap;

// --- Defaults ---
pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_MAX_BODY_SIZE: usize = 1_048_576; // 1MB
pub const DEFAULT_CLIENT_TIMEOUT: u64 = 60;
pub const DEFAULT_ROOT: &str = "./www";
pub const DEFAULT_FILE: &str = "index.html";

#[derive(Debug, Clone)]
pub struct LocationConfig {
    pub path: String,
    pub methods: Vec<String>,
    pub root: String,        // empty -> inherit the server root
    pub index: Vec<String>,  // empty -> inherit the server index list
    pub autoindex: bool,
    pub client_max_body_size: Option<usize>,
    pub cgi_pass: String, // empty if none
    pub redirect: Option<(u16, String)>,
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            path: "/".to_string(),
            methods: vec!["GET".to_string()],
            root: String::new(),
            index: Vec::new(),
            autoindex: false,
            client_max_body_size: None,
            cgi_pass: String::new(),
            redirect: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub server_names: Vec<String>,
    pub root: String,
    pub index: Vec<String>,
    pub client_timeout: u64,
    pub client_max_body_size: usize,
    pub error_pages: HashMap<u16, String>,
    pub locations: Vec<LocationConfig>,
    pub cgi_handlers: HashMap<String, String>, // ".py" -> "/usr/bin/python3"
    pub secure_cookies: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            server_names: Vec::new(),
            root: DEFAULT_ROOT.to_string(),
            index: vec![DEFAULT_FILE.to_string()],
            client_timeout: DEFAULT_CLIENT_TIMEOUT,
            client_max_body_size: DEFAULT_MAX_BODY_SIZE,
            error_pages: HashMap::new(),
            locations: Vec::new(),
            cgi_handlers: HashMap::new(),
            secure_cookies: false,
        }
    }
}

impl ServerConfig {
    /// Location-level limit wins over the server-level one.
    pub fn body_limit(&self, location: Option<&LocationConfig>) -> usize {
        location
            .and_then(|l| l.client_max_body_size)
            .unwrap_or(self.client_max_body_size)
    }

    pub fn effective_root<'a>(&'a self, location: &'a LocationConfig) -> &'a str {
        if location.root.is_empty() {
            &self.root
        } else {
            &location.root
        }
    }

    pub fn effective_index<'a>(&'a self, location: &'a LocationConfig) -> &'a [String] {
        if location.index.is_empty() {
            &self.index
        } else {
            &location.index
        }
    }

    /// CGI handler for the path's extension, if one is configured.
    pub fn cgi_handler_for(&self, path: &str) -> Option<&str> {
        let dot = path.rfind('.')?;
        let ext = &path[dot..];
        self.cgi_handlers.get(ext).map(|s| s.as_str())
    }
}
