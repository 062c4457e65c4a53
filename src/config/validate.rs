use std::collections::HashMap;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use crate::config::types::ServerConfig;

/// Startup validation. Every problem is collected so the operator sees the
/// full list before the process exits.
pub fn validate_configs(configs: &[ServerConfig]) -> Result<(), Vec<String>> {
    let mut errors = Vec::new();

    // Exact endpoint conflicts: same host:port claimed under the same name.
    let mut usage_map: HashMap<(String, u16, String), Vec<usize>> = HashMap::new();
    for (idx, config) in configs.iter().enumerate() {
        let name = config
            .server_names
            .first()
            .cloned()
            .unwrap_or_else(|| config.host.clone());
        usage_map
            .entry((config.host.clone(), config.port, name))
            .or_default()
            .push(idx);
    }
    for ((host, port, name), indices) in &usage_map {
        if indices.len() > 1 {
            errors.push(format!(
                "multiple servers defined for {}:{} with name '{}'",
                host, port, name
            ));
        }
    }

    for config in configs {
        let label = config
            .server_names
            .first()
            .map(|s| s.as_str())
            .unwrap_or(config.host.as_str());

        // Document roots are created on demand.
        let mut roots = vec![config.root.clone()];
        for location in &config.locations {
            if !location.root.is_empty() {
                roots.push(location.root.clone());
            }
        }
        for root in roots {
            if let Err(e) = ensure_directory(&root) {
                errors.push(format!(
                    "server '{}': cannot create root directory '{}': {}",
                    label, root, e
                ));
            }
        }

        // Error pages must exist under the server root.
        for (code, page) in &config.error_pages {
            let path = Path::new(&config.root).join(page.trim_start_matches('/'));
            if !path.is_file() {
                errors.push(format!(
                    "server '{}': error page for {} not found at {}",
                    label,
                    code,
                    path.display()
                ));
            }
        }

        // Duplicate location paths shadow each other.
        let mut seen = Vec::new();
        for location in &config.locations {
            if seen.contains(&&location.path) {
                errors.push(format!(
                    "server '{}': duplicate location '{}'",
                    label, location.path
                ));
            }
            seen.push(&location.path);
        }

        for (ext, handler) in &config.cgi_handlers {
            if !handler_resolves(handler) {
                errors.push(format!(
                    "server '{}': cgi handler for '{}' is not executable: {}",
                    label, ext, handler
                ));
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn ensure_directory(path: &str) -> std::io::Result<()> {
    let p = Path::new(path);
    if !p.is_dir() {
        fs::create_dir_all(p)?;
        fs::set_permissions(p, fs::Permissions::from_mode(0o755))?;
    }
    Ok(())
}

fn is_executable(path: &Path) -> bool {
    fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

/// Accepts absolute handler paths and the `/usr/bin/env <cmd>` indirection.
fn handler_resolves(handler: &str) -> bool {
    let mut parts = handler.split_whitespace();
    let program = match parts.next() {
        Some(p) => p,
        None => return false,
    };

    if program == "/usr/bin/env" {
        let cmd = match parts.next() {
            Some(c) => c,
            None => return false,
        };
        return ["/usr/bin", "/usr/local/bin", "/bin"]
            .iter()
            .any(|dir| is_executable(&Path::new(dir).join(cmd)));
    }

    is_executable(Path::new(program))
}
