use crate::prelude::*;

#[derive(Debug, PartialEq)]
pub enum RoutingError {
    NotFound,
    MethodNotAllowed,
}

/// Virtual-host selection for one listening endpoint. `candidates` are
/// arena indices in declaration order; a `Host` header that matches no
/// `server_name` falls back to the first-declared server.
pub fn resolve_server(
    configs: &[ServerConfig],
    candidates: &[usize],
    host_header: Option<&str>,
) -> usize {
    if let Some(host) = host_header {
        let hostname = host.split(':').next().unwrap_or("");
        for &idx in candidates {
            if configs[idx]
                .server_names
                .iter()
                .any(|name| name == hostname)
            {
                return idx;
            }
        }
    }
    candidates.first().copied().unwrap_or(0)
}

/// Two-pass location selection: suffix patterns (`~ .py$`) first, then an
/// exact match, then the longest proper prefix.
pub fn find_location<'a>(cfg: &'a ServerConfig, path: &str) -> Option<&'a LocationConfig> {
    for location in &cfg.locations {
        if let Some(rest) = location.path.strip_prefix('~') {
            let pattern = rest.trim().split_whitespace().next().unwrap_or("");
            let pattern = pattern.strip_suffix('$').unwrap_or(pattern);
            if !pattern.is_empty() && path.ends_with(pattern) {
                return Some(location);
            }
        }
    }

    let mut prefix_match: Option<&LocationConfig> = None;
    let mut prefix_len = 0;

    for location in &cfg.locations {
        if location.path.starts_with('~') {
            continue;
        }
        if location.path == path {
            return Some(location);
        }
        if path.starts_with(&location.path) && location.path.len() > prefix_len {
            prefix_match = Some(location);
            prefix_len = location.path.len();
        }
    }

    prefix_match
}

/// Resolve a location and consult its method allowlist.
pub fn route<'a>(
    cfg: &'a ServerConfig,
    path: &str,
    method: &Method,
) -> std::result::Result<&'a LocationConfig, RoutingError> {
    let location = find_location(cfg, path).ok_or(RoutingError::NotFound)?;
    if !method.is_allowed(&location.methods) {
        return Err(RoutingError::MethodNotAllowed);
    }
    Ok(location)
}
