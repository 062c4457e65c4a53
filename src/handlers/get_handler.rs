use crate::handlers::autoindex;
use crate::http::response::error_response;
use crate::prelude::*;

/// Filesystem mapping: the location's root plus the request path with the
/// location prefix stripped. Suffix-pattern locations keep the full path.
pub fn map_path(request: &HttpRequest, location: &LocationConfig, cfg: &ServerConfig) -> PathBuf {
    let root = cfg.effective_root(location).trim_end_matches('/');
    let relative = if location.path.starts_with('~') {
        request.path.as_str()
    } else {
        request
            .path
            .strip_prefix(location.path.as_str())
            .unwrap_or(&request.path)
    };
    PathBuf::from(root).join(relative.trim_start_matches('/'))
}

pub fn handle_get(
    request: &HttpRequest,
    location: &LocationConfig,
    cfg: &ServerConfig,
) -> HttpResponse {
    if request.path.split('/').any(|seg| seg == "..") {
        return error_response(HTTP_FORBIDDEN, Some(cfg));
    }

    let mut path = map_path(request, location, cfg);

    if path.is_dir() {
        match cfg
            .effective_index(location)
            .iter()
            .map(|index| path.join(index))
            .find(|candidate| candidate.is_file())
        {
            Some(index_path) => path = index_path,
            None => {
                if location.autoindex {
                    return autoindex::generate(&path, &request.path, cfg);
                }
                return error_response(HTTP_FORBIDDEN, Some(cfg));
            }
        }
    }

    serve_file(&path, cfg)
}

pub fn serve_file(path: &Path, cfg: &ServerConfig) -> HttpResponse {
    match File::open(path) {
        Ok(file) => {
            let Ok(metadata) = file.metadata() else {
                return error_response(HTTP_INTERNAL_SERVER_ERROR, Some(cfg));
            };
            let mime = get_mime_type(path.extension().and_then(|s| s.to_str()));
            let mut res = HttpResponse::new(HTTP_OK);
            res.set_file(file, metadata.len(), mime);
            res
        }
        Err(e) => match e.kind() {
            ErrorKind::NotFound => error_response(HTTP_NOT_FOUND, Some(cfg)),
            ErrorKind::PermissionDenied => error_response(HTTP_FORBIDDEN, Some(cfg)),
            _ => error_response(HTTP_INTERNAL_SERVER_ERROR, Some(cfg)),
        },
    }
}
