use crate::handlers::get_handler::map_path;
use crate::http::response::error_response;
use crate::prelude::*;

/// DELETE unlinks regular files only: directories answer 403, missing
/// targets 404, anything else 500.
pub fn handle_delete(
    request: &HttpRequest,
    location: &LocationConfig,
    cfg: &ServerConfig,
    logger: &Logger,
) -> HttpResponse {
    let target = map_path(request, location, cfg);

    let metadata = match fs::metadata(&target) {
        Ok(m) => m,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return error_response(HTTP_NOT_FOUND, Some(cfg))
        }
        Err(_) => return error_response(HTTP_INTERNAL_SERVER_ERROR, Some(cfg)),
    };

    if metadata.is_dir() {
        return error_response(HTTP_FORBIDDEN, Some(cfg));
    }

    match fs::remove_file(&target) {
        Ok(()) => {
            logger.info(&format!("deleted {}", target.display()));
            let mut res = HttpResponse::new(HTTP_OK);
            res.set_body(b"File deleted successfully".to_vec(), "text/plain");
            res
        }
        Err(e) => {
            logger.error(&format!("delete {} failed: {}", target.display(), e));
            error_response(HTTP_INTERNAL_SERVER_ERROR, Some(cfg))
        }
    }
}
