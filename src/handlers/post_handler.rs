use crate::prelude::*;
use crate::upload;

/// Non-CGI POST: multipart bodies are persisted as uploads, anything else
/// is echoed back.
pub fn handle_post(
    request: &HttpRequest,
    location: &LocationConfig,
    cfg: &ServerConfig,
    logger: &Logger,
) -> HttpResponse {
    let content_type = request.header("content-type").unwrap_or("");

    if content_type.starts_with("multipart/form-data") {
        return upload::handle_upload(request, location, cfg, logger);
    }

    let mut res = HttpResponse::new(HTTP_OK);
    res.set_body(request.body.clone(), "text/plain");
    res
}
