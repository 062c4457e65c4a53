pub mod autoindex;
pub mod delete_handler;
pub mod get_handler;
pub mod post_handler;

use crate::http::response::error_response;
use crate::prelude::*;

/// Run the handler pipeline for one framed request and decorate the result
/// with the cookie side channel. Always returns a fully-formed response.
pub fn dispatch(
    request: &HttpRequest,
    cfg: &ServerConfig,
    peer: SocketAddr,
    sessions: &mut SessionStore,
    logger: &Logger,
) -> HttpResponse {
    let mut response = run_handlers(request, cfg, peer, logger);
    sessions.decorate_response(request, &mut response, cfg.secure_cookies);
    response
}

fn run_handlers(
    request: &HttpRequest,
    cfg: &ServerConfig,
    peer: SocketAddr,
    logger: &Logger,
) -> HttpResponse {
    let location = match router::route(cfg, &request.path, &request.method) {
        Ok(location) => location,
        Err(RoutingError::NotFound) => return error_response(HTTP_NOT_FOUND, Some(cfg)),
        Err(RoutingError::MethodNotAllowed) => {
            return error_response(HTTP_METHOD_NOT_ALLOWED, Some(cfg))
        }
    };

    if let Some((code, target)) = &location.redirect {
        return HttpResponse::redirect(*code, target);
    }

    if !request.body.is_empty() && request.body.len() > cfg.body_limit(Some(location)) {
        return error_response(HTTP_PAYLOAD_TOO_LARGE, Some(cfg));
    }

    // CGI dispatch: the extension must be mapped in the server's cgi block;
    // GET additionally requires the location to opt in via cgi_pass.
    if let Some(handler) = cfg.cgi_handler_for(&request.path) {
        let enabled = match request.method {
            Method::POST => true,
            Method::GET => !location.cgi_pass.is_empty(),
            _ => false,
        };
        if enabled {
            let script = get_handler::map_path(request, location, cfg);
            return crate::cgi::execute(request, handler, &script, cfg, peer, logger);
        }
    }

    match request.method {
        Method::GET => get_handler::handle_get(request, location, cfg),
        Method::POST => post_handler::handle_post(request, location, cfg, logger),
        Method::DELETE => delete_handler::handle_delete(request, location, cfg, logger),
        Method::PUT => {
            // Accepted but not persisted.
            let mut res = HttpResponse::new(HTTP_OK);
            res.set_body(b"OK".to_vec(), "text/plain");
            res
        }
        Method::HEAD => error_response(HTTP_NOT_IMPLEMENTED, Some(cfg)),
    }
}
