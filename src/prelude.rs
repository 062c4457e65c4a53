pub use crate::config::{LocationConfig, ServerConfig};
pub use crate::error::Result;
pub use crate::http::connection::{ClientPhase, HttpConnection};
pub use crate::http::request::{HttpRequest, Method, ParseError, ParseProgress, ParsingState};
pub use crate::http::response::{get_mime_type, HttpResponse, ResponseBody};
pub use crate::router::{self, RoutingError};
pub use crate::session::SessionStore;
pub use crate::utils::set_cookie::SetCookie;

pub use mio::{
    event::Event,
    net::{TcpListener, TcpStream},
    Events, Interest, Poll, Token,
};
pub use weblog::{LogLevel, Logger};

pub use std::collections::HashMap;
pub use std::fs::{self, File, OpenOptions};
pub use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
pub use std::net::SocketAddr;
pub use std::path::{Path, PathBuf};
pub use std::sync::Arc;
pub use std::time::{Duration, Instant, SystemTime};

pub const READ_BUF_SIZE: usize = 4096;
pub const STREAM_CHUNK_SIZE: usize = 8192;
pub const UPLOAD_CHUNK_SIZE: usize = 64 * 1024;
pub const MAX_READ_DATA: usize = u16::MAX as usize; // 64KB

pub const SERVER_SOFTWARE: &str = "webserv/1.0";

// 2xx / 3xx
pub const HTTP_OK: u16 = 200;
pub const HTTP_CREATED: u16 = 201;
pub const HTTP_NO_CONTENT: u16 = 204;
pub const HTTP_MOVED_PERMANENTLY: u16 = 301;
pub const HTTP_FOUND: u16 = 302;

// 4xx Client Errors
pub const HTTP_BAD_REQUEST: u16 = 400;
pub const HTTP_FORBIDDEN: u16 = 403;
pub const HTTP_NOT_FOUND: u16 = 404;
pub const HTTP_METHOD_NOT_ALLOWED: u16 = 405;
pub const HTTP_PAYLOAD_TOO_LARGE: u16 = 413;
pub const HTTP_URI_TOO_LONG: u16 = 414;

// 5xx Server Errors
pub const HTTP_INTERNAL_SERVER_ERROR: u16 = 500;
pub const HTTP_NOT_IMPLEMENTED: u16 = 501;
pub const HTTP_GATEWAY_TIMEOUT: u16 = 504;

pub const IDLE_TIMEOUT: Duration = Duration::from_secs(60);
pub const KEEP_ALIVE_TIMEOUT: Duration = Duration::from_secs(60);
pub const CGI_TIMEOUT: Duration = Duration::from_secs(30);
pub const POLL_TIMEOUT: Duration = Duration::from_secs(1);
pub const SESSION_TTL: u64 = 1800;
pub const SESSION_CLEANUP_INTERVAL: Duration = Duration::from_secs(300);

// FD_SETSIZE minus headroom for listeners, spill files and CGI pipes.
pub const MAX_CLIENTS: usize = 1024 - 10;
