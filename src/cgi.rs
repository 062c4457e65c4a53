use std::os::fd::AsRawFd;
use std::process::{Child, Command, Stdio};
use std::thread;

use crate::http::response::error_response;
use crate::prelude::*;

const CGI_PIPE_BUFSIZE: usize = 1024 * 1024;
const CGI_HEAD_SCAN: usize = 16 * 1024;
const DRAIN_PAUSE: Duration = Duration::from_millis(2);

/// Execute a CGI/1.1 handler and turn its output into a response. Internal
/// failures never escape as errors; they become 5xx responses.
pub fn execute(
    request: &HttpRequest,
    handler: &str,
    script_path: &Path,
    cfg: &ServerConfig,
    peer: SocketAddr,
    logger: &Logger,
) -> HttpResponse {
    match run(request, handler, script_path, cfg, peer, logger) {
        Ok(res) => res,
        Err(code) => error_response(code, Some(cfg)),
    }
}

fn run(
    request: &HttpRequest,
    handler: &str,
    script_path: &Path,
    cfg: &ServerConfig,
    peer: SocketAddr,
    logger: &Logger,
) -> std::result::Result<HttpResponse, u16> {
    let script = script_path
        .canonicalize()
        .map_err(|_| HTTP_NOT_FOUND)?;

    // Body spill: the child reads the (already de-chunked) body from a
    // rewound temp file on stdin.
    let mut stdin_spill = tempfile::tempfile().map_err(|_| HTTP_INTERNAL_SERVER_ERROR)?;
    stdin_spill
        .write_all(&request.body)
        .and_then(|_| stdin_spill.seek(SeekFrom::Start(0)))
        .map_err(|_| HTTP_INTERNAL_SERVER_ERROR)?;

    let mut parts = handler.split_whitespace();
    let program = parts.next().ok_or(HTTP_INTERNAL_SERVER_ERROR)?;

    let mut cmd = Command::new(program);
    for arg in parts {
        cmd.arg(arg);
    }
    cmd.arg(&script)
        .env_clear()
        .envs(build_cgi_env(request, &script, cfg, peer))
        .stdin(Stdio::from(stdin_spill))
        .stdout(Stdio::piped())
        .stderr(Stdio::null());
    if let Some(dir) = script.parent() {
        cmd.current_dir(dir);
    }

    logger.info(&format!("cgi: {} {}", handler, script.display()));

    let mut child = cmd.spawn().map_err(|e| {
        logger.error(&format!("cgi spawn failed: {}", e));
        HTTP_INTERNAL_SERVER_ERROR
    })?;

    let mut stdout = child.stdout.take().ok_or(HTTP_INTERNAL_SERVER_ERROR)?;
    unsafe {
        let fd = stdout.as_raw_fd();
        let flags = libc::fcntl(fd, libc::F_GETFL, 0);
        libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK);
        #[cfg(target_os = "linux")]
        libc::fcntl(fd, libc::F_SETPIPE_SZ, CGI_PIPE_BUFSIZE as libc::c_int);
    }

    let (out_spill, total) = drain_child(&mut child, &mut stdout, logger)?;
    parse_cgi_output(out_spill, total)
}

/// Pump the child's stdout into an output spill file under the wall-clock
/// timeout. Finishes only once the child is reaped and EOF was observed.
fn drain_child(
    child: &mut Child,
    stdout: &mut impl Read,
    logger: &Logger,
) -> std::result::Result<(File, u64), u16> {
    let mut out_spill = tempfile::tempfile().map_err(|_| {
        kill_child(child);
        HTTP_INTERNAL_SERVER_ERROR
    })?;

    let start = Instant::now();
    let mut buf = [0u8; 8192];
    let mut total: u64 = 0;
    let mut eof = false;
    let mut exit_status = None;

    loop {
        let mut progressed = false;

        if !eof {
            match stdout.read(&mut buf) {
                Ok(0) => eof = true,
                Ok(n) => {
                    out_spill.write_all(&buf[..n]).map_err(|_| {
                        kill_child(child);
                        HTTP_INTERNAL_SERVER_ERROR
                    })?;
                    total += n as u64;
                    progressed = true;
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => {}
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(_) => {
                    kill_child(child);
                    return Err(HTTP_INTERNAL_SERVER_ERROR);
                }
            }
        }

        if exit_status.is_none() {
            match child.try_wait() {
                Ok(Some(status)) => exit_status = Some(status),
                Ok(None) => {}
                Err(_) => {
                    kill_child(child);
                    return Err(HTTP_INTERNAL_SERVER_ERROR);
                }
            }
        }

        if eof && exit_status.is_some() {
            break;
        }

        if start.elapsed() > CGI_TIMEOUT {
            logger.warn("cgi handler exceeded the wall-clock timeout");
            kill_child(child);
            return Err(HTTP_GATEWAY_TIMEOUT);
        }

        if !progressed {
            thread::sleep(DRAIN_PAUSE);
        }
    }

    match exit_status {
        Some(status) if status.success() => Ok((out_spill, total)),
        Some(status) => {
            logger.error(&format!("cgi handler exited with {}", status));
            Err(HTTP_INTERNAL_SERVER_ERROR)
        }
        None => Err(HTTP_INTERNAL_SERVER_ERROR),
    }
}

fn kill_child(child: &mut Child) {
    unsafe {
        libc::kill(child.id() as libc::pid_t, libc::SIGTERM);
    }
    let _ = child.wait();
}

/// Split the CGI output into its header block and a streamed body. The
/// spill file is seeked past the terminator and attached as the source.
fn parse_cgi_output(
    mut out_spill: File,
    total: u64,
) -> std::result::Result<HttpResponse, u16> {
    out_spill
        .seek(SeekFrom::Start(0))
        .map_err(|_| HTTP_INTERNAL_SERVER_ERROR)?;

    let head_len = std::cmp::min(total, CGI_HEAD_SCAN as u64) as usize;
    let mut head = vec![0u8; head_len];
    out_spill
        .read_exact(&mut head)
        .map_err(|_| HTTP_INTERNAL_SERVER_ERROR)?;

    let (header_end, delim_len) =
        match crate::http::request::find_subsequence(&head, b"\r\n\r\n") {
            Some(pos) => (pos, 4),
            None => match crate::http::request::find_subsequence(&head, b"\n\n") {
                Some(pos) => (pos, 2),
                None => return Err(HTTP_INTERNAL_SERVER_ERROR),
            },
        };

    let (status, cgi_headers) = parse_cgi_headers(&head[..header_end]);

    let body_offset = (header_end + delim_len) as u64;
    out_spill
        .seek(SeekFrom::Start(body_offset))
        .map_err(|_| HTTP_INTERNAL_SERVER_ERROR)?;
    let remaining = total - body_offset;

    let mut res = HttpResponse::new(status);
    for (key, val) in cgi_headers {
        res.set_header(&key, &val);
    }
    res.set_header("content-length", &remaining.to_string());
    res.body = ResponseBody::Stream {
        file: out_spill,
        remaining,
    };
    Ok(res)
}

/// Header lines from the CGI output; `Status:` sets the response code and
/// is not forwarded.
pub fn parse_cgi_headers(bytes: &[u8]) -> (u16, Vec<(String, String)>) {
    let mut status = HTTP_OK;
    let mut headers = Vec::new();
    let content = String::from_utf8_lossy(bytes);

    for line in content.lines() {
        if let Some((key, val)) = line.split_once(':') {
            let key = key.trim().to_lowercase();
            let val = val.trim().to_string();

            if key == "status" {
                if let Some(code) = val
                    .split_whitespace()
                    .next()
                    .and_then(|s| s.parse::<u16>().ok())
                {
                    if (100..600).contains(&code) {
                        status = code;
                    }
                }
            } else {
                headers.push((key, val));
            }
        }
    }
    (status, headers)
}

pub fn build_cgi_env(
    request: &HttpRequest,
    script: &Path,
    cfg: &ServerConfig,
    peer: SocketAddr,
) -> HashMap<String, String> {
    let mut envs = HashMap::new();
    let script_str = script.to_string_lossy().into_owned();
    let request_uri = if request.query.is_empty() {
        request.path.clone()
    } else {
        format!("{}?{}", request.path, request.query)
    };
    let server_name = cfg
        .server_names
        .first()
        .cloned()
        .unwrap_or_else(|| cfg.host.clone());

    envs.insert("GATEWAY_INTERFACE".to_string(), "CGI/1.1".to_string());
    envs.insert("SERVER_PROTOCOL".to_string(), "HTTP/1.1".to_string());
    envs.insert("SERVER_SOFTWARE".to_string(), SERVER_SOFTWARE.to_string());
    envs.insert("SERVER_NAME".to_string(), server_name);
    envs.insert("SERVER_PORT".to_string(), cfg.port.to_string());
    envs.insert("REQUEST_METHOD".to_string(), request.method.to_string());
    envs.insert("REQUEST_URI".to_string(), request_uri);
    envs.insert("SCRIPT_NAME".to_string(), request.path.clone());
    envs.insert("SCRIPT_FILENAME".to_string(), script_str.clone());
    envs.insert("PATH_INFO".to_string(), request.path.clone());
    envs.insert("PATH_TRANSLATED".to_string(), script_str);
    envs.insert("QUERY_STRING".to_string(), request.query.clone());
    envs.insert("REMOTE_ADDR".to_string(), peer.ip().to_string());
    envs.insert("REDIRECT_STATUS".to_string(), "200".to_string());

    if request.method == Method::POST {
        envs.insert(
            "CONTENT_LENGTH".to_string(),
            request.body.len().to_string(),
        );
        if let Some(ct) = request.header("content-type") {
            envs.insert("CONTENT_TYPE".to_string(), ct.to_string());
        }
    }

    for (key, val) in &request.headers {
        let env_key = format!("HTTP_{}", key.to_uppercase().replace('-', "_"));
        envs.insert(env_key, val.clone());
    }

    envs
}
