use std::os::unix::fs::PermissionsExt;

use crate::http::request::find_subsequence;
use crate::http::response::error_response;
use crate::prelude::*;

#[derive(Debug, Default)]
pub struct PartInfo {
    pub name: String,
    pub filename: Option<String>,
    pub content_type: String,
}

#[derive(Debug)]
pub struct FilePart<'a> {
    pub filename: String,
    pub content: &'a [u8],
}

/// `boundary=...` parameter of a multipart Content-Type.
pub fn extract_boundary(content_type: &str) -> Option<String> {
    content_type
        .split("boundary=")
        .nth(1)
        .map(|b| b.trim().trim_matches('"').to_string())
        .filter(|b| !b.is_empty())
}

pub fn parse_part_headers(headers: &str) -> PartInfo {
    let mut info = PartInfo::default();

    for line in headers.lines() {
        if line.starts_with("Content-Disposition:") {
            if let Some(n) = line.split(';').find(|s| s.trim().starts_with("name=")) {
                info.name = n
                    .split('=')
                    .nth(1)
                    .unwrap_or("")
                    .trim_matches('"')
                    .to_string();
            }
            if let Some(f) = line.split(';').find(|s| s.trim().starts_with("filename=")) {
                info.filename = Some(
                    f.split('=')
                        .nth(1)
                        .unwrap_or("")
                        .trim_matches('"')
                        .to_string(),
                );
            }
        } else if line.starts_with("Content-Type:") {
            info.content_type = line.split(':').nth(1).unwrap_or("").trim().to_string();
        }
    }
    info
}

/// Walk a complete multipart body and collect the file parts. Part content
/// runs from the blank line after its headers up to the CRLF before the
/// next delimiter.
pub fn parse_multipart<'a>(body: &'a [u8], boundary: &str) -> Vec<FilePart<'a>> {
    let delim = format!("--{}", boundary).into_bytes();
    let mut parts = Vec::new();

    let mut pos = match find_subsequence(body, &delim) {
        Some(p) => p,
        None => return parts,
    };

    loop {
        let after = pos + delim.len();
        if body[after..].starts_with(b"--") {
            break; // closing delimiter
        }
        let headers_start = if body[after..].starts_with(b"\r\n") {
            after + 2
        } else {
            after
        };

        let sep = match find_subsequence(&body[headers_start..], b"\r\n\r\n") {
            Some(s) => s,
            None => break,
        };
        let headers = String::from_utf8_lossy(&body[headers_start..headers_start + sep]);
        let info = parse_part_headers(&headers);

        let content_start = headers_start + sep + 4;
        let next = match find_subsequence(&body[content_start..], &delim) {
            Some(n) => n,
            None => break,
        };
        let mut content_end = content_start + next;
        if content_end >= content_start + 2 && &body[content_end - 2..content_end] == b"\r\n" {
            content_end -= 2;
        }

        if let Some(raw_name) = info.filename {
            let filename = sanitize_filename(&raw_name);
            if !filename.is_empty() {
                parts.push(FilePart {
                    filename,
                    content: &body[content_start..content_end],
                });
            }
        }

        pos = content_start + next;
    }

    parts
}

/// Keep `[A-Za-z0-9._- ]` and the final path component only; everything
/// else is dropped.
pub fn sanitize_filename(name: &str) -> String {
    let base = Path::new(name)
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("");

    let sanitized: String = base
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-' | ' '))
        .collect();

    if sanitized.is_empty() || sanitized.chars().all(|c| c == '.') {
        String::new()
    } else {
        sanitized
    }
}

fn save_part(target: &Path, content: &[u8]) -> std::io::Result<()> {
    let mut file = File::create(target)?;
    for chunk in content.chunks(UPLOAD_CHUNK_SIZE) {
        file.write_all(chunk)?;
    }
    Ok(())
}

/// POST multipart/form-data: persist every file part under the location's
/// upload directory, created on demand with mode 0755.
pub fn handle_upload(
    request: &HttpRequest,
    location: &LocationConfig,
    cfg: &ServerConfig,
    logger: &Logger,
) -> HttpResponse {
    let content_type = request.header("content-type").unwrap_or("");
    let boundary = match extract_boundary(content_type) {
        Some(b) => b,
        None => return error_response(HTTP_BAD_REQUEST, Some(cfg)),
    };

    let parts = parse_multipart(&request.body, &boundary);
    if parts.is_empty() {
        return error_response(HTTP_BAD_REQUEST, Some(cfg));
    }

    let root = cfg.effective_root(location).trim_end_matches('/');
    let dir = PathBuf::from(root).join(location.path.trim_start_matches('/'));
    if !dir.is_dir() {
        if fs::create_dir_all(&dir).is_err() {
            return error_response(HTTP_INTERNAL_SERVER_ERROR, Some(cfg));
        }
        let _ = fs::set_permissions(&dir, fs::Permissions::from_mode(0o755));
    }

    for part in &parts {
        let target = dir.join(&part.filename);
        if let Err(e) = save_part(&target, part.content) {
            logger.error(&format!("upload to {} failed: {}", target.display(), e));
            return error_response(HTTP_INTERNAL_SERVER_ERROR, Some(cfg));
        }
        logger.info(&format!(
            "uploaded {} ({} bytes)",
            target.display(),
            part.content.len()
        ));
    }

    let mut res = HttpResponse::new(HTTP_CREATED);
    res.set_body(b"File uploaded successfully".to_vec(), "text/plain");
    res
}
