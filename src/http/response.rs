use crate::prelude::*;

#[derive(Debug)]
pub enum ResponseBody {
    Inline(Vec<u8>),
    /// Streamed from an owned descriptor; closed when the response (or the
    /// connection driving it) is dropped.
    Stream { file: File, remaining: u64 },
}

#[derive(Debug)]
pub struct HttpResponse {
    pub status_code: u16,
    pub headers: HashMap<String, String>,
    pub cookies: Vec<String>,
    pub body: ResponseBody,
}

impl HttpResponse {
    pub fn new(status_code: u16) -> Self {
        let mut headers = HashMap::from([("content-length".to_string(), "0".to_string())]);
        headers.insert("server".to_string(), SERVER_SOFTWARE.to_string());
        headers.insert(
            "date".to_string(),
            httpdate::fmt_http_date(SystemTime::now()),
        );
        Self {
            status_code,
            headers,
            cookies: Vec::new(),
            body: ResponseBody::Inline(Vec::new()),
        }
    }

    pub fn set_status_code(&mut self, code: u16) -> &mut Self {
        if (100..600).contains(&code) {
            self.status_code = code;
        }
        self
    }

    pub fn set_header(&mut self, key: &str, value: &str) -> &mut Self {
        self.headers.insert(key.to_lowercase(), value.to_string());
        self
    }

    pub fn set_body(&mut self, body: Vec<u8>, content_type: &str) -> &mut Self {
        self.headers
            .insert("content-length".to_string(), body.len().to_string());
        self.headers
            .insert("content-type".to_string(), content_type.to_string());
        self.body = ResponseBody::Inline(body);
        self
    }

    /// Stream the body from an open file; `len` becomes `Content-Length`.
    pub fn set_file(&mut self, file: File, len: u64, content_type: &str) -> &mut Self {
        self.headers
            .insert("content-length".to_string(), len.to_string());
        self.headers
            .insert("content-type".to_string(), content_type.to_string());
        self.body = ResponseBody::Stream {
            file,
            remaining: len,
        };
        self
    }

    pub fn add_cookie(&mut self, cookie: &SetCookie) -> &mut Self {
        self.cookies.push(cookie.to_header());
        self
    }

    pub fn status_text(code: u16) -> &'static str {
        match code {
            200 => "OK",
            201 => "Created",
            204 => "No Content",
            301 => "Moved Permanently",
            302 => "Found",
            400 => "Bad Request",
            401 => "Unauthorized",
            403 => "Forbidden",
            404 => "Not Found",
            405 => "Method Not Allowed",
            413 => "Payload Too Large",
            414 => "URI Too Long",
            415 => "Unsupported Media Type",
            500 => "Internal Server Error",
            501 => "Not Implemented",
            502 => "Bad Gateway",
            503 => "Service Unavailable",
            504 => "Gateway Timeout",
            _ => "Unknown",
        }
    }

    pub fn header_bytes(&self) -> Vec<u8> {
        let mut res = format!(
            "HTTP/1.1 {} {}\r\n",
            self.status_code,
            Self::status_text(self.status_code)
        );
        for (key, val) in &self.headers {
            res.push_str(&format!("{}: {}\r\n", to_pascal_case(key), val));
        }
        for cookie in &self.cookies {
            res.push_str(&format!("Set-Cookie: {}\r\n", cookie));
        }
        res.push_str("\r\n");
        res.into_bytes()
    }

    /// Serialize a fully-buffered response. Streaming responses serialize
    /// only their header block; the caller drains the file afterwards.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = self.header_bytes();
        if let ResponseBody::Inline(body) = &self.body {
            out.extend_from_slice(body);
        }
        out
    }

    /// Split into the serialized header block (plus inline body) and an
    /// optional file source still to be streamed.
    pub fn into_parts(self) -> (Vec<u8>, Option<(File, u64)>) {
        let head = self.to_bytes();
        match self.body {
            ResponseBody::Inline(_) => (head, None),
            ResponseBody::Stream { file, remaining } => (head, Some((file, remaining))),
        }
    }

    pub fn redirect(code: u16, target_url: &str) -> Self {
        let mut res = HttpResponse::new(code);
        res.set_header("location", target_url);
        res
    }
}

/// Error response factory: a configured error page is streamed from disk,
/// otherwise a built-in page embeds the code and reason phrase.
pub fn error_response(code: u16, s_cfg: Option<&ServerConfig>) -> HttpResponse {
    let mut res = HttpResponse::new(code);

    if let Some(cfg) = s_cfg {
        if let Some(page) = cfg.error_pages.get(&code) {
            let path = Path::new(&cfg.root).join(page.trim_start_matches('/'));
            if let Ok(file) = File::open(&path) {
                if let Ok(meta) = file.metadata() {
                    res.set_file(file, meta.len(), "text/html");
                    return res;
                }
            }
        }
    }

    let reason = HttpResponse::status_text(code);
    let body = format!(
        "<html><head><title>{code} {reason}</title></head>\
         <body><h1>{code} {reason}</h1></body></html>"
    );
    res.set_body(body.into_bytes(), "text/html");
    res
}

fn to_pascal_case(s: &str) -> String {
    s.split('-')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                None => String::new(),
                Some(f) => f.to_uppercase().collect::<String>() + chars.as_str(),
            }
        })
        .collect::<Vec<String>>()
        .join("-")
}

pub fn get_mime_type(extension: Option<&str>) -> &'static str {
    match extension {
        Some("html") | Some("htm") => "text/html",
        Some("css") => "text/css",
        Some("js") => "application/javascript",
        Some("json") => "application/json",
        Some("xml") => "application/xml",
        Some("txt") => "text/plain",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        Some("ico") => "image/x-icon",
        Some("pdf") => "application/pdf",
        Some("zip") => "application/zip",
        Some("gz") => "application/gzip",
        _ => "application/octet-stream",
    }
}
