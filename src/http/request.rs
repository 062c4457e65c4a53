use std::fmt;
use std::str::FromStr;

use crate::prelude::*;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Method {
    GET,
    POST,
    DELETE,
    PUT,
    HEAD,
}

impl Method {
    pub fn is_allowed(&self, allowed_methods: &[String]) -> bool {
        allowed_methods.iter().any(|m| m == self.as_str())
    }

    pub fn as_str(&self) -> &str {
        match self {
            Method::GET => "GET",
            Method::POST => "POST",
            Method::DELETE => "DELETE",
            Method::PUT => "PUT",
            Method::HEAD => "HEAD",
        }
    }
}

impl FromStr for Method {
    type Err = ParseError;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "GET" => Ok(Method::GET),
            "POST" => Ok(Method::POST),
            "DELETE" => Ok(Method::DELETE),
            "PUT" => Ok(Method::PUT),
            "HEAD" => Ok(Method::HEAD),
            _ => Err(ParseError::InvalidMethod),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, PartialEq)]
pub enum ParsingState {
    RequestLine,
    Headers,
    HeadersDone,
    Body,
    ChunkedBody,
    Complete,
}

#[derive(Debug, PartialEq)]
pub enum ParseProgress {
    NeedMore,
    /// Header block framed; the caller resolves the virtual host and body
    /// limit before body parsing continues.
    HeadersParsed,
    Complete,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParseError {
    MalformedRequestLine,
    InvalidMethod,
    HeaderTooLong,
    TooManyHeaders,
    InvalidHeaderValue,
    InvalidChunkSize,
    PayloadTooLarge,
    PathTraversal,
}

impl ParseError {
    pub fn to_status(&self) -> u16 {
        match self {
            ParseError::PayloadTooLarge => HTTP_PAYLOAD_TOO_LARGE,
            ParseError::PathTraversal => HTTP_FORBIDDEN,
            ParseError::InvalidMethod => HTTP_NOT_IMPLEMENTED,
            ParseError::HeaderTooLong => HTTP_URI_TOO_LONG,
            _ => HTTP_BAD_REQUEST,
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::MalformedRequestLine => write!(f, "Malformed request line"),
            ParseError::InvalidMethod => write!(f, "Invalid HTTP method"),
            ParseError::HeaderTooLong => write!(f, "Header line too long"),
            ParseError::TooManyHeaders => write!(f, "Too many headers"),
            ParseError::InvalidHeaderValue => write!(f, "Invalid header value"),
            ParseError::InvalidChunkSize => write!(f, "Invalid chunk size"),
            ParseError::PayloadTooLarge => write!(f, "Payload too large"),
            ParseError::PathTraversal => write!(f, "Path escapes the document root"),
        }
    }
}

impl std::error::Error for ParseError {}

#[derive(Debug)]
pub enum ChunkState {
    ReadSize,
    ReadData(usize),
    ReadTrailingCrlf,
    ReadTrailers,
}

const CRLF_LEN: usize = 2;
const MAX_HEADER_LINE: usize = 8192;
const MAX_HEADERS: usize = 100;

#[derive(Debug)]
pub struct HttpRequest {
    pub method: Method,
    pub path: String,  // percent-decoded
    pub query: String, // raw
    pub version: String,
    pub headers: HashMap<String, String>,
    pub cookies: HashMap<String, String>,
    pub body: Vec<u8>,
    pub chunked: bool,
    pub content_length: usize,
    /// Effective body limit, set by the caller once the host and location
    /// are known.
    pub max_body: usize,
    pub buffer: Vec<u8>,
    pub cursor: usize,
    pub state: ParsingState,
    chunk_state: ChunkState,
}

impl Default for HttpRequest {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpRequest {
    pub fn new() -> Self {
        HttpRequest {
            method: Method::GET,
            path: String::new(),
            query: String::new(),
            version: String::new(),
            headers: HashMap::new(),
            cookies: HashMap::new(),
            body: Vec::new(),
            chunked: false,
            content_length: 0,
            max_body: crate::config::types::DEFAULT_MAX_BODY_SIZE,
            buffer: Vec::with_capacity(READ_BUF_SIZE),
            cursor: 0,
            state: ParsingState::RequestLine,
            chunk_state: ChunkState::ReadSize,
        }
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Case-preserving insert; an existing header under any spelling of the
    /// same name is replaced (last wins).
    pub fn set_header(&mut self, name: &str, value: String) {
        self.headers
            .retain(|k, _| !k.eq_ignore_ascii_case(name));
        self.headers.insert(name.to_string(), value);
    }

    pub fn remove_header(&mut self, name: &str) {
        self.headers
            .retain(|k, _| !k.eq_ignore_ascii_case(name));
    }

    /// Reset parse state for the next request on a kept-alive connection.
    /// Pipelined bytes already received stay in the buffer.
    pub fn finish_request(&mut self) {
        self.buffer.drain(..self.cursor);
        self.cursor = 0;
        self.method = Method::GET;
        self.path.clear();
        self.query.clear();
        self.version.clear();
        self.headers.clear();
        self.cookies.clear();
        self.body.clear();
        self.chunked = false;
        self.content_length = 0;
        self.state = ParsingState::RequestLine;
        self.chunk_state = ChunkState::ReadSize;
    }

    /// Drive the state machine as far as the buffered bytes allow.
    pub fn advance(&mut self) -> std::result::Result<ParseProgress, ParseError> {
        loop {
            match self.state {
                ParsingState::RequestLine => {
                    if !self.parse_request_line()? {
                        return Ok(ParseProgress::NeedMore);
                    }
                }
                ParsingState::Headers => {
                    if !self.parse_headers()? {
                        return Ok(ParseProgress::NeedMore);
                    }
                    return Ok(ParseProgress::HeadersParsed);
                }
                ParsingState::HeadersDone => self.begin_body()?,
                ParsingState::Body => {
                    if !self.parse_body() {
                        return Ok(ParseProgress::NeedMore);
                    }
                }
                ParsingState::ChunkedBody => {
                    if !self.parse_chunked_body()? {
                        return Ok(ParseProgress::NeedMore);
                    }
                }
                ParsingState::Complete => return Ok(ParseProgress::Complete),
            }
        }
    }

    fn parse_request_line(&mut self) -> std::result::Result<bool, ParseError> {
        let abs_index = match find_crlf(&self.buffer, self.cursor) {
            Some(i) => i,
            None => {
                if self.buffer.len() - self.cursor > MAX_HEADER_LINE {
                    return Err(ParseError::HeaderTooLong);
                }
                return Ok(false);
            }
        };

        let line_bytes = &self.buffer[self.cursor..abs_index];
        let request_line =
            std::str::from_utf8(line_bytes).map_err(|_| ParseError::MalformedRequestLine)?;

        let parts: Vec<&str> = request_line.split_whitespace().collect();
        if parts.len() != 3 {
            return Err(ParseError::MalformedRequestLine);
        }

        self.method = Method::from_str(parts[0])?;

        let uri = parts[1];
        let (raw_path, raw_query) = match uri.find('?') {
            Some(q) => (&uri[..q], &uri[q + 1..]),
            None => (uri, ""),
        };
        self.path = percent_decode(raw_path);
        self.query = raw_query.to_string();
        if self.path.split('/').any(|seg| seg == "..") {
            return Err(ParseError::PathTraversal);
        }

        self.version = parts[2].to_string();
        self.cursor = abs_index + CRLF_LEN;
        self.state = ParsingState::Headers;
        Ok(true)
    }

    fn extract_header_line(
        &mut self,
    ) -> std::result::Result<Option<Option<(String, String)>>, ParseError> {
        let abs_index = match find_crlf(&self.buffer, self.cursor) {
            Some(i) => i,
            None => {
                if self.buffer.len() - self.cursor > MAX_HEADER_LINE {
                    return Err(ParseError::HeaderTooLong);
                }
                return Ok(None); // need more bytes
            }
        };

        let line_bytes = &self.buffer[self.cursor..abs_index];
        if line_bytes.is_empty() {
            self.cursor = abs_index + CRLF_LEN;
            return Ok(Some(None)); // blank line, headers finished
        }

        let line =
            std::str::from_utf8(line_bytes).map_err(|_| ParseError::InvalidHeaderValue)?;
        self.cursor = abs_index + CRLF_LEN;

        match line.find(':') {
            Some(sep) => {
                let key = line[..sep].trim().to_string();
                let val = line[sep + 1..].trim().to_string();
                if key.is_empty() {
                    return Err(ParseError::InvalidHeaderValue);
                }
                Ok(Some(Some((key, val))))
            }
            None => Err(ParseError::InvalidHeaderValue),
        }
    }

    fn parse_headers(&mut self) -> std::result::Result<bool, ParseError> {
        loop {
            match self.extract_header_line()? {
                None => return Ok(false),
                Some(Some((k, v))) => {
                    if self.headers.len() >= MAX_HEADERS {
                        return Err(ParseError::TooManyHeaders);
                    }
                    self.set_header(&k, v);
                }
                Some(None) => {
                    self.buffer.drain(..self.cursor);
                    self.cursor = 0;
                    self.state = ParsingState::HeadersDone;
                    return Ok(true);
                }
            }
        }
    }

    /// Decide the body framing once the caller had a chance to set
    /// `max_body` from the resolved location.
    fn begin_body(&mut self) -> std::result::Result<(), ParseError> {
        self.chunked = self
            .header("transfer-encoding")
            .map(|v| v.contains("chunked"))
            .unwrap_or(false);
        self.content_length = self
            .header("content-length")
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(0);

        if self.chunked {
            self.chunk_state = ChunkState::ReadSize;
            self.state = ParsingState::ChunkedBody;
        } else if self.content_length > 0 {
            if self.content_length > self.max_body {
                return Err(ParseError::PayloadTooLarge);
            }
            self.state = ParsingState::Body;
        } else {
            self.complete();
        }
        Ok(())
    }

    fn parse_body(&mut self) -> bool {
        let missing = self.content_length - self.body.len();
        let take = std::cmp::min(self.buffer.len(), missing);
        self.body.extend(self.buffer.drain(..take));

        if self.body.len() == self.content_length {
            self.complete();
            true
        } else {
            false
        }
    }

    fn parse_chunked_body(&mut self) -> std::result::Result<bool, ParseError> {
        loop {
            match self.chunk_state {
                ChunkState::ReadSize => {
                    if self.buffer.is_empty() {
                        return Ok(false);
                    }
                    let search_limit = std::cmp::min(self.buffer.len(), 18);
                    match find_subsequence(&self.buffer[..search_limit], b"\r\n") {
                        Some(line_end) => {
                            let hex_str = String::from_utf8_lossy(&self.buffer[..line_end]);
                            let chunk_size = usize::from_str_radix(hex_str.trim(), 16)
                                .map_err(|_| ParseError::InvalidChunkSize)?;
                            if self.body.len() + chunk_size > self.max_body {
                                return Err(ParseError::PayloadTooLarge);
                            }
                            self.buffer.drain(..line_end + CRLF_LEN);
                            if chunk_size == 0 {
                                self.chunk_state = ChunkState::ReadTrailers;
                            } else {
                                self.chunk_state = ChunkState::ReadData(chunk_size);
                            }
                        }
                        None => {
                            if self.buffer.len() >= 18 {
                                return Err(ParseError::InvalidChunkSize);
                            }
                            return Ok(false);
                        }
                    }
                }

                ChunkState::ReadData(remaining) => {
                    if self.buffer.is_empty() {
                        return Ok(false);
                    }
                    let take = std::cmp::min(self.buffer.len(), remaining);
                    self.body.extend(self.buffer.drain(..take));
                    if take == remaining {
                        self.chunk_state = ChunkState::ReadTrailingCrlf;
                    } else {
                        self.chunk_state = ChunkState::ReadData(remaining - take);
                        return Ok(false);
                    }
                }

                ChunkState::ReadTrailingCrlf => {
                    if self.buffer.len() < CRLF_LEN {
                        return Ok(false);
                    }
                    if &self.buffer[..CRLF_LEN] != b"\r\n" {
                        return Err(ParseError::InvalidChunkSize);
                    }
                    self.buffer.drain(..CRLF_LEN);
                    self.chunk_state = ChunkState::ReadSize;
                }

                ChunkState::ReadTrailers => match find_crlf(&self.buffer, 0) {
                    Some(0) => {
                        self.buffer.drain(..CRLF_LEN);
                        // CGI and handlers see the decoded length.
                        self.content_length = self.body.len();
                        self.set_header("Content-Length", self.body.len().to_string());
                        self.remove_header("Transfer-Encoding");
                        self.complete();
                        return Ok(true);
                    }
                    Some(line_end) => {
                        if line_end > MAX_HEADER_LINE {
                            return Err(ParseError::HeaderTooLong);
                        }
                        self.buffer.drain(..line_end + CRLF_LEN);
                    }
                    None => {
                        if self.buffer.len() > MAX_HEADER_LINE {
                            return Err(ParseError::HeaderTooLong);
                        }
                        return Ok(false);
                    }
                },
            }
        }
    }

    fn complete(&mut self) {
        if let Some(cookie_header) = self.header("cookie").map(|s| s.to_string()) {
            self.parse_cookie_header(&cookie_header);
        }
        self.state = ParsingState::Complete;
    }

    /// `Cookie: name=value; name=value` into the request's cookie map.
    fn parse_cookie_header(&mut self, header_value: &str) {
        for part in header_value.split(';') {
            let part = part.trim();
            if let Some((name, value)) = part.split_once('=') {
                self.cookies.insert(name.to_string(), value.to_string());
            }
        }
    }
}

/// Decode %XX escapes. `+` is left alone; query strings are not decoded
/// here at all.
pub fn percent_decode(encoded: &str) -> String {
    let bytes = encoded.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
            match hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                Some(b) => {
                    decoded.push(b);
                    i += 3;
                    continue;
                }
                None => decoded.push(bytes[i]),
            }
        } else {
            decoded.push(bytes[i]);
        }
        i += 1;
    }
    String::from_utf8_lossy(&decoded).into_owned()
}

pub fn find_crlf(buffer: &[u8], start_offset: usize) -> Option<usize> {
    let search_area = buffer.get(start_offset..)?;
    let mut current = 0;
    while let Some(r_pos) = memchr::memchr(b'\r', &search_area[current..]) {
        let abs = current + r_pos;
        if search_area.get(abs + 1) == Some(&b'\n') {
            return Some(start_offset + abs);
        }
        current = abs + 1;
    }
    None
}

pub fn find_subsequence(buffer: &[u8], needle: &[u8]) -> Option<usize> {
    memchr::memmem::find(buffer, needle)
}
