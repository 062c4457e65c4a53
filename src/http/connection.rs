use crate::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientPhase {
    ReadingRequest,
    Processing,
    WritingResponse,
    Idle,
    Closing,
}

/// Per-client state, owned by the event loop and keyed by its poll token.
/// `candidates`/`cfg` are indices into the process-lifetime config arena,
/// never owning references.
#[derive(Debug)]
pub struct HttpConnection {
    pub stream: TcpStream,
    pub peer: SocketAddr,
    pub phase: ClientPhase,
    pub request: HttpRequest,
    pub write_buffer: Vec<u8>,
    pub stream_file: Option<(File, u64)>,
    pub bytes_written: u64,
    pub keep_alive: bool,
    pub closed: bool,
    pub candidates: Vec<usize>,
    pub cfg: Option<usize>,
    pub last_activity: Instant,
    pub request_started: Option<Instant>,
}

impl HttpConnection {
    pub fn new(stream: TcpStream, peer: SocketAddr, candidates: Vec<usize>) -> Self {
        Self {
            stream,
            peer,
            phase: ClientPhase::ReadingRequest,
            request: HttpRequest::new(),
            write_buffer: Vec::new(),
            stream_file: None,
            bytes_written: 0,
            keep_alive: false,
            closed: false,
            candidates,
            cfg: None,
            last_activity: Instant::now(),
            request_started: None,
        }
    }

    /// Drain the socket into the request buffer. Returns true on EOF or a
    /// hard read error.
    pub fn read_data(&mut self) -> bool {
        let mut buf = [0u8; READ_BUF_SIZE];
        loop {
            match self.stream.read(&mut buf) {
                Ok(0) => return true,
                Ok(n) => {
                    self.request.buffer.extend_from_slice(&buf[..n]);
                    self.touch();
                    if self.request_started.is_none() {
                        self.request_started = Some(Instant::now());
                    }
                    if self.request.buffer.len() >= MAX_READ_DATA {
                        break;
                    }
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(_) => return true,
            }
        }
        false
    }

    /// Flush as much buffered output as the socket accepts. Returns true on
    /// a hard write error.
    pub fn write_data(&mut self) -> bool {
        while !self.write_buffer.is_empty() {
            match self.stream.write(&self.write_buffer) {
                Ok(0) => return true,
                Ok(n) => {
                    self.write_buffer.drain(..n);
                    self.bytes_written += n as u64;
                    self.touch();
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => return false,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(_) => return true,
            }
        }
        false
    }

    /// Refill the outbound buffer from the streaming file source.
    pub fn refill_from_file(&mut self) {
        if !self.write_buffer.is_empty() {
            return;
        }
        let Some((file, remaining)) = self.stream_file.as_mut() else {
            return;
        };

        let want = std::cmp::min(*remaining, STREAM_CHUNK_SIZE as u64) as usize;
        if want == 0 {
            self.stream_file = None;
            return;
        }

        let mut chunk = vec![0u8; want];
        match file.read(&mut chunk) {
            Ok(0) => self.stream_file = None, // short file; close out the source
            Ok(n) => {
                self.write_buffer.extend_from_slice(&chunk[..n]);
                *remaining -= n as u64;
                if *remaining == 0 {
                    self.stream_file = None;
                }
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => {}
            Err(_) => {
                self.stream_file = None;
                self.closed = true;
            }
        }
    }

    /// Queue a materialized response and move to the writing phase.
    pub fn begin_response(&mut self, response: HttpResponse, keep_alive: bool) {
        let (head, stream) = response.into_parts();
        self.write_buffer.extend_from_slice(&head);
        self.stream_file = stream;
        self.keep_alive = keep_alive;
        self.phase = ClientPhase::WritingResponse;
        self.bytes_written = 0;
    }

    /// Reset for the next request on the same socket.
    pub fn finish_response(&mut self) {
        self.request.finish_request();
        self.cfg = None;
        self.request_started = None;
        self.phase = if self.request.buffer.is_empty() {
            ClientPhase::Idle
        } else {
            ClientPhase::ReadingRequest
        };
    }

    pub fn has_pending_output(&self) -> bool {
        !self.write_buffer.is_empty() || self.stream_file.is_some()
    }

    pub fn should_close(&self) -> bool {
        self.closed && self.write_buffer.is_empty() && self.stream_file.is_none()
    }

    pub fn interest(&self) -> Interest {
        if self.has_pending_output() {
            Interest::READABLE | Interest::WRITABLE
        } else {
            Interest::READABLE
        }
    }

    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
    }
}
