use crate::handlers;
use crate::http::response::error_response;
use crate::prelude::*;
use crate::signals;

/// Client tokens start above the listener range so an event's origin is
/// decided by its token alone.
const CLIENT_TOKEN_BASE: usize = 4096;

struct Listener {
    socket: TcpListener,
    /// Config-arena indices served by this endpoint, in declaration order.
    candidates: Vec<usize>,
}

/// The event loop: owns every listening and client socket, the config
/// arena, the session store and the logger.
pub struct Server {
    pub configs: Vec<ServerConfig>,
    listeners: Vec<Listener>,
    pub connections: HashMap<Token, HttpConnection>,
    pub sessions: SessionStore,
    pub logger: Logger,
    next_token: usize,
    config_path: Option<PathBuf>,
}

impl Server {
    pub fn new(configs: Vec<ServerConfig>, logger: Logger, poll: &Poll) -> Result<Self> {
        let listeners = Self::bind_listeners(&configs, poll)?;
        for listener in &listeners {
            let cfg = &configs[listener.candidates[0]];
            logger.info(&format!("listening on {}:{}", cfg.host, cfg.port));
        }
        Ok(Self {
            configs,
            listeners,
            connections: HashMap::new(),
            sessions: SessionStore::new(SESSION_TTL),
            logger,
            next_token: CLIENT_TOKEN_BASE,
            config_path: None,
        })
    }

    /// Remember where the configuration came from so SIGHUP can re-read it.
    pub fn with_config_path(mut self, path: PathBuf) -> Self {
        self.config_path = Some(path);
        self
    }

    /// One listener per distinct host:port; servers sharing the endpoint
    /// become virtual-host candidates on it.
    fn bind_listeners(configs: &[ServerConfig], poll: &Poll) -> Result<Vec<Listener>> {
        let mut listeners: Vec<(String, u16, Listener)> = Vec::new();

        for (idx, cfg) in configs.iter().enumerate() {
            if let Some((_, _, listener)) = listeners
                .iter_mut()
                .find(|(host, port, _)| *host == cfg.host && *port == cfg.port)
            {
                listener.candidates.push(idx);
                continue;
            }

            let addr: SocketAddr = format!("{}:{}", cfg.host, cfg.port).parse()?;
            let mut socket = TcpListener::bind(addr)?;
            let token = Token(listeners.len());
            poll.registry()
                .register(&mut socket, token, Interest::READABLE)?;
            listeners.push((
                cfg.host.clone(),
                cfg.port,
                Listener {
                    socket,
                    candidates: vec![idx],
                },
            ));
        }

        Ok(listeners.into_iter().map(|(_, _, l)| l).collect())
    }

    pub fn run(&mut self, mut poll: Poll) -> Result<()> {
        let mut events = Events::with_capacity(1024);
        self.logger.info("server started");

        loop {
            if signals::shutdown_requested() {
                self.logger.info("shutdown requested, exiting");
                break;
            }
            if signals::take_reload() {
                self.reload(&poll);
            }

            match poll.poll(&mut events, Some(POLL_TIMEOUT)) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }

            for event in events.iter() {
                let token = event.token();
                if token.0 < CLIENT_TOKEN_BASE {
                    self.accept_clients(&poll, token.0);
                } else {
                    self.drive_client(&poll, token, event.is_readable(), event.is_writable());
                }
            }

            self.sweep_timeouts(&poll);
            if self.sessions.last_cleanup.elapsed() > SESSION_CLEANUP_INTERVAL {
                self.sessions.cleanup();
            }
        }

        Ok(())
    }

    fn accept_clients(&mut self, poll: &Poll, listener_idx: usize) {
        loop {
            let Some(listener) = self.listeners.get(listener_idx) else {
                return;
            };
            match listener.socket.accept() {
                Ok((mut stream, peer)) => {
                    if self.connections.len() >= MAX_CLIENTS {
                        self.logger
                            .warn(&format!("client limit reached, rejecting {}", peer));
                        continue; // dropped on the spot
                    }

                    let token = Token(self.next_token);
                    self.next_token += 1;
                    if poll
                        .registry()
                        .register(&mut stream, token, Interest::READABLE)
                        .is_err()
                    {
                        continue;
                    }

                    let candidates = listener.candidates.clone();
                    self.connections
                        .insert(token, HttpConnection::new(stream, peer, candidates));
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.logger.error(&format!("accept failed: {}", e));
                    break;
                }
            }
        }
    }

    fn drive_client(&mut self, poll: &Poll, token: Token, readable: bool, writable: bool) {
        if readable {
            if let Some(conn) = self.connections.get_mut(&token) {
                if conn.read_data() {
                    conn.closed = true; // peer EOF or hard error
                }
            }
            self.process_requests(poll, token);

            // Readiness is edge-triggered; re-arm in case the read loop
            // stopped at the buffer cap with data still pending.
            if let Some(conn) = self.connections.get_mut(&token) {
                if !conn.closed {
                    let interest = conn.interest();
                    let _ = poll.registry().reregister(&mut conn.stream, token, interest);
                }
            }
        }

        if writable {
            self.flush_client(poll, token);
        }

        if let Some(conn) = self.connections.get(&token) {
            if conn.should_close() {
                self.close_connection(poll, token);
            }
        }
    }

    /// Drive the request parser over whatever is buffered. At most one
    /// response is in flight per connection; the next pipelined request is
    /// parsed only after the current response has fully drained.
    fn process_requests(&mut self, poll: &Poll, token: Token) {
        loop {
            let Some(conn) = self.connections.get_mut(&token) else {
                return;
            };
            if conn.closed || (conn.phase == ClientPhase::WritingResponse) {
                return;
            }
            if conn.request.buffer.is_empty()
                && conn.request.state == ParsingState::RequestLine
            {
                return;
            }
            conn.phase = ClientPhase::ReadingRequest;

            match conn.request.advance() {
                Ok(ParseProgress::NeedMore) => return,
                Ok(ParseProgress::HeadersParsed) => {
                    let cfg_idx = router::resolve_server(
                        &self.configs,
                        &conn.candidates,
                        conn.request.header("host"),
                    );
                    conn.cfg = Some(cfg_idx);
                    let cfg = &self.configs[cfg_idx];
                    let location = router::find_location(cfg, &conn.request.path);
                    conn.request.max_body = cfg.body_limit(location);
                }
                Ok(ParseProgress::Complete) => {
                    conn.phase = ClientPhase::Processing;
                    let cfg_idx = conn.cfg.unwrap_or(conn.candidates[0]);

                    let mut response = handlers::dispatch(
                        &conn.request,
                        &self.configs[cfg_idx],
                        conn.peer,
                        &mut self.sessions,
                        &self.logger,
                    );

                    let status = response.status_code;
                    let wants_keep_alive = conn
                        .request
                        .header("connection")
                        .map(|v| v.eq_ignore_ascii_case("keep-alive"))
                        .unwrap_or(false);
                    let keep_alive = wants_keep_alive && status < 400;
                    response.set_header(
                        "connection",
                        if keep_alive { "keep-alive" } else { "close" },
                    );

                    self.logger.info(&format!(
                        "{} \"{} {}\" -> {}",
                        conn.peer, conn.request.method, conn.request.path, status
                    ));

                    conn.begin_response(response, keep_alive);
                    if !keep_alive {
                        conn.closed = true;
                    }
                    let interest = conn.interest();
                    let _ = poll.registry().reregister(&mut conn.stream, token, interest);
                    return;
                }
                Err(e) => {
                    let status = e.to_status();
                    let cfg = conn.cfg.map(|i| &self.configs[i]);
                    self.logger
                        .info(&format!("{} malformed request: {} -> {}", conn.peer, e, status));

                    let mut response = error_response(status, cfg);
                    response.set_header("connection", "close");
                    conn.begin_response(response, false);
                    conn.closed = true;
                    let _ = poll.registry().reregister(
                        &mut conn.stream,
                        token,
                        Interest::READABLE | Interest::WRITABLE,
                    );
                    return;
                }
            }
        }
    }

    fn flush_client(&mut self, poll: &Poll, token: Token) {
        let mut response_done = false;

        if let Some(conn) = self.connections.get_mut(&token) {
            loop {
                conn.refill_from_file();
                if conn.write_data() {
                    conn.closed = true;
                    break;
                }
                // socket full, or nothing left to send
                if !conn.write_buffer.is_empty() || conn.stream_file.is_none() {
                    break;
                }
            }

            if !conn.closed
                && conn.phase == ClientPhase::WritingResponse
                && !conn.has_pending_output()
            {
                if conn.keep_alive {
                    conn.finish_response();
                    let _ = poll
                        .registry()
                        .reregister(&mut conn.stream, token, Interest::READABLE);
                    response_done = true;
                } else {
                    conn.phase = ClientPhase::Closing;
                    conn.closed = true;
                }
            }
        }

        // Pipelined bytes may already be buffered; parse them now.
        if response_done {
            self.process_requests(poll, token);
        }
    }

    fn close_connection(&mut self, poll: &Poll, token: Token) {
        if let Some(mut conn) = self.connections.remove(&token) {
            let _ = poll.registry().deregister(&mut conn.stream);
            let _ = conn.stream.shutdown(std::net::Shutdown::Both);
        }
    }

    /// Idle connections and requests that outlived the server's
    /// client_timeout are closed on every loop iteration.
    fn sweep_timeouts(&mut self, poll: &Poll) {
        let now = Instant::now();
        let mut expired: Vec<Token> = Vec::new();

        for (token, conn) in &self.connections {
            let inactivity_limit = if conn.phase == ClientPhase::Idle {
                KEEP_ALIVE_TIMEOUT
            } else {
                IDLE_TIMEOUT
            };
            if now.duration_since(conn.last_activity) > inactivity_limit {
                expired.push(*token);
                continue;
            }
            if let Some(started) = conn.request_started {
                let cfg_idx = conn.cfg.unwrap_or(conn.candidates[0]);
                let limit = Duration::from_secs(self.configs[cfg_idx].client_timeout);
                if conn.phase == ClientPhase::ReadingRequest && now.duration_since(started) > limit
                {
                    expired.push(*token);
                }
            }
        }

        for token in expired {
            if let Some(conn) = self.connections.get(&token) {
                self.logger
                    .info(&format!("closing idle connection from {}", conn.peer));
            }
            self.close_connection(poll, token);
        }
    }

    /// SIGHUP: re-parse and validate; only a good configuration tears down
    /// the old sockets. Existing connections are closed because their
    /// config indices would dangle across the arena swap.
    fn reload(&mut self, poll: &Poll) {
        let Some(path) = self.config_path.clone() else {
            self.logger.warn("reload requested but no config path is known");
            return;
        };

        let parsed = fs::read_to_string(&path)
            .map_err(|e| e.to_string())
            .and_then(|text| {
                crate::config::parse_config(&text).map_err(|e| e.to_string())
            })
            .and_then(|configs| {
                crate::config::validate_configs(&configs)
                    .map(|_| configs)
                    .map_err(|errors| errors.join("; "))
            });

        match parsed {
            Ok(configs) => {
                for listener in &mut self.listeners {
                    let _ = poll.registry().deregister(&mut listener.socket);
                }
                self.listeners.clear();

                let tokens: Vec<Token> = self.connections.keys().copied().collect();
                for token in tokens {
                    self.close_connection(poll, token);
                }

                self.configs = configs;
                match Self::bind_listeners(&self.configs, poll) {
                    Ok(listeners) => {
                        self.listeners = listeners;
                        self.logger.info("configuration reloaded");
                    }
                    Err(e) => self.logger.error(&format!("re-bind after reload failed: {}", e)),
                }
            }
            Err(msg) => self.logger.error(&format!("reload rejected: {}", msg)),
        }
    }
}
