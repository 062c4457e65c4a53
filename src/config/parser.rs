use std::fmt;

use crate::config::lexer::{Lexer, Loc, Token, TokenType};
use crate::config::types::{LocationConfig, ServerConfig};

// --- Error Handling ---

#[derive(Debug)]
pub struct ConfigError {
    pub message: String,
    pub loc: Option<Loc>,
    pub context: Vec<String>,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\x1b[1;31mConfiguration Error\x1b[0m: {}", self.message)?;
        if let Some(loc) = self.loc {
            write!(f, " \x1b[38;5;244m(at line {}, col {})\x1b[0m", loc.line, loc.col)?;
        }
        if !self.context.is_empty() {
            writeln!(f, "\n   \x1b[1;34mContext trace:\x1b[0m")?;
            for (i, ctx) in self.context.iter().rev().enumerate() {
                let indent = " ".repeat(2 + i * 2);
                writeln!(f, "{}in {}", indent, ctx)?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for ConfigError {}

pub type ParseResult<T> = Result<T, ConfigError>;

/// Parse a whole configuration file into server blocks.
pub fn parse_config(input: &str) -> ParseResult<Vec<ServerConfig>> {
    let mut lexer = Lexer::new(input);
    let tokens = lexer.tokenize().map_err(|e| ConfigError {
        message: e,
        loc: None,
        context: vec!["lexing phase".to_string()],
    })?;

    let mut parser = ConfigParser::new(tokens);
    let mut servers = Vec::new();

    loop {
        parser.skip_newlines();
        match parser.peek_kind() {
            None => break,
            Some(TokenType::Word(w)) if w == "server" => {
                parser.cursor += 1;
                let server = parser.parse_server().map_err(|mut e| {
                    e.context.push(format!("server block #{}", servers.len() + 1));
                    e
                })?;
                servers.push(server);
            }
            _ => {
                return Err(parser.err("expected 'server' block at top level"));
            }
        }
    }

    if servers.is_empty() {
        return Err(ConfigError {
            message: "no server blocks found".to_string(),
            loc: None,
            context: Vec::new(),
        });
    }

    Ok(servers)
}

// --- Config Parser ---

pub struct ConfigParser {
    pub tokens: Vec<Token>,
    pub cursor: usize,
}

impl ConfigParser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, cursor: 0 }
    }

    // ====== Token Access ======

    fn peek_kind(&self) -> Option<&TokenType> {
        self.tokens.get(self.cursor).map(|t| &t.kind)
    }

    fn peek_loc(&self) -> Option<Loc> {
        self.tokens.get(self.cursor).map(|t| t.loc)
    }

    fn next_token(&mut self) -> Option<&Token> {
        if self.cursor < self.tokens.len() {
            let t = &self.tokens[self.cursor];
            self.cursor += 1;
            Some(t)
        } else {
            None
        }
    }

    fn err(&self, message: &str) -> ConfigError {
        ConfigError {
            message: message.to_string(),
            loc: self.peek_loc(),
            context: Vec::new(),
        }
    }

    fn skip_newlines(&mut self) {
        while matches!(self.peek_kind(), Some(TokenType::Newline)) {
            self.cursor += 1;
        }
    }

    fn consume_lbrace(&mut self) -> ParseResult<()> {
        self.skip_newlines();
        match self.next_token() {
            Some(t) if t.kind == TokenType::LBrace => Ok(()),
            Some(t) => Err(ConfigError {
                message: format!("expected '{{', found {}", t.kind),
                loc: Some(t.loc),
                context: Vec::new(),
            }),
            None => Err(self.err("expected '{', found EOF")),
        }
    }

    /// Word/number values of one directive, up to `;` or end of line.
    /// The terminating semicolon is consumed; the newline is left in place.
    fn value_words(&mut self) -> Vec<String> {
        let mut values = Vec::new();
        loop {
            match self.peek_kind() {
                Some(TokenType::Word(w)) => {
                    values.push(w.clone());
                    self.cursor += 1;
                }
                Some(TokenType::Number(n)) => {
                    values.push(n.to_string());
                    self.cursor += 1;
                }
                Some(TokenType::Semicolon) => {
                    self.cursor += 1;
                    break;
                }
                _ => break,
            }
        }
        values
    }

    fn single_value(&mut self, directive: &str) -> ParseResult<String> {
        let values = self.value_words();
        if values.len() != 1 {
            return Err(self.err(&format!("'{}' expects exactly one value", directive)));
        }
        Ok(values.into_iter().next().unwrap())
    }

    // ====== Blocks ======

    fn parse_server(&mut self) -> ParseResult<ServerConfig> {
        self.consume_lbrace()?;
        let mut server = ServerConfig::default();

        loop {
            self.skip_newlines();
            match self.peek_kind() {
                Some(TokenType::RBrace) => {
                    self.cursor += 1;
                    break;
                }
                None => return Err(self.err("unexpected EOF in server block")),
                Some(TokenType::Word(w)) => {
                    let directive = w.clone();
                    self.cursor += 1;
                    match directive.as_str() {
                        "host" => server.host = self.single_value("host")?,
                        "port" => {
                            let v = self.single_value("port")?;
                            let port: u64 = v
                                .parse()
                                .map_err(|_| self.err("'port' expects a number"))?;
                            if port == 0 || port > u16::MAX as u64 {
                                return Err(self.err("'port' must be within 1..65535"));
                            }
                            server.port = port as u16;
                        }
                        "server_name" => server.server_names = self.value_words(),
                        "root" => server.root = self.single_value("root")?,
                        "index" => server.index = self.value_words(),
                        "client_timeout" => {
                            let v = self.single_value("client_timeout")?;
                            server.client_timeout = v
                                .parse()
                                .map_err(|_| self.err("'client_timeout' expects seconds"))?;
                        }
                        "client_max_body_size" => {
                            let v = self.single_value("client_max_body_size")?;
                            server.client_max_body_size =
                                parse_size(&v).map_err(|m| self.err(&m))?;
                        }
                        "secure_cookies" => {
                            let v = self.single_value("secure_cookies")?;
                            server.secure_cookies = v == "on";
                        }
                        "error_page" => {
                            let values = self.value_words();
                            if values.len() != 2 {
                                return Err(
                                    self.err("'error_page' expects a status code and a path")
                                );
                            }
                            let code: u16 = values[0]
                                .parse()
                                .map_err(|_| self.err("invalid error_page status code"))?;
                            if !(100..=599).contains(&code) {
                                return Err(self.err("error_page code must be within 100..599"));
                            }
                            server.error_pages.insert(code, values[1].clone());
                        }
                        "location" => {
                            let location = self.parse_location().map_err(|mut e| {
                                e.context.push("location block".to_string());
                                e
                            })?;
                            server.locations.push(location);
                        }
                        "cgi" => self.parse_cgi(&mut server)?,
                        other => {
                            return Err(self.err(&format!(
                                "unknown directive '{}' in server block",
                                other
                            )));
                        }
                    }
                }
                Some(t) => {
                    return Err(self.err(&format!("unexpected token {} in server block", t)));
                }
            }
        }

        if server.index.is_empty() {
            server.index = vec![crate::config::types::DEFAULT_FILE.to_string()];
        }
        Ok(server)
    }

    fn parse_location(&mut self) -> ParseResult<LocationConfig> {
        // Everything before the brace is the path pattern ("~ .py$" stays intact).
        let mut parts = Vec::new();
        loop {
            match self.peek_kind() {
                Some(TokenType::Word(w)) => {
                    parts.push(w.clone());
                    self.cursor += 1;
                }
                Some(TokenType::Number(n)) => {
                    parts.push(n.to_string());
                    self.cursor += 1;
                }
                _ => break,
            }
        }
        if parts.is_empty() {
            return Err(self.err("'location' expects a path pattern"));
        }

        let mut location = LocationConfig {
            path: parts.join(" "),
            ..LocationConfig::default()
        };

        self.consume_lbrace()?;

        loop {
            self.skip_newlines();
            match self.peek_kind() {
                Some(TokenType::RBrace) => {
                    self.cursor += 1;
                    break;
                }
                None => return Err(self.err("unexpected EOF in location block")),
                Some(TokenType::Word(w)) => {
                    let directive = w.clone();
                    self.cursor += 1;
                    match directive.as_str() {
                        "root" => location.root = self.single_value("root")?,
                        "index" => location.index = self.value_words(),
                        "autoindex" => {
                            let v = self.single_value("autoindex")?;
                            location.autoindex = v == "on";
                        }
                        "allowed_methods" => {
                            location.methods = self
                                .value_words()
                                .into_iter()
                                .filter(|m| {
                                    matches!(
                                        m.as_str(),
                                        "GET" | "POST" | "DELETE" | "PUT" | "HEAD"
                                    )
                                })
                                .collect();
                            if location.methods.is_empty() {
                                location.methods.push("GET".to_string());
                            }
                        }
                        "client_max_body_size" => {
                            let v = self.single_value("client_max_body_size")?;
                            location.client_max_body_size =
                                Some(parse_size(&v).map_err(|m| self.err(&m))?);
                        }
                        "cgi_pass" => location.cgi_pass = self.single_value("cgi_pass")?,
                        "return" => {
                            let values = self.value_words();
                            if values.len() != 2 {
                                return Err(self.err("'return' expects a code and a target URL"));
                            }
                            let code: u16 = values[0]
                                .parse()
                                .map_err(|_| self.err("invalid 'return' status code"))?;
                            if code != 301 && code != 302 {
                                return Err(self.err("'return' supports codes 301 and 302"));
                            }
                            location.redirect = Some((code, values[1].clone()));
                        }
                        other => {
                            return Err(self.err(&format!(
                                "unknown directive '{}' in location block",
                                other
                            )));
                        }
                    }
                }
                Some(t) => {
                    return Err(self.err(&format!("unexpected token {} in location block", t)));
                }
            }
        }

        Ok(location)
    }

    /// `cgi { .py /usr/bin/python3; .sh /bin/sh; }`; handlers may span
    /// several words ("/usr/bin/env python3").
    fn parse_cgi(&mut self, server: &mut ServerConfig) -> ParseResult<()> {
        self.consume_lbrace()?;
        loop {
            self.skip_newlines();
            match self.peek_kind() {
                Some(TokenType::RBrace) => {
                    self.cursor += 1;
                    return Ok(());
                }
                None => return Err(self.err("unexpected EOF in cgi block")),
                _ => {
                    let values = self.value_words();
                    if values.len() < 2 {
                        return Err(self.err("cgi entry expects '<.ext> <handler>'"));
                    }
                    let mut ext = values[0].clone();
                    if !ext.starts_with('.') {
                        ext.insert(0, '.');
                    }
                    server.cgi_handlers.insert(ext, values[1..].join(" "));
                }
            }
        }
    }
}

/// Byte size with optional k/K/m/M/g/G suffix (a trailing `b`/`B` is accepted).
pub fn parse_size(value: &str) -> Result<usize, String> {
    let digits: String = value
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    let unit: String = value[digits.len()..].to_ascii_lowercase();

    let size: f64 = digits
        .parse()
        .map_err(|_| format!("invalid size value '{}'", value))?;

    let multiplier: f64 = match unit.as_str() {
        "" => 1.0,
        "k" | "kb" => 1024.0,
        "m" | "mb" => 1024.0 * 1024.0,
        "g" | "gb" => 1024.0 * 1024.0 * 1024.0,
        _ => return Err(format!("invalid size unit '{}'", unit)),
    };

    Ok((size * multiplier) as usize)
}
