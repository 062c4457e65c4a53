use std::fmt::{Display, Formatter, Result};
use std::iter::Peekable;
use std::str::Chars;

#[derive(Debug, PartialEq, Clone)]
pub enum TokenType {
    Word(String), // host, /var/www, ~ .py$
    Number(u64),  // 8080
    LBrace,       // {
    RBrace,       // }
    Semicolon,    // ;
    Newline,      // \n
}

#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenType,
    pub loc: Loc,
}

#[derive(Debug, Clone, Copy)]
pub struct Loc {
    pub line: usize,
    pub col: usize,
}

pub struct Lexer<'a> {
    input: Peekable<Chars<'a>>,
    line: usize,
    col: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input: input.chars().peekable(),
            line: 1,
            col: 1,
        }
    }

    fn advance(&mut self) {
        if let Some(c) = self.input.next() {
            if c == '\n' {
                self.line += 1;
                self.col = 1;
            } else {
                self.col += 1;
            }
        }
    }

    fn peek(&mut self) -> Option<&char> {
        self.input.peek()
    }

    fn current_loc(&self) -> Loc {
        Loc {
            line: self.line,
            col: self.col,
        }
    }

    pub fn tokenize(&mut self) -> std::result::Result<Vec<Token>, String> {
        let mut tokens = Vec::new();

        while let Some(&c) = self.peek() {
            let loc = self.current_loc();

            match c {
                '#' => self.skip_comment(),
                '{' => {
                    tokens.push(Token {
                        kind: TokenType::LBrace,
                        loc,
                    });
                    self.advance();
                }
                '}' => {
                    tokens.push(Token {
                        kind: TokenType::RBrace,
                        loc,
                    });
                    self.advance();
                }
                ';' => {
                    tokens.push(Token {
                        kind: TokenType::Semicolon,
                        loc,
                    });
                    self.advance();
                }
                '\n' => {
                    tokens.push(Token {
                        kind: TokenType::Newline,
                        loc,
                    });
                    self.advance();
                }
                c if c.is_whitespace() => self.advance(),
                _ => self.handle_word(&mut tokens, loc),
            }
        }

        Ok(tokens)
    }

    fn skip_comment(&mut self) {
        while let Some(&c) = self.peek() {
            if c == '\n' {
                break;
            }
            self.advance();
        }
    }

    fn handle_word(&mut self, tokens: &mut Vec<Token>, loc: Loc) {
        let mut val = String::new();

        while let Some(&c) = self.peek() {
            if c.is_whitespace() || c == '{' || c == '}' || c == ';' || c == '#' {
                break;
            }
            val.push(c);
            self.advance();
        }

        if !val.is_empty() && val.chars().all(|c| c.is_ascii_digit()) {
            if let Ok(num) = val.parse::<u64>() {
                tokens.push(Token {
                    kind: TokenType::Number(num),
                    loc,
                });
                return;
            }
        }
        tokens.push(Token {
            kind: TokenType::Word(val),
            loc,
        });
    }
}

impl Display for TokenType {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self {
            TokenType::Word(s) => write!(f, "{s}"),
            TokenType::Number(n) => write!(f, "{n}"),
            TokenType::LBrace => write!(f, "{{"),
            TokenType::RBrace => write!(f, "}}"),
            TokenType::Semicolon => write!(f, ";"),
            TokenType::Newline => write!(f, "\\n"),
        }
    }
}

impl Display for Loc {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(f, "line {}, col {}", self.line, self.col)
    }
}

impl Display for Token {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(f, "'{}' at {}", self.kind, self.loc)
    }
}
