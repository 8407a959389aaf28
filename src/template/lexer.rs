/// Tokens of the template language. Text outside `{{ }}` comes through as
/// [`TokenType::Text`]; everything between delimiters is split into the
/// remaining variants.
#[derive(Debug, PartialEq, Clone)]
pub enum TokenType {
    // == Special Tokens ==
    /// Represents the end of the input.
    Eof,
    /// Literal template text, trim markers already applied.
    Text(String),
    /// `{{`
    LeftDelim,
    /// `}}`
    RightDelim,

    // == Operands ==
    /// The cursor, `.`
    Dot,
    /// A field chain on the cursor: `.Name`, `.Address.City`.
    Field(Vec<String>),
    /// The root data (`$`) optionally followed by a field chain: `$.Title`.
    Variable(Vec<String>),
    /// A keyword or function name: `if`, `range`, `eq`, `json`...
    Identifier(String),
    /// A double-quoted or back-quoted string literal.
    String(String),
    /// A number literal. Integers stay exact.
    Number(serde_json::Number),
    /// `true` or `false`
    Bool(bool),
    /// `nil`
    Nil,

    // == Punctuation ==
    /// `|`
    Pipe,
    /// `(`
    LParen,
    /// `)`
    RParen,
}

#[derive(Debug, Clone)]
pub struct Token {
    pub ttype: TokenType,
    pub pos_start: usize,
    pub pos_end: usize,
}

impl Token {
    pub fn new(ttype: TokenType, pos_start: usize, pos_end: usize) -> Token {
        Token {
            ttype,
            pos_start,
            pos_end,
        }
    }
}

#[derive(Debug, PartialEq, Clone)]
pub enum LexError {
    /// A `{{` without its `}}`. `pos` points at the opening delimiter.
    UnclosedAction { pos: usize },
    /// Something that is not a token, with a description and byte range.
    Invalid {
        message: String,
        pos_start: usize,
        pos_end: usize,
    },
}

const LEFT: &str = "{{";
const RIGHT: &str = "}}";

pub struct Lexer<'a> {
    input: &'a str,
    position: usize,
    tokens: Vec<Token>,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            position: 0,
            tokens: Vec::new(),
        }
    }

    pub fn lex(mut self) -> Result<Vec<Token>, LexError> {
        let mut trim_next = false;
        while self.position < self.input.len() {
            let rest = &self.input[self.position..];
            let text_len = rest.find(LEFT).unwrap_or(rest.len());
            let mut text = &rest[..text_len];
            let text_start = self.position;
            self.position += text_len;

            if trim_next {
                text = text.trim_start();
            }
            let action_start = self.position;
            let trim_prev = self.input[self.position..].starts_with("{{- ")
                || self.input[self.position..].starts_with("{{-\t")
                || self.input[self.position..].starts_with("{{-\n");
            if trim_prev {
                text = text.trim_end();
            }
            if !text.is_empty() {
                self.tokens.push(Token::new(
                    TokenType::Text(text.to_string()),
                    text_start,
                    action_start,
                ));
            }

            if self.position >= self.input.len() {
                break;
            }
            trim_next = self.lex_action(trim_prev)?;
        }

        self.tokens
            .push(Token::new(TokenType::Eof, self.position, self.position));
        Ok(self.tokens)
    }

    /// Lexes one `{{ ... }}`, returning whether it ends with a right trim marker.
    fn lex_action(&mut self, trim_prev: bool) -> Result<bool, LexError> {
        let open = self.position;
        self.position += LEFT.len();
        if trim_prev {
            self.position += 1;
        }

        let body_start = self.position;
        let Some(close) = self.input[body_start..].find(RIGHT) else {
            return Err(LexError::UnclosedAction { pos: open });
        };

        let trimmed = self.input[body_start..body_start + close].trim();
        if trimmed.starts_with("/*") {
            let Some(end) = self.input[body_start..].find("*/") else {
                return Err(LexError::UnclosedAction { pos: open });
            };
            let after = body_start + end + 2;
            let tail = &self.input[after..];
            let trim_next = tail.starts_with(" -}}");
            let tail_trimmed = tail.trim_start_matches(" -").trim_start();
            if !tail_trimmed.starts_with(RIGHT) {
                return Err(LexError::Invalid {
                    message: "comment ends before closing delimiter".to_string(),
                    pos_start: open,
                    pos_end: after,
                });
            }
            self.position = after + (tail.len() - tail_trimmed.len()) + RIGHT.len();
            return Ok(trim_next);
        }

        self.tokens
            .push(Token::new(TokenType::LeftDelim, open, self.position));

        loop {
            self.skip_whitespace();
            let rest = &self.input[self.position..];
            if rest.is_empty() {
                return Err(LexError::UnclosedAction { pos: open });
            }
            if rest.starts_with("-}}") || rest.starts_with(RIGHT) {
                let trim_next = rest.starts_with('-');
                let preceded_by_space = self.input[..self.position]
                    .chars()
                    .next_back()
                    .is_some_and(char::is_whitespace);
                if trim_next && !preceded_by_space {
                    return Err(self.invalid("trim marker must follow a space", 1));
                }
                let start = self.position;
                self.position += if trim_next { 3 } else { 2 };
                self.tokens
                    .push(Token::new(TokenType::RightDelim, start, self.position));
                return Ok(trim_next);
            }
            let token = self.next_token()?;
            self.tokens.push(token);
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.position += c.len_utf8();
            } else {
                break;
            }
        }
    }

    fn peek(&self) -> Option<char> {
        self.input[self.position..].chars().next()
    }

    fn peek_second(&self) -> Option<char> {
        let mut chars = self.input[self.position..].chars();
        chars.next();
        chars.next()
    }

    fn invalid(&self, message: &str, len: usize) -> LexError {
        LexError::Invalid {
            message: message.to_string(),
            pos_start: self.position,
            pos_end: (self.position + len).min(self.input.len()),
        }
    }

    fn next_token(&mut self) -> Result<Token, LexError> {
        let start = self.position;
        let Some(c) = self.peek() else {
            return Err(self.invalid("unexpected end of action", 0));
        };

        let ttype = match c {
            '|' => {
                self.position += 1;
                TokenType::Pipe
            }
            '(' => {
                self.position += 1;
                TokenType::LParen
            }
            ')' => {
                self.position += 1;
                TokenType::RParen
            }
            '.' if self.peek_second().is_some_and(is_ident_start) => {
                TokenType::Field(self.read_chain()?)
            }
            '.' if self.peek_second().is_some_and(|c| c.is_ascii_digit()) => self.read_number()?,
            '.' => {
                self.position += 1;
                TokenType::Dot
            }
            '$' => {
                self.position += 1;
                if self.peek() == Some('.') && self.peek_second().is_some_and(is_ident_start) {
                    TokenType::Variable(self.read_chain()?)
                } else {
                    TokenType::Variable(Vec::new())
                }
            }
            '"' => self.read_string()?,
            '`' => self.read_raw_string()?,
            c if c.is_ascii_digit() || ((c == '-' || c == '+') && self.peek_second().is_some_and(|d| d.is_ascii_digit())) => {
                self.read_number()?
            }
            c if is_ident_start(c) => {
                let ident = self.read_identifier();
                match ident.as_str() {
                    "true" => TokenType::Bool(true),
                    "false" => TokenType::Bool(false),
                    "nil" => TokenType::Nil,
                    _ => TokenType::Identifier(ident),
                }
            }
            _ => return Err(self.invalid(&format!("unexpected character {c:?} in action"), c.len_utf8())),
        };

        Ok(Token::new(ttype, start, self.position))
    }

    fn read_identifier(&mut self) -> String {
        let mut ident = String::new();
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' {
                ident.push(c);
                self.position += c.len_utf8();
            } else {
                break;
            }
        }
        ident
    }

    /// Reads `.A.B.C`, starting at the first dot.
    fn read_chain(&mut self) -> Result<Vec<String>, LexError> {
        let mut chain = Vec::new();
        while self.peek() == Some('.') {
            self.position += 1;
            if !self.peek().is_some_and(is_ident_start) {
                return Err(self.invalid("expected a field name after '.'", 1));
            }
            chain.push(self.read_identifier());
        }
        Ok(chain)
    }

    fn read_string(&mut self) -> Result<TokenType, LexError> {
        let start = self.position;
        self.position += 1; // Consume the opening quote
        let mut value = String::new();
        while let Some(c) = self.peek() {
            self.position += c.len_utf8();
            match c {
                '"' => return Ok(TokenType::String(value)),
                '\\' => {
                    let Some(escaped) = self.peek() else { break };
                    self.position += escaped.len_utf8();
                    match escaped {
                        '"' => value.push('"'),
                        '\\' => value.push('\\'),
                        'n' => value.push('\n'),
                        'r' => value.push('\r'),
                        't' => value.push('\t'),
                        other => {
                            value.push('\\');
                            value.push(other);
                        }
                    }
                }
                '\n' => break,
                c => value.push(c),
            }
        }
        Err(LexError::Invalid {
            message: "unterminated quoted string".to_string(),
            pos_start: start,
            pos_end: self.position,
        })
    }

    fn read_raw_string(&mut self) -> Result<TokenType, LexError> {
        let start = self.position;
        self.position += 1;
        match self.input[self.position..].find('`') {
            Some(end) => {
                let value = self.input[self.position..self.position + end].to_string();
                self.position += end + 1;
                Ok(TokenType::String(value))
            }
            None => Err(LexError::Invalid {
                message: "unterminated raw string".to_string(),
                pos_start: start,
                pos_end: self.input.len(),
            }),
        }
    }

    fn read_number(&mut self) -> Result<TokenType, LexError> {
        let start = self.position;
        let mut end = start;
        for (i, c) in self.input[start..].char_indices() {
            let sign_ok = i == 0 && (c == '-' || c == '+');
            let exponent_sign = (c == '-' || c == '+')
                && matches!(self.input[start..start + i].chars().next_back(), Some('e' | 'E'));
            if c.is_ascii_alphanumeric() || c == '.' || c == '_' || sign_ok || exponent_sign {
                end = start + i + c.len_utf8();
            } else {
                break;
            }
        }
        let text = &self.input[start..end];
        self.position = end;

        parse_number(text)
            .map(TokenType::Number)
            .ok_or_else(|| LexError::Invalid {
                message: format!("bad number syntax: {text:?}"),
                pos_start: start,
                pos_end: end,
            })
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn parse_number(text: &str) -> Option<serde_json::Number> {
    let cleaned = text.replace('_', "");
    if let Ok(i) = cleaned.parse::<i64>() {
        return Some(i.into());
    }
    if let Ok(u) = cleaned.parse::<u64>() {
        return Some(u.into());
    }
    let (negative, digits) = match cleaned.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, cleaned.strip_prefix('+').unwrap_or(&cleaned)),
    };
    let radix = if let Some(hex) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        Some((hex, 16))
    } else if let Some(oct) = digits.strip_prefix("0o").or_else(|| digits.strip_prefix("0O")) {
        Some((oct, 8))
    } else if let Some(bin) = digits.strip_prefix("0b").or_else(|| digits.strip_prefix("0B")) {
        Some((bin, 2))
    } else {
        None
    };
    if let Some((body, radix)) = radix {
        let value = i64::from_str_radix(body, radix).ok()?;
        return Some(if negative { -value } else { value }.into());
    }
    let f = cleaned.parse::<f64>().ok()?;
    if !f.is_finite() {
        return None;
    }
    serde_json::Number::from_f64(f)
}
