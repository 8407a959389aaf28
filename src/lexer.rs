/// Represents the different kinds of tokens that the markup lexer can produce.
/// Tokens are coarse, one per tag, text run or comment.
#[derive(Debug, PartialEq, Clone)]
pub enum TokenType {
    // == Special Tokens ==
    /// Represents the end of the input.
    Eof,
    /// A comment, `<!-- ... -->`. The associated `String` holds its trimmed content.
    Comment(String),
    /// A processing instruction or declaration (`<?xml ...?>`, `<!DOCTYPE ...>`).
    /// Carries no meaning for the tree and is skipped by the decoder.
    Declaration,

    // == Content ==
    /// Character data between tags, exactly as written (entities not yet resolved).
    Text(String),
    /// A `<![CDATA[...]]>` section. Its content is taken literally.
    CData(String),

    // == Tags ==
    /// A start tag: `<name attr="value">` or the self-closing form `<name />`.
    OpenTag {
        name: String,
        attributes: Vec<RawAttr>,
        self_closing: bool,
    },
    /// An end tag: `</name>`.
    CloseTag(String),
}

/// An attribute as written in a start tag.
/// `value` is raw; `value_start` is the byte offset of its first character.
#[derive(Debug, PartialEq, Clone)]
pub struct RawAttr {
    pub name: String,
    pub value: String,
    pub value_start: usize,
}

/// A token with its type and position
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

/// Lexing failure. `pos` is the byte offset where the problem was detected.
#[derive(Debug, PartialEq, Clone)]
pub enum LexError {
    Unexpected { expected: String, pos: usize },
    Eof { pos: usize },
}

pub struct Lexer<'a> {
    input: &'a str,
    position: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self { input, position: 0 }
    }

    pub fn lex(&mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            if token.ttype == TokenType::Eof {
                tokens.push(token);
                break;
            }
            tokens.push(token);
        }
        Ok(tokens)
    }

    pub fn next_token(&mut self) -> Result<Token, LexError> {
        let start_pos = self.position;

        let ttype = match self.peek() {
            None => TokenType::Eof,
            Some('<') => {
                if self.starts_with("<!--") {
                    self.read_comment()?
                } else if self.starts_with("<![CDATA[") {
                    self.read_cdata()?
                } else if self.starts_with("<?") || self.starts_with("<!") {
                    self.read_declaration()?
                } else if self.starts_with("</") {
                    self.read_close_tag()?
                } else {
                    self.read_open_tag()?
                }
            }
            Some(_) => self.read_text(),
        };

        Ok(Token::new(ttype, start_pos, self.position))
    }

    fn rest(&self) -> &'a str {
        &self.input[self.position..]
    }

    fn starts_with(&self, prefix: &str) -> bool {
        self.rest().starts_with(prefix)
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.position += c.len_utf8();
        Some(c)
    }

    fn skip(&mut self, prefix: &str) {
        self.position += prefix.len();
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.advance();
        }
    }

    fn unexpected(&self, expected: &str) -> LexError {
        if self.position >= self.input.len() {
            LexError::Eof { pos: self.position }
        } else {
            LexError::Unexpected {
                expected: expected.to_string(),
                pos: self.position,
            }
        }
    }

    /// Consumes everything up to (and including) `terminator`, returning what came before it.
    fn read_until(&mut self, terminator: &str) -> Result<&'a str, LexError> {
        match self.rest().find(terminator) {
            Some(offset) => {
                let content = &self.rest()[..offset];
                self.position += offset + terminator.len();
                Ok(content)
            }
            None => {
                self.position = self.input.len();
                Err(LexError::Eof { pos: self.position })
            }
        }
    }

    fn read_text(&mut self) -> TokenType {
        let rest = self.rest();
        let end = rest.find('<').unwrap_or(rest.len());
        self.position += end;
        TokenType::Text(rest[..end].to_string())
    }

    fn read_comment(&mut self) -> Result<TokenType, LexError> {
        self.skip("<!--");
        let content = self.read_until("-->")?;
        Ok(TokenType::Comment(content.trim().to_string()))
    }

    fn read_cdata(&mut self) -> Result<TokenType, LexError> {
        self.skip("<![CDATA[");
        let content = self.read_until("]]>")?;
        Ok(TokenType::CData(content.to_string()))
    }

    fn read_declaration(&mut self) -> Result<TokenType, LexError> {
        if self.starts_with("<?") {
            self.skip("<?");
            self.read_until("?>")?;
        } else {
            self.skip("<!");
            self.read_until(">")?;
        }
        Ok(TokenType::Declaration)
    }

    fn read_name(&mut self) -> Result<String, LexError> {
        let mut name = String::new();
        match self.peek() {
            Some(c) if is_name_start(c) => name.push(c),
            _ => return Err(self.unexpected("a name")),
        }
        self.advance();
        while let Some(c) = self.peek() {
            if is_name_char(c) {
                name.push(c);
                self.advance();
            } else {
                break;
            }
        }
        Ok(name)
    }

    fn read_close_tag(&mut self) -> Result<TokenType, LexError> {
        self.skip("</");
        let name = self.read_name()?;
        self.skip_whitespace();
        if self.peek() != Some('>') {
            return Err(self.unexpected("'>' to end the closing tag"));
        }
        self.advance();
        Ok(TokenType::CloseTag(name))
    }

    fn read_open_tag(&mut self) -> Result<TokenType, LexError> {
        self.skip("<");
        let name = self.read_name()?;
        let mut attributes = Vec::new();

        loop {
            let had_space = self.peek().is_some_and(char::is_whitespace);
            self.skip_whitespace();
            match self.peek() {
                Some('>') => {
                    self.advance();
                    return Ok(TokenType::OpenTag {
                        name,
                        attributes,
                        self_closing: false,
                    });
                }
                Some('/') => {
                    self.advance();
                    if self.peek() != Some('>') {
                        return Err(self.unexpected("'>' after '/'"));
                    }
                    self.advance();
                    return Ok(TokenType::OpenTag {
                        name,
                        attributes,
                        self_closing: true,
                    });
                }
                Some(c) if is_name_start(c) && had_space => {
                    attributes.push(self.read_attribute()?);
                }
                _ => return Err(self.unexpected("an attribute, '>' or '/>'")),
            }
        }
    }

    fn read_attribute(&mut self) -> Result<RawAttr, LexError> {
        let name = self.read_name()?;
        self.skip_whitespace();
        if self.peek() != Some('=') {
            return Err(self.unexpected("'=' after attribute name"));
        }
        self.advance();
        self.skip_whitespace();

        let quote = match self.peek() {
            Some(q @ ('"' | '\'')) => q,
            _ => return Err(self.unexpected("a quoted attribute value")),
        };
        self.advance();
        let value_start = self.position;
        let rest = self.rest();
        let Some(end) = rest.find(quote) else {
            self.position = self.input.len();
            return Err(LexError::Eof { pos: self.position });
        };
        let value = &rest[..end];
        if let Some(offset) = value.find('<') {
            self.position += offset;
            return Err(self.unexpected("attribute value without '<'"));
        }
        self.position += end + 1;

        Ok(RawAttr {
            name,
            value: value.to_string(),
            value_start,
        })
    }
}

fn is_name_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == ':'
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | ':' | '-' | '.')
}

/// Resolves character references in `raw`.
///
/// On failure returns the byte range (relative to `raw`) of the offending reference.
pub fn unescape(raw: &str) -> Result<String, (usize, usize)> {
    if !raw.contains('&') {
        return Ok(raw.to_string());
    }

    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    let mut offset = 0;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let start = offset + amp;
        let after = &rest[amp + 1..];
        let Some(semi) = after.find(';') else {
            return Err((start, raw.len()));
        };
        let entity = &after[..semi];
        let end = start + semi + 2;
        let c = match entity {
            "amp" => '&',
            "lt" => '<',
            "gt" => '>',
            "quot" => '"',
            "apos" => '\'',
            _ => {
                let code = if let Some(hex) = entity
                    .strip_prefix("#x")
                    .or_else(|| entity.strip_prefix("#X"))
                {
                    u32::from_str_radix(hex, 16).ok()
                } else if let Some(dec) = entity.strip_prefix('#') {
                    dec.parse::<u32>().ok()
                } else {
                    None
                };
                code.and_then(char::from_u32).ok_or((start, end))?
            }
        };
        out.push(c);
        offset = end;
        rest = &raw[end..];
    }
    out.push_str(rest);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_tokens(input: &str, expected: Vec<TokenType>) {
        let mut lexer = Lexer::new(input);
        let tokens = lexer.lex().unwrap();
        let token_types: Vec<TokenType> = tokens.into_iter().map(|t| t.ttype).collect();
        assert_eq!(token_types, expected);
    }

    fn open(name: &str, attributes: Vec<(&str, &str)>, self_closing: bool) -> TokenType {
        TokenType::OpenTag {
            name: name.to_string(),
            attributes: attributes
                .into_iter()
                .map(|(n, v)| RawAttr {
                    name: n.to_string(),
                    value: v.to_string(),
                    value_start: 0,
                })
                .collect(),
            self_closing,
        }
    }

    fn strip_offsets(tokens: Vec<Token>) -> Vec<TokenType> {
        tokens
            .into_iter()
            .map(|t| match t.ttype {
                TokenType::OpenTag {
                    name,
                    attributes,
                    self_closing,
                } => TokenType::OpenTag {
                    name,
                    attributes: attributes
                        .into_iter()
                        .map(|a| RawAttr { value_start: 0, ..a })
                        .collect(),
                    self_closing,
                },
                other => other,
            })
            .collect()
    }

    #[test]
    fn test_eof() {
        assert_tokens("", vec![TokenType::Eof]);
    }

    #[test]
    fn test_simple_element() {
        assert_tokens(
            "<p>Hi</p>",
            vec![
                open("p", vec![], false),
                TokenType::Text("Hi".to_string()),
                TokenType::CloseTag("p".to_string()),
                TokenType::Eof,
            ],
        );
    }

    #[test]
    fn test_attributes_and_self_closing() {
        let mut lexer = Lexer::new(r#"<input value="a b" type='text' _onchange="Changed"/>"#);
        let tokens = strip_offsets(lexer.lex().unwrap());
        assert_eq!(
            tokens,
            vec![
                open(
                    "input",
                    vec![("value", "a b"), ("type", "text"), ("_onchange", "Changed")],
                    true
                ),
                TokenType::Eof,
            ]
        );
    }

    #[test]
    fn test_attribute_value_offset() {
        let mut lexer = Lexer::new(r#"<a href="x">"#);
        let token = lexer.next_token().unwrap();
        match token.ttype {
            TokenType::OpenTag { attributes, .. } => assert_eq!(attributes[0].value_start, 9),
            other => panic!("unexpected token {other:?}"),
        }
    }

    #[test]
    fn test_comments_cdata_and_declarations() {
        assert_tokens(
            "<?xml version=\"1.0\"?><!DOCTYPE html><div><!-- note --><![CDATA[<raw>]]></div>",
            vec![
                TokenType::Declaration,
                TokenType::Declaration,
                open("div", vec![], false),
                TokenType::Comment("note".to_string()),
                TokenType::CData("<raw>".to_string()),
                TokenType::CloseTag("div".to_string()),
                TokenType::Eof,
            ],
        );
    }

    #[test]
    fn test_text_is_split_by_comments() {
        assert_tokens(
            "<div>a<!-- x -->b</div>",
            vec![
                open("div", vec![], false),
                TokenType::Text("a".to_string()),
                TokenType::Comment("x".to_string()),
                TokenType::Text("b".to_string()),
                TokenType::CloseTag("div".to_string()),
                TokenType::Eof,
            ],
        );
    }

    #[test]
    fn test_unquoted_attribute_is_rejected() {
        let mut lexer = Lexer::new("<div class=foo>");
        assert!(matches!(lexer.lex(), Err(LexError::Unexpected { pos: 11, .. })));
    }

    #[test]
    fn test_unterminated_comment_is_eof() {
        let mut lexer = Lexer::new("<div><!-- never closed");
        assert!(matches!(lexer.lex(), Err(LexError::Eof { .. })));
    }

    #[test]
    fn test_unescape() {
        assert_eq!(unescape("a &amp; b").unwrap(), "a & b");
        assert_eq!(unescape("&lt;p&gt; &#65;&#x42;").unwrap(), "<p> AB");
        assert_eq!(unescape("&quot;&apos;").unwrap(), "\"'");
        assert_eq!(unescape("x &nope; y"), Err((2, 8)));
        assert_eq!(unescape("dangling &amp"), Err((9, 13)));
    }
}
