use crate::ast::{Attr, AttrList, Node};
use crate::error::{DecodeError, MarkupError};
use crate::lexer::{unescape, LexError, Lexer, RawAttr, Token, TokenType};
use miette::NamedSource;

/// Builds a [`Node`] tree from markup tokens in a single pass.
#[derive(Debug)]
pub struct Parser<'a> {
    name: String,
    source_text: &'a str,
    tokens: Vec<Token>,
    position: usize,
}

impl<'a> Parser<'a> {
    pub fn new(source_text: &'a str) -> Result<Self, MarkupError> {
        Self::new_with_name(source_text, "markup".to_string())
    }

    pub fn new_with_name(source_text: &'a str, name: String) -> Result<Self, MarkupError> {
        let mut lexer = Lexer::new(source_text);
        let tokens = match lexer.lex() {
            Ok(tokens) => tokens,
            Err(err) => return Err(lex_error(&name, source_text, err).into()),
        };
        Ok(Self {
            name,
            source_text,
            tokens,
            position: 0,
        })
    }

    /// Document ::= { Misc } Element { Misc }
    pub fn parse_document(&mut self) -> Result<Node, MarkupError> {
        // Open elements, innermost last.
        let mut stack: Vec<Node> = Vec::new();
        let mut root: Option<Node> = None;

        while self.position < self.tokens.len() {
            let token = self.tokens[self.position].clone();
            self.position += 1;

            match token.ttype {
                TokenType::Eof => break,
                TokenType::Comment(_) | TokenType::Declaration => {}
                TokenType::Text(raw) => {
                    let text = raw.trim();
                    if text.is_empty() {
                        continue;
                    }
                    let leading = raw.len() - raw.trim_start().len();
                    let start = token.pos_start + leading;
                    let text = unescape(text).map_err(|(from, to)| {
                        self.invalid_entity(start + from, start + to)
                    })?;
                    self.push_text(&mut stack, text, start, start + raw.trim().len())?;
                }
                TokenType::CData(content) => {
                    let text = content.trim();
                    if !text.is_empty() {
                        self.push_text(&mut stack, text.to_string(), token.pos_start, token.pos_end)?;
                    }
                }
                TokenType::OpenTag {
                    name,
                    attributes,
                    self_closing,
                } => {
                    if stack.is_empty() && root.is_some() {
                        return Err(DecodeError::MultipleRoots {
                            src: self.source(),
                            span: (token.pos_start, token.pos_end - token.pos_start).into(),
                        }
                        .into());
                    }

                    let mut node = Node::element(name, self.attributes(attributes)?);
                    node.pos_start = token.pos_start;
                    node.pos_end = token.pos_end;

                    if self_closing {
                        attach(&mut stack, &mut root, node);
                    } else {
                        stack.push(node);
                    }
                }
                TokenType::CloseTag(name) => {
                    let Some(mut node) = stack.pop() else {
                        return Err(DecodeError::UnexpectedClose {
                            src: self.source(),
                            span: (token.pos_start, token.pos_end - token.pos_start).into(),
                            found: name,
                        }
                        .into());
                    };
                    if node.tag != name {
                        return Err(DecodeError::MismatchedClose {
                            src: self.source(),
                            span: (token.pos_start, token.pos_end - token.pos_start).into(),
                            expected: node.tag,
                            found: name,
                        }
                        .into());
                    }
                    node.pos_end = token.pos_end;
                    attach(&mut stack, &mut root, node);
                }
            }
        }

        if let Some(open) = stack.pop() {
            return Err(DecodeError::UnclosedTag {
                src: self.source(),
                span: (open.pos_start, 1).into(),
                name: open.tag,
            }
            .into());
        }

        root.ok_or_else(|| DecodeError::EmptyMarkup.into())
    }

    fn push_text(
        &self,
        stack: &mut [Node],
        text: String,
        pos_start: usize,
        pos_end: usize,
    ) -> Result<(), MarkupError> {
        let Some(parent) = stack.last_mut() else {
            return Err(DecodeError::TextOutsideTags {
                src: self.source(),
                span: (pos_start, pos_end - pos_start).into(),
                text,
            }
            .into());
        };
        let mut leaf = Node::text(text);
        leaf.pos_start = pos_start;
        leaf.pos_end = pos_end;
        parent.children.push(leaf);
        Ok(())
    }

    fn attributes(&self, raw: Vec<RawAttr>) -> Result<AttrList, MarkupError> {
        raw.into_iter()
            .map(|attr| {
                let value = unescape(&attr.value).map_err(|(from, to)| {
                    self.invalid_entity(attr.value_start + from, attr.value_start + to)
                })?;
                Ok(Attr::new(attr.name, value))
            })
            .collect()
    }

    fn source(&self) -> NamedSource<String> {
        NamedSource::new(self.name.clone(), self.source_text.to_string())
    }

    fn invalid_entity(&self, start: usize, end: usize) -> MarkupError {
        DecodeError::InvalidEntity {
            src: self.source(),
            span: (start, end - start).into(),
            entity: self.source_text[start..end].to_string(),
        }
        .into()
    }
}

fn attach(stack: &mut [Node], root: &mut Option<Node>, node: Node) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(node),
        None => *root = Some(node),
    }
}

fn lex_error(name: &str, source_text: &str, err: LexError) -> DecodeError {
    let src = NamedSource::new(name.to_string(), source_text.to_string());
    match err {
        LexError::Unexpected { expected, pos } => DecodeError::UnexpectedToken {
            src,
            span: (pos, 1).into(),
            expected,
        },
        LexError::Eof { pos } => DecodeError::UnexpectedEof {
            src,
            span: (pos, 0).into(),
        },
    }
}

/// Decodes markup text into a node tree and returns its root.
///
/// Tags starting with an upper-case letter become
/// [`NodeKind::Component`](crate::NodeKind::Component) references, all other
/// tags [`NodeKind::Html`](crate::NodeKind::Html) elements. Text between tags
/// is trimmed; whitespace-only text is dropped. Comments are ignored.
pub fn decode(text: &str) -> Result<Node, MarkupError> {
    if text.trim().is_empty() {
        return Err(DecodeError::EmptyMarkup.into());
    }
    Parser::new(text)?.parse_document()
}

/// Like [`decode`], naming the source in diagnostics (usually the component type).
pub fn decode_named(text: &str, name: &str) -> Result<Node, MarkupError> {
    if text.trim().is_empty() {
        return Err(DecodeError::EmptyMarkup.into());
    }
    Parser::new_with_name(text, name.to_string())?.parse_document()
}
