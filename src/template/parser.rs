use super::lexer::{LexError, Lexer, Token, TokenType};
use crate::error::TemplateError;
use miette::NamedSource;
use serde_json::Value;

/// A parsed template: a sequence of text runs and actions.
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    pub name: String,
    pub source: String,
    pub body: Vec<Item>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    Text(String),
    /// `{{pipeline}}`: evaluates and writes the result.
    Action(Pipeline),
    /// `{{if p}} ... {{else if q}} ... {{else}} ... {{end}}`
    If {
        branches: Vec<(Pipeline, Vec<Item>)>,
        otherwise: Vec<Item>,
    },
    /// `{{range p}} ... {{else}} ... {{end}}`, rebinding the cursor per element.
    Range {
        pipeline: Pipeline,
        body: Vec<Item>,
        otherwise: Vec<Item>,
    },
    /// `{{with p}} ... {{else}} ... {{end}}`, rebinding the cursor when truthy.
    With {
        pipeline: Pipeline,
        body: Vec<Item>,
        otherwise: Vec<Item>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Pipeline {
    pub commands: Vec<Command>,
    pub pos_start: usize,
    pub pos_end: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub args: Vec<Operand>,
    pub pos_start: usize,
    pub pos_end: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Dot,
    Field(Vec<String>, usize, usize),
    Root(Vec<String>, usize, usize),
    Function(String, usize, usize),
    Literal(Value),
    Nested(Box<Pipeline>),
}

/// How a block body ended.
enum Terminator {
    End,
    Else,
    ElseIf(Pipeline),
    Eof,
}

/// Recursive descent parser over template tokens.
pub struct Parser {
    name: String,
    source: String,
    tokens: Vec<Token>,
    position: usize,
}

impl Parser {
    pub fn new(source: &str, name: &str) -> Result<Self, TemplateError> {
        let tokens = Lexer::new(source).lex().map_err(|err| match err {
            LexError::UnclosedAction { pos } => TemplateError::UnclosedAction {
                src: NamedSource::new(name.to_string(), source.to_string()),
                span: (pos, 2).into(),
            },
            LexError::Invalid {
                message,
                pos_start,
                pos_end,
            } => TemplateError::Syntax {
                src: NamedSource::new(name.to_string(), source.to_string()),
                span: (pos_start, pos_end - pos_start).into(),
                message,
            },
        })?;

        Ok(Self {
            name: name.to_string(),
            source: source.to_string(),
            tokens,
            position: 0,
        })
    }

    /// Template ::= { Text | Action | Block }
    pub fn parse(mut self) -> Result<Template, TemplateError> {
        let (body, terminator) = self.parse_list()?;
        match terminator {
            Terminator::Eof => Ok(Template {
                name: self.name,
                source: self.source,
                body,
            }),
            Terminator::End => self.err_at_previous("unexpected {{end}}"),
            Terminator::Else | Terminator::ElseIf(_) => self.err_at_previous("unexpected {{else}}"),
        }
    }

    fn parse_list(&mut self) -> Result<(Vec<Item>, Terminator), TemplateError> {
        let mut items = Vec::new();
        loop {
            let token = self.current().clone();
            match token.ttype {
                TokenType::Eof => return Ok((items, Terminator::Eof)),
                TokenType::Text(text) => {
                    self.advance();
                    items.push(Item::Text(text));
                }
                TokenType::LeftDelim => {
                    self.advance();
                    let keyword = self.keyword().map(str::to_string);
                    match keyword.as_deref() {
                        Some("end") => {
                            self.advance();
                            self.expect_right_delim()?;
                            return Ok((items, Terminator::End));
                        }
                        Some("else") => {
                            self.advance();
                            if self.keyword() == Some("if") {
                                self.advance();
                                let pipeline = self.parse_pipeline()?;
                                self.expect_right_delim()?;
                                return Ok((items, Terminator::ElseIf(pipeline)));
                            }
                            self.expect_right_delim()?;
                            return Ok((items, Terminator::Else));
                        }
                        Some("if") => {
                            self.advance();
                            items.push(self.parse_if()?);
                        }
                        Some("range") => {
                            self.advance();
                            let (pipeline, body, otherwise) = self.parse_block("range")?;
                            items.push(Item::Range {
                                pipeline,
                                body,
                                otherwise,
                            });
                        }
                        Some("with") => {
                            self.advance();
                            let (pipeline, body, otherwise) = self.parse_block("with")?;
                            items.push(Item::With {
                                pipeline,
                                body,
                                otherwise,
                            });
                        }
                        _ => {
                            let pipeline = self.parse_pipeline()?;
                            self.expect_right_delim()?;
                            items.push(Item::Action(pipeline));
                        }
                    }
                }
                _ => return self.err_unexpected("text or an action"),
            }
        }
    }

    /// If ::= "{{if" Pipeline "}}" List { "{{else if" Pipeline "}}" List } [ "{{else}}" List ] "{{end}}"
    fn parse_if(&mut self) -> Result<Item, TemplateError> {
        let mut branches = Vec::new();
        let mut condition = self.parse_pipeline()?;
        self.expect_right_delim()?;

        loop {
            let (body, terminator) = self.parse_list()?;
            branches.push((condition, body));
            match terminator {
                Terminator::End => {
                    return Ok(Item::If {
                        branches,
                        otherwise: Vec::new(),
                    })
                }
                Terminator::ElseIf(next) => condition = next,
                Terminator::Else => {
                    let otherwise = self.parse_else_body("if")?;
                    return Ok(Item::If {
                        branches,
                        otherwise,
                    });
                }
                Terminator::Eof => return self.err_at_previous("unexpected EOF in {{if}}"),
            }
        }
    }

    fn parse_block(
        &mut self,
        keyword: &str,
    ) -> Result<(Pipeline, Vec<Item>, Vec<Item>), TemplateError> {
        let pipeline = self.parse_pipeline()?;
        self.expect_right_delim()?;
        let (body, terminator) = self.parse_list()?;
        let otherwise = match terminator {
            Terminator::End => Vec::new(),
            Terminator::Else => self.parse_else_body(keyword)?,
            Terminator::ElseIf(_) => {
                return self.err_at_previous(&format!("{{{{else if}}}} is not allowed in {{{{{keyword}}}}}"))
            }
            Terminator::Eof => {
                return self.err_at_previous(&format!("unexpected EOF in {{{{{keyword}}}}}"))
            }
        };
        Ok((pipeline, body, otherwise))
    }

    fn parse_else_body(&mut self, keyword: &str) -> Result<Vec<Item>, TemplateError> {
        let (otherwise, terminator) = self.parse_list()?;
        match terminator {
            Terminator::End => Ok(otherwise),
            Terminator::Eof => self.err_at_previous(&format!("unexpected EOF in {{{{{keyword}}}}}")),
            _ => self.err_at_previous("expected {{end}} after {{else}} branch"),
        }
    }

    /// Pipeline ::= Command { "|" Command }
    fn parse_pipeline(&mut self) -> Result<Pipeline, TemplateError> {
        let pos_start = self.current().pos_start;
        let mut commands = vec![self.parse_command()?];
        while self.current().ttype == TokenType::Pipe {
            self.advance();
            commands.push(self.parse_command()?);
        }
        let pos_end = commands.last().map_or(pos_start, |c| c.pos_end);
        Ok(Pipeline {
            commands,
            pos_start,
            pos_end,
        })
    }

    /// Command ::= Operand { Operand }
    fn parse_command(&mut self) -> Result<Command, TemplateError> {
        let pos_start = self.current().pos_start;
        let mut args = Vec::new();
        let mut pos_end = pos_start;
        while let Some(operand) = self.parse_operand()? {
            pos_end = self.tokens[self.position - 1].pos_end;
            args.push(operand);
        }
        if args.is_empty() {
            return self.err_unexpected("an operand");
        }
        Ok(Command {
            args,
            pos_start,
            pos_end,
        })
    }

    fn parse_operand(&mut self) -> Result<Option<Operand>, TemplateError> {
        let token = self.current().clone();
        let operand = match token.ttype {
            TokenType::Dot => Operand::Dot,
            TokenType::Field(chain) => Operand::Field(chain, token.pos_start, token.pos_end),
            TokenType::Variable(chain) => Operand::Root(chain, token.pos_start, token.pos_end),
            TokenType::Identifier(name) => {
                if matches!(name.as_str(), "if" | "else" | "end" | "range" | "with") {
                    return self.err_unexpected("an operand, not a keyword");
                }
                Operand::Function(name, token.pos_start, token.pos_end)
            }
            TokenType::String(s) => Operand::Literal(Value::String(s)),
            TokenType::Number(n) => Operand::Literal(Value::Number(n)),
            TokenType::Bool(b) => Operand::Literal(Value::Bool(b)),
            TokenType::Nil => Operand::Literal(Value::Null),
            TokenType::LParen => {
                self.advance();
                let inner = self.parse_pipeline()?;
                if self.current().ttype != TokenType::RParen {
                    return self.err_unexpected("')'");
                }
                Operand::Nested(Box::new(inner))
            }
            _ => return Ok(None),
        };
        self.advance();
        Ok(Some(operand))
    }

    fn keyword(&self) -> Option<&str> {
        match &self.current().ttype {
            TokenType::Identifier(name) => Some(name.as_str()),
            _ => None,
        }
    }

    fn expect_right_delim(&mut self) -> Result<(), TemplateError> {
        if self.current().ttype == TokenType::RightDelim {
            self.advance();
            Ok(())
        } else {
            self.err_unexpected("'}}'")
        }
    }

    fn current(&self) -> &Token {
        // The lexer always ends the stream with Eof.
        let last = self.tokens.len() - 1;
        &self.tokens[self.position.min(last)]
    }

    fn advance(&mut self) {
        if self.position < self.tokens.len() {
            self.position += 1;
        }
    }

    fn src(&self) -> NamedSource<String> {
        NamedSource::new(self.name.clone(), self.source.clone())
    }

    fn err_unexpected<T>(&self, expected: &str) -> Result<T, TemplateError> {
        let token = self.current();
        Err(TemplateError::Syntax {
            src: self.src(),
            span: (token.pos_start, token.pos_end - token.pos_start).into(),
            message: format!("expected {expected}"),
        })
    }

    fn err_at_previous<T>(&self, message: &str) -> Result<T, TemplateError> {
        let token = &self.tokens[self.position.saturating_sub(1)];
        Err(TemplateError::Syntax {
            src: self.src(),
            span: (token.pos_start, token.pos_end - token.pos_start).into(),
            message: message.to_string(),
        })
    }
}
