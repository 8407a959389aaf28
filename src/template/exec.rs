use super::parser::{Command, Item, Operand, Pipeline, Template};
use crate::error::TemplateError;
use crate::value::{escape_html, is_truthy, to_json_html, to_text, type_name};
use chrono::format::{Item as FormatItem, StrftimeItems};
use chrono::{DateTime, FixedOffset};
use miette::{NamedSource, SourceSpan};
use serde_json::Value;
use std::cmp::Ordering;

/// Executes a parsed [`Template`] against a data value.
pub struct Exec<'t> {
    template: &'t Template,
    root: &'t Value,
    out: String,
}

impl<'t> Exec<'t> {
    pub fn new(template: &'t Template, root: &'t Value) -> Self {
        Self {
            template,
            root,
            out: String::with_capacity(template.source.len()),
        }
    }

    pub fn run(mut self) -> Result<String, TemplateError> {
        let template = self.template;
        self.walk(&template.body, self.root)?;
        Ok(self.out)
    }

    fn walk(&mut self, items: &[Item], dot: &Value) -> Result<(), TemplateError> {
        for item in items {
            match item {
                Item::Text(text) => self.out.push_str(text),
                Item::Action(pipeline) => {
                    let value = self.eval_pipeline(pipeline, dot)?;
                    self.out.push_str(&to_text(&value));
                }
                Item::If {
                    branches,
                    otherwise,
                } => {
                    let mut taken = false;
                    for (condition, body) in branches {
                        if is_truthy(&self.eval_pipeline(condition, dot)?) {
                            self.walk(body, dot)?;
                            taken = true;
                            break;
                        }
                    }
                    if !taken {
                        self.walk(otherwise, dot)?;
                    }
                }
                Item::With {
                    pipeline,
                    body,
                    otherwise,
                } => {
                    let value = self.eval_pipeline(pipeline, dot)?;
                    if is_truthy(&value) {
                        self.walk(body, &value)?;
                    } else {
                        self.walk(otherwise, dot)?;
                    }
                }
                Item::Range {
                    pipeline,
                    body,
                    otherwise,
                } => {
                    let value = self.eval_pipeline(pipeline, dot)?;
                    let elements: Vec<Value> = match value {
                        Value::Null => Vec::new(),
                        Value::Array(items) => items,
                        Value::Object(map) => map.into_iter().map(|(_, v)| v).collect(),
                        Value::Number(ref n) if n.as_u64().is_some() || n.as_i64().is_some() => {
                            let count = n.as_i64().unwrap_or(0).max(0);
                            (0..count).map(Value::from).collect()
                        }
                        other => {
                            return Err(self.mismatch(
                                pipeline.pos_start,
                                pipeline.pos_end,
                                format!("range can't iterate over {}", type_name(&other)),
                            ))
                        }
                    };
                    if elements.is_empty() {
                        self.walk(otherwise, dot)?;
                    }
                    for element in &elements {
                        self.walk(body, element)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn eval_pipeline(&self, pipeline: &Pipeline, dot: &Value) -> Result<Value, TemplateError> {
        let mut piped: Option<Value> = None;
        for command in &pipeline.commands {
            piped = Some(self.eval_command(command, dot, piped)?);
        }
        Ok(piped.unwrap_or(Value::Null))
    }

    fn eval_command(
        &self,
        command: &Command,
        dot: &Value,
        piped: Option<Value>,
    ) -> Result<Value, TemplateError> {
        let (first, rest) = command
            .args
            .split_first()
            .ok_or_else(|| self.mismatch(command.pos_start, command.pos_end, "empty command".to_string()))?;

        if let Operand::Function(name, start, end) = first {
            let mut args = rest
                .iter()
                .map(|operand| self.eval_operand(operand, dot))
                .collect::<Result<Vec<_>, _>>()?;
            if let Some(value) = piped {
                args.push(value);
            }
            return self.call(name, *start, *end, args);
        }

        if !rest.is_empty() || piped.is_some() {
            return Err(self.mismatch(
                command.pos_start,
                command.pos_end,
                "can't give argument to non-function".to_string(),
            ));
        }
        self.eval_operand(first, dot)
    }

    fn eval_operand(&self, operand: &Operand, dot: &Value) -> Result<Value, TemplateError> {
        match operand {
            Operand::Dot => Ok(dot.clone()),
            Operand::Field(chain, start, end) => self.lookup(dot, chain, *start, *end),
            Operand::Root(chain, start, end) => self.lookup(self.root, chain, *start, *end),
            Operand::Function(name, start, end) => self.call(name, *start, *end, Vec::new()),
            Operand::Literal(value) => Ok(value.clone()),
            Operand::Nested(pipeline) => self.eval_pipeline(pipeline, dot),
        }
    }

    fn lookup(
        &self,
        base: &Value,
        chain: &[String],
        start: usize,
        end: usize,
    ) -> Result<Value, TemplateError> {
        let mut current = base;
        for field in chain {
            current = match current {
                Value::Object(map) => map.get(field).ok_or_else(|| TemplateError::UndefinedField {
                    src: self.src(),
                    span: span(start, end),
                    field: field.clone(),
                    context: self.template.name.clone(),
                })?,
                other => {
                    return Err(TemplateError::UndefinedField {
                        src: self.src(),
                        span: span(start, end),
                        field: field.clone(),
                        context: format!("type {}", type_name(other)),
                    })
                }
            };
        }
        Ok(current.clone())
    }

    fn call(
        &self,
        name: &str,
        start: usize,
        end: usize,
        args: Vec<Value>,
    ) -> Result<Value, TemplateError> {
        let arity = |min: usize, max: Option<usize>| -> Result<(), TemplateError> {
            let ok = args.len() >= min && max.map_or(true, |max| args.len() <= max);
            if ok {
                return Ok(());
            }
            let expected = match max {
                Some(max) if max == min => min.to_string(),
                Some(max) => format!("{min} to {max}"),
                None => format!("at least {min}"),
            };
            Err(TemplateError::WrongArgCount {
                src: self.src(),
                span: span(start, end),
                name: name.to_string(),
                expected,
                found: args.len(),
            })
        };

        match name {
            "eq" => {
                arity(2, None)?;
                for other in &args[1..] {
                    if self.compare(&args[0], other, start, end)? == Some(Ordering::Equal) {
                        return Ok(Value::Bool(true));
                    }
                }
                Ok(Value::Bool(false))
            }
            "ne" => {
                arity(2, Some(2))?;
                Ok(Value::Bool(
                    self.compare(&args[0], &args[1], start, end)? != Some(Ordering::Equal),
                ))
            }
            "lt" | "le" | "gt" | "ge" => {
                arity(2, Some(2))?;
                let ordering = match (&args[0], &args[1]) {
                    (Value::Number(_), Value::Number(_)) | (Value::String(_), Value::String(_)) => {
                        self.compare(&args[0], &args[1], start, end)?
                    }
                    (a, b) => {
                        return Err(self.mismatch(
                            start,
                            end,
                            format!("{name}: can't order {} and {}", type_name(a), type_name(b)),
                        ))
                    }
                };
                let result = match (name, ordering) {
                    (_, None) => false,
                    ("lt", Some(o)) => o == Ordering::Less,
                    ("le", Some(o)) => o != Ordering::Greater,
                    ("gt", Some(o)) => o == Ordering::Greater,
                    (_, Some(o)) => o != Ordering::Less,
                };
                Ok(Value::Bool(result))
            }
            "and" => {
                arity(1, None)?;
                let last = args.len() - 1;
                Ok(args
                    .iter()
                    .position(|v| !is_truthy(v))
                    .map_or_else(|| args[last].clone(), |i| args[i].clone()))
            }
            "or" => {
                arity(1, None)?;
                let last = args.len() - 1;
                Ok(args
                    .iter()
                    .position(is_truthy)
                    .map_or_else(|| args[last].clone(), |i| args[i].clone()))
            }
            "not" => {
                arity(1, Some(1))?;
                Ok(Value::Bool(!is_truthy(&args[0])))
            }
            "len" => {
                arity(1, Some(1))?;
                let len = match &args[0] {
                    Value::String(s) => s.chars().count(),
                    Value::Array(a) => a.len(),
                    Value::Object(o) => o.len(),
                    Value::Null => 0,
                    other => {
                        return Err(self.mismatch(
                            start,
                            end,
                            format!("len of type {}", type_name(other)),
                        ))
                    }
                };
                Ok(Value::from(len))
            }
            "index" => {
                arity(1, None)?;
                let mut current = args[0].clone();
                for key in &args[1..] {
                    current = match (&current, key) {
                        (Value::Array(items), Value::Number(n)) => {
                            let i = n
                                .as_u64()
                                .and_then(|i| usize::try_from(i).ok())
                                .filter(|i| *i < items.len())
                                .ok_or_else(|| {
                                    self.mismatch(start, end, format!("index out of range: {n}"))
                                })?;
                            items[i].clone()
                        }
                        (Value::Object(map), Value::String(k)) => {
                            map.get(k).cloned().unwrap_or(Value::Null)
                        }
                        (Value::Null, _) => Value::Null,
                        (container, key) => {
                            return Err(self.mismatch(
                                start,
                                end,
                                format!(
                                    "can't index item of type {} with {}",
                                    type_name(container),
                                    type_name(key)
                                ),
                            ))
                        }
                    };
                }
                Ok(current)
            }
            "print" => {
                let mut out = String::new();
                for (i, arg) in args.iter().enumerate() {
                    let needs_space = i > 0
                        && !matches!(arg, Value::String(_))
                        && !matches!(args[i - 1], Value::String(_));
                    if needs_space {
                        out.push(' ');
                    }
                    out.push_str(&to_text(arg));
                }
                Ok(Value::String(out))
            }
            "json" => {
                arity(1, Some(1))?;
                Ok(Value::String(to_json_html(&args[0])))
            }
            "time" => {
                arity(2, Some(2))?;
                let Value::String(layout) = &args[1] else {
                    return Err(self.mismatch(
                        start,
                        end,
                        format!("time layout of type {}", type_name(&args[1])),
                    ));
                };
                format_time(&args[0], layout)
                    .map(Value::String)
                    .map_err(|message| self.mismatch(start, end, message))
            }
            "html" => {
                arity(1, None)?;
                let joined: Vec<String> = args.iter().map(to_text).collect();
                Ok(Value::String(escape_html(&joined.concat())))
            }
            _ => Err(TemplateError::UndefinedFunction {
                src: self.src(),
                span: span(start, end),
                name: name.to_string(),
            }),
        }
    }

    /// Orders two values of compatible types. `None` means "not equal, no order"
    /// (composite values only support equality, nil only equals nil).
    fn compare(
        &self,
        a: &Value,
        b: &Value,
        start: usize,
        end: usize,
    ) -> Result<Option<Ordering>, TemplateError> {
        match (a, b) {
            (Value::Number(x), Value::Number(y)) => {
                if let (Some(x), Some(y)) = (x.as_i64(), y.as_i64()) {
                    return Ok(Some(x.cmp(&y)));
                }
                if let (Some(x), Some(y)) = (x.as_u64(), y.as_u64()) {
                    return Ok(Some(x.cmp(&y)));
                }
                let (x, y) = (x.as_f64().unwrap_or(f64::NAN), y.as_f64().unwrap_or(f64::NAN));
                Ok(x.partial_cmp(&y))
            }
            (Value::String(x), Value::String(y)) => Ok(Some(x.cmp(y))),
            (Value::Bool(x), Value::Bool(y)) => Ok(Some(x.cmp(y))),
            (Value::Null, Value::Null) => Ok(Some(Ordering::Equal)),
            (Value::Array(_), Value::Array(_)) | (Value::Object(_), Value::Object(_)) => {
                Ok((a == b).then_some(Ordering::Equal))
            }
            (Value::Null, _) | (_, Value::Null) => Ok(None),
            (a, b) => Err(self.mismatch(
                start,
                end,
                format!(
                    "incompatible types for comparison: {} and {}",
                    type_name(a),
                    type_name(b)
                ),
            )),
        }
    }

    fn src(&self) -> NamedSource<String> {
        NamedSource::new(self.template.name.clone(), self.template.source.clone())
    }

    fn mismatch(&self, start: usize, end: usize, message: String) -> TemplateError {
        TemplateError::TypeMismatch {
            src: self.src(),
            span: span(start, end),
            message,
        }
    }
}

/// Formats an RFC 3339 string or unix seconds with a strftime `layout`.
fn format_time(value: &Value, layout: &str) -> Result<String, String> {
    let time: DateTime<FixedOffset> = match value {
        Value::String(text) => DateTime::parse_from_rfc3339(text)
            .map_err(|err| format!("time: {text:?} is not an RFC 3339 timestamp: {err}"))?,
        Value::Number(n) => n
            .as_i64()
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .map(|utc| utc.fixed_offset())
            .ok_or_else(|| format!("time: {n} is out of range"))?,
        other => return Err(format!("time of type {}", type_name(other))),
    };
    let items: Vec<FormatItem<'_>> = StrftimeItems::new(layout).collect();
    if items.contains(&FormatItem::Error) {
        return Err(format!("time: invalid layout {layout:?}"));
    }
    Ok(time.format_with_items(items.iter()).to_string())
}

fn span(start: usize, end: usize) -> SourceSpan {
    (start, end.saturating_sub(start)).into()
}
