//! A small logic-enabled template language used by components to produce markup.
//!
//! The syntax follows the familiar double-brace style:
//!
//! - `{{.Field}}`, `{{.A.B}}`: field access on the cursor; `{{.}}` is the cursor itself
//! - `{{$}}`, `{{$.Field}}`: access from the root data, even inside `range`/`with`
//! - `{{if p}} .. {{else if q}} .. {{else}} .. {{end}}`
//! - `{{range p}} .. {{else}} .. {{end}}` over arrays, object values or an integer count
//! - `{{with p}} .. {{else}} .. {{end}}`
//! - pipelines `{{.Value | json}}` and parenthesized calls `{{if (eq .A 1)}}`
//! - helpers `eq ne lt le gt ge and or not len index print json html`
//! - comments `{{/* .. */}}` and trim markers `{{- ` / ` -}}`
//!
//! Action output is written verbatim. Use `json` or `html` to escape values
//! that may contain markup characters.

mod exec;
mod lexer;
mod parser;

pub use parser::{Command, Item, Operand, Pipeline, Template};

use crate::error::TemplateError;
use serde_json::Value;

/// Parses `source` without executing it.
pub fn parse(source: &str, name: &str) -> Result<Template, TemplateError> {
    parser::Parser::new(source, name)?.parse()
}

/// Expands `source` against `data`. Any syntax or execution error aborts the
/// whole expansion; partial output is never returned.
pub fn render(source: &str, data: &Value) -> Result<String, TemplateError> {
    render_named(source, data, "template")
}

/// Like [`render`], naming the template in diagnostics.
pub fn render_named(source: &str, data: &Value, name: &str) -> Result<String, TemplateError> {
    let template = parse(source, name)?;
    template.execute(data)
}

impl Template {
    pub fn execute(&self, data: &Value) -> Result<String, TemplateError> {
        exec::Exec::new(self, data).run()
    }
}
