//! Loading query and eval text, and environment templating
//!
//! Both the query and the eval argument may name a file. When a regular file
//! with that name exists its contents are used, otherwise the argument itself
//! is the text.
//!
//! Templating replaces `${NAME}` with the value of the environment variable
//! `NAME` and `$$` with a single `$`. Any other `$` is left alone, so
//! positional parameters and `$` inside string literals survive unchanged.

use std::io;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("environment variable {0} is not defined")]
    Undefined(String),

    #[error("unterminated ${{ starting at byte {0}")]
    Unterminated(usize),

    #[error("invalid variable name {0:?}")]
    InvalidName(String),
}

/// Contents of the file named `arg`, or `arg` itself if there is no such file
pub fn read_source(arg: &str) -> io::Result<String> {
    let path = Path::new(arg);
    if path.is_file() {
        std::fs::read_to_string(path)
    } else {
        Ok(arg.to_string())
    }
}

/// Expand `${NAME}` and `$$` using `lookup` for variable values
pub fn render<F>(template: &str, lookup: F) -> Result<String, TemplateError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    let mut offset = 0;

    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];

        if after.starts_with('$') {
            out.push('$');
            rest = &after[1..];
            offset += pos + 2;
        } else if let Some(body) = after.strip_prefix('{') {
            let end = body.find('}').ok_or(TemplateError::Unterminated(offset + pos))?;
            let name = &body[..end];
            if !is_valid_name(name) {
                return Err(TemplateError::InvalidName(name.to_string()));
            }

            let value = lookup(name).ok_or_else(|| TemplateError::Undefined(name.to_string()))?;
            out.push_str(&value);

            // '$' + '{' + name + '}'
            let consumed = pos + 2 + end + 1;
            rest = &rest[consumed..];
            offset += consumed;
        } else {
            out.push('$');
            rest = after;
            offset += pos + 1;
        }
    }

    out.push_str(rest);
    Ok(out)
}

fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
