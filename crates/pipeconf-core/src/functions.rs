//! Functions usable in an interpolation block pipeline
//!
//! - `expand_vars` - expand `$VAR` and `${VAR}` from pipeline variables
//! - `truncate(offset, length)` - character based substring
//! - `posix_escape` - quote a value for a POSIX shell

use crate::context::InterpolationContext;
use crate::error::{Error, Result};
use crate::interpolation::FunctionCall;
use crate::value::Value;

/// Apply `call` to `value`
pub fn apply(call: &FunctionCall, value: Value, context: &InterpolationContext) -> Result<Value> {
    let text = |value: Value| match value {
        Value::String(s) => Ok(s),
        _ => Err(Error::function_input_type(&call.name)),
    };

    match (call.name.as_str(), call.args.as_slice()) {
        ("expand_vars", []) => Ok(Value::String(expand_vars(&text(value)?, context))),
        ("truncate", [offset, length]) if *offset >= 0 && *length >= 0 => Ok(Value::String(
            truncate(&text(value)?, *offset as usize, *length as usize),
        )),
        ("posix_escape", []) => Ok(Value::String(posix_escape(&text(value)?))),
        _ => Err(Error::unknown_function(&call.name)),
    }
}

/// Expand `$NAME` and `${NAME}` references; unknown names are kept as written
pub fn expand_vars(input: &str, context: &InterpolationContext) -> String {
    let mut result = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(pos) = rest.find('$') {
        result.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];

        let (name, consumed) = if let Some(braced) = after.strip_prefix('{') {
            match braced.find('}') {
                Some(end) if is_variable_name(&braced[..end]) => (&braced[..end], end + 2),
                _ => ("", 0),
            }
        } else {
            let end = after
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                .unwrap_or(after.len());
            (&after[..end], end)
        };

        match context.variable(name) {
            Some(value) if !name.is_empty() => {
                result.push_str(value);
                rest = &after[consumed..];
            }
            _ => {
                result.push('$');
                rest = after;
            }
        }
    }

    result.push_str(rest);
    result
}

fn is_variable_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Substring of `length` characters starting at character `offset`
pub fn truncate(input: &str, offset: usize, length: usize) -> String {
    input.chars().skip(offset).take(length).collect()
}

/// Escape `input` for safe use as a single POSIX shell word
pub fn posix_escape(input: &str) -> String {
    if input.is_empty() {
        return "''".to_string();
    }

    let mut result = String::with_capacity(input.len() * 2);
    for c in input.chars() {
        match c {
            '\n' => result.push_str("'\n'"),
            c if c.is_ascii_alphanumeric() || "_-.,:+/@".contains(c) => result.push(c),
            c => {
                result.push('\\');
                result.push(c);
            }
        }
    }
    result
}
