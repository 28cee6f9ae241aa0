//! Interpolation expression parsing
//!
//! Parses interpolation blocks like:
//! - `$[[ inputs.env ]]` - declared input
//! - `$[[ inputs.config.region ]]` - key inside a mapping input
//! - `$[[ CI_COMMIT_REF_NAME ]]` - pipeline variable
//! - `$[[ inputs.name | expand_vars | truncate(0, 8) ]]` - function pipeline
//!
//! Blocks are found left to right. The text between the markers is not
//! scanned for further blocks.

use crate::error::{Error, ErrorKind, Result};
use crate::interpolator::InterpolationOptions;

/// Opens an interpolation block
pub const OPEN_MARKER: &str = "$[[";
/// Closes an interpolation block
pub const CLOSE_MARKER: &str = "]]";

/// A piece of a scanned string scalar
#[derive(Debug, Clone, PartialEq)]
pub enum Segment<'a> {
    /// Text outside any block
    Literal(&'a str),
    /// A complete block, markers included
    Block(&'a str),
}

/// Split `input` into literal text and interpolation blocks
pub fn scan(input: &str) -> Result<Vec<Segment<'_>>> {
    let mut segments = Vec::new();
    let mut rest = input;

    while let Some(start) = rest.find(OPEN_MARKER) {
        if start > 0 {
            segments.push(Segment::Literal(&rest[..start]));
        }
        let after_open = start + OPEN_MARKER.len();
        let Some(close) = rest[after_open..].find(CLOSE_MARKER) else {
            return Err(ErrorKind::MalformedExpression {
                expression: rest[start..].to_string(),
            }
            .into());
        };
        let end = after_open + close + CLOSE_MARKER.len();
        segments.push(Segment::Block(&rest[start..end]));
        rest = &rest[end..];
    }

    if !rest.is_empty() {
        segments.push(Segment::Literal(rest));
    }

    Ok(segments)
}

/// Check if a string contains an interpolation block opener
pub fn contains_interpolation(input: &str) -> bool {
    input.contains(OPEN_MARKER)
}

/// Dotted path naming the value a block refers to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessPath {
    segments: Vec<String>,
}

impl AccessPath {
    pub fn segments(&self) -> &[String] {
        &self.segments
    }
}

impl std::fmt::Display for AccessPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.segments.join("."))
    }
}

/// A function applied to the accessed value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionCall {
    pub name: String,
    pub args: Vec<i64>,
}

/// A parsed interpolation block
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    pub access: AccessPath,
    pub functions: Vec<FunctionCall>,
}

impl Expression {
    /// Parse a block including its `$[[` and `]]` markers
    pub fn parse(block: &str, options: &InterpolationOptions) -> Result<Expression> {
        let inner = block
            .strip_prefix(OPEN_MARKER)
            .and_then(|s| s.strip_suffix(CLOSE_MARKER))
            .ok_or_else(|| Error::from(ErrorKind::MalformedExpression {
                expression: block.to_string(),
            }))?
            .trim();

        if inner.is_empty() {
            return Err(ErrorKind::EmptyExpression {
                expression: block.to_string(),
            }
            .into());
        }
        if inner.len() > options.max_expression_size {
            return Err(ErrorKind::ExpressionTooLarge.into());
        }

        let mut parts = inner.split('|');
        let access = parse_access(parts.next().unwrap_or_default().trim(), block, options)?;

        let calls: Vec<&str> = parts.map(str::trim).collect();
        if calls.len() > options.max_functions {
            return Err(ErrorKind::TooManyFunctions {
                expression: block.to_string(),
            }
            .into());
        }
        let functions = calls
            .into_iter()
            .map(|call| FunctionParser::new(call).parse())
            .collect::<Result<Vec<_>>>()?;

        Ok(Expression { access, functions })
    }
}

fn parse_access(text: &str, block: &str, options: &InterpolationOptions) -> Result<AccessPath> {
    let valid_segment =
        |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');

    let segments: Vec<String> = text.split('.').map(str::to_string).collect();
    if !segments.iter().all(|s| valid_segment(s)) {
        return Err(ErrorKind::InvalidAccess {
            expression: block.to_string(),
        }
        .into());
    }
    if segments.len() > options.max_access_objects {
        return Err(ErrorKind::TooManyAccessObjects {
            expression: block.to_string(),
        }
        .into());
    }

    Ok(AccessPath { segments })
}

/// Parser for a single `name` or `name(arg, ...)` function call
struct FunctionParser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> FunctionParser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn parse(&mut self) -> Result<FunctionCall> {
        let name = self.collect_while(|c| c.is_ascii_alphanumeric() || c == '_');
        if name.is_empty() {
            return Err(Error::unknown_function(self.input));
        }

        self.skip_whitespace();
        let mut args = Vec::new();

        if self.current() == Some('(') {
            self.advance();
            loop {
                self.skip_whitespace();
                match self.current() {
                    Some(')') if args.is_empty() => {
                        self.advance();
                        break;
                    }
                    Some(c) if c == '-' || c.is_ascii_digit() => {
                        let number = self.collect_while(|c| c == '-' || c.is_ascii_digit());
                        let arg = number
                            .parse::<i64>()
                            .map_err(|_| Error::unknown_function(&name))?;
                        args.push(arg);
                    }
                    _ => return Err(Error::unknown_function(&name)),
                }

                self.skip_whitespace();
                match self.current() {
                    Some(',') => self.advance(),
                    Some(')') => {
                        self.advance();
                        break;
                    }
                    _ => return Err(Error::unknown_function(&name)),
                }
            }
        }

        self.skip_whitespace();
        if !self.is_eof() {
            return Err(Error::unknown_function(self.input));
        }

        Ok(FunctionCall { name, args })
    }

    fn is_eof(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn current(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn advance(&mut self) {
        if let Some(c) = self.current() {
            self.pos += c.len_utf8();
        }
    }

    fn collect_while(&mut self, accept: impl Fn(char) -> bool) -> String {
        let mut result = String::new();
        while let Some(c) = self.current() {
            if !accept(c) {
                break;
            }
            result.push(c);
            self.advance();
        }
        result
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.current() {
            if c.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(block: &str) -> Result<Expression> {
        Expression::parse(block, &InterpolationOptions::default())
    }

    #[test]
    fn test_scan_literal() {
        assert_eq!(scan("plain text").unwrap(), vec![Segment::Literal("plain text")]);
        assert!(scan("").unwrap().is_empty());
    }

    #[test]
    fn test_scan_blocks() {
        let segments = scan("deploy $[[ inputs.env ]] to $[[inputs.region]]!").unwrap();
        assert_eq!(
            segments,
            vec![
                Segment::Literal("deploy "),
                Segment::Block("$[[ inputs.env ]]"),
                Segment::Literal(" to "),
                Segment::Block("$[[inputs.region]]"),
                Segment::Literal("!"),
            ]
        );
    }

    #[test]
    fn test_scan_adjacent_blocks() {
        let segments = scan("$[[ a ]]$[[ b ]]").unwrap();
        assert_eq!(
            segments,
            vec![Segment::Block("$[[ a ]]"), Segment::Block("$[[ b ]]")]
        );
    }

    #[test]
    fn test_scan_unclosed_block() {
        let err = scan("echo $[[ inputs.env").unwrap_err();
        assert_eq!(
            err.to_string(),
            "malformed interpolation expression: `$[[ inputs.env`"
        );
    }

    #[test]
    fn test_scan_is_not_recursive() {
        let segments = scan("$[[ a $[[ b ]] ]]").unwrap();
        assert_eq!(
            segments,
            vec![Segment::Block("$[[ a $[[ b ]]"), Segment::Literal(" ]]")]
        );
    }

    #[test]
    fn test_scan_ignores_stray_close_marker() {
        assert_eq!(scan("matrix: [[1, 2]]").unwrap(), vec![Segment::Literal("matrix: [[1, 2]]")]);
    }

    #[test]
    fn test_contains_interpolation() {
        assert!(contains_interpolation("x $[[ inputs.a ]]"));
        assert!(!contains_interpolation("x ${VAR} [[ ]]"));
    }

    #[test]
    fn test_parse_input_access() {
        let expr = parse("$[[ inputs.env ]]").unwrap();
        assert_eq!(expr.access.segments(), &["inputs", "env"]);
        assert_eq!(expr.access.to_string(), "inputs.env");
        assert!(expr.functions.is_empty());
    }

    #[test]
    fn test_parse_variable_access() {
        let expr = parse("$[[CI_PROJECT_NAME]]").unwrap();
        assert_eq!(expr.access.segments(), &["CI_PROJECT_NAME"]);
    }

    #[test]
    fn test_parse_functions() {
        let expr = parse("$[[ inputs.name | expand_vars | truncate(0, 8) ]]").unwrap();
        assert_eq!(
            expr.functions,
            vec![
                FunctionCall {
                    name: "expand_vars".into(),
                    args: vec![]
                },
                FunctionCall {
                    name: "truncate".into(),
                    args: vec![0, 8]
                },
            ]
        );
    }

    #[test]
    fn test_parse_empty_block() {
        let err = parse("$[[  ]]").unwrap_err();
        assert_eq!(err.to_string(), "empty interpolation expression: `$[[  ]]`");
    }

    #[test]
    fn test_parse_invalid_access() {
        for block in ["$[[ inputs..env ]]", "$[[ inputs.env! ]]", "$[[ inputs env ]]", "$[[ a $[[ b ]]"] {
            let err = parse(block).unwrap_err();
            assert!(
                matches!(err.kind, ErrorKind::InvalidAccess { .. }),
                "{} gave {:?}",
                block,
                err
            );
        }
    }

    #[test]
    fn test_parse_too_many_objects() {
        let err = parse("$[[ inputs.a.b.c.d.e ]]").unwrap_err();
        assert!(matches!(err.kind, ErrorKind::TooManyAccessObjects { .. }));
        assert!(parse("$[[ inputs.a.b.c.d ]]").is_ok());
    }

    #[test]
    fn test_parse_expression_too_large() {
        let block = format!("$[[ inputs.{} ]]", "a".repeat(1100));
        let err = parse(&block).unwrap_err();
        assert_eq!(err.kind, ErrorKind::ExpressionTooLarge);
    }

    #[test]
    fn test_parse_too_many_functions() {
        let err = parse("$[[ inputs.a | posix_escape | posix_escape | posix_escape | posix_escape ]]")
            .unwrap_err();
        assert!(matches!(err.kind, ErrorKind::TooManyFunctions { .. }));
    }

    #[test]
    fn test_parse_malformed_function() {
        for block in ["$[[ inputs.a | truncate(1 ]]", "$[[ inputs.a | truncate(x) ]]", "$[[ inputs.a | ]]"] {
            let err = parse(block).unwrap_err();
            assert!(
                matches!(err.kind, ErrorKind::UnknownFunction { .. }),
                "{} gave {:?}",
                block,
                err
            );
        }
    }
}
