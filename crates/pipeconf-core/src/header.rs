//! Header document parsing
//!
//! The header declares the inputs a pipeline document accepts:
//!
//! ```yaml
//! spec:
//!   inputs:
//!     env:
//!       options: [dev, prod]
//!       default: dev
//!     replicas:
//!       type: number
//!     tag:
//!       regex: ^v\d+\.\d+$
//! ```
//!
//! Parsing happens in two steps that fail independently: [`Header`] checks
//! the overall structure, [`ParameterSpec`] checks every input declaration.

use std::fmt;

use indexmap::IndexMap;
use regex::Regex;

use crate::error::Error;
use crate::interpolator::InterpolationOptions;
use crate::value::Value;

const HEADER_KEYS: &[&str] = &["spec"];
const SPEC_KEYS: &[&str] = &["inputs"];
const INPUT_KEYS: &[&str] = &["type", "default", "description", "options", "regex"];

/// The declared type of an input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParameterType {
    #[default]
    String,
    Number,
    Boolean,
    Array,
}

impl ParameterType {
    /// Parse a type name as written in the header
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "string" => Some(ParameterType::String),
            "number" => Some(ParameterType::Number),
            "boolean" => Some(ParameterType::Boolean),
            "array" => Some(ParameterType::Array),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ParameterType::String => "string",
            ParameterType::Number => "number",
            ParameterType::Boolean => "boolean",
            ParameterType::Array => "array",
        }
    }

    /// Whether `value` is of this type, without any coercion
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            ParameterType::String => value.is_string(),
            ParameterType::Number => value.is_number(),
            ParameterType::Boolean => matches!(value, Value::Bool(_)),
            ParameterType::Array => value.is_sequence(),
        }
    }

    fn supports_options(&self) -> bool {
        matches!(self, ParameterType::String | ParameterType::Number)
    }
}

impl fmt::Display for ParameterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Structurally valid header document
#[derive(Debug, Clone)]
pub struct Header {
    inputs: Value,
}

impl Header {
    /// Check the structure of a header document
    pub fn parse(document: &Value) -> Result<Header, Vec<Error>> {
        let mut errors = Vec::new();

        let Some(root) = document.as_mapping() else {
            return Err(vec![Error::header("header", "config must be a hash")]);
        };
        if let Some(err) = unknown_keys("header", root.keys(), HEADER_KEYS) {
            errors.push(err);
        }

        let mut inputs = Value::Null;
        match root.get("spec") {
            Some(Value::Mapping(spec)) => {
                if let Some(err) = unknown_keys("header:spec", spec.keys(), SPEC_KEYS) {
                    errors.push(err);
                }
                match spec.get("inputs") {
                    None | Some(Value::Null) => {}
                    Some(value @ Value::Mapping(_)) => inputs = value.clone(),
                    Some(_) => errors.push(Error::header("header:spec:inputs", "config must be a hash")),
                }
            }
            Some(Value::Null) | None => {}
            Some(_) => errors.push(Error::header("header:spec", "config must be a hash")),
        }

        if errors.is_empty() {
            Ok(Header { inputs })
        } else {
            Err(errors)
        }
    }

    /// The raw `spec.inputs` declarations (`Value::Null` when absent)
    pub fn inputs(&self) -> &Value {
        &self.inputs
    }
}

/// Declaration of a single input
#[derive(Debug, Clone)]
pub struct InputSpec {
    pub name: String,
    pub param_type: ParameterType,
    pub default: Option<Value>,
    pub description: Option<String>,
    pub regex: Option<Regex>,
    pub options: Option<Vec<Value>>,
}

impl InputSpec {
    /// An input without a default must be supplied by the caller
    pub fn is_required(&self) -> bool {
        self.default.is_none()
    }

    /// Allowed options rendered for error messages
    pub fn option_labels(&self) -> Vec<String> {
        self.options
            .iter()
            .flatten()
            .map(Value::to_text)
            .collect()
    }

    fn parse(name: &str, declaration: &Value, options: &InterpolationOptions) -> Result<InputSpec, Vec<Error>> {
        let path = format!("header:spec:inputs:{}", name);
        let empty = IndexMap::new();
        let entry = match declaration {
            Value::Null => &empty,
            Value::Mapping(map) => map,
            _ => return Err(vec![Error::header(path, "config must be a hash")]),
        };

        let mut errors = Vec::new();
        if let Some(err) = unknown_keys(&path, entry.keys(), INPUT_KEYS) {
            errors.push(err);
        }

        let param_type = match entry.get("type") {
            None | Some(Value::Null) => ParameterType::default(),
            Some(Value::String(type_name)) => ParameterType::parse(type_name).unwrap_or_else(|| {
                errors.push(Error::header(&path, format!("input type unknown value: {}", type_name)));
                ParameterType::default()
            }),
            Some(other) => {
                errors.push(Error::header(&path, format!("input type unknown value: {}", other)));
                ParameterType::default()
            }
        };

        let description = match entry.get("description") {
            None | Some(Value::Null) => None,
            Some(Value::String(text)) => Some(text.clone()),
            Some(_) => {
                errors.push(Error::header(&path, "description must be a string"));
                None
            }
        };

        let regex = match entry.get("regex") {
            None | Some(Value::Null) => None,
            Some(_) if param_type != ParameterType::String => {
                errors.push(Error::header(&path, "regex can only be used with string inputs"));
                None
            }
            Some(Value::String(pattern)) => match Regex::new(pattern) {
                Ok(regex) => Some(regex),
                Err(e) => {
                    errors.push(Error::header(&path, format!("regex is invalid: {}", e)));
                    None
                }
            },
            Some(_) => {
                errors.push(Error::header(&path, "regex is invalid: pattern must be a string"));
                None
            }
        };

        let allowed = match entry.get("options") {
            None | Some(Value::Null) => None,
            Some(Value::Sequence(values)) => {
                if values.is_empty() {
                    errors.push(Error::header(&path, "options cannot be empty"));
                } else if values.len() > options.max_options {
                    errors.push(Error::header(
                        &path,
                        format!("options cannot contain more than {} values", options.max_options),
                    ));
                } else if !param_type.supports_options() {
                    errors.push(Error::header(
                        &path,
                        "options can only be used with string and number inputs",
                    ));
                } else if !values.iter().all(|v| param_type.matches(v)) {
                    errors.push(Error::header(
                        &path,
                        format!("options must only contain {} values", param_type),
                    ));
                }
                Some(values.clone())
            }
            Some(_) => {
                errors.push(Error::header(&path, "options must be a list"));
                None
            }
        };

        let default = entry.get("default").filter(|v| !v.is_null()).cloned();

        if errors.is_empty() {
            Ok(InputSpec {
                name: name.to_string(),
                param_type,
                default,
                description,
                regex,
                options: allowed,
            })
        } else {
            Err(errors)
        }
    }
}

/// All input declarations of a header, in declaration order
#[derive(Debug, Clone, Default)]
pub struct ParameterSpec {
    inputs: IndexMap<String, InputSpec>,
}

impl ParameterSpec {
    /// Parse the `spec.inputs` section. Every declaration is checked and all
    /// problems are reported together.
    pub fn parse(inputs: &Value, options: &InterpolationOptions) -> Result<ParameterSpec, Vec<Error>> {
        let Some(declarations) = inputs.as_mapping() else {
            return if inputs.is_null() {
                Ok(ParameterSpec::default())
            } else {
                Err(vec![Error::header("header:spec:inputs", "config must be a hash")])
            };
        };

        let mut specs = IndexMap::with_capacity(declarations.len());
        let mut errors = Vec::new();
        for (name, declaration) in declarations {
            match InputSpec::parse(name, declaration, options) {
                Ok(spec) => {
                    specs.insert(name.clone(), spec);
                }
                Err(errs) => errors.extend(errs),
            }
        }

        if errors.is_empty() {
            Ok(ParameterSpec { inputs: specs })
        } else {
            Err(errors)
        }
    }

    pub fn get(&self, name: &str) -> Option<&InputSpec> {
        self.inputs.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inputs.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &InputSpec> {
        self.inputs.values()
    }

    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }
}

fn unknown_keys<'a>(
    path: &str,
    keys: impl Iterator<Item = &'a String>,
    allowed: &[&str],
) -> Option<Error> {
    let unknown: Vec<&str> = keys
        .map(String::as_str)
        .filter(|key| !allowed.contains(key))
        .collect();
    if unknown.is_empty() {
        None
    } else {
        Some(Error::header(
            path,
            format!("config contains unknown keys: {}", unknown.join(", ")),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn yaml(text: &str) -> Value {
        Value::from_yaml(serde_yaml::from_str(text).unwrap()).unwrap()
    }

    fn parse_spec(text: &str) -> Result<ParameterSpec, Vec<Error>> {
        let header = Header::parse(&yaml(text)).expect("header should be valid");
        ParameterSpec::parse(header.inputs(), &InterpolationOptions::default())
    }

    fn messages(errors: Vec<Error>) -> Vec<String> {
        errors.into_iter().map(|e| e.to_string()).collect()
    }

    #[test]
    fn test_parse_inputs() {
        let spec = parse_spec(
            r#"
spec:
  inputs:
    env:
      default: prod
      description: Target environment
    replicas:
      type: number
    tag:
      regex: ^v\d+$
    flags:
      type: array
      default: []
"#,
        )
        .unwrap();

        assert_eq!(spec.len(), 4);
        let env = spec.get("env").unwrap();
        assert_eq!(env.param_type, ParameterType::String);
        assert!(!env.is_required());
        assert_eq!(env.description.as_deref(), Some("Target environment"));

        let replicas = spec.get("replicas").unwrap();
        assert_eq!(replicas.param_type, ParameterType::Number);
        assert!(replicas.is_required());

        assert!(spec.get("tag").unwrap().regex.is_some());
        assert_eq!(spec.get("flags").unwrap().default, Some(Value::Sequence(vec![])));
    }

    #[test]
    fn test_declaration_order_preserved() {
        let spec = parse_spec("spec:\n  inputs:\n    z: {}\n    a: {}\n    m: {}\n").unwrap();
        let names: Vec<_> = spec.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["z", "a", "m"]);
    }

    #[test]
    fn test_null_declaration_is_required_string() {
        let spec = parse_spec("spec:\n  inputs:\n    env:\n").unwrap();
        let env = spec.get("env").unwrap();
        assert_eq!(env.param_type, ParameterType::String);
        assert!(env.is_required());
    }

    #[test]
    fn test_null_default_is_required() {
        let spec = parse_spec("spec:\n  inputs:\n    env:\n      default:\n").unwrap();
        assert!(spec.get("env").unwrap().is_required());
    }

    #[test]
    fn test_missing_inputs_section() {
        let spec = parse_spec("spec: {}\n").unwrap();
        assert!(spec.is_empty());
    }

    #[test]
    fn test_header_unknown_keys() {
        let errors = Header::parse(&yaml("spec: {}\nextra: 1\nother: 2\n")).unwrap_err();
        assert_eq!(
            messages(errors),
            vec!["header config contains unknown keys: extra, other"]
        );
    }

    #[test]
    fn test_spec_must_be_hash() {
        let errors = Header::parse(&yaml("spec: [1, 2]\n")).unwrap_err();
        assert_eq!(messages(errors), vec!["header:spec config must be a hash"]);
    }

    #[test]
    fn test_spec_unknown_keys() {
        let errors = Header::parse(&yaml("spec:\n  inputs: {}\n  outputs: {}\n")).unwrap_err();
        assert_eq!(
            messages(errors),
            vec!["header:spec config contains unknown keys: outputs"]
        );
    }

    #[test]
    fn test_inputs_must_be_hash() {
        let errors = Header::parse(&yaml("spec:\n  inputs: [env]\n")).unwrap_err();
        assert_eq!(messages(errors), vec!["header:spec:inputs config must be a hash"]);
    }

    #[test]
    fn test_entry_must_be_hash() {
        let errors = parse_spec("spec:\n  inputs:\n    env: prod\n").unwrap_err();
        assert_eq!(
            messages(errors),
            vec!["header:spec:inputs:env config must be a hash"]
        );
    }

    #[test]
    fn test_regex_requires_string_type() {
        let errors = parse_spec("spec:\n  inputs:\n    count:\n      type: number\n      regex: ^\\d+$\n").unwrap_err();
        assert_eq!(
            messages(errors),
            vec!["header:spec:inputs:count regex can only be used with string inputs"]
        );
    }

    #[test]
    fn test_invalid_regex() {
        let errors = parse_spec("spec:\n  inputs:\n    tag:\n      regex: '(unclosed'\n").unwrap_err();
        assert!(errors[0]
            .to_string()
            .starts_with("header:spec:inputs:tag regex is invalid:"));
    }

    #[test]
    fn test_empty_options() {
        let errors = parse_spec("spec:\n  inputs:\n    env:\n      options: []\n").unwrap_err();
        assert_eq!(
            messages(errors),
            vec!["header:spec:inputs:env options cannot be empty"]
        );
    }

    #[test]
    fn test_too_many_options() {
        let values: Vec<String> = (0..51).map(|i| i.to_string()).collect();
        let text = format!(
            "spec:\n  inputs:\n    n:\n      type: number\n      options: [{}]\n",
            values.join(", ")
        );
        let errors = parse_spec(&text).unwrap_err();
        assert_eq!(
            messages(errors),
            vec!["header:spec:inputs:n options cannot contain more than 50 values"]
        );
    }

    #[test]
    fn test_options_on_boolean() {
        let errors = parse_spec("spec:\n  inputs:\n    flag:\n      type: boolean\n      options: [true]\n").unwrap_err();
        assert_eq!(
            messages(errors),
            vec!["header:spec:inputs:flag options can only be used with string and number inputs"]
        );
    }

    #[test]
    fn test_options_must_match_type() {
        let errors = parse_spec("spec:\n  inputs:\n    n:\n      type: number\n      options: [1, a]\n").unwrap_err();
        assert_eq!(
            messages(errors),
            vec!["header:spec:inputs:n options must only contain number values"]
        );

        let errors = parse_spec("spec:\n  inputs:\n    env:\n      options: [dev, 2]\n").unwrap_err();
        assert_eq!(
            messages(errors),
            vec!["header:spec:inputs:env options must only contain string values"]
        );
    }

    #[test]
    fn test_unknown_type_and_keys_accumulate() {
        let errors = parse_spec(
            "spec:\n  inputs:\n    a:\n      type: text\n    b:\n      required: true\n",
        )
        .unwrap_err();
        assert_eq!(
            messages(errors),
            vec![
                "header:spec:inputs:a input type unknown value: text",
                "header:spec:inputs:b config contains unknown keys: required",
            ]
        );
    }

    #[test]
    fn test_parameter_type_matches() {
        assert!(ParameterType::String.matches(&Value::from("x")));
        assert!(!ParameterType::String.matches(&Value::Integer(1)));
        assert!(ParameterType::Number.matches(&Value::Integer(1)));
        assert!(ParameterType::Number.matches(&Value::Float(1.5)));
        assert!(!ParameterType::Number.matches(&Value::from("1")));
        assert!(ParameterType::Boolean.matches(&Value::Bool(false)));
        assert!(!ParameterType::Boolean.matches(&Value::from("true")));
        assert!(ParameterType::Array.matches(&Value::Sequence(vec![])));
        assert!(!ParameterType::Array.matches(&Value::Null));
    }
}
