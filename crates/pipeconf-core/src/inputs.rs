//! Validation of caller-supplied input arguments
//!
//! Every rule is evaluated for every input so a single call reports all
//! problems at once. Values are never coerced: `"3"` is not a number.

use indexmap::IndexMap;

use crate::error::{Error, ValueOrigin};
use crate::header::{InputSpec, ParameterSpec};
use crate::value::Value;

/// Input arguments as supplied by the caller
pub type InputArgs = IndexMap<String, Value>;

/// One value per declared input, defaults filled in
pub type ValidatedInputs = IndexMap<String, Value>;

/// Validates input arguments against a [`ParameterSpec`]
pub struct InputValidator;

impl InputValidator {
    /// Validate `args` against `spec`.
    ///
    /// `spec` is `None` when the document has no header; any argument is then
    /// rejected with a single error.
    pub fn execute(spec: Option<&ParameterSpec>, args: &InputArgs) -> Result<ValidatedInputs, Vec<Error>> {
        let Some(spec) = spec else {
            return if args.is_empty() {
                Ok(ValidatedInputs::new())
            } else {
                Err(vec![Error::inputs_without_header()])
            };
        };

        let mut errors: Vec<Error> = args
            .keys()
            .filter(|name| !spec.contains(name))
            .map(Error::unknown_input)
            .collect();

        let mut validated = ValidatedInputs::with_capacity(spec.len());
        for input in spec.iter() {
            let (value, origin) = match (args.get(&input.name), &input.default) {
                (Some(value), _) => (value, ValueOrigin::Provided),
                (None, Some(default)) => (default, ValueOrigin::Default),
                (None, None) => {
                    errors.push(Error::missing_input(&input.name));
                    continue;
                }
            };

            let before = errors.len();
            check_value(input, value, origin, &mut errors);
            if errors.len() == before {
                validated.insert(input.name.clone(), value.clone());
            }
        }

        if errors.is_empty() {
            log::debug!("validated {} input(s)", validated.len());
            Ok(validated)
        } else {
            log::debug!("input validation failed with {} error(s)", errors.len());
            Err(errors)
        }
    }
}

fn check_value(input: &InputSpec, value: &Value, origin: ValueOrigin, errors: &mut Vec<Error>) {
    if !input.param_type.matches(value) {
        errors.push(Error::type_mismatch(&input.name, origin, input.param_type));
        return;
    }

    if let (Some(regex), Value::String(text)) = (&input.regex, value) {
        if !regex.is_match(text) {
            errors.push(Error::regex_mismatch(&input.name, origin));
        }
    }

    if let Some(options) = &input.options {
        if !options.iter().any(|option| same_option(option, value)) {
            errors.push(Error::option_mismatch(&input.name, origin, &input.option_labels()));
        }
    }
}

/// Option equality; integers and floats compare by numeric value
fn same_option(option: &Value, value: &Value) -> bool {
    match (option, value) {
        (Value::Integer(i), Value::Float(f)) | (Value::Float(f), Value::Integer(i)) => *i as f64 == *f,
        _ => option == value,
    }
}
