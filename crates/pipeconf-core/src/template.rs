//! Interpolation of a document tree
//!
//! Mappings and sequences are rebuilt with the same shape; string scalars
//! and mapping keys have their blocks replaced. A string that consists of a
//! single block takes the resolved value as is, so `$[[ inputs.replicas ]]`
//! stays a number. Any failing block fails the whole template.

use indexmap::IndexMap;

use crate::context::InterpolationContext;
use crate::error::{Error, ErrorKind, Result};
use crate::functions;
use crate::interpolation::{self, Expression, Segment};
use crate::interpolator::InterpolationOptions;
use crate::value::Value;

/// The interpolated form of one document
#[derive(Debug, Clone)]
pub struct TextTemplate {
    result: Option<Value>,
    errors: Vec<Error>,
}

impl TextTemplate {
    /// Interpolate `content` against `context`
    pub fn new(content: &Value, context: &InterpolationContext, options: &InterpolationOptions) -> Self {
        if let Err(err) = check_limits(content, options) {
            return Self {
                result: None,
                errors: vec![err],
            };
        }

        let mut walker = Walker {
            context,
            options,
            blocks: 0,
            errors: Vec::new(),
        };
        let result = walker.walk(content);
        log::debug!("interpolated {} block(s)", walker.blocks);

        if walker.errors.is_empty() {
            Self {
                result: Some(result),
                errors: Vec::new(),
            }
        } else {
            let mut errors = Vec::with_capacity(walker.errors.len() + 1);
            errors.push(Error::from(ErrorKind::Interrupted));
            errors.extend(walker.errors);
            Self {
                result: None,
                errors,
            }
        }
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors(&self) -> &[Error] {
        &self.errors
    }

    /// The interpolated document; `None` when any block failed
    pub fn interpolated(&self) -> Option<&Value> {
        self.result.as_ref()
    }

    pub fn into_result(self) -> std::result::Result<Value, Vec<Error>> {
        match self.result {
            Some(value) if self.errors.is_empty() => Ok(value),
            _ => Err(self.errors),
        }
    }
}

/// Reject documents nested deeper than `max_depth` or holding strings longer
/// than `max_scalar_length`
pub(crate) fn check_limits(value: &Value, options: &InterpolationOptions) -> Result<()> {
    fn visit(value: &Value, depth: usize, options: &InterpolationOptions) -> Result<()> {
        if depth > options.max_depth {
            log::warn!("document nesting exceeds {} levels", options.max_depth);
            return Err(Error::depth_exceeded(options.max_depth));
        }
        let too_long = |s: &str| s.len() > options.max_scalar_length;
        match value {
            Value::String(s) if too_long(s) => Err(Error::scalar_too_long(options.max_scalar_length)),
            Value::Sequence(seq) => seq.iter().try_for_each(|v| visit(v, depth + 1, options)),
            Value::Mapping(map) => map.iter().try_for_each(|(k, v)| {
                if too_long(k) {
                    return Err(Error::scalar_too_long(options.max_scalar_length));
                }
                visit(v, depth + 1, options)
            }),
            _ => Ok(()),
        }
    }

    visit(value, 0, options)
}

struct Walker<'a> {
    context: &'a InterpolationContext,
    options: &'a InterpolationOptions,
    blocks: usize,
    errors: Vec<Error>,
}

impl Walker<'_> {
    fn walk(&mut self, value: &Value) -> Value {
        match value {
            Value::String(s) => self.interpolate_string(s),
            Value::Sequence(seq) => Value::Sequence(seq.iter().map(|v| self.walk(v)).collect()),
            Value::Mapping(map) => {
                let mut result = IndexMap::with_capacity(map.len());
                for (key, value) in map {
                    let key = self.interpolate_text(key);
                    let value = self.walk(value);
                    if result.contains_key(&key) {
                        self.errors.push(Error::duplicate_key(key));
                    } else {
                        result.insert(key, value);
                    }
                }
                Value::Mapping(result)
            }
            other => other.clone(),
        }
    }

    fn interpolate_string(&mut self, input: &str) -> Value {
        if !interpolation::contains_interpolation(input) {
            return Value::String(input.to_string());
        }

        match interpolation::scan(input) {
            Ok(segments) => match segments.as_slice() {
                [Segment::Block(block)] => self
                    .resolve_block(block)
                    .unwrap_or_else(|| Value::String(input.to_string())),
                _ => Value::String(self.render(&segments)),
            },
            Err(err) => {
                self.errors.push(err);
                Value::String(input.to_string())
            }
        }
    }

    fn interpolate_text(&mut self, input: &str) -> String {
        if !interpolation::contains_interpolation(input) {
            return input.to_string();
        }

        match interpolation::scan(input) {
            Ok(segments) => self.render(&segments),
            Err(err) => {
                self.errors.push(err);
                input.to_string()
            }
        }
    }

    fn render(&mut self, segments: &[Segment<'_>]) -> String {
        let mut result = String::new();
        for segment in segments {
            match segment {
                Segment::Literal(text) => result.push_str(text),
                Segment::Block(block) => match self.resolve_block(block) {
                    Some(value) => result.push_str(&value.to_text()),
                    None => result.push_str(block),
                },
            }
        }
        result
    }

    /// Resolve one block, recording any error
    fn resolve_block(&mut self, block: &str) -> Option<Value> {
        self.blocks += 1;
        if self.blocks > self.options.max_blocks {
            if self.blocks == self.options.max_blocks + 1 {
                log::warn!("more than {} interpolation blocks", self.options.max_blocks);
                self.errors.push(ErrorKind::TooManyBlocks.into());
            }
            return None;
        }

        log::trace!("resolving {}", block);
        match self.evaluate(block) {
            Ok(value) => Some(value),
            Err(err) => {
                self.errors.push(err);
                None
            }
        }
    }

    fn evaluate(&self, block: &str) -> Result<Value> {
        let expression = Expression::parse(block, self.options)?;
        let mut value = self
            .context
            .resolve(&expression.access)
            .ok_or_else(|| Error::unknown_key(expression.access.to_string()))?;

        for call in &expression.functions {
            value = functions::apply(call, value, self.context)?;
        }

        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Variables;
    use crate::inputs::ValidatedInputs;

    fn yaml(text: &str) -> Value {
        Value::from_yaml(serde_yaml::from_str(text).unwrap()).unwrap()
    }

    fn context() -> InterpolationContext {
        let mut inputs = ValidatedInputs::new();
        inputs.insert("env".into(), Value::from("prod"));
        inputs.insert("replicas".into(), Value::Integer(3));
        inputs.insert("debug".into(), Value::Bool(false));
        inputs.insert("stages".into(), Value::from(vec!["build", "test"]));
        inputs.insert("name".into(), Value::from("app $CI_COMMIT_REF_NAME"));

        let mut variables = Variables::new();
        variables.insert("CI_COMMIT_REF_NAME".into(), "main".into());

        InterpolationContext::new(inputs, variables, &InterpolationOptions::default()).unwrap()
    }

    fn render(text: &str) -> TextTemplate {
        TextTemplate::new(&yaml(text), &context(), &InterpolationOptions::default())
    }

    fn messages(template: &TextTemplate) -> Vec<String> {
        template.errors().iter().map(|e| e.to_string()).collect()
    }

    #[test]
    fn test_interpolates_nested_strings() {
        let template = render(
            r#"
deploy:
  script:
    - echo "deploying to $[[ inputs.env ]]"
  variables:
    TARGET: $[[ inputs.env ]]-cluster
"#,
        );

        assert!(template.is_valid());
        let expected = yaml(
            r#"
deploy:
  script:
    - echo "deploying to prod"
  variables:
    TARGET: prod-cluster
"#,
        );
        assert_eq!(template.interpolated(), Some(&expected));
    }

    #[test]
    fn test_whole_block_keeps_type() {
        let template = render("parallel: $[[ inputs.replicas ]]\nflag: $[[ inputs.debug ]]\nstages: $[[ inputs.stages ]]\n");
        let result = template.interpolated().unwrap();

        assert_eq!(result.get("parallel"), Some(&Value::Integer(3)));
        assert_eq!(result.get("flag"), Some(&Value::Bool(false)));
        assert_eq!(result.get("stages"), Some(&Value::from(vec!["build", "test"])));
    }

    #[test]
    fn test_embedded_values_render_as_text() {
        let template = render("a: n=$[[ inputs.replicas ]]\nb: s=$[[ inputs.stages ]]\n");
        let result = template.interpolated().unwrap();

        assert_eq!(result.get("a"), Some(&Value::from("n=3")));
        assert_eq!(result.get("b"), Some(&Value::from(r#"s=["build","test"]"#)));
    }

    #[test]
    fn test_keys_are_interpolated() {
        let template = render("deploy-$[[ inputs.env ]]:\n  stage: deploy\n");
        let result = template.interpolated().unwrap();
        assert!(result.get("deploy-prod").is_some());
    }

    #[test]
    fn test_colliding_keys_fail_template() {
        let template = render("job-prod: one\njob-$[[ inputs.env ]]: two\n");

        assert!(template.interpolated().is_none());
        assert_eq!(
            messages(&template),
            vec![
                "interpolation interrupted by errors",
                "duplicate key after interpolation: `job-prod`",
            ]
        );
    }

    #[test]
    fn test_non_string_scalars_untouched() {
        let doc = yaml("a: 1\nb: true\nc: ~\nd: 2.5\n");
        let template = TextTemplate::new(&doc, &context(), &InterpolationOptions::default());
        assert_eq!(template.interpolated(), Some(&doc));
    }

    #[test]
    fn test_substituted_text_is_not_rescanned() {
        let mut inputs = ValidatedInputs::new();
        inputs.insert("raw".into(), Value::from("$[[ inputs.raw ]]"));
        let ctx = InterpolationContext::new(inputs, Variables::new(), &InterpolationOptions::default()).unwrap();

        let template = TextTemplate::new(
            &yaml("a: x $[[ inputs.raw ]]\n"),
            &ctx,
            &InterpolationOptions::default(),
        );
        assert_eq!(
            template.interpolated().unwrap().get("a"),
            Some(&Value::from("x $[[ inputs.raw ]]"))
        );
    }

    #[test]
    fn test_functions_applied() {
        let template = render("a: $[[ inputs.name | expand_vars | truncate(0, 8) ]]\nb: $[[ inputs.env | posix_escape ]]\n");
        let result = template.interpolated().unwrap();

        assert_eq!(result.get("a"), Some(&Value::from("app main")));
        assert_eq!(result.get("b"), Some(&Value::from("prod")));
    }

    #[test]
    fn test_unknown_key_fails_whole_template() {
        let template = render("a: $[[ inputs.env ]]\nb: $[[ inputs.missing ]]\n");

        assert!(!template.is_valid());
        assert!(template.interpolated().is_none());
        assert_eq!(
            messages(&template),
            vec![
                "interpolation interrupted by errors",
                "unknown interpolation key: `inputs.missing`",
            ]
        );
    }

    #[test]
    fn test_all_block_errors_collected() {
        let template = render("a: $[[ inputs.x ]] $[[ ]]\nb: $[[ inputs.env\n");
        assert_eq!(
            messages(&template),
            vec![
                "interpolation interrupted by errors",
                "unknown interpolation key: `inputs.x`",
                "empty interpolation expression: `$[[ ]]`",
                "malformed interpolation expression: `$[[ inputs.env`",
            ]
        );
    }

    #[test]
    fn test_too_many_blocks() {
        let options = InterpolationOptions {
            max_blocks: 2,
            ..Default::default()
        };
        let template = TextTemplate::new(
            &yaml("a: $[[ inputs.env ]] $[[ inputs.env ]] $[[ inputs.env ]] $[[ inputs.env ]]\n"),
            &context(),
            &options,
        );
        assert_eq!(
            messages(&template),
            vec!["interpolation interrupted by errors", "too many interpolation blocks"]
        );
    }

    #[test]
    fn test_depth_limit() {
        let options = InterpolationOptions {
            max_depth: 2,
            ..Default::default()
        };
        let template = TextTemplate::new(&yaml("a:\n  b:\n    c: 1\n"), &context(), &options);
        assert_eq!(
            messages(&template),
            vec!["document exceeds maximum nesting depth of 2"]
        );
    }

    #[test]
    fn test_scalar_length_limit() {
        let options = InterpolationOptions {
            max_scalar_length: 4,
            ..Default::default()
        };
        let template = TextTemplate::new(&yaml("a: too long\n"), &context(), &options);
        assert_eq!(
            messages(&template),
            vec!["string scalar exceeds maximum length of 4 bytes"]
        );
    }

    #[test]
    fn test_no_markers_is_identity() {
        let doc = yaml("job:\n  script: [echo hi, 'echo ${VAR}']\n");
        let first = TextTemplate::new(&doc, &context(), &InterpolationOptions::default())
            .into_result()
            .unwrap();
        assert_eq!(first, doc);

        let second = TextTemplate::new(&first, &context(), &InterpolationOptions::default())
            .into_result()
            .unwrap();
        assert_eq!(second, first);
    }
}
