//! Interpolation of a multi-document pipeline file
//!
//! [`TextInterpolator`] runs the stages in a fixed order and stops at the
//! first one that fails:
//!
//! 1. the first document must parse
//! 2. inputs require a header document
//! 3. without a header and inputs the body is returned unchanged
//! 4. the header must be well formed
//! 5. input declarations must be valid and the arguments must satisfy them
//! 6. the context must build, the body must parse and every block must resolve

use crate::context::{InterpolationContext, Variables};
use crate::document::{DocumentLoader, DocumentSet};
use crate::error::Error;
use crate::header::{Header, ParameterSpec};
use crate::inputs::{InputArgs, InputValidator, ValidatedInputs};
use crate::template::{self, TextTemplate};
use crate::value::Value;

/// Number of errors joined into [`TextInterpolator::error_message`]
const MAX_REPORTED_ERRORS: usize = 3;

/// Limits applied while interpolating
#[derive(Debug, Clone)]
pub struct InterpolationOptions {
    /// Maximum nesting depth of the body document
    pub max_depth: usize,
    /// Maximum length of a string scalar or mapping key, in bytes
    pub max_scalar_length: usize,
    /// Maximum number of blocks in one document
    pub max_blocks: usize,
    /// Maximum number of functions in one block
    pub max_functions: usize,
    /// Maximum number of dot-separated segments in an access path
    pub max_access_objects: usize,
    /// Maximum length of the text inside one block, in bytes
    pub max_expression_size: usize,
    /// Maximum number of `options` of one input
    pub max_options: usize,
    /// Maximum nesting depth of an input value
    pub max_context_depth: usize,
}

impl Default for InterpolationOptions {
    fn default() -> Self {
        Self {
            max_depth: 100,
            max_scalar_length: 1024 * 1024,
            max_blocks: 10_000,
            max_functions: 3,
            max_access_objects: 5,
            max_expression_size: 1024,
            max_options: 50,
            max_context_depth: 3,
        }
    }
}

/// Validates inputs and interpolates the body of a [`DocumentSet`]
pub struct TextInterpolator<D> {
    documents: DocumentSet<D>,
    input_args: InputArgs,
    variables: Variables,
    options: InterpolationOptions,
    errors: Vec<Error>,
    inputs: Option<ValidatedInputs>,
    result: Option<Value>,
    interpolated: bool,
    executed: bool,
}

impl<D: DocumentLoader> TextInterpolator<D> {
    /// Create an interpolator with default limits
    pub fn new(documents: DocumentSet<D>, input_args: InputArgs, variables: Variables) -> Self {
        Self::with_options(documents, input_args, variables, InterpolationOptions::default())
    }

    /// Create an interpolator with custom limits
    pub fn with_options(
        documents: DocumentSet<D>,
        input_args: InputArgs,
        variables: Variables,
        options: InterpolationOptions,
    ) -> Self {
        Self {
            documents,
            input_args,
            variables,
            options,
            errors: Vec::new(),
            inputs: None,
            result: None,
            interpolated: false,
            executed: false,
        }
    }

    /// Run the interpolation. Calling this again has no effect.
    pub fn interpolate(&mut self) -> &mut Self {
        if !self.executed {
            self.executed = true;
            if let Err(errors) = self.run() {
                log::debug!("interpolation failed with {} error(s)", errors.len());
                self.errors.extend(errors);
            }
        }
        self
    }

    fn run(&mut self) -> Result<(), Vec<Error>> {
        if !self.documents.is_valid() {
            return Err(self.documents.errors().to_vec());
        }

        let header = self.documents.header();
        if header.is_none() && !self.input_args.is_empty() {
            return Err(vec![Error::inputs_without_header()]);
        }

        let Some(header) = header else {
            log::debug!("no header document, returning content unchanged");
            let content = self.documents.content().map_err(|e| vec![e])?;
            template::check_limits(&content, &self.options).map_err(|e| vec![e])?;
            self.result = Some(content);
            return Ok(());
        };

        let header = Header::parse(header)?;
        let spec = ParameterSpec::parse(header.inputs(), &self.options)?;
        let inputs = InputValidator::execute(Some(&spec), &self.input_args)?;

        let context = InterpolationContext::new(inputs, self.variables.clone(), &self.options)
            .map_err(|e| vec![e])?;
        let content = self.documents.content().map_err(|e| vec![e])?;
        let result = TextTemplate::new(&content, &context, &self.options).into_result()?;

        self.inputs = Some(context.inputs().clone());
        self.result = Some(result);
        self.interpolated = true;
        Ok(())
    }

    /// Whether no error has been recorded
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Whether a header was processed and the body fully interpolated
    pub fn is_interpolated(&self) -> bool {
        self.interpolated
    }

    /// The resulting document, once [`interpolate`](Self::interpolate) succeeded
    pub fn result(&self) -> Option<&Value> {
        self.result.as_ref()
    }

    pub fn into_result(self) -> Option<Value> {
        self.result
    }

    /// Validated inputs of a successful interpolation
    pub fn inputs(&self) -> Option<&ValidatedInputs> {
        self.inputs.as_ref()
    }

    /// All recorded errors, in order
    pub fn errors(&self) -> &[Error] {
        &self.errors
    }

    /// The first three errors joined with `", "`
    pub fn error_message(&self) -> String {
        self.errors
            .iter()
            .take(MAX_REPORTED_ERRORS)
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    }
}
