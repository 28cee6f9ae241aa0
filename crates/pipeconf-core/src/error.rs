//! Error types for pipeconf
//!
//! Every error renders as a single user-facing line; the exact wording is
//! part of the public contract since callers surface it verbatim. Optional
//! help text is only shown by [`Error::report`].

use std::fmt;

use crate::header::ParameterType;

/// Result type alias for pipeconf operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for pipeconf operations
#[derive(Debug, Clone, PartialEq)]
pub struct Error {
    /// The kind of error that occurred
    pub kind: ErrorKind,
    /// Actionable help message
    pub help: Option<String>,
}

/// Where a validated input value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueOrigin {
    /// Supplied by the caller
    Provided,
    /// Taken from the `default` of the input declaration
    Default,
}

impl ValueOrigin {
    fn qualifier(&self) -> &'static str {
        match self {
            ValueOrigin::Provided => "",
            ValueOrigin::Default => "default value ",
        }
    }

    fn option_phrase(&self) -> &'static str {
        match self {
            ValueOrigin::Provided => "cannot use value",
            ValueOrigin::Default => "default value cannot be used",
        }
    }
}

impl fmt::Display for ValueOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueOrigin::Provided => write!(f, "provided value"),
            ValueOrigin::Default => write!(f, "default value"),
        }
    }
}

/// Categories of errors that can occur
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ErrorKind {
    /// A document could not be loaded
    #[error("invalid configuration format: {0}")]
    Parse(String),

    /// The header or one of its input declarations is malformed
    #[error("{path} {message}")]
    Header { path: String, message: String },

    /// Inputs were passed to a document that declares none
    #[error("Given inputs not defined in the `spec` section of the included configuration file")]
    InputsWithoutHeader,

    #[error("{name} input is not defined")]
    UnknownInput { name: String },

    #[error("{name} input: required value has not been provided")]
    MissingInput { name: String },

    #[error("{name} input: {origin} is not a {expected}")]
    TypeMismatch {
        name: String,
        origin: ValueOrigin,
        expected: ParameterType,
    },

    #[error("{name} input: {}does not match regular expression", .origin.qualifier())]
    RegexMismatch { name: String, origin: ValueOrigin },

    #[error("{name} input: {}, must be one of: {allowed}", .origin.option_phrase())]
    OptionMismatch {
        name: String,
        origin: ValueOrigin,
        allowed: String,
    },

    #[error("interpolation context too complex")]
    ContextTooComplex,

    /// Leads the template errors of a failed interpolation
    #[error("interpolation interrupted by errors")]
    Interrupted,

    #[error("unknown interpolation key: `{key}`")]
    UnknownKey { key: String },

    #[error("malformed interpolation expression: `{expression}`")]
    MalformedExpression { expression: String },

    #[error("empty interpolation expression: `{expression}`")]
    EmptyExpression { expression: String },

    #[error("invalid interpolation access pattern: `{expression}`")]
    InvalidAccess { expression: String },

    #[error("too many objects in interpolation access: `{expression}`")]
    TooManyAccessObjects { expression: String },

    #[error("maximum interpolation expression size exceeded")]
    ExpressionTooLarge,

    #[error("too many interpolation blocks")]
    TooManyBlocks,

    #[error("too many functions in interpolation block: `{expression}`")]
    TooManyFunctions { expression: String },

    #[error("no function matching `{name}`: check that the function name, arguments, and types are correct")]
    UnknownFunction { name: String },

    #[error("invalid input type: {function} can only be used with string inputs")]
    FunctionInputType { function: String },

    #[error("document exceeds maximum nesting depth of {limit}")]
    DepthExceeded { limit: usize },

    #[error("string scalar exceeds maximum length of {limit} bytes")]
    ScalarTooLong { limit: usize },

    /// Two mapping keys became equal once interpolated
    #[error("duplicate key after interpolation: `{key}`")]
    DuplicateKey { key: String },
}

impl Error {
    fn new(kind: ErrorKind) -> Self {
        Self { kind, help: None }
    }

    /// Create a new parse error
    pub fn parse(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Parse(message.into()))
            .with_help("Check the YAML syntax of the configuration file")
    }

    /// Create a header declaration error located at `path` (e.g. `header:spec:inputs:env`)
    pub fn header(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Header {
            path: path.into(),
            message: message.into(),
        })
    }

    /// Create the error for inputs passed without a header document
    pub fn inputs_without_header() -> Self {
        Self::new(ErrorKind::InputsWithoutHeader).with_help(
            "Declare the inputs under `spec: inputs:` in a header document followed by `---`",
        )
    }

    /// Create an unknown input error
    pub fn unknown_input(name: impl Into<String>) -> Self {
        let name = name.into();
        Self::new(ErrorKind::UnknownInput { name: name.clone() })
            .with_help(format!("Remove '{}' or declare it under `spec: inputs:`", name))
    }

    /// Create a missing required input error
    pub fn missing_input(name: impl Into<String>) -> Self {
        let name = name.into();
        Self::new(ErrorKind::MissingInput { name: name.clone() })
            .with_help(format!("Provide a value for '{}' or give it a default", name))
    }

    /// Create a type mismatch error
    pub fn type_mismatch(name: impl Into<String>, origin: ValueOrigin, expected: ParameterType) -> Self {
        Self::new(ErrorKind::TypeMismatch {
            name: name.into(),
            origin,
            expected,
        })
    }

    /// Create a regular expression mismatch error
    pub fn regex_mismatch(name: impl Into<String>, origin: ValueOrigin) -> Self {
        Self::new(ErrorKind::RegexMismatch {
            name: name.into(),
            origin,
        })
    }

    /// Create an error for a value outside the allowed options
    pub fn option_mismatch(name: impl Into<String>, origin: ValueOrigin, allowed: &[String]) -> Self {
        Self::new(ErrorKind::OptionMismatch {
            name: name.into(),
            origin,
            allowed: allowed.join(", "),
        })
    }

    /// Create an unknown interpolation key error
    pub fn unknown_key(key: impl Into<String>) -> Self {
        let key = key.into();
        Self::new(ErrorKind::UnknownKey { key: key.clone() }).with_help(format!(
            "Use `inputs.<name>` for a declared input or the name of a pipeline variable instead of '{}'",
            key
        ))
    }

    /// Create an error for an unknown interpolation function
    pub fn unknown_function(name: impl Into<String>) -> Self {
        Self::new(ErrorKind::UnknownFunction { name: name.into() })
            .with_help("Available functions: expand_vars, truncate(offset, length), posix_escape")
    }

    /// Create an error for a function applied to a non-string value
    pub fn function_input_type(function: impl Into<String>) -> Self {
        Self::new(ErrorKind::FunctionInputType {
            function: function.into(),
        })
    }

    /// Create a structural depth limit error
    pub fn depth_exceeded(limit: usize) -> Self {
        Self::new(ErrorKind::DepthExceeded { limit })
    }

    /// Create a structural scalar length limit error
    pub fn scalar_too_long(limit: usize) -> Self {
        Self::new(ErrorKind::ScalarTooLong { limit })
    }

    /// Create an error for a mapping key that collides after interpolation
    pub fn duplicate_key(key: impl Into<String>) -> Self {
        Self::new(ErrorKind::DuplicateKey { key: key.into() })
            .with_help("Make interpolated keys unique within their mapping")
    }

    /// Add help message to the error
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    /// Render the message followed by its help text, if any
    pub fn report(&self) -> String {
        match &self.help {
            Some(help) => format!("{}\n  Help: {}", self.kind, help),
            None => self.kind.to_string(),
        }
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Self::new(kind)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)
    }
}

impl std::error::Error for Error {}
