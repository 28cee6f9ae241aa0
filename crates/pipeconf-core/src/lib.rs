//! pipeconf-core: input validation and interpolation for CI pipeline files
//!
//! A pipeline file may begin with a header document declaring the inputs it
//! accepts. Caller supplied inputs are validated against that declaration and
//! then substituted into every `$[[ ... ]]` block of the body document.
//!
//! # Example
//!
//! ```rust
//! use pipeconf_core::{DocumentSet, InputArgs, TextInterpolator, Value, Variables};
//!
//! let yaml = r#"
//! spec:
//!   inputs:
//!     env:
//!       default: prod
//! ---
//! deploy:
//!   script: echo "deploy to $[[ inputs.env ]]"
//! "#;
//!
//! let mut interpolator =
//!     TextInterpolator::new(DocumentSet::from_yaml(yaml), InputArgs::new(), Variables::new());
//! interpolator.interpolate();
//!
//! assert!(interpolator.is_interpolated());
//! let result = interpolator.result().unwrap();
//! assert_eq!(
//!     result.get("deploy").and_then(|d| d.get("script")),
//!     Some(&Value::from("echo \"deploy to prod\""))
//! );
//! ```

pub mod context;
pub mod document;
pub mod error;
pub mod functions;
pub mod header;
pub mod inputs;
pub mod interpolation;
pub mod template;
pub mod value;

mod interpolator;

pub use context::{InterpolationContext, Variables};
pub use document::{DocumentLoader, DocumentSet, YamlDocument};
pub use error::{Error, ErrorKind, Result};
pub use header::{Header, InputSpec, ParameterSpec, ParameterType};
pub use inputs::{InputArgs, InputValidator, ValidatedInputs};
pub use interpolator::{InterpolationOptions, TextInterpolator};
pub use template::TextTemplate;
pub use value::Value;
