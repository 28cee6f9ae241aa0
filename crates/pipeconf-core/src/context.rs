//! Values available to interpolation blocks

use indexmap::IndexMap;

use crate::error::{ErrorKind, Result};
use crate::inputs::ValidatedInputs;
use crate::interpolation::AccessPath;
use crate::interpolator::InterpolationOptions;
use crate::value::Value;

/// Pipeline variables, by name
pub type Variables = IndexMap<String, String>;

const INPUTS_KEY: &str = "inputs";

/// Read-only lookup environment for one interpolation pass
#[derive(Debug, Clone)]
pub struct InterpolationContext {
    inputs: ValidatedInputs,
    variables: Variables,
}

impl InterpolationContext {
    /// Build a context, rejecting input values nested deeper than
    /// `options.max_context_depth`.
    pub fn new(inputs: ValidatedInputs, variables: Variables, options: &InterpolationOptions) -> Result<Self> {
        if let Some((name, _)) = inputs
            .iter()
            .find(|(_, value)| value.depth() > options.max_context_depth)
        {
            log::warn!("input '{}' exceeds the interpolation context depth limit", name);
            return Err(ErrorKind::ContextTooComplex.into());
        }

        Ok(Self { inputs, variables })
    }

    /// Resolve `inputs.<name>[.<key>...]` or a bare variable name
    pub fn resolve(&self, path: &AccessPath) -> Option<Value> {
        match path.segments() {
            [root, name, keys @ ..] if root == INPUTS_KEY => {
                let mut current = self.inputs.get(name)?;
                for key in keys {
                    current = current.get(key)?;
                }
                Some(current.clone())
            }
            [name] if name != INPUTS_KEY => self.variable(name).map(Value::from),
            _ => None,
        }
    }

    /// Look up a pipeline variable
    pub fn variable(&self, name: &str) -> Option<&str> {
        self.variables.get(name).map(String::as_str)
    }

    pub fn inputs(&self) -> &ValidatedInputs {
        &self.inputs
    }
}
