//! Multi-document input handling
//!
//! A pipeline file may start with a header document declaring its inputs:
//!
//! ```yaml
//! spec:
//!   inputs:
//!     env:
//!       default: prod
//! ---
//! deploy:
//!   script: echo "deploying to $[[ inputs.env ]]"
//! ```
//!
//! The header is only recognized when there are at least two documents and
//! the first one is a mapping with a `spec` key.

use crate::error::{Error, Result};
use crate::value::Value;

/// Source of a single parsed document
pub trait DocumentLoader {
    /// Parse the document into a value tree
    fn load(&self) -> Result<Value>;
}

impl DocumentLoader for Value {
    fn load(&self) -> Result<Value> {
        Ok(self.clone())
    }
}

/// One YAML document of a multi-document stream, kept as raw text until loaded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YamlDocument {
    source: String,
}

impl YamlDocument {
    /// Wrap the text of a single YAML document
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }

    /// Split a YAML stream on `---` separator lines.
    ///
    /// Text before the first separator is dropped when it holds nothing but
    /// blank lines, comments and directives such as `%YAML 1.2`.
    pub fn split(stream: &str) -> Vec<YamlDocument> {
        let mut chunks: Vec<String> = vec![String::new()];

        for line in stream.split_inclusive('\n') {
            if let Some(rest) = separator_remainder(line) {
                chunks.push(rest.to_string());
            } else if let Some(current) = chunks.last_mut() {
                current.push_str(line);
            }
        }

        if chunks.len() > 1 && is_blank(&chunks[0]) {
            chunks.remove(0);
        }

        chunks.into_iter().map(YamlDocument::new).collect()
    }

    /// The raw document text
    pub fn source(&self) -> &str {
        &self.source
    }
}

impl DocumentLoader for YamlDocument {
    fn load(&self) -> Result<Value> {
        if is_blank(&self.source) {
            return Ok(Value::Null);
        }
        let yaml: serde_yaml::Value =
            serde_yaml::from_str(&self.source).map_err(|e| Error::parse(e.to_string()))?;
        Value::from_yaml(yaml)
    }
}

/// Returns the text following `---` when `line` is a document separator
fn separator_remainder(line: &str) -> Option<&str> {
    let rest = line.strip_prefix("---")?;
    match rest.chars().next() {
        None | Some('\n') | Some('\r') => Some(""),
        Some(c) if c == ' ' || c == '\t' => {
            let rest = rest.trim_start_matches([' ', '\t']);
            if rest.starts_with('#') {
                Some("")
            } else {
                Some(rest)
            }
        }
        _ => None,
    }
}

/// Only blank lines, comments and `%` directives
fn is_blank(text: &str) -> bool {
    text.lines().all(|line| {
        if line.starts_with('%') {
            return true;
        }
        let line = line.trim();
        line.is_empty() || line.starts_with('#')
    })
}

/// The documents of one interpolation request, split into header and content
#[derive(Debug)]
pub struct DocumentSet<D = YamlDocument> {
    documents: Vec<D>,
    /// First document, parsed once at construction
    first: Option<Value>,
    errors: Vec<Error>,
}

impl DocumentSet<YamlDocument> {
    /// Split and wrap a YAML stream
    pub fn from_yaml(stream: &str) -> Self {
        Self::new(YamlDocument::split(stream))
    }
}

impl<D: DocumentLoader> DocumentSet<D> {
    /// Create a document set, parsing the first document immediately
    pub fn new(documents: Vec<D>) -> Self {
        let mut errors = Vec::new();
        let first = match documents.first() {
            None => Some(Value::Null),
            Some(doc) => match doc.load() {
                Ok(value) => Some(value),
                Err(e) => {
                    errors.push(e);
                    None
                }
            },
        };

        log::debug!(
            "document set with {} document(s), first document valid: {}",
            documents.len(),
            first.is_some()
        );

        Self {
            documents,
            first,
            errors,
        }
    }

    /// Whether the first document parsed successfully
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Errors recorded while parsing the first document
    pub fn errors(&self) -> &[Error] {
        &self.errors
    }

    /// Number of documents in the set
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Whether the set holds no documents at all
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// The header document, if present
    pub fn header(&self) -> Option<&Value> {
        let first = self.first.as_ref()?;
        let has_spec = first.as_mapping().is_some_and(|map| map.contains_key("spec"));
        (self.documents.len() > 1 && has_spec).then_some(first)
    }

    /// The body document.
    ///
    /// With a header this is the last document, otherwise the first one.
    /// An empty set yields `Value::Null`.
    pub fn content(&self) -> Result<Value> {
        if let Some(err) = self.errors.first() {
            return Err(err.clone());
        }

        if self.header().is_some() {
            return match self.documents.last() {
                Some(doc) => doc.load(),
                None => Ok(Value::Null),
            };
        }

        Ok(self.first.clone().unwrap_or_default())
    }
}
