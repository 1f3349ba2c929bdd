//! Running an external schema and folding its failure into an error tree.

use std::{fmt, rc::Rc};

use futures::{
    FutureExt,
    future::{self, LocalBoxFuture},
};

use crate::{
    error::PathError,
    path::{self, FieldPath},
    value::Value,
};

/// One failed rule, as reported by a schema.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidationIssue {
    /// Dot or bracket path of the offending field.
    pub path: String,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// A schema's rejection, carrying every issue it found in order.
#[derive(Clone, Debug, Default, PartialEq, Eq, thiserror::Error)]
#[error("{} validation issue(s)", inner.len())]
pub struct ValidationError {
    pub inner: Vec<ValidationIssue>,
}

impl ValidationError {
    pub fn new(inner: Vec<ValidationIssue>) -> Self {
        Self { inner }
    }

    pub fn single(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(vec![ValidationIssue::new(path, message)])
    }
}

impl From<Vec<ValidationIssue>> for ValidationError {
    fn from(inner: Vec<ValidationIssue>) -> Self {
        Self::new(inner)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ValidateOptions {
    /// Stop at the first failed rule. The pipeline always asks for all of them.
    pub abort_early: bool,
}

/// An external validator checked against the whole values tree.
///
/// Any `Fn(&Value) -> Result<(), ValidationError>` is a synchronous schema.
pub trait Schema {
    fn validate(
        &self,
        values: &Value,
        options: ValidateOptions,
    ) -> LocalBoxFuture<'static, Result<(), ValidationError>>;
}

impl<F> Schema for F
where
    F: Fn(&Value) -> Result<(), ValidationError>,
{
    fn validate(
        &self,
        values: &Value,
        _options: ValidateOptions,
    ) -> LocalBoxFuture<'static, Result<(), ValidationError>> {
        future::ready(self(values)).boxed_local()
    }
}

/// Convert a validator path such as `a[0].b` to a [`FieldPath`].
pub fn normalize_path(path: &str) -> Result<FieldPath, PathError> {
    FieldPath::parse_bracketed(path)
}

/// Fold issues into an error tree. Later issues for the same path win.
/// Issues whose path cannot be used are skipped.
pub fn fold_issues(issues: &[ValidationIssue]) -> Value {
    issues.iter().fold(Value::map(), |errors, issue| {
        match normalize_path(&issue.path) {
            Ok(path) => path::set(&errors, &path, Value::from(issue.message.as_str())),
            Err(err) => {
                tracing::warn!(path = %issue.path, %err, "skipping validation issue");
                errors
            }
        }
    })
}

/// The result of one validation run.
#[derive(Clone, Debug, PartialEq)]
pub struct ValidationOutcome {
    pub errors: Value,
    pub is_valid: bool,
}

impl ValidationOutcome {
    fn valid() -> Self {
        Self {
            errors: Value::map(),
            is_valid: true,
        }
    }
}

/// Runs the configured schema, if any.
#[derive(Clone, Default)]
pub struct ValidationPipeline {
    schema: Option<Rc<dyn Schema>>,
}

impl ValidationPipeline {
    pub fn new(schema: Option<Rc<dyn Schema>>) -> Self {
        Self { schema }
    }

    pub fn has_schema(&self) -> bool {
        self.schema.is_some()
    }

    /// Check `values` with all-errors semantics. The schema sees `values` as
    /// passed here, whatever happens to the form while the check runs.
    ///
    /// Without a schema every form is valid.
    pub fn validate(&self, values: &Value) -> LocalBoxFuture<'static, ValidationOutcome> {
        let Some(schema) = &self.schema else {
            return future::ready(ValidationOutcome::valid()).boxed_local();
        };
        let check = schema.validate(values, ValidateOptions { abort_early: false });
        async move {
            match check.await {
                Ok(()) => ValidationOutcome::valid(),
                Err(err) => {
                    tracing::debug!(issues = err.inner.len(), "validation failed");
                    ValidationOutcome {
                        errors: fold_issues(&err.inner),
                        is_valid: false,
                    }
                }
            }
        }
        .boxed_local()
    }
}

impl fmt::Debug for ValidationPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidationPipeline")
            .field("has_schema", &self.has_schema())
            .finish()
    }
}
