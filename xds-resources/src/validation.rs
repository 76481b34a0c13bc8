//! Error accumulation for resource validation.
//!
//! Decoding a resource walks the entire wire message and records every
//! violation together with the dotted field path where it occurred, so a
//! single NACK can report everything that is wrong with a resource at once
//! instead of failing on the first problem.

use std::fmt::Write as _;
use std::ops::{Deref, DerefMut};

use tonic::Status;

/// A single validation failure, recorded at the field path that was in
/// scope when it was added.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    path: String,
    message: String,
}

impl ValidationError {
    /// The dotted/bracketed path of the offending field, e.g.
    /// `endpoints[2].lb_endpoints[0].endpoint.address`.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The error message, without any path prefix.
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Accumulates validation errors over one decode pass.
///
/// The accumulator carries a stack of field-path segments; entering a field
/// pushes a segment via [`ValidationErrors::scoped`] and the returned guard
/// pops it again on drop, so the path can never be left dangling by an early
/// return.
///
/// One instance is created per decode attempt and never shared across calls.
///
/// # Example
///
/// ```
/// use xds_resources::ValidationErrors;
///
/// let mut errors = ValidationErrors::new();
/// {
///     let mut errors = errors.scoped("endpoints");
///     let mut errors = errors.scoped("[0]");
///     errors.add_error("field not present");
/// }
/// assert!(!errors.ok());
/// assert_eq!(
///     errors.status("validation failed").message(),
///     "validation failed: [field:endpoints[0] error:field not present]",
/// );
/// ```
#[derive(Debug, Default)]
pub struct ValidationErrors {
    fields: Vec<String>,
    errors: Vec<ValidationError>,
}

impl ValidationErrors {
    /// Creates an empty accumulator with an empty path.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enters a field scope, returning a guard that leaves it again on drop.
    ///
    /// Segments are concatenated verbatim, so nested message fields pass a
    /// leading dot (`".address"`) and repeated-field indices pass brackets
    /// (`"[3]"`). A leading dot is stripped when the stack is empty, so a
    /// helper that always scopes `".seconds"` renders `seconds` when used at
    /// the top level.
    pub fn scoped(&mut self, segment: impl Into<String>) -> ScopedField<'_> {
        let mut segment = segment.into();
        if self.fields.is_empty() && segment.starts_with('.') {
            segment.remove(0);
        }
        self.fields.push(segment);
        ScopedField { errors: self }
    }

    /// Records an error at the current field path.
    pub fn add_error(&mut self, message: impl Into<String>) {
        self.errors.push(ValidationError {
            path: self.fields.concat(),
            message: message.into(),
        });
    }

    /// The number of errors recorded so far.
    ///
    /// Callers snapshot this before descending into a sub-structure to tell
    /// whether that sub-structure added any new errors.
    pub fn size(&self) -> usize {
        self.errors.len()
    }

    /// Returns true if no errors have been recorded.
    pub fn ok(&self) -> bool {
        self.errors.is_empty()
    }

    /// Renders all recorded errors into one message.
    ///
    /// Errors are sorted lexicographically by path before rendering, so the
    /// output is deterministic regardless of discovery order. The sort is
    /// stable: several errors on the same path keep their insertion order.
    pub fn message(&self, summary: &str) -> String {
        let mut errors: Vec<&ValidationError> = self.errors.iter().collect();
        errors.sort_by(|a, b| a.path.cmp(&b.path));
        let mut out = String::new();
        let _ = write!(out, "{summary}: [");
        for (i, error) in errors.iter().enumerate() {
            if i > 0 {
                out.push_str("; ");
            }
            let _ = write!(out, "field:{} error:{}", error.path, error.message);
        }
        out.push(']');
        out
    }

    /// Renders all recorded errors into a single `InvalidArgument` status.
    pub fn status(&self, summary: &str) -> Status {
        Status::invalid_argument(self.message(summary))
    }
}

/// Guard for one entered field-path segment.
///
/// Dereferences to the underlying [`ValidationErrors`], so errors and nested
/// scopes flow through the guard; dropping it pops the segment, including on
/// early-return paths.
pub struct ScopedField<'a> {
    errors: &'a mut ValidationErrors,
}

impl Drop for ScopedField<'_> {
    fn drop(&mut self) {
        self.errors.fields.pop();
    }
}

impl Deref for ScopedField<'_> {
    type Target = ValidationErrors;

    fn deref(&self) -> &ValidationErrors {
        self.errors
    }
}

impl DerefMut for ScopedField<'_> {
    fn deref_mut(&mut self) -> &mut ValidationErrors {
        self.errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_accumulator_is_ok() {
        let errors = ValidationErrors::new();
        assert!(errors.ok());
        assert_eq!(errors.size(), 0);
    }

    #[test]
    fn test_error_at_top_level_has_plain_path() {
        let mut errors = ValidationErrors::new();
        {
            let mut errors = errors.scoped("cluster");
            errors.add_error("field not present");
        }
        assert_eq!(
            errors.message("validation failed"),
            "validation failed: [field:cluster error:field not present]",
        );
    }

    #[test]
    fn test_leading_dot_stripped_at_top_level() {
        let mut errors = ValidationErrors::new();
        {
            let mut errors = errors.scoped(".seconds");
            errors.add_error("out of range");
        }
        assert_eq!(
            errors.message("validation failed"),
            "validation failed: [field:seconds error:out of range]",
        );
    }

    #[test]
    fn test_nested_scopes_concatenate() {
        let mut errors = ValidationErrors::new();
        {
            let mut errors = errors.scoped("endpoints");
            let mut errors = errors.scoped("[2]");
            let mut errors = errors.scoped(".lb_endpoints[0]");
            let mut errors = errors.scoped(".endpoint");
            errors.add_error("field not present");
        }
        assert_eq!(
            errors.message("oops"),
            "oops: [field:endpoints[2].lb_endpoints[0].endpoint error:field not present]",
        );
    }

    #[test]
    fn test_rendering_sorts_by_path() {
        let mut errors = ValidationErrors::new();
        {
            let mut errors = errors.scoped("b");
            errors.add_error("second");
        }
        {
            let mut errors = errors.scoped("a");
            errors.add_error("first");
        }
        assert_eq!(
            errors.message("validation failed"),
            "validation failed: [field:a error:first; field:b error:second]",
        );
    }

    #[test]
    fn test_same_path_errors_keep_insertion_order() {
        let mut errors = ValidationErrors::new();
        let mut errors = errors.scoped("x");
        errors.add_error("one");
        errors.add_error("two");
        assert_eq!(
            errors.message("validation failed"),
            "validation failed: [field:x error:one; field:x error:two]",
        );
    }

    #[test]
    fn test_scope_unwinds_on_early_return() {
        fn inner(errors: &mut ValidationErrors, fail_early: bool) -> Option<()> {
            let mut errors = errors.scoped(".outer");
            if fail_early {
                errors.add_error("early exit");
                return None;
            }
            let mut errors = errors.scoped(".inner");
            errors.add_error("deep");
            Some(())
        }

        let mut errors = ValidationErrors::new();
        inner(&mut errors, true);
        // The path stack must be empty again: a fresh top-level error carries
        // no residue from the aborted scope.
        errors.add_error("top level");
        assert_eq!(
            errors.message("validation failed"),
            "validation failed: [field: error:top level; field:outer error:early exit]",
        );
    }

    #[test]
    fn test_size_detects_sub_scope_errors() {
        let mut errors = ValidationErrors::new();
        let before = errors.size();
        {
            let mut errors = errors.scoped("field");
            errors.add_error("bad");
        }
        assert_eq!(errors.size(), before + 1);
    }

    #[test]
    fn test_status_is_invalid_argument() {
        let mut errors = ValidationErrors::new();
        errors.add_error("bad");
        let status = errors.status("failed");
        assert_eq!(status.code(), tonic::Code::InvalidArgument);
        assert_eq!(status.message(), "failed: [field: error:bad]");
    }
}
