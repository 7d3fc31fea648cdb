//! Component store error types.

/// Errors returned by single-component lookups.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// No component of the requested type (or any subclass of it) is present.
    #[error("no component of type '{type_name}' found")]
    NotFound {
        /// Name of the requested type.
        type_name: &'static str,
    },

    /// A component was found under the requested id but is a different
    /// concrete type than the one asked for.
    #[error("component indexed as '{expected}' is a different concrete type ('{found}')")]
    TypeMismatch {
        /// Name of the requested type.
        expected: &'static str,
        /// Name of the concrete type that was found.
        found: &'static str,
    },
}
