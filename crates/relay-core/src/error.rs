/// Alias for `Result<T, CoreError>`.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors raised while validating host-supplied options.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CoreError {
    /// A numeric field is outside its accepted range.
    #[error("invalid {field}: {value} ({reason})")]
    OutOfRange {
        /// The offending field name.
        field: &'static str,
        /// The rejected value.
        value: f32,
        /// What the field must satisfy.
        reason: &'static str,
    },

    /// A manual-fit shape is missing a size field it needs.
    #[error("{kind} shape with manual fit requires `{field}`")]
    MissingShapeField {
        /// The shape kind being resolved.
        kind: crate::shape::ShapeKind,
        /// The missing field name.
        field: &'static str,
    },

    /// An auto-fit shape was given no vertices to fit against.
    #[error("{0} shape with fit \"all\" needs at least one vertex")]
    EmptyGeometry(crate::shape::ShapeKind),

    /// A matrix was not made of sixteen finite numbers.
    #[error("malformed transform: {0}")]
    MalformedTransform(String),
}
