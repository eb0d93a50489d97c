//! The rewriter's error taxonomy.
//!
//! One variant per failure kind the rewrite can raise. Each carries the
//! printed form of the IR object responsible, so a caller several layers up
//! (the CLI's top-level error report) can still name exactly what went
//! wrong without the rewriter having printed and discarded that context
//! itself. Modeled as a tagged sum rather than a string, per the redesign
//! guidance against stringly-typed errors.

use thiserror::Error;

/// Why a module failed to rewrite.
#[derive(Debug, Error)]
pub enum RewriteError {
    #[error("function '{function}' calls kernel_launch targeting an undeclared kernel '{kernel_name}'\n  at: {site}")]
    UnknownKernel {
        function: String,
        kernel_name: String,
        site: String,
    },

    #[error("double-precision parameter is not supported\n  at: {site}")]
    DoubleNotSupported { site: String },

    #[error("integer parameter has unsupported bit width {bits} (expected 8, 32 or 64)\n  at: {site}")]
    UnsupportedBitWidth { bits: u32, site: String },

    #[error("vector parameter has non-primitive element type {element_type}\n  at: {site}")]
    UnsupportedVectorElement { element_type: String, site: String },

    #[error("device-side by-value struct parameter contains an embedded pointer at field path {index_path:?}\n  at: {site}")]
    PointersInsideDeviceStruct { index_path: Vec<usize>, site: String },

    #[error("argument does not match any supported marshalling strategy\n  at: {site}")]
    UnsupportedArgumentKind { site: String },

    #[error("struct type cannot be laid out as a pointer-free twin: {reason}\n  at: {site}")]
    UnsupportedStructShape { reason: String, site: String },

    #[error("setup call's staging-slot operand is not a bitcast of a stack allocation\n  at: {site}")]
    MalformedSetupArgument { site: String },

    #[error("post-rewrite verification failed:\n{0}")]
    VerificationFailure(String),
}
