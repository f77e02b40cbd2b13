//! Trestle Bridge Compiler - Hosted Class to JVM Bridge Generation
//!
//! This crate implements the ahead-of-time generator that exposes a hosted
//! class's public method table as a JVM class. Each bridge method marshals
//! its arguments into the hosted calling convention, dispatches by name
//! through the runtime's dynamic call entry point, and converts the result
//! back to its declared native type.

pub mod binding;
pub mod emit;
pub mod error;
pub mod manifest;
pub mod marshal;
pub mod signature;

pub use binding::RuntimeBinding;
pub use emit::{first_local_slot, BridgeCompiler, GeneratedClass};
pub use error::{EmitError, EmitResult};
pub use manifest::{
    AnnotationSpec, AnnotationValue, BridgeManifest, ClassSpec, MethodSpec, RuntimeOverrides,
    SignatureSpec,
};
pub use marshal::{conversion_for, Conversion, CONVERSIONS};
pub use signature::MethodSignature;
