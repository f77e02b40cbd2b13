//! Bridge generation errors

use thiserror::Error;
use trestle_classfile::{ClassFileError, PoolError, VerifyError};

pub type EmitResult<T> = Result<T, EmitError>;

#[derive(Debug, Error)]
pub enum EmitError {
    #[error("Manifest error: {message}")]
    Manifest { message: String },

    #[error("Method {method}: explicit signature has {got} parameters but the arity is {expected}")]
    ArityMismatch {
        method: String,
        expected: i32,
        got: usize,
    },

    #[error("Method {method}: variadic methods cannot take an explicit signature")]
    VariadicSignature { method: String },

    #[error("Unsupported type in signature: {name}")]
    UnsupportedType { name: String },

    #[error("{name:?} is not a valid Java identifier (supply java_name)")]
    InvalidName { name: String },

    #[error("Invalid class or package name: {name}")]
    InvalidClassName { name: String },

    #[error("Method {method} has too many parameters (max 254)")]
    TooManyParameters { method: String },

    #[error("Class file error: {0}")]
    ClassFile(#[from] ClassFileError),

    #[error("Generated class failed verification: {0}")]
    Verification(#[from] VerifyError),
}

impl From<PoolError> for EmitError {
    fn from(err: PoolError) -> Self {
        EmitError::ClassFile(ClassFileError::Pool(err))
    }
}
