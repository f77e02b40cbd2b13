//! Method signature resolution
//!
//! A bridge method's native signature is either explicit (type keywords
//! from the manifest) or implicit: arity-many generic hosted-object
//! parameters and a hosted-object return, with variadic methods taking a
//! single hosted-object array instead.

use crate::binding::RuntimeBinding;
use crate::error::{EmitError, EmitResult};
use crate::manifest::MethodSpec;
use trestle_classfile::JavaType;

/// A resolved native signature.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodSignature {
    /// Parameter types, in order.
    pub params: Vec<JavaType>,
    /// Return type.
    pub ret: JavaType,
}

/// Resolve a method's native signature against the runtime binding.
///
/// An explicit signature must match the declared arity exactly, and
/// variadic methods never take one.
pub fn resolve(spec: &MethodSpec, binding: &RuntimeBinding) -> EmitResult<MethodSignature> {
    match &spec.signature {
        Some(signature) => {
            if spec.arity < 0 {
                return Err(EmitError::VariadicSignature {
                    method: spec.name.clone(),
                });
            }
            if signature.params.len() != spec.arity as usize {
                return Err(EmitError::ArityMismatch {
                    method: spec.name.clone(),
                    expected: spec.arity,
                    got: signature.params.len(),
                });
            }
            let params = signature
                .params
                .iter()
                .map(|keyword| parse_keyword(keyword, binding, false))
                .collect::<EmitResult<Vec<_>>>()?;
            let ret = parse_keyword(&signature.returns, binding, true)?;
            Ok(MethodSignature { params, ret })
        }
        None if spec.arity >= 0 => Ok(MethodSignature {
            params: vec![binding.object_type(); spec.arity as usize],
            ret: binding.object_type(),
        }),
        None => Ok(MethodSignature {
            params: vec![JavaType::array(binding.object_type())],
            ret: binding.object_type(),
        }),
    }
}

/// Map a manifest type keyword to a Java type.
///
/// The keyword set is closed: the eight primitives, `object` (the generic
/// hosted object), and `void` for return positions. Anything else is an
/// explicit unsupported-type error rather than a silent conversion.
pub fn parse_keyword(
    keyword: &str,
    binding: &RuntimeBinding,
    allow_void: bool,
) -> EmitResult<JavaType> {
    match keyword {
        "boolean" => Ok(JavaType::Boolean),
        "byte" => Ok(JavaType::Byte),
        "short" => Ok(JavaType::Short),
        "char" => Ok(JavaType::Char),
        "int" => Ok(JavaType::Int),
        "long" => Ok(JavaType::Long),
        "float" => Ok(JavaType::Float),
        "double" => Ok(JavaType::Double),
        "object" => Ok(binding.object_type()),
        "void" if allow_void => Ok(JavaType::Void),
        other => Err(EmitError::UnsupportedType {
            name: other.to_string(),
        }),
    }
}
