//! Structural verification of built class files
//!
//! Runs over the in-memory model before serialization: pool
//! cross-references, descriptor sanity, local-slot accounting, and an
//! instruction scan of each method body. This is not a bytecode verifier
//! in the JVM sense; it catches emitter bugs, not hostile input.

use crate::classfile::{access, ClassFile, MethodInfo};
use crate::code::Opcode;
use crate::pool::{Constant, ConstantPool};
use crate::types::{param_slots, parse_method_descriptor, DescriptorError};
use std::collections::HashSet;

/// Class file verification errors
#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    /// A pool index that is missing or of the wrong entry kind
    #[error("Pool index {index} is not a {expected} entry")]
    InvalidPoolRef {
        /// The dangling or mistyped index
        index: u16,
        /// The entry kind the referent must have
        expected: &'static str,
    },

    /// A method descriptor that does not parse
    #[error(transparent)]
    Descriptor(#[from] DescriptorError),

    /// A method with an empty body
    #[error("Method {method} has empty code")]
    EmptyCode {
        /// Method name
        method: String,
    },

    /// An instruction whose operands run past the end of the body
    #[error("Truncated instruction at offset {offset} in {method}")]
    TruncatedCode {
        /// Method name
        method: String,
        /// Offset of the truncated instruction
        offset: usize,
    },

    /// A byte that is not an opcode of the emitted subset
    #[error("Unknown opcode {opcode:#04x} at offset {offset} in {method}")]
    UnknownOpcode {
        /// Method name
        method: String,
        /// The unrecognized byte
        opcode: u8,
        /// Offset of the byte
        offset: usize,
    },

    /// Straight-line code that does not end in a return instruction
    #[error("Execution falls off the end of {method}")]
    MissingReturn {
        /// Method name
        method: String,
    },

    /// Declared max_locals smaller than the descriptor requires
    #[error("Method {method} declares {declared} locals but its signature needs {required}")]
    MaxLocalsTooSmall {
        /// Method name
        method: String,
        /// Declared max_locals
        declared: u16,
        /// Slots required by the receiver and parameters
        required: u16,
    },

    /// Two methods with the same name and descriptor
    #[error("Duplicate method {method}{descriptor}")]
    DuplicateMethod {
        /// Method name
        method: String,
        /// Shared descriptor
        descriptor: String,
    },
}

/// Verify a built class file.
pub fn verify_class(class: &ClassFile) -> Result<(), VerifyError> {
    verify_pool(&class.pool)?;
    expect_class_entry(&class.pool, class.this_class)?;
    expect_class_entry(&class.pool, class.super_class)?;

    let mut seen = HashSet::new();
    for method in class.methods() {
        verify_method(class, method, &mut seen)?;
    }
    Ok(())
}

fn verify_pool(pool: &ConstantPool) -> Result<(), VerifyError> {
    for (_, entry) in pool.iter() {
        match entry {
            Constant::Utf8(_) | Constant::Integer(_) => {}
            Constant::Class { name } => expect_utf8(pool, *name)?,
            Constant::String { utf8 } => expect_utf8(pool, *utf8)?,
            Constant::Methodref {
                class,
                name_and_type,
            }
            | Constant::InterfaceMethodref {
                class,
                name_and_type,
            } => {
                expect_class_entry(pool, *class)?;
                match pool.get(*name_and_type) {
                    Some(Constant::NameAndType { .. }) => {}
                    _ => {
                        return Err(VerifyError::InvalidPoolRef {
                            index: *name_and_type,
                            expected: "NameAndType",
                        })
                    }
                }
            }
            Constant::NameAndType { name, descriptor } => {
                expect_utf8(pool, *name)?;
                expect_utf8(pool, *descriptor)?;
            }
        }
    }
    Ok(())
}

fn expect_utf8(pool: &ConstantPool, index: u16) -> Result<(), VerifyError> {
    match pool.utf8_at(index) {
        Some(_) => Ok(()),
        None => Err(VerifyError::InvalidPoolRef {
            index,
            expected: "Utf8",
        }),
    }
}

fn expect_class_entry(pool: &ConstantPool, index: u16) -> Result<(), VerifyError> {
    match pool.get(index) {
        Some(Constant::Class { .. }) => Ok(()),
        _ => Err(VerifyError::InvalidPoolRef {
            index,
            expected: "Class",
        }),
    }
}

fn verify_method(
    class: &ClassFile,
    method: &MethodInfo,
    seen: &mut HashSet<(u16, u16)>,
) -> Result<(), VerifyError> {
    let name = class
        .method_name(method)
        .ok_or(VerifyError::InvalidPoolRef {
            index: method.name_index,
            expected: "Utf8",
        })?
        .to_string();
    let descriptor = class
        .method_descriptor(method)
        .ok_or(VerifyError::InvalidPoolRef {
            index: method.descriptor_index,
            expected: "Utf8",
        })?;

    if !seen.insert((method.name_index, method.descriptor_index)) {
        return Err(VerifyError::DuplicateMethod {
            method: name,
            descriptor: descriptor.to_string(),
        });
    }

    let (params, _) = parse_method_descriptor(descriptor)?;
    let receiver = ((method.access_flags & access::STATIC) == 0) as u16;
    let required = receiver + param_slots(&params);
    if method.code.max_locals < required {
        return Err(VerifyError::MaxLocalsTooSmall {
            method: name,
            declared: method.code.max_locals,
            required,
        });
    }

    scan_code(&name, &method.code.code)
}

/// Walk the body instruction by instruction; the emitted subset has fixed
/// operand lengths, so this catches truncation and stray bytes exactly.
fn scan_code(method: &str, code: &[u8]) -> Result<(), VerifyError> {
    if code.is_empty() {
        return Err(VerifyError::EmptyCode {
            method: method.to_string(),
        });
    }

    let mut offset = 0;
    let mut last = None;
    while offset < code.len() {
        let opcode = Opcode::from_u8(code[offset]).ok_or(VerifyError::UnknownOpcode {
            method: method.to_string(),
            opcode: code[offset],
            offset,
        })?;
        if offset + opcode.length() > code.len() {
            return Err(VerifyError::TruncatedCode {
                method: method.to_string(),
                offset,
            });
        }
        offset += opcode.length();
        last = Some(opcode);
    }

    match last {
        Some(op) if op.is_return() => Ok(()),
        _ => Err(VerifyError::MissingReturn {
            method: method.to_string(),
        }),
    }
}
