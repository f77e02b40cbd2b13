//! Class file assembly and serialization

use crate::code::{ByteWriter, CodeWriter};
use crate::pool::{ConstantPool, PoolError};
use thiserror::Error;

/// Class file magic number.
pub const MAGIC: u32 = 0xCAFE_BABE;

/// Emitted major version (49 = Java 5: verification by type inference,
/// no StackMapTable required).
pub const MAJOR_VERSION: u16 = 49;

/// Emitted minor version.
pub const MINOR_VERSION: u16 = 0;

/// Class and method access flags.
pub mod access {
    /// Accessible outside its package
    pub const PUBLIC: u16 = 0x0001;
    /// Treat superclass methods specially in `invokespecial`
    pub const SUPER: u16 = 0x0020;
    /// Static member
    pub const STATIC: u16 = 0x0008;
}

/// Class building/serialization errors
#[derive(Debug, Error)]
pub enum ClassFileError {
    /// Constant pool error
    #[error("Constant pool error: {0}")]
    Pool(#[from] PoolError),

    /// A method body longer than the format's code-length limit
    #[error("Method body for {method} is {len} bytes (max 65535)")]
    CodeTooLarge {
        /// Method name
        method: String,
        /// Emitted body length
        len: usize,
    },
}

/// An annotation to attach to a generated method.
///
/// Values are emitted in the order given; callers that need deterministic
/// output pass them pre-sorted.
#[derive(Debug, Clone)]
pub struct Annotation {
    /// Annotation class, as a binary or internal name
    pub class_path: String,
    /// Named attribute values
    pub values: Vec<(String, AnnotationValue)>,
}

/// The closed set of annotation attribute value kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum AnnotationValue {
    /// `boolean` element (tag `Z`, stored as an Integer constant)
    Boolean(bool),
    /// `int` element (tag `I`)
    Int(i32),
    /// `String` element (tag `s`)
    Str(String),
}

/// A pool-resolved annotation, ready to serialize.
#[derive(Debug, Clone)]
pub(crate) struct AnnotationInfo {
    pub(crate) type_index: u16,
    pub(crate) elements: Vec<(u16, ElementValue)>,
}

/// A pool-resolved annotation element value.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ElementValue {
    pub(crate) tag: u8,
    pub(crate) value_index: u16,
}

/// The Code attribute body of a method.
#[derive(Debug, Clone)]
pub struct CodeBody {
    /// Operand-stack high-water mark
    pub max_stack: u16,
    /// Local variable slots, including the receiver and any scratch slots
    pub max_locals: u16,
    /// Instruction bytes
    pub code: Vec<u8>,
}

/// One method of a built class.
#[derive(Debug, Clone)]
pub struct MethodInfo {
    /// Access flags
    pub access_flags: u16,
    /// Utf8 pool index of the method name
    pub name_index: u16,
    /// Utf8 pool index of the method descriptor
    pub descriptor_index: u16,
    /// The method body (every generated method has one)
    pub code: CodeBody,
    pub(crate) annotations: Vec<AnnotationInfo>,
}

/// Incrementally builds a class: interns names up front so code emission
/// can reference pool indices, then seals into a [`ClassFile`].
#[derive(Debug)]
pub struct ClassBuilder {
    pool: ConstantPool,
    access_flags: u16,
    this_class: u16,
    super_class: u16,
    code_attr: u16,
    annotations_attr: Option<u16>,
    source_file: Option<(u16, u16)>,
    methods: Vec<MethodInfo>,
}

impl ClassBuilder {
    /// Start a class with the given access flags, internal name, and
    /// internal superclass name.
    pub fn new(
        access_flags: u16,
        this_class: &str,
        super_class: &str,
    ) -> Result<Self, ClassFileError> {
        let mut pool = ConstantPool::new();
        let this_class = pool.class(this_class)?;
        let super_class = pool.class(super_class)?;
        // Every generated class has at least a constructor body.
        let code_attr = pool.utf8("Code")?;
        Ok(Self {
            pool,
            access_flags,
            this_class,
            super_class,
            code_attr,
            annotations_attr: None,
            source_file: None,
            methods: Vec::new(),
        })
    }

    /// The pool, for interning call-site and literal constants during
    /// code emission.
    pub fn pool_mut(&mut self) -> &mut ConstantPool {
        &mut self.pool
    }

    /// Record a SourceFile attribute.
    pub fn set_source_file(&mut self, name: &str) -> Result<(), ClassFileError> {
        let attr = self.pool.utf8("SourceFile")?;
        let value = self.pool.utf8(name)?;
        self.source_file = Some((attr, value));
        Ok(())
    }

    /// Add a finished method.
    ///
    /// `max_locals` comes from the caller's slot accounting; `max_stack`
    /// comes from the code writer.
    pub fn add_method(
        &mut self,
        access_flags: u16,
        name: &str,
        descriptor: &str,
        code: CodeWriter,
        max_locals: u16,
        annotations: &[Annotation],
    ) -> Result<(), ClassFileError> {
        if code.len() > 65535 {
            return Err(ClassFileError::CodeTooLarge {
                method: name.to_string(),
                len: code.len(),
            });
        }
        let name_index = self.pool.utf8(name)?;
        let descriptor_index = self.pool.utf8(descriptor)?;
        let annotations = annotations
            .iter()
            .map(|a| self.resolve_annotation(a))
            .collect::<Result<Vec<_>, _>>()?;
        if !annotations.is_empty() && self.annotations_attr.is_none() {
            self.annotations_attr = Some(self.pool.utf8("RuntimeVisibleAnnotations")?);
        }
        self.methods.push(MethodInfo {
            access_flags,
            name_index,
            descriptor_index,
            code: CodeBody {
                max_stack: code.max_stack(),
                max_locals,
                code: code.into_code(),
            },
            annotations,
        });
        Ok(())
    }

    fn resolve_annotation(&mut self, annotation: &Annotation) -> Result<AnnotationInfo, PoolError> {
        let descriptor = format!("L{};", annotation.class_path.replace('.', "/"));
        let type_index = self.pool.utf8(&descriptor)?;
        let mut elements = Vec::with_capacity(annotation.values.len());
        for (name, value) in &annotation.values {
            let name_index = self.pool.utf8(name)?;
            let value = match value {
                AnnotationValue::Boolean(b) => ElementValue {
                    tag: b'Z',
                    value_index: self.pool.integer(*b as i32)?,
                },
                AnnotationValue::Int(i) => ElementValue {
                    tag: b'I',
                    value_index: self.pool.integer(*i)?,
                },
                AnnotationValue::Str(s) => ElementValue {
                    tag: b's',
                    value_index: self.pool.utf8(s)?,
                },
            };
            elements.push((name_index, value));
        }
        Ok(AnnotationInfo {
            type_index,
            elements,
        })
    }

    /// Seal the builder into an immutable class file model.
    pub fn finish(self) -> ClassFile {
        ClassFile {
            pool: self.pool,
            access_flags: self.access_flags,
            this_class: self.this_class,
            super_class: self.super_class,
            code_attr: self.code_attr,
            annotations_attr: self.annotations_attr,
            source_file: self.source_file,
            methods: self.methods,
        }
    }
}

/// A built class file, ready to verify and serialize.
#[derive(Debug, Clone)]
pub struct ClassFile {
    /// The constant pool
    pub pool: ConstantPool,
    /// Class access flags
    pub access_flags: u16,
    /// Pool index of this class
    pub this_class: u16,
    /// Pool index of the superclass
    pub super_class: u16,
    code_attr: u16,
    annotations_attr: Option<u16>,
    source_file: Option<(u16, u16)>,
    pub(crate) methods: Vec<MethodInfo>,
}

impl ClassFile {
    /// Internal name of this class, if the pool is well-formed.
    pub fn class_name(&self) -> Option<&str> {
        self.pool.class_name_at(self.this_class)
    }

    /// The class's methods, in emission order.
    pub fn methods(&self) -> &[MethodInfo] {
        &self.methods
    }

    /// Find a method by name.
    pub fn find_method(&self, name: &str) -> Option<&MethodInfo> {
        self.methods
            .iter()
            .find(|m| self.pool.utf8_at(m.name_index) == Some(name))
    }

    /// Resolve a method's name from the pool.
    pub fn method_name(&self, method: &MethodInfo) -> Option<&str> {
        self.pool.utf8_at(method.name_index)
    }

    /// Resolve a method's descriptor from the pool.
    pub fn method_descriptor(&self, method: &MethodInfo) -> Option<&str> {
        self.pool.utf8_at(method.descriptor_index)
    }

    /// Serialize to class file bytes.
    ///
    /// All size limits were enforced while building, so serialization
    /// cannot fail; identical models produce identical bytes.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = ByteWriter::new();
        out.emit_u32(MAGIC);
        out.emit_u16(MINOR_VERSION);
        out.emit_u16(MAJOR_VERSION);

        self.pool.encode(&mut out);

        out.emit_u16(self.access_flags);
        out.emit_u16(self.this_class);
        out.emit_u16(self.super_class);

        // No interfaces, no fields: bridge classes declare neither.
        out.emit_u16(0);
        out.emit_u16(0);

        out.emit_u16(self.methods.len() as u16);
        for method in &self.methods {
            self.encode_method(method, &mut out);
        }

        // Class attributes: SourceFile only, when set.
        match self.source_file {
            Some((attr, value)) => {
                out.emit_u16(1);
                out.emit_u16(attr);
                out.emit_u32(2);
                out.emit_u16(value);
            }
            None => out.emit_u16(0),
        }

        out.into_bytes()
    }

    fn encode_method(&self, method: &MethodInfo, out: &mut ByteWriter) {
        out.emit_u16(method.access_flags);
        out.emit_u16(method.name_index);
        out.emit_u16(method.descriptor_index);

        let has_annotations = !method.annotations.is_empty();
        out.emit_u16(1 + has_annotations as u16);

        // Code attribute: max_stack, max_locals, code, no exception
        // table, no nested attributes.
        out.emit_u16(self.code_attr);
        out.emit_u32(12 + method.code.code.len() as u32);
        out.emit_u16(method.code.max_stack);
        out.emit_u16(method.code.max_locals);
        out.emit_u32(method.code.code.len() as u32);
        out.emit_bytes(&method.code.code);
        out.emit_u16(0);
        out.emit_u16(0);

        if has_annotations {
            let mut body = ByteWriter::new();
            body.emit_u16(method.annotations.len() as u16);
            for annotation in &method.annotations {
                body.emit_u16(annotation.type_index);
                body.emit_u16(annotation.elements.len() as u16);
                for (name_index, value) in &annotation.elements {
                    body.emit_u16(*name_index);
                    body.emit_u8(value.tag);
                    body.emit_u16(value.value_index);
                }
            }
            // Interned on the first annotated method; present here by
            // construction.
            let attr = self.annotations_attr.unwrap_or(0);
            out.emit_u16(attr);
            out.emit_u32(body.offset() as u32);
            out.emit_bytes(body.bytes());
        }
    }
}
