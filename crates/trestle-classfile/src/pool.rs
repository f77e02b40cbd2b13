//! Class file constant pool

use crate::code::ByteWriter;
use rustc_hash::FxHashMap;
use thiserror::Error;

/// Errors raised while interning pool entries
#[derive(Debug, Error)]
pub enum PoolError {
    /// The pool is full (indices are u16, entry 0 is reserved)
    #[error("Constant pool overflow (max 65534 entries)")]
    Overflow,

    /// A modified-UTF-8 payload longer than the format allows
    #[error("UTF-8 constant of {0} bytes exceeds 65535")]
    Utf8TooLong(usize),
}

/// A single constant pool entry.
///
/// Cross-references are pool indices (1-based, as the format counts them).
/// Only the entry kinds bridge emission produces are modeled.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Constant {
    /// Modified-UTF-8 text (tag 1)
    Utf8(String),
    /// 32-bit integer (tag 3), used for annotation int/boolean values
    Integer(i32),
    /// Class reference (tag 7)
    Class {
        /// Utf8 index of the internal class name
        name: u16,
    },
    /// String literal (tag 8)
    String {
        /// Utf8 index of the text
        utf8: u16,
    },
    /// Class method reference (tag 10)
    Methodref {
        /// Class entry of the declaring class
        class: u16,
        /// NameAndType entry of the member
        name_and_type: u16,
    },
    /// Interface method reference (tag 11)
    InterfaceMethodref {
        /// Class entry of the declaring interface
        class: u16,
        /// NameAndType entry of the member
        name_and_type: u16,
    },
    /// Name and descriptor pair (tag 12)
    NameAndType {
        /// Utf8 index of the member name
        name: u16,
        /// Utf8 index of the descriptor
        descriptor: u16,
    },
}

impl Constant {
    fn tag(&self) -> u8 {
        match self {
            Constant::Utf8(_) => 1,
            Constant::Integer(_) => 3,
            Constant::Class { .. } => 7,
            Constant::String { .. } => 8,
            Constant::Methodref { .. } => 10,
            Constant::InterfaceMethodref { .. } => 11,
            Constant::NameAndType { .. } => 12,
        }
    }
}

/// Deduplicating constant pool.
///
/// Entries are assigned indices in insertion order, so identical build
/// inputs always produce identical pools.
#[derive(Debug, Clone, Default)]
pub struct ConstantPool {
    entries: Vec<Constant>,
    index: FxHashMap<Constant, u16>,
}

impl ConstantPool {
    /// Create an empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries (the format's `constant_pool_count` is this + 1).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if no entries have been interned.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn intern(&mut self, constant: Constant) -> Result<u16, PoolError> {
        if let Some(&index) = self.index.get(&constant) {
            return Ok(index);
        }
        if self.entries.len() >= 65534 {
            return Err(PoolError::Overflow);
        }
        let index = (self.entries.len() + 1) as u16;
        self.index.insert(constant.clone(), index);
        self.entries.push(constant);
        Ok(index)
    }

    /// Intern a Utf8 entry.
    pub fn utf8(&mut self, text: &str) -> Result<u16, PoolError> {
        if text.len() > 65535 {
            return Err(PoolError::Utf8TooLong(text.len()));
        }
        self.intern(Constant::Utf8(text.to_string()))
    }

    /// Intern an Integer entry.
    pub fn integer(&mut self, value: i32) -> Result<u16, PoolError> {
        self.intern(Constant::Integer(value))
    }

    /// Intern a Class entry for an internal name.
    pub fn class(&mut self, internal_name: &str) -> Result<u16, PoolError> {
        let name = self.utf8(internal_name)?;
        self.intern(Constant::Class { name })
    }

    /// Intern a String entry.
    pub fn string(&mut self, text: &str) -> Result<u16, PoolError> {
        let utf8 = self.utf8(text)?;
        self.intern(Constant::String { utf8 })
    }

    /// Intern a NameAndType entry.
    pub fn name_and_type(&mut self, name: &str, descriptor: &str) -> Result<u16, PoolError> {
        let name = self.utf8(name)?;
        let descriptor = self.utf8(descriptor)?;
        self.intern(Constant::NameAndType { name, descriptor })
    }

    /// Intern a Methodref for a class member.
    pub fn method_ref(
        &mut self,
        class_name: &str,
        name: &str,
        descriptor: &str,
    ) -> Result<u16, PoolError> {
        let class = self.class(class_name)?;
        let name_and_type = self.name_and_type(name, descriptor)?;
        self.intern(Constant::Methodref {
            class,
            name_and_type,
        })
    }

    /// Intern an InterfaceMethodref for an interface member.
    pub fn interface_method_ref(
        &mut self,
        interface_name: &str,
        name: &str,
        descriptor: &str,
    ) -> Result<u16, PoolError> {
        let class = self.class(interface_name)?;
        let name_and_type = self.name_and_type(name, descriptor)?;
        self.intern(Constant::InterfaceMethodref {
            class,
            name_and_type,
        })
    }

    /// Look up an entry by its 1-based pool index.
    pub fn get(&self, index: u16) -> Option<&Constant> {
        if index == 0 {
            return None;
        }
        self.entries.get(index as usize - 1)
    }

    /// Resolve a Utf8 entry's text.
    pub fn utf8_at(&self, index: u16) -> Option<&str> {
        match self.get(index)? {
            Constant::Utf8(text) => Some(text),
            _ => None,
        }
    }

    /// Resolve a Class entry's internal name.
    pub fn class_name_at(&self, index: u16) -> Option<&str> {
        match self.get(index)? {
            Constant::Class { name } => self.utf8_at(*name),
            _ => None,
        }
    }

    /// Resolve a Methodref or InterfaceMethodref into
    /// (class name, member name, descriptor).
    pub fn method_ref_at(&self, index: u16) -> Option<(&str, &str, &str)> {
        let (class, name_and_type) = match self.get(index)? {
            Constant::Methodref {
                class,
                name_and_type,
            }
            | Constant::InterfaceMethodref {
                class,
                name_and_type,
            } => (*class, *name_and_type),
            _ => return None,
        };
        let class_name = self.class_name_at(class)?;
        match self.get(name_and_type)? {
            Constant::NameAndType { name, descriptor } => {
                Some((class_name, self.utf8_at(*name)?, self.utf8_at(*descriptor)?))
            }
            _ => None,
        }
    }

    /// Iterate entries with their 1-based indices.
    pub fn iter(&self) -> impl Iterator<Item = (u16, &Constant)> {
        self.entries
            .iter()
            .enumerate()
            .map(|(i, c)| ((i + 1) as u16, c))
    }

    /// Serialize the pool (count then entries, big-endian).
    pub fn encode(&self, out: &mut ByteWriter) {
        out.emit_u16((self.entries.len() + 1) as u16);
        for entry in &self.entries {
            out.emit_u8(entry.tag());
            match entry {
                Constant::Utf8(text) => {
                    out.emit_u16(text.len() as u16);
                    out.emit_bytes(text.as_bytes());
                }
                Constant::Integer(value) => out.emit_u32(*value as u32),
                Constant::Class { name } => out.emit_u16(*name),
                Constant::String { utf8 } => out.emit_u16(*utf8),
                Constant::Methodref {
                    class,
                    name_and_type,
                }
                | Constant::InterfaceMethodref {
                    class,
                    name_and_type,
                } => {
                    out.emit_u16(*class);
                    out.emit_u16(*name_and_type);
                }
                Constant::NameAndType { name, descriptor } => {
                    out.emit_u16(*name);
                    out.emit_u16(*descriptor);
                }
            }
        }
    }
}
