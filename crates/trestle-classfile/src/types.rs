//! Java types and descriptor rendering/parsing

use std::fmt;
use thiserror::Error;

/// Descriptor parsing errors
#[derive(Debug, Error)]
pub enum DescriptorError {
    /// Descriptor ended before a complete type was read
    #[error("Truncated descriptor: {0}")]
    Truncated(String),

    /// A character that does not start any field type
    #[error("Invalid type character {ch:?} in descriptor {descriptor}")]
    InvalidChar {
        /// The offending character
        ch: char,
        /// The full descriptor being parsed
        descriptor: String,
    },

    /// A method descriptor that does not start with '('
    #[error("Method descriptor must start with '(': {0}")]
    MissingParams(String),
}

/// A Java type as it appears in method and field descriptors.
///
/// Reference types carry their internal name (`java/lang/String`); the
/// convenience constructors accept dotted binary names and normalize them.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum JavaType {
    /// `boolean` (descriptor `Z`)
    Boolean,
    /// `byte` (descriptor `B`)
    Byte,
    /// `short` (descriptor `S`)
    Short,
    /// `char` (descriptor `C`)
    Char,
    /// `int` (descriptor `I`)
    Int,
    /// `long` (descriptor `J`), two local slots wide
    Long,
    /// `float` (descriptor `F`)
    Float,
    /// `double` (descriptor `D`), two local slots wide
    Double,
    /// A class or interface reference, by internal name
    Object(String),
    /// An array of some element type
    Array(Box<JavaType>),
    /// `void`, valid only as a return type
    Void,
}

impl JavaType {
    /// Reference type from a binary or internal class name.
    pub fn object(name: &str) -> Self {
        JavaType::Object(name.replace('.', "/"))
    }

    /// Array of the given element type.
    pub fn array(elem: JavaType) -> Self {
        JavaType::Array(Box::new(elem))
    }

    /// Descriptor form of this type (`I`, `Ljava/lang/String;`, `[Z`).
    pub fn descriptor(&self) -> String {
        let mut out = String::new();
        self.write_descriptor(&mut out);
        out
    }

    fn write_descriptor(&self, out: &mut String) {
        match self {
            JavaType::Boolean => out.push('Z'),
            JavaType::Byte => out.push('B'),
            JavaType::Short => out.push('S'),
            JavaType::Char => out.push('C'),
            JavaType::Int => out.push('I'),
            JavaType::Long => out.push('J'),
            JavaType::Float => out.push('F'),
            JavaType::Double => out.push('D'),
            JavaType::Object(name) => {
                out.push('L');
                out.push_str(name);
                out.push(';');
            }
            JavaType::Array(elem) => {
                out.push('[');
                elem.write_descriptor(out);
            }
            JavaType::Void => out.push('V'),
        }
    }

    /// Number of local-variable/operand slots this type occupies.
    ///
    /// `long` and `double` are two slots wide; `void` occupies none.
    pub fn slots(&self) -> u16 {
        match self {
            JavaType::Long | JavaType::Double => 2,
            JavaType::Void => 0,
            _ => 1,
        }
    }

    /// True for the eight primitive types (not `void`, not references).
    pub fn is_primitive(&self) -> bool {
        !matches!(
            self,
            JavaType::Object(_) | JavaType::Array(_) | JavaType::Void
        )
    }
}

impl fmt::Display for JavaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JavaType::Boolean => write!(f, "boolean"),
            JavaType::Byte => write!(f, "byte"),
            JavaType::Short => write!(f, "short"),
            JavaType::Char => write!(f, "char"),
            JavaType::Int => write!(f, "int"),
            JavaType::Long => write!(f, "long"),
            JavaType::Float => write!(f, "float"),
            JavaType::Double => write!(f, "double"),
            JavaType::Object(name) => write!(f, "{}", name.replace('/', ".")),
            JavaType::Array(elem) => write!(f, "{}[]", elem),
            JavaType::Void => write!(f, "void"),
        }
    }
}

/// Render a method descriptor from parameter and return types.
pub fn method_descriptor(params: &[JavaType], ret: &JavaType) -> String {
    let mut out = String::from("(");
    for p in params {
        p.write_descriptor(&mut out);
    }
    out.push(')');
    ret.write_descriptor(&mut out);
    out
}

/// Total number of local slots occupied by a parameter list.
pub fn param_slots(params: &[JavaType]) -> u16 {
    params.iter().map(JavaType::slots).sum()
}

/// Parse a method descriptor into its parameter and return types.
pub fn parse_method_descriptor(
    descriptor: &str,
) -> Result<(Vec<JavaType>, JavaType), DescriptorError> {
    let mut chars = descriptor.chars().peekable();
    if chars.next() != Some('(') {
        return Err(DescriptorError::MissingParams(descriptor.to_string()));
    }

    let mut params = Vec::new();
    loop {
        match chars.peek() {
            Some(')') => {
                chars.next();
                break;
            }
            Some(_) => params.push(parse_type(&mut chars, descriptor)?),
            None => return Err(DescriptorError::Truncated(descriptor.to_string())),
        }
    }

    let ret = parse_type(&mut chars, descriptor)?;
    if let Some(ch) = chars.next() {
        return Err(DescriptorError::InvalidChar {
            ch,
            descriptor: descriptor.to_string(),
        });
    }
    Ok((params, ret))
}

fn parse_type(
    chars: &mut std::iter::Peekable<std::str::Chars<'_>>,
    descriptor: &str,
) -> Result<JavaType, DescriptorError> {
    let ch = chars
        .next()
        .ok_or_else(|| DescriptorError::Truncated(descriptor.to_string()))?;
    match ch {
        'Z' => Ok(JavaType::Boolean),
        'B' => Ok(JavaType::Byte),
        'S' => Ok(JavaType::Short),
        'C' => Ok(JavaType::Char),
        'I' => Ok(JavaType::Int),
        'J' => Ok(JavaType::Long),
        'F' => Ok(JavaType::Float),
        'D' => Ok(JavaType::Double),
        'V' => Ok(JavaType::Void),
        '[' => Ok(JavaType::array(parse_type(chars, descriptor)?)),
        'L' => {
            let mut name = String::new();
            for c in chars.by_ref() {
                if c == ';' {
                    return Ok(JavaType::Object(name));
                }
                name.push(c);
            }
            Err(DescriptorError::Truncated(descriptor.to_string()))
        }
        other => Err(DescriptorError::InvalidChar {
            ch: other,
            descriptor: descriptor.to_string(),
        }),
    }
}
