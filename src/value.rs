//! src/value.rs
//!
//! Compile-time view of runtime objects. The compiler only needs enough of
//! the object model to build literals: immediates, symbols, strings, reals,
//! arrays, frames, frame maps and finished code blocks.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use crate::codeblock::CodeBlock;

// --- 1. Symbols ---

/// An interned name. Comparison and hashing ignore ASCII case.
#[derive(Clone)]
pub struct Symbol(Rc<str>);

impl Symbol {
    pub fn new(name: &str) -> Self {
        Symbol(Rc::from(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True if both symbols share the same interned storage.
    pub fn same_storage(&self, other: &Symbol) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Whether the name can be printed without bars.
    fn is_plain(&self) -> bool {
        let mut chars = self.0.chars();
        match chars.next() {
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
            _ => return false,
        }
        chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
    }
}

impl PartialEq for Symbol {
    fn eq(&self, other: &Self) -> bool {
        self.same_storage(other) || self.0.eq_ignore_ascii_case(&other.0)
    }
}

impl Eq for Symbol {}

impl Hash for Symbol {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for b in self.0.bytes() {
            state.write_u8(b.to_ascii_lowercase());
        }
        state.write_u8(0xff);
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}", self)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_plain() {
            f.write_str(&self.0)
        } else {
            f.write_str("|")?;
            for c in self.0.chars() {
                if c == '|' || c == '\\' {
                    f.write_str("\\")?;
                }
                write!(f, "{}", c)?;
            }
            f.write_str("|")
        }
    }
}

// --- 2. Heap objects ---

/// Slot names of a frame. Maps built through the store's `shared_map`
/// are reused by every frame with the same slot list.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameMap {
    pub slots: Vec<Symbol>,
    pub shared: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArrayObject {
    pub class: Symbol,
    pub elements: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FrameObject {
    pub map: Rc<FrameMap>,
    pub values: Vec<Value>,
}

// --- 3. Values ---

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Nil,
    True,
    /// 30-bit immediate integer.
    Int(i32),
    /// 16-bit unicode character.
    Char(u16),
    Real(f64),
    Symbol(Symbol),
    String(Rc<str>),
    /// `@n` reference into the magic-pointer table.
    MagicPointer(i32),
    Array(Rc<ArrayObject>),
    Frame(Rc<FrameObject>),
    Map(Rc<FrameMap>),
    CodeBlock(Rc<CodeBlock>),
}

pub const MIN_INT: i32 = -(1 << 29);
pub const MAX_INT: i32 = (1 << 29) - 1;

impl Value {
    /// Identity used by the literal pool: immediates, symbols and reals
    /// compare by value, heap objects by reference.
    pub fn same_literal(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) | (Value::True, Value::True) => true,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Char(a), Value::Char(b)) => a == b,
            (Value::MagicPointer(a), Value::MagicPointer(b)) => a == b,
            (Value::Real(a), Value::Real(b)) => a.to_bits() == b.to_bits(),
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::String(a), Value::String(b)) => Rc::ptr_eq(a, b),
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
            (Value::Frame(a), Value::Frame(b)) => Rc::ptr_eq(a, b),
            (Value::Map(a), Value::Map(b)) => Rc::ptr_eq(a, b),
            (Value::CodeBlock(a), Value::CodeBlock(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => f.write_str("nil"),
            Value::True => f.write_str("true"),
            Value::Int(n) => write!(f, "{}", n),
            Value::Char(c) => match char::from_u32(u32::from(*c)) {
                Some(ch) if ch.is_ascii_graphic() && ch != '\\' => write!(f, "${}", ch),
                _ => write!(f, "$\\u{:04X}", c),
            },
            Value::Real(r) => {
                if r.fract() == 0.0 && r.is_finite() {
                    write!(f, "{:.1}", r)
                } else {
                    write!(f, "{}", r)
                }
            }
            Value::Symbol(s) => write!(f, "'{}", s),
            Value::String(s) => {
                f.write_str("\"")?;
                for c in s.chars() {
                    match c {
                        '"' => f.write_str("\\\"")?,
                        '\\' => f.write_str("\\\\")?,
                        '\r' => f.write_str("\\n")?,
                        '\t' => f.write_str("\\t")?,
                        c if (c as u32) < 0x20 || (c as u32) > 0x7e => {
                            write!(f, "\\u{:04X}\\u", c as u32)?
                        }
                        c => write!(f, "{}", c)?,
                    }
                }
                f.write_str("\"")
            }
            Value::MagicPointer(n) => write!(f, "@{}", n),
            Value::Array(a) => {
                f.write_str("[")?;
                if a.class.as_str() != "array" {
                    write!(f, "{}: ", a.class)?;
                }
                for (i, e) in a.elements.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", e)?;
                }
                f.write_str("]")
            }
            Value::Frame(frame) => {
                f.write_str("{")?;
                for (i, (name, v)) in frame.map.slots.iter().zip(&frame.values).enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", name, v)?;
                }
                f.write_str("}")
            }
            Value::Map(map) => {
                f.write_str("<map")?;
                for s in &map.slots {
                    write!(f, " {}", s)?;
                }
                f.write_str(">")
            }
            Value::CodeBlock(block) => write!(f, "<CodeBlock, {} args>", block.arg_count()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbols_ignore_case() {
        assert_eq!(Symbol::new("Foo"), Symbol::new("fOO"));
        assert_ne!(Symbol::new("foo"), Symbol::new("bar"));
    }

    #[test]
    fn literal_identity_is_by_reference_for_heap_objects() {
        let a = Value::String(Rc::from("x"));
        let b = Value::String(Rc::from("x"));
        assert!(a.same_literal(&a.clone()));
        assert!(!a.same_literal(&b));
        assert!(Value::Real(1.5).same_literal(&Value::Real(1.5)));
        assert!(!Value::Int(1).same_literal(&Value::Real(1.0)));
    }

    #[test]
    fn printed_forms() {
        assert_eq!(Value::Symbol(Symbol::new("a b")).to_string(), "'|a b|");
        assert_eq!(Value::Char(u16::from(b'a')).to_string(), "$a");
        assert_eq!(Value::Char(0x2022).to_string(), "$\\u2022");
        assert_eq!(Value::Real(2.0).to_string(), "2.0");
        assert_eq!(Value::String(Rc::from("hi\"")).to_string(), "\"hi\\\"\"");
    }
}
