use crate::value::Value;

/// Immediate reference of `nil` in a `push-constant` operand.
pub const NIL_REF: u16 = 0x02;
/// Immediate reference of `true`.
pub const TRUE_REF: u16 = 0x1A;

const MIN_IMMEDIATE_INT: i32 = -8192;
const MAX_IMMEDIATE_INT: i32 = 8191;

/// The `push-constant` operand for `value`, if it has an immediate form.
pub fn constant_ref(value: &Value) -> Option<u16> {
    match value {
        Value::Nil => Some(NIL_REF),
        Value::True => Some(TRUE_REF),
        Value::Int(n) if (MIN_IMMEDIATE_INT..=MAX_IMMEDIATE_INT).contains(n) => Some(int_ref(*n)),
        Value::Char(c) if *c < 0x1000 => Some((*c << 4) | 6),
        _ => None,
    }
}

/// Tagged reference for a small integer: the value shifted left two bits.
pub fn int_ref(n: i32) -> u16 {
    ((n << 2) as i16) as u16
}

/// Inverse of [`constant_ref`], for the disassembler.
pub fn describe_constant(operand: u16) -> Value {
    match operand {
        NIL_REF => Value::Nil,
        TRUE_REF => Value::True,
        r if r & 0xF == 6 => Value::Char(r >> 4),
        r if r & 3 == 0 => Value::Int(i32::from(r as i16) >> 2),
        r => Value::MagicPointer(i32::from(r)),
    }
}

/// Ordered, de-duplicated literals of one function.
#[derive(Debug, Default)]
pub struct LiteralPool {
    values: Vec<Value>,
}

impl LiteralPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the index of `value`, appending it when not present yet.
    pub fn add(&mut self, value: Value) -> usize {
        if let Some(index) = self.index_of(&value) {
            return index;
        }
        self.values.push(value);
        self.values.len() - 1
    }

    pub fn index_of(&self, value: &Value) -> Option<usize> {
        self.values.iter().position(|v| v.same_literal(value))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Final pool, `None` when no literal was ever added.
    pub fn finish(mut self) -> Option<Vec<Value>> {
        if self.values.is_empty() {
            None
        } else {
            self.values.shrink_to_fit();
            Some(self.values)
        }
    }
}
