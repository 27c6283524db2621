//! The frequently-used function table. A call whose name and argument count
//! match an entry compiles to a single `freq-func` instruction.

pub struct FreqFunc {
    pub name: &'static str,
    pub arity: u16,
}

const fn entry(name: &'static str, arity: u16) -> FreqFunc {
    FreqFunc { name, arity }
}

pub const FREQ_FUNCS: [FreqFunc; 25] = [
    entry("+", 2),
    entry("-", 2),
    entry("aref", 2),
    entry("setAref", 3),
    entry("=", 2),
    entry("not", 1),
    entry("<>", 2),
    entry("*", 2),
    entry("/", 2),
    entry("div", 2),
    entry("<", 2),
    entry(">", 2),
    entry(">=", 2),
    entry("<=", 2),
    entry("BAnd", 2),
    entry("BOr", 2),
    entry("BNot", 1),
    entry("newIterator", 2),
    entry("Length", 1),
    entry("Clone", 1),
    entry("SetClass", 2),
    entry("AddArraySlot", 2),
    entry("Stringer", 1),
    entry("hasPath", 2),
    entry("ClassOf", 1),
];

// indexes used directly by the code generator
pub const FREQ_ADD: u16 = 0;
pub const FREQ_SUBTRACT: u16 = 1;
pub const FREQ_AREF: u16 = 2;
pub const FREQ_SET_AREF: u16 = 3;
pub const FREQ_EQUALS: u16 = 4;
pub const FREQ_NOT: u16 = 5;
pub const FREQ_NOT_EQUALS: u16 = 6;
pub const FREQ_MULTIPLY: u16 = 7;
pub const FREQ_DIVIDE: u16 = 8;
pub const FREQ_DIV: u16 = 9;
pub const FREQ_LESS: u16 = 10;
pub const FREQ_GREATER: u16 = 11;
pub const FREQ_GREATER_EQUAL: u16 = 12;
pub const FREQ_LESS_EQUAL: u16 = 13;
pub const FREQ_NEW_ITERATOR: u16 = 17;
pub const FREQ_LENGTH: u16 = 18;
pub const FREQ_STRINGER: u16 = 22;
pub const FREQ_HAS_PATH: u16 = 23;

/// Finds the table entry for a call of `name` with `arity` arguments.
/// Names compare case-insensitively, like symbols.
pub fn lookup(name: &str, arity: usize) -> Option<u16> {
    FREQ_FUNCS
        .iter()
        .position(|f| f.name.eq_ignore_ascii_case(name) && usize::from(f.arity) == arity)
        .map(|i| i as u16)
}

pub fn name_of(index: u16) -> Option<&'static str> {
    FREQ_FUNCS.get(usize::from(index)).map(|f| f.name)
}
