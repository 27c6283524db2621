// src/diagnostics/codes.rs

use crate::diagnostics::DiagnosticLevel;

/// A diagnostic code with its fixed number, level and default text.
/// This table is the single source of truth for everything the compiler reports.
#[derive(Debug)]
pub struct ErrorCode {
    pub number: u16,
    pub code: &'static str,
    pub level: DiagnosticLevel,
    pub message: &'static str,
    pub explanation: &'static str,
}

impl PartialEq for ErrorCode {
    fn eq(&self, other: &Self) -> bool {
        self.number == other.number
    }
}

/*
1xxx: lexical errors
2xxx: syntax errors
3xxx: declaration errors
4xxx: code generation errors
5xxx: warnings
*/

// --- 1xxx: Lexical Errors ---

pub const E1001_UNRECOGNIZED_CHAR: ErrorCode = ErrorCode {
    number: 1001,
    code: "E1001",
    level: DiagnosticLevel::Error,
    message: "Unrecognized character",
    explanation: "The character cannot start any token of the language.",
};

pub const E1002_UNTERMINATED_STRING: ErrorCode = ErrorCode {
    number: 1002,
    code: "E1002",
    level: DiagnosticLevel::Error,
    message: "Unterminated string literal",
    explanation: "The input ended before the closing double quote of a string.",
};

pub const E1003_UNTERMINATED_SYMBOL: ErrorCode = ErrorCode {
    number: 1003,
    code: "E1003",
    level: DiagnosticLevel::Error,
    message: "Unterminated symbol",
    explanation: "A symbol opened with `|` was never closed by a second `|`.",
};

pub const E1004_BAD_HEX_DIGITS: ErrorCode = ErrorCode {
    number: 1004,
    code: "E1004",
    level: DiagnosticLevel::Error,
    message: "Wrong number of hex digits in escape",
    explanation: "`$\\xx` takes exactly two hex digits. `\\u` escapes take groups of exactly four \
                  hex digits and a string's `\\u` run must be closed by another `\\u`.",
};

pub const E1005_INT_OUT_OF_RANGE: ErrorCode = ErrorCode {
    number: 1005,
    code: "E1005",
    level: DiagnosticLevel::Error,
    message: "Integer literal out of range",
    explanation: "Integers are 30-bit immediates: -536870912 to 536870911.",
};

pub const E1006_UNTERMINATED_COMMENT: ErrorCode = ErrorCode {
    number: 1006,
    code: "E1006",
    level: DiagnosticLevel::Error,
    message: "Unterminated block comment",
    explanation: "A `/*` comment was never closed by `*/`.",
};

pub const E1007_BAD_CHAR_LITERAL: ErrorCode = ErrorCode {
    number: 1007,
    code: "E1007",
    level: DiagnosticLevel::Error,
    message: "Malformed character literal",
    explanation: "`$` must be followed by a character or one of the escapes `\\n`, `\\t`, `\\\\`, \
                  `\\xx` or `\\uXXXX`.",
};

pub const E1008_BAD_NUMBER: ErrorCode = ErrorCode {
    number: 1008,
    code: "E1008",
    level: DiagnosticLevel::Error,
    message: "Malformed number",
    explanation: "Hex numbers need at least one digit after `0x`, exponents need at least one \
                  digit, and `@` must be followed by a decimal number.",
};

pub const E1009_UNKNOWN_ESCAPE: ErrorCode = ErrorCode {
    number: 1009,
    code: "E1009",
    level: DiagnosticLevel::Error,
    message: "Unknown escape sequence",
    explanation: "Strings accept `\\n`, `\\t`, `\\\\`, `\\\"` and `\\u` runs.",
};

// --- 2xxx: Syntax Errors ---

pub const E2001_SYNTAX_ERROR: ErrorCode = ErrorCode {
    number: 2001,
    code: "E2001",
    level: DiagnosticLevel::Error,
    message: "Syntax error",
    explanation: "The token cannot appear here. The message lists every token the parser \
                  would have accepted at this point.",
};

// --- 3xxx: Declaration Errors ---

pub const E3001_LOCAL_CONSTANT_CLASH: ErrorCode = ErrorCode {
    number: 3001,
    code: "E3001",
    level: DiagnosticLevel::Error,
    message: "Name is declared both as a local and as a constant",
    explanation: "Within one function a name is either a local variable or a local constant.",
};

pub const E3002_CONSTANT_GLOBAL_CLASH: ErrorCode = ErrorCode {
    number: 3002,
    code: "E3002",
    level: DiagnosticLevel::Error,
    message: "Constant has the same name as a global",
    explanation: "A top-level constant would hide a global variable or function of the same name.",
};

pub const E3003_NON_LITERAL_CONSTANT: ErrorCode = ErrorCode {
    number: 3003,
    code: "E3003",
    level: DiagnosticLevel::Error,
    message: "Constant initializer is not a literal",
    explanation: "A constant must be initialized with a literal, another constant, or the \
                  negation of one of those.",
};

// --- 4xxx: Code Generation Errors ---

pub const E4001_BAD_PATH: ErrorCode = ErrorCode {
    number: 4001,
    code: "E4001",
    level: DiagnosticLevel::Error,
    message: "Malformed path expression",
    explanation: "Only variables, slot paths and array elements can be assigned or tested \
                  with `exists`.",
};

pub const E4002_ASSIGN_TO_CONSTANT: ErrorCode = ErrorCode {
    number: 4002,
    code: "E4002",
    level: DiagnosticLevel::Error,
    message: "Assignment to a constant",
    explanation: "Constants are bound at compile time and cannot be assigned.",
};

pub const E4003_BREAK_OUTSIDE_LOOP: ErrorCode = ErrorCode {
    number: 4003,
    code: "E4003",
    level: DiagnosticLevel::Error,
    message: "`break` outside of a loop",
    explanation: "`break` must appear inside the body of a loop of the same function.",
};

pub const E4004_CAPTURED_LOOP_INDEX: ErrorCode = ErrorCode {
    number: 4004,
    code: "E4004",
    level: DiagnosticLevel::Error,
    message: "Closing over a `for` loop index",
    explanation: "`for` indices live on the stack and cannot be captured by a nested function. \
                  Declare the variable with `local` first if a closure needs it.",
};

pub const E4005_CODE_TOO_LARGE: ErrorCode = ErrorCode {
    number: 4005,
    code: "E4005",
    level: DiagnosticLevel::Error,
    message: "Function too large",
    explanation: "Branch targets and literal indices are 16-bit operands.",
};

pub const E4006_UNDECLARED_FUNCTION: ErrorCode = ErrorCode {
    number: 4006,
    code: "E4006",
    level: DiagnosticLevel::Error,
    message: "Function literal was never declared",
    explanation: "Code generation met a function literal the declaration pass did not see. \
                  The passes must run over the same syntax tree.",
};

// --- 5xxx: Warnings ---

pub const W5001_DUPLICATE_NAME: ErrorCode = ErrorCode {
    number: 5001,
    code: "W5001",
    level: DiagnosticLevel::Warning,
    message: "Duplicate argument or local name",
    explanation: "The name is already declared in this function; both refer to the same slot.",
};

pub const W5002_UNUSED_VALUE: ErrorCode = ErrorCode {
    number: 5002,
    code: "W5002",
    level: DiagnosticLevel::Warning,
    message: "Value of expression is not used",
    explanation: "The expression has no side effects and its result is discarded.",
};

pub const W5003_STANDALONE_EQUALS: ErrorCode = ErrorCode {
    number: 5003,
    code: "W5003",
    level: DiagnosticLevel::Warning,
    message: "Stand-alone `=` comparison",
    explanation: "`=` compares; to assign use `:=`.",
};
