//! src/config.rs

use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;

/// Binary layout of call-frame templates and the argument-count word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum CompatMode {
    /// Template only when the function needs one; `numArgs = locals << 16 | args`.
    #[default]
    Native,
    /// Every function carries a template; `numArgs` is the argument count.
    #[value(name = "newton20")]
    Newton20,
}

impl FromStr for CompatMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "native" => Ok(CompatMode::Native),
            "newton20" | "newton2.0" | "2.0" => Ok(CompatMode::Newton20),
            other => Err(format!("unknown compatibility mode `{}`", other)),
        }
    }
}

impl fmt::Display for CompatMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompatMode::Native => f.write_str("native"),
            CompatMode::Newton20 => f.write_str("newton20"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CompilerOptions {
    pub compat: CompatMode,
    /// Attach function/argument/local names to every code block.
    pub debug_names: bool,
    /// Stop after the first top-level command.
    pub first_command_only: bool,
    pub warnings: bool,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            compat: CompatMode::Native,
            debug_names: false,
            first_command_only: false,
            warnings: true,
        }
    }
}

impl CompilerOptions {
    pub fn with_compat(mut self, compat: CompatMode) -> Self {
        self.compat = compat;
        self
    }

    pub fn with_debug_names(mut self, on: bool) -> Self {
        self.debug_names = on;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_mode_names() {
        assert_eq!("Native".parse::<CompatMode>(), Ok(CompatMode::Native));
        assert_eq!("newton20".parse::<CompatMode>(), Ok(CompatMode::Newton20));
        assert!("v3".parse::<CompatMode>().is_err());
        assert_eq!(CompilerOptions::default().compat, CompatMode::Native);
    }
}
