//! Errors raised while building the macro tables or expanding calls.
//!
//! Definition errors are collected for the whole of pass 1; when any are
//! present the tables are discarded and nothing is expanded. Expansion
//! errors abort only the top-level call they were raised under.
use thiserror::Error;

use super::lexer::SourceLine;

/// An error located at the source line that caused it. For errors raised
/// inside a nested expansion this is the top-level call line.
#[derive(Clone, PartialEq, Eq, Debug, Error)]
#[error("line {}: {} (`{}`)", .line.number, .kind, .line.text.trim())]
pub struct Error {
    pub line: SourceLine,
    pub kind: ErrorKind,
}

impl Error {
    pub fn new(line: SourceLine, kind: ErrorKind) -> Self {
        Error { line, kind }
    }
}

#[derive(Clone, PartialEq, Eq, Debug, Error)]
pub enum ErrorKind {
    #[error("macro `{name}` is already defined")]
    DuplicateMacroDefinition { name: String },

    #[error("parameter `{parameter}` is declared more than once in macro `{macro_name}`")]
    DuplicateParameterName { macro_name: String, parameter: String },

    #[error("expansion variable `{variable}` clashes with an earlier declaration in macro `{macro_name}`")]
    DuplicateExpansionVariable { macro_name: String, variable: String },

    #[error("internal label `{label}` is defined more than once in macro `{macro_name}`")]
    DuplicateInternalLabel { macro_name: String, label: String },

    #[error("expected a macro header but found no macro name")]
    MissingMacroName,

    #[error("macro definitions may not be nested (inside `{macro_name}`)")]
    NestedMacroDefinition { macro_name: String },

    #[error("macro end marker outside of a macro definition")]
    UnexpectedMacroEnd,

    #[error("macro `{macro_name}` is never terminated")]
    UnterminatedMacroDefinition { macro_name: String },

    #[error("`{reference}` is neither a parameter, a declared expansion variable nor a defined label of macro `{macro_name}`")]
    UnknownLocalVariableReference { macro_name: String, reference: String },

    #[error("macro `{macro_name}` expects {expected} argument(s) but {found} were supplied")]
    ArgumentCountMismatch { macro_name: String, expected: usize, found: usize },

    #[error("parameter `{parameter}` of macro `{macro_name}` is bound more than once")]
    ConflictingArgument { macro_name: String, parameter: String },

    #[error("expansion of macro `{macro_name}` exceeds the maximum nesting depth of {limit} (recursive macro?)")]
    RecursionDepthExceeded { macro_name: String, limit: usize },
}
