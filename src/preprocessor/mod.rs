//! The Preprocessor module expands macros in assembly source,
//! producing plain instruction text for the assembler proper.
//!
//! It works in two passes with a hard barrier between them. Pass 1
//! ([`definition`]) scans every macro definition into the tables in
//! [`tables`]. Only once those are complete does pass 2 ([`expansion`])
//! walk the remaining lines and replace each macro call with its
//! substituted body. A call must follow the definition of the macro it
//! names, but bodies may call macros defined further down.

pub mod definition;
pub mod error;
pub mod expansion;
pub mod lexer;
pub mod printer;
pub mod tables;

use self::definition::TableBuilder;
use self::error::Error;
use self::expansion::{Expander, Expansion};
use self::lexer::SourceLine;
use self::tables::MacroTables;

/// Default bound on nested macro calls.
pub const DEFAULT_MAX_DEPTH: usize = 25;

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Config {
    /// Deepest allowed nesting of macro calls; a top-level call is depth 1.
    pub max_depth:    usize,
    pub begin_marker: String,
    pub end_marker:   String,
    pub local_marker: String,
    /// Marks internal labels in a macro body, e.g. `.LOOP`.
    pub label_prefix: char,
    /// Conventional prefix of parameter and local names, e.g. `&REG`.
    pub param_prefix: char,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            max_depth:    DEFAULT_MAX_DEPTH,
            begin_marker: "MACRO".to_owned(),
            end_marker:   "MEND".to_owned(),
            local_marker: "LCL".to_owned(),
            label_prefix: '.',
            param_prefix: '&',
        }
    }
}

/// Everything both passes produced.
#[derive(Debug)]
pub struct Preprocessed {
    pub tables:    MacroTables,
    pub expansion: Expansion,
}

/// Runs both passes over `lines`.
///
/// Definition errors are returned as `Err` and stop before pass 2.
/// Expansion errors are collected in [`Expansion::errors`] next to the
/// output of every call that did expand.
pub fn preprocess(lines: Vec<SourceLine>, config: &Config) -> Result<Preprocessed, Vec<Error>> {
    let definitions = TableBuilder::new(config).run(lines)?;
    let expansion = Expander::new(&definitions.tables, config).run(&definitions.source);

    Ok(Preprocessed { tables: definitions.tables, expansion })
}
