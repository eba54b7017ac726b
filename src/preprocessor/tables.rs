//! The macro tables produced by pass 1.
//!
//! Every table is a flat, append-only vector. A [`MacroDefinition`] owns
//! one index range into each of them, so the tables of different macros
//! never interleave:
//!
//! ```text
//! MNT     name, ranges ──┬──> PNTAB   parameter names (positional order)
//!                        ├──> KPDTAB  keyword name, default, slot
//!                        ├──> EVNTAB  expansion (local) variable names
//!                        ├──> SSNTAB  internal label names
//!                        ├──> SSTAB   internal label, template index
//!                        └──> MDT     template lines
//! ```
use std::collections::HashMap;
use std::fmt;
use std::ops::Range;

/// One classified token of a template line.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum TemplateToken {
    /// Index of a formal parameter, bound to an argument per call.
    Positional(usize),
    /// Index of an expansion variable, bound to a generated label per call.
    Local(usize),
    /// Index of an internal label reference, bound to a generated label per call.
    Symbol(usize),
    Text(String),
}

impl fmt::Display for TemplateToken {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use TemplateToken::*;
        match self {
            Positional(i) => write!(f, "(P,{})", i + 1),
            Local(i)      => write!(f, "(E,{})", i + 1),
            Symbol(i)     => write!(f, "(S,{})", i + 1),
            Text(s)       => write!(f, "{}", s),
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum LineKind {
    Instruction,
    /// The rewritten local declaration. Listed, never emitted.
    LocalDeclaration,
}

/// A macro body line with its parameters and locals replaced by markers.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct TemplateLine {
    pub kind:     LineKind,
    pub label:    Option<TemplateToken>,
    pub primary:  Option<TemplateToken>,
    pub operands: Vec<TemplateToken>,
}

impl fmt::Display for TemplateLine {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut sep = "";
        if let Some(label) = &self.label {
            write!(f, "{}:", label)?;
            sep = " ";
        }
        if let Some(primary) = &self.primary {
            write!(f, "{}{}", sep, primary)?;
            sep = " ";
        }
        for (i, operand) in self.operands.iter().enumerate() {
            write!(f, "{}{}", if i == 0 { sep } else { ", " }, operand)?;
        }
        Ok(())
    }
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct KeywordParameter {
    pub name:     String,
    pub default:  String,
    /// Slot of this keyword within its macro's parameter list.
    pub position: usize,
}

impl fmt::Display for KeywordParameter {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} = {}", self.name, self.default)
    }
}

/// An internal label definition and the template line it labels.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct SymbolSubstitution {
    pub name:     String,
    /// Index into the owning macro's SSNTAB slice.
    pub symbol:   usize,
    /// Absolute index into the MDT.
    pub location: usize,
}

impl fmt::Display for SymbolSubstitution {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.location)
    }
}

/// A Macro Name Table entry.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct MacroDefinition {
    pub name:          String,
    pub parameters:    Range<usize>,
    pub keywords:      Range<usize>,
    pub locals:        Range<usize>,
    pub symbols:       Range<usize>,
    pub substitutions: Range<usize>,
    pub template:      Range<usize>,
    /// Line of the begin marker.
    pub line:          usize,
    /// Line of the end marker. Top-level calls must come after it.
    pub end_line:      usize,
}

impl MacroDefinition {
    pub fn positional_count(&self) -> usize {
        self.parameters.len()
    }

    pub fn keyword_count(&self) -> usize {
        self.keywords.len()
    }

    pub fn local_count(&self) -> usize {
        self.locals.len()
    }
}

impl fmt::Display for MacroDefinition {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Name={}, PosParams={}, KeyParams={}, ExpVars={}, MDT=[{}, {}), KPDTAB Ptr={}, SSTAB Ptr={}",
            self.name,
            self.positional_count(),
            self.keyword_count(),
            self.local_count(),
            self.template.start,
            self.template.end,
            self.keywords.start,
            self.substitutions.start,
        )
    }
}

/// All tables built by pass 1. Frozen once pass 1 returns.
#[derive(Clone, Debug, Default)]
pub struct MacroTables {
    pub(super) macros:        Vec<MacroDefinition>,
    pub(super) index:         HashMap<String, usize>,
    pub(super) parameters:    Vec<String>,
    pub(super) keywords:      Vec<KeywordParameter>,
    pub(super) locals:        Vec<String>,
    pub(super) symbols:       Vec<String>,
    pub(super) substitutions: Vec<SymbolSubstitution>,
    pub(super) templates:     Vec<TemplateLine>,
}

impl MacroTables {
    /// Finds a macro by its exact name.
    pub fn lookup(&self, name: &str) -> Option<&MacroDefinition> {
        self.index.get(name).map(|&i| &self.macros[i])
    }

    pub fn is_empty(&self) -> bool {
        self.macros.is_empty()
    }

    /// The Macro Name Table, in definition order.
    pub fn macros(&self) -> &[MacroDefinition] {
        &self.macros
    }

    pub fn keyword_table(&self) -> &[KeywordParameter] {
        &self.keywords
    }

    pub fn substitution_table(&self) -> &[SymbolSubstitution] {
        &self.substitutions
    }

    /// The Instruction Template Table shared by all macros.
    pub fn template_table(&self) -> &[TemplateLine] {
        &self.templates
    }

    pub fn parameters_of(&self, def: &MacroDefinition) -> &[String] {
        &self.parameters[def.parameters.clone()]
    }

    pub fn keywords_of(&self, def: &MacroDefinition) -> &[KeywordParameter] {
        &self.keywords[def.keywords.clone()]
    }

    pub fn locals_of(&self, def: &MacroDefinition) -> &[String] {
        &self.locals[def.locals.clone()]
    }

    pub fn symbols_of(&self, def: &MacroDefinition) -> &[String] {
        &self.symbols[def.symbols.clone()]
    }

    pub fn substitutions_of(&self, def: &MacroDefinition) -> &[SymbolSubstitution] {
        &self.substitutions[def.substitutions.clone()]
    }

    pub fn template_of(&self, def: &MacroDefinition) -> &[TemplateLine] {
        &self.templates[def.template.clone()]
    }
}
