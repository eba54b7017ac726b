//! Pass 2: replaces macro calls with their substituted bodies.
//!
//! Each call gets an [`ExpansionBinding`]: its arguments in parameter
//! order, plus one freshly generated label per expansion variable and per
//! internal label. Substituted lines that are themselves macro calls are
//! expanded in place, one level deeper, up to [`Config::max_depth`].
use std::fmt;

use super::Config;
use super::error::{Error, ErrorKind};
use super::lexer::{self, Line, SourceLine};
use super::tables::*;

/// An Actual Parameter Table entry: one expansion instance.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct ActualParameters {
    pub macro_name: String,
    /// Line of the top-level call this instance belongs to.
    pub line:       usize,
    /// 1 for a top-level call.
    pub depth:      usize,
    pub arguments:  Vec<String>,
    pub labels:     Vec<String>,
}

impl fmt::Display for ActualParameters {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} ({})", self.macro_name, self.arguments.join(", "))?;
        if !self.labels.is_empty() {
            write!(f, " [{}]", self.labels.join(", "))?;
        }
        Ok(())
    }
}

/// The output of pass 2.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct Expansion {
    /// The expanded instruction stream, one instruction per line.
    pub lines:  Vec<String>,
    pub calls:  Vec<ActualParameters>,
    pub errors: Vec<Error>,
}

/// Values bound to the markers of one macro for one call.
#[derive(Clone, PartialEq, Eq, Debug)]
struct ExpansionBinding {
    arguments: Vec<String>,
    locals:    Vec<String>,
    symbols:   Vec<String>,
}

impl ExpansionBinding {
    fn resolve(&self, token: &TemplateToken) -> String {
        use TemplateToken::*;
        match token {
            Positional(i) => self.arguments[*i].clone(),
            Local(j)      => self.locals[*j].clone(),
            Symbol(k)     => self.symbols[*k].clone(),
            Text(s)       => s.clone(),
        }
    }

    /// Tokens bound to an empty argument are dropped from the line.
    fn substitute(&self, template: &TemplateLine) -> Line {
        let resolve = |t: &TemplateToken| Some(self.resolve(t)).filter(|s| !s.is_empty());
        Line {
            label:    template.label.as_ref().and_then(resolve),
            primary:  template.primary.as_ref().and_then(resolve),
            operands: template.operands.iter().filter_map(resolve).collect(),
        }
    }
}

pub struct Expander<'t> {
    tables:  &'t MacroTables,
    config:  &'t Config,
    /// Source of every generated label; never reset.
    counter: usize,
    calls:   Vec<ActualParameters>,
}

impl<'t> Expander<'t> {
    pub fn new(tables: &'t MacroTables, config: &'t Config) -> Self {
        Expander { tables, config, counter: 0, calls: Vec::new() }
    }

    /// Expands every line in order, consuming the expander.
    ///
    /// Lines that do not call a macro are emitted byte for byte. A call
    /// that fails emits nothing and is reported; expansion carries on with
    /// the next line.
    pub fn run(mut self, source: &[SourceLine]) -> Expansion {
        let tables = self.tables;
        let mut lines = Vec::with_capacity(source.len());
        let mut errors = Vec::new();

        for src in source {
            let line = lexer::tokenize_line(&src.text);
            // A macro is only callable once its definition is complete.
            let def = match line.primary.as_deref().and_then(|p| tables.lookup(p)) {
                Some(def) if src.number > def.end_line => def,
                _ => {
                    lines.push(src.text.clone());
                    continue;
                }
            };

            let mut out = Vec::new();
            let mark = self.calls.len();
            match self.expand(def, &line, src.number, 1, &mut out) {
                Ok(()) => lines.append(&mut out),
                Err(kind) => {
                    self.calls.truncate(mark);
                    let err = Error::new(src.clone(), kind);
                    error!("{}", err);
                    errors.push(err);
                }
            }
        }

        info!("Expanded {} macro call(s) into {} line(s), {} error(s).",
            self.calls.len(), lines.len(), errors.len());
        Expansion { lines, calls: self.calls, errors }
    }

    /// Expands one call of `def`, appending the produced lines to `out`.
    fn expand(&mut self, def: &'t MacroDefinition, call: &Line, line: usize, depth: usize, out: &mut Vec<String>) -> Result<(), ErrorKind> {
        if depth > self.config.max_depth {
            return Err(ErrorKind::RecursionDepthExceeded {
                macro_name: def.name.clone(),
                limit: self.config.max_depth,
            });
        }

        let tables = self.tables;
        let binding = self.bind(def, call)?;
        trace!("{}{} on line {}: {:?}", "  ".repeat(depth - 1), def.name, line, binding);
        self.calls.push(ActualParameters {
            macro_name: def.name.clone(),
            line,
            depth,
            arguments: binding.arguments.clone(),
            labels: binding.locals.iter().chain(&binding.symbols).cloned().collect(),
        });

        if let Some(label) = &call.label {
            out.push(format!("{}:", label));
        }

        let substitutions = tables.substitutions_of(def);
        for (offset, template) in tables.template_of(def).iter().enumerate() {
            if template.kind == LineKind::LocalDeclaration {
                continue;
            }

            let mut line_out = binding.substitute(template);
            let location = def.template.start + offset;
            if let Some(sst) = substitutions.iter().find(|s| s.location == location) {
                let label = binding.symbols[sst.symbol].clone();
                if line_out.label.is_some() {
                    out.push(format!("{}:", label));
                } else {
                    line_out.label = Some(label);
                }
            }

            match line_out.primary.as_deref().and_then(|p| tables.lookup(p)) {
                Some(inner) => self.expand(inner, &line_out, line, depth + 1, out)?,
                None => out.push(line_out.to_string()),
            }
        }

        debug!("Expanded {} (defined on line {}) at depth {} for line {}.", def.name, def.line, depth, line);
        Ok(())
    }

    /// Binds call arguments to parameter slots and mints fresh labels.
    ///
    /// Arguments fill slots left to right, skipping any slot already bound
    /// by keyword. `name=value` binds a keyword parameter by name. Unbound
    /// keyword slots take their default.
    fn bind(&mut self, def: &MacroDefinition, call: &Line) -> Result<ExpansionBinding, ErrorKind> {
        let tables = self.tables;
        let parameters = tables.parameters_of(def);
        let keywords = tables.keywords_of(def);
        let mut slots: Vec<Option<String>> = vec![None; parameters.len()];
        let mut next = 0;

        for argument in &call.operands {
            if let Some((keyword, value)) = self.keyword_argument(keywords, argument) {
                let slot = &mut slots[keyword.position];
                if slot.is_some() {
                    return Err(ErrorKind::ConflictingArgument {
                        macro_name: def.name.clone(),
                        parameter: keyword.name.clone(),
                    });
                }
                *slot = Some(value.to_owned());
                continue;
            }

            while next < slots.len() && slots[next].is_some() {
                next += 1;
            }
            if next == slots.len() {
                return Err(ErrorKind::ArgumentCountMismatch {
                    macro_name: def.name.clone(),
                    expected: parameters.len(),
                    found: call.operands.len(),
                });
            }
            slots[next] = Some(argument.clone());
            next += 1;
        }

        for keyword in keywords {
            slots[keyword.position].get_or_insert_with(|| keyword.default.clone());
        }

        let arguments = match slots.into_iter().collect::<Option<Vec<_>>>() {
            Some(arguments) => arguments,
            None => return Err(ErrorKind::ArgumentCountMismatch {
                macro_name: def.name.clone(),
                expected: parameters.len() - keywords.len(),
                found: call.operands.len(),
            }),
        };

        let locals = tables.locals_of(def).iter().map(|v| self.fresh_label(&def.name, v)).collect();
        let symbols = tables.symbols_of(def).iter().map(|s| self.fresh_label(&def.name, s)).collect();

        Ok(ExpansionBinding { arguments, locals, symbols })
    }

    /// Splits `name=value` when `name` is one of `keywords`.
    fn keyword_argument<'a, 'k>(&self, keywords: &'k [KeywordParameter], argument: &'a str) -> Option<(&'k KeywordParameter, &'a str)> {
        let (name, value) = argument.split_once('=')?;
        let prefix = self.config.param_prefix;
        keywords.iter()
            .find(|k| k.name.trim_start_matches(prefix) == name.trim_start_matches(prefix))
            .map(|k| (k, value))
    }

    /// `<MACRO>_<name>_<n>`, unique across every expansion instance.
    fn fresh_label(&mut self, macro_name: &str, name: &str) -> String {
        self.counter += 1;
        let config = self.config;
        let name = name.trim_start_matches(|c: char| c == config.param_prefix || c == config.label_prefix);
        format!("{}_{}_{}", macro_name, name, self.counter)
    }
}
