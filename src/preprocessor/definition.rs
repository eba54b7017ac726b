//! Pass 1: scans macro definitions into the macro tables.
//!
//! The builder is a three-state machine driven one source line at a time:
//!
//! ```text
//!            MACRO              header             MEND
//! OUTSIDE ─────────> HEADER ─────────> IN_BODY ─────────> OUTSIDE
//!    │     MACRO name params ─────────────^
//!    └── any other line is kept for pass 2
//! ```
//!
//! Errors are recorded against the offending line and scanning carries on,
//! except for a definition left open at the end of the input.
use std::mem;

use super::Config;
use super::error::{Error, ErrorKind};
use super::lexer::{self, Line, SourceLine};
use super::tables::*;

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
enum State {
    Outside,
    HeaderExpected,
    InBody,
}

/// An internal label seen while scanning one macro body.
struct PendingSymbol {
    name:      String,
    defined:   bool,
    first_use: SourceLine,
}

/// Buffers for the macro currently being defined.
struct Pending {
    name:           String,
    begin:          SourceLine,
    parameters:     Vec<String>,
    keywords:       Vec<KeywordParameter>,
    locals:         Vec<String>,
    symbols:        Vec<PendingSymbol>,
    substitutions:  Vec<SymbolSubstitution>,
    template_start: usize,
    /// Set when the definition is invalid and must not be committed.
    discard:        bool,
}

impl Pending {
    fn new(begin: SourceLine, template_start: usize) -> Self {
        Pending {
            name: String::new(),
            begin,
            parameters: Vec::new(),
            keywords: Vec::new(),
            locals: Vec::new(),
            symbols: Vec::new(),
            substitutions: Vec::new(),
            template_start,
            discard: false,
        }
    }

    fn symbol_index(&mut self, name: &str, line: &SourceLine) -> usize {
        match self.symbols.iter().position(|s| s.name == name) {
            Some(k) => k,
            None => {
                self.symbols.push(PendingSymbol { name: name.to_owned(), defined: false, first_use: line.clone() });
                self.symbols.len() - 1
            }
        }
    }
}

/// The output of pass 1: frozen tables plus every line outside a definition.
#[derive(Debug)]
pub struct Definitions {
    pub tables: MacroTables,
    pub source: Vec<SourceLine>,
}

pub struct TableBuilder<'c> {
    config:  &'c Config,
    state:   State,
    pending: Option<Pending>,
    tables:  MacroTables,
    source:  Vec<SourceLine>,
    errors:  Vec<Error>,
}

impl<'c> TableBuilder<'c> {
    pub fn new(config: &'c Config) -> Self {
        TableBuilder {
            config,
            state: State::Outside,
            pending: None,
            tables: MacroTables::default(),
            source: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Run pass 1 over the whole input, consuming the builder.
    pub fn run(mut self, lines: Vec<SourceLine>) -> Result<Definitions, Vec<Error>> {
        for src in lines {
            self.line(src);
        }

        if self.state != State::Outside {
            if let Some(pending) = self.pending.take() {
                let macro_name = if pending.name.is_empty() { "?".to_owned() } else { pending.name };
                let err = Error::new(pending.begin, ErrorKind::UnterminatedMacroDefinition { macro_name });
                error!("fatal: {}", err);
                self.errors.push(err);
            }
        }

        if !self.errors.is_empty() {
            error!("Stopped preprocessing due to {} definition error(s).", self.errors.len());
            return Err(self.errors);
        }

        info!("Defined {} macro(s) with {} template line(s).",
            self.tables.macros.len(), self.tables.templates.len());
        Ok(Definitions { tables: self.tables, source: self.source })
    }

    fn line(&mut self, src: SourceLine) {
        let line = lexer::tokenize_line(&src.text);
        let config = self.config;
        let is = |marker: &str| line.primary.as_deref().map_or(false, |p| p.eq_ignore_ascii_case(marker));

        match self.state {
            State::Outside if is(config.begin_marker.as_str()) => {
                let mut pending = Pending::new(src.clone(), self.tables.templates.len());
                if line.operands.is_empty() {
                    self.pending = Some(pending);
                    self.state = State::HeaderExpected;
                } else {
                    // Header on the same line as the begin marker.
                    let mut operands = line.operands.into_iter();
                    let header = Line { label: None, primary: operands.next(), operands: operands.collect() };
                    self.header(&src, header, &mut pending);
                    self.pending = Some(pending);
                    self.state = State::InBody;
                }
            }
            State::Outside if is(config.end_marker.as_str()) => {
                self.report(src, ErrorKind::UnexpectedMacroEnd);
            }
            State::Outside => self.source.push(src),

            State::HeaderExpected | State::InBody if is(config.begin_marker.as_str()) => {
                let macro_name = self.pending.as_ref().map(|p| p.name.clone()).unwrap_or_default();
                self.report(src, ErrorKind::NestedMacroDefinition { macro_name });
            }
            State::HeaderExpected if is(config.end_marker.as_str()) => {
                self.pending = None;
                self.state = State::Outside;
                self.report(src, ErrorKind::MissingMacroName);
            }
            State::HeaderExpected => {
                if line.is_empty() {
                    return;
                }
                if let Some(mut pending) = self.pending.take() {
                    self.header(&src, line, &mut pending);
                    self.pending = Some(pending);
                }
                self.state = State::InBody;
            }

            State::InBody if is(config.end_marker.as_str()) => {
                if let Some(pending) = self.pending.take() {
                    self.commit(pending, &src);
                }
                self.state = State::Outside;
            }
            State::InBody if line.is_empty() => {}
            State::InBody => {
                if let Some(mut pending) = self.pending.take() {
                    if is(config.local_marker.as_str()) {
                        self.local_declaration(&src, line, &mut pending);
                    } else {
                        self.body_line(&src, line, &mut pending);
                    }
                    self.pending = Some(pending);
                }
            }
        }
    }

    /// Parses `NAME param [param...]`, where a `name=default` param is a keyword.
    fn header(&mut self, src: &SourceLine, header: Line, pending: &mut Pending) {
        let name = match header.primary {
            Some(name) => name,
            None => {
                pending.discard = true;
                self.report(src.clone(), ErrorKind::MissingMacroName);
                return;
            }
        };

        if self.tables.index.contains_key(&name) {
            pending.discard = true;
            self.report(src.clone(), ErrorKind::DuplicateMacroDefinition { name: name.clone() });
        }
        pending.name = name;

        for token in header.operands {
            let (param, default) = match token.split_once('=') {
                Some((param, default)) if !param.is_empty() => (param.to_owned(), Some(default.to_owned())),
                _ => (token.clone(), None),
            };

            if pending.parameters.contains(&param) {
                pending.discard = true;
                self.report(src.clone(), ErrorKind::DuplicateParameterName {
                    macro_name: pending.name.clone(),
                    parameter: param,
                });
                continue;
            }

            if let Some(default) = default {
                pending.keywords.push(KeywordParameter {
                    name: param.clone(),
                    default,
                    position: pending.parameters.len(),
                });
            }
            pending.parameters.push(param);
        }
    }

    /// Declares expansion variables and lists the rewritten declaration.
    fn local_declaration(&mut self, src: &SourceLine, line: Line, pending: &mut Pending) {
        let mut operands = Vec::with_capacity(line.operands.len());

        for variable in line.operands {
            if pending.locals.contains(&variable) || pending.parameters.contains(&variable) {
                pending.discard = true;
                self.report(src.clone(), ErrorKind::DuplicateExpansionVariable {
                    macro_name: pending.name.clone(),
                    variable,
                });
                continue;
            }
            operands.push(TemplateToken::Local(pending.locals.len()));
            pending.locals.push(variable);
        }

        self.tables.templates.push(TemplateLine {
            kind: LineKind::LocalDeclaration,
            label: None,
            primary: line.primary.map(TemplateToken::Text),
            operands,
        });
    }

    fn body_line(&mut self, src: &SourceLine, line: Line, pending: &mut Pending) {
        let Line { mut label, mut primary, operands } = line;
        let location = self.tables.templates.len();
        let prefix = self.config.label_prefix;

        // An internal label is written either as `.NAME:` or as a bare
        // leading `.NAME` token.
        let mut symbol = None;
        if label.as_deref().map_or(false, |l| l.starts_with(prefix) && l.len() > prefix.len_utf8()) {
            symbol = label.take();
        } else if label.is_none() && primary.as_deref().map_or(false, |p| p.starts_with(prefix) && p.len() > prefix.len_utf8()) {
            symbol = primary.take();
        }
        let mut operands = operands.into_iter();
        if symbol.is_some() && primary.is_none() && label.is_none() {
            primary = operands.next();
        }

        if let Some(symbol) = symbol {
            let name = symbol[prefix.len_utf8()..].to_owned();
            let k = pending.symbol_index(&name, src);
            if pending.symbols[k].defined {
                pending.discard = true;
                self.report(src.clone(), ErrorKind::DuplicateInternalLabel {
                    macro_name: pending.name.clone(),
                    label: name,
                });
            } else {
                pending.symbols[k].defined = true;
                pending.substitutions.push(SymbolSubstitution { name, symbol: k, location });
            }
        }

        let label = label.map(|t| self.classify(src, &t, pending));
        let primary = primary.map(|t| self.classify(src, &t, pending));
        let operands = operands.map(|t| self.classify(src, &t, pending)).collect();

        self.tables.templates.push(TemplateLine { kind: LineKind::Instruction, label, primary, operands });
    }

    /// Classifies one body token into its template form.
    fn classify(&mut self, src: &SourceLine, token: &str, pending: &mut Pending) -> TemplateToken {
        if let Some(i) = pending.parameters.iter().position(|p| p == token) {
            return TemplateToken::Positional(i);
        }
        if let Some(j) = pending.locals.iter().position(|v| v == token) {
            return TemplateToken::Local(j);
        }

        let label_prefix = self.config.label_prefix;
        if token.starts_with(label_prefix) && token.len() > label_prefix.len_utf8() {
            let k = pending.symbol_index(&token[label_prefix.len_utf8()..], src);
            return TemplateToken::Symbol(k);
        }

        let param_prefix = self.config.param_prefix;
        if token.starts_with(param_prefix) && token.len() > param_prefix.len_utf8() {
            pending.discard = true;
            self.report(src.clone(), ErrorKind::UnknownLocalVariableReference {
                macro_name: pending.name.clone(),
                reference: token.to_owned(),
            });
        }
        TemplateToken::Text(token.to_owned())
    }

    /// Closes the current definition and commits it to the tables.
    fn commit(&mut self, mut pending: Pending, end: &SourceLine) {
        for symbol in pending.symbols.iter().filter(|s| !s.defined) {
            pending.discard = true;
            let err = Error::new(symbol.first_use.clone(), ErrorKind::UnknownLocalVariableReference {
                macro_name: pending.name.clone(),
                reference: format!("{}{}", self.config.label_prefix, symbol.name),
            });
            error!("{}", err);
            self.errors.push(err);
        }

        if pending.discard || pending.name.is_empty() {
            // Keep template ranges of committed macros contiguous.
            self.tables.templates.truncate(pending.template_start);
            debug!("Discarded invalid definition of `{}` ending on line {}.", pending.name, end.number);
            return;
        }

        let tables = &mut self.tables;
        let parameters = extend(&mut tables.parameters, mem::take(&mut pending.parameters));
        let keywords = extend(&mut tables.keywords, mem::take(&mut pending.keywords));
        let locals = extend(&mut tables.locals, mem::take(&mut pending.locals));
        let symbols = extend(&mut tables.symbols, pending.symbols.drain(..).map(|s| s.name).collect());
        let substitutions = extend(&mut tables.substitutions, mem::take(&mut pending.substitutions));

        let def = MacroDefinition {
            name: pending.name,
            parameters,
            keywords,
            locals,
            symbols,
            substitutions,
            template: pending.template_start..tables.templates.len(),
            line: pending.begin.number,
            end_line: end.number,
        };
        debug!("MNT[{}]: {}", tables.macros.len(), def);

        tables.index.insert(def.name.clone(), tables.macros.len());
        tables.macros.push(def);
    }

    fn report(&mut self, line: SourceLine, kind: ErrorKind) {
        let err = Error::new(line, kind);
        error!("{}", err);
        self.errors.push(err);
    }
}

/// Appends `items` to `table`, returning the range they now occupy.
fn extend<T>(table: &mut Vec<T>, items: Vec<T>) -> std::ops::Range<usize> {
    let start = table.len();
    table.extend(items);
    start..table.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::TemplateToken::*;
    use pretty_assertions::assert_eq;

    fn lines(src: &str) -> Vec<SourceLine> {
        src.lines().enumerate().map(|(i, l)| SourceLine::new(i + 1, l)).collect()
    }

    fn build(src: &str) -> Result<Definitions, Vec<Error>> {
        TableBuilder::new(&Config::default()).run(lines(src))
    }

    fn kinds(src: &str) -> Vec<ErrorKind> {
        build(src).unwrap_err().into_iter().map(|e| e.kind).collect()
    }

    fn listing(tables: &MacroTables, def: &MacroDefinition) -> Vec<String> {
        tables.template_of(def).iter().map(|l| l.to_string()).collect()
    }

    const INCR: &str = "
        MACRO
        INCR &X, &Y, &REG=AREG
        LCL &M
        .NEXT MOVER &REG, &X
        ADD &REG, &Y
        MOVEM &REG, &M
        BC ANY, .NEXT ; loop back
        MEND
        START
        INCR A, B
        END";

    #[test]
    fn test_definition_tables() {
        let defs = build(INCR).unwrap();
        let tables = &defs.tables;

        let def = tables.lookup("INCR").unwrap();
        assert_eq!(def.positional_count(), 3);
        assert_eq!(def.keyword_count(), 1);
        assert_eq!(def.local_count(), 1);
        assert_eq!(def.template, 0..5);
        assert_eq!(def.line, 2);
        assert_eq!(def.end_line, 9);

        assert_eq!(tables.parameters_of(def), ["&X", "&Y", "&REG"]);
        assert_eq!(tables.keywords_of(def), [KeywordParameter {
            name: "&REG".to_owned(), default: "AREG".to_owned(), position: 2,
        }]);
        assert_eq!(tables.locals_of(def), ["&M"]);
        assert_eq!(tables.symbols_of(def), ["NEXT"]);
        assert_eq!(tables.substitutions_of(def), [SymbolSubstitution {
            name: "NEXT".to_owned(), symbol: 0, location: 1,
        }]);

        assert_eq!(listing(tables, def), vec![
            "LCL (E,1)",
            "MOVER (P,3), (P,1)",
            "ADD (P,3), (P,2)",
            "MOVEM (P,3), (E,1)",
            "BC ANY, (S,1)",
        ]);

        let source: Vec<&str> = defs.source.iter().map(|l| l.text.trim()).filter(|t| !t.is_empty()).collect();
        assert_eq!(source, vec!["START", "INCR A, B", "END"]);
    }

    #[test]
    fn test_template_ranges_are_sequential() {
        let defs = build("
            MACRO
            ONE &a
            PRINT &a

            ; comment lines are not body lines
            PRINT &a
            MEND
            MACRO TWO
            NOP
            MEND
            MACRO
            THREE k=1
            LCL v
            LDA k
            STA v
            MEND").unwrap();
        let tables = &defs.tables;

        let ranges: Vec<_> = tables.macros().iter().map(|d| d.template.clone()).collect();
        assert_eq!(ranges, vec![0..2, 2..3, 3..6]);
        assert_eq!(tables.template_table().len(), 6);

        let three = tables.lookup("THREE").unwrap();
        assert_eq!(tables.template_of(three)[0].kind, LineKind::LocalDeclaration);
        assert_eq!(listing(tables, three), vec!["LCL (E,1)", "LDA (P,1)", "STA (E,1)"]);
    }

    #[test]
    fn test_header_on_begin_line() {
        let defs = build("macro GREET &name\nPRINT &name\nmend").unwrap();
        let def = defs.tables.lookup("GREET").unwrap();
        assert_eq!(defs.tables.parameters_of(def), ["&name"]);
        assert_eq!(listing(&defs.tables, def), vec!["PRINT (P,1)"]);
    }

    #[test]
    fn test_internal_label_forms() {
        let defs = build("
            MACRO WAIT &n
            .TOP:
            DEC &n
            JNZ .TOP
            .OUT RET
            MEND").unwrap();
        let tables = &defs.tables;
        let def = tables.lookup("WAIT").unwrap();

        assert_eq!(tables.template_of(def)[0], TemplateLine {
            kind: LineKind::Instruction, label: None, primary: None, operands: vec![],
        });
        assert_eq!(listing(tables, def), vec!["", "DEC (P,1)", "JNZ (S,1)", "RET"]);
        let locations: Vec<_> = tables.substitutions_of(def).iter().map(|s| (s.name.as_str(), s.location)).collect();
        assert_eq!(locations, vec![("TOP", 0), ("OUT", 3)]);
    }

    #[test]
    fn test_lone_label_prefix_is_text() {
        let config = Config { label_prefix: '§', ..Config::default() };
        let defs = TableBuilder::new(&config).run(lines("MACRO M\n§ NOP\n§top INC\nMEND")).unwrap();
        let def = defs.tables.lookup("M").unwrap();

        assert_eq!(defs.tables.template_of(def)[0], TemplateLine {
            kind: LineKind::Instruction,
            label: None,
            primary: Some(Text("§".to_owned())),
            operands: vec![Text("NOP".to_owned())],
        });
        assert_eq!(defs.tables.symbols_of(def), ["top"]);
        assert_eq!(defs.tables.substitutions_of(def)[0].location, 1);
    }

    #[test]
    fn test_forward_label_reference() {
        let defs = build("
            MACRO SKIP
            JMP .DONE
            NOP
            .DONE: NOP
            MEND").unwrap();
        let def = defs.tables.lookup("SKIP").unwrap();
        assert_eq!(defs.tables.template_of(def)[0].operands, vec![Symbol(0)]);
        assert_eq!(defs.tables.substitutions_of(def)[0].location, 2);
    }

    #[test]
    fn test_parameter_may_be_mnemonic_or_label() {
        let defs = build("MACRO DO &op &lab\n&lab: &op R1\nMEND").unwrap();
        let def = defs.tables.lookup("DO").unwrap();
        assert_eq!(defs.tables.template_of(def)[0], TemplateLine {
            kind: LineKind::Instruction,
            label: Some(Positional(1)),
            primary: Some(Positional(0)),
            operands: vec![Text("R1".to_owned())],
        });
    }

    #[test]
    fn test_duplicate_macro_definition() {
        let errors = build("MACRO A\nNOP\nMEND\nMACRO A\nHLT\nMEND").unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].line.number, 4);
        assert_eq!(errors[0].kind, ErrorKind::DuplicateMacroDefinition { name: "A".to_owned() });
    }

    #[test]
    fn test_duplicate_names() {
        assert_eq!(kinds("MACRO A &x, &x\nMEND"), vec![ErrorKind::DuplicateParameterName {
            macro_name: "A".to_owned(), parameter: "&x".to_owned(),
        }]);
        assert_eq!(kinds("MACRO A &x, &x=1\nMEND"), vec![ErrorKind::DuplicateParameterName {
            macro_name: "A".to_owned(), parameter: "&x".to_owned(),
        }]);
        assert_eq!(kinds("MACRO A &x\nLCL &v, &v\nMEND"), vec![ErrorKind::DuplicateExpansionVariable {
            macro_name: "A".to_owned(), variable: "&v".to_owned(),
        }]);
        assert_eq!(kinds("MACRO A &x\nLCL &x\nMEND"), vec![ErrorKind::DuplicateExpansionVariable {
            macro_name: "A".to_owned(), variable: "&x".to_owned(),
        }]);
        assert_eq!(kinds("MACRO A\n.L NOP\n.L NOP\nMEND"), vec![ErrorKind::DuplicateInternalLabel {
            macro_name: "A".to_owned(), label: "L".to_owned(),
        }]);
    }

    #[test]
    fn test_unknown_references() {
        assert_eq!(kinds("MACRO A &x\nMOV &y, &x\nMEND"), vec![ErrorKind::UnknownLocalVariableReference {
            macro_name: "A".to_owned(), reference: "&y".to_owned(),
        }]);

        let errors = build("MACRO A\nNOP\nJMP .NOWHERE\nMEND").unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].line.number, 3);
        assert_eq!(errors[0].kind, ErrorKind::UnknownLocalVariableReference {
            macro_name: "A".to_owned(), reference: ".NOWHERE".to_owned(),
        });
    }

    #[test]
    fn test_marker_errors_recover_locally() {
        assert_eq!(kinds("MEND\nMACRO\nMEND\nMACRO A\nMACRO\nNOP\nMEND"), vec![
            ErrorKind::UnexpectedMacroEnd,
            ErrorKind::MissingMacroName,
            ErrorKind::NestedMacroDefinition { macro_name: "A".to_owned() },
        ]);
    }

    #[test]
    fn test_unterminated_definition() {
        let errors = build("NOP\nMACRO\nLOOP &a\nJMP &a").unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].line.number, 2);
        assert_eq!(errors[0].kind, ErrorKind::UnterminatedMacroDefinition { macro_name: "LOOP".to_owned() });

        assert_eq!(kinds("MACRO"), vec![ErrorKind::UnterminatedMacroDefinition { macro_name: "?".to_owned() }]);
    }

    #[test]
    fn test_discarded_definition_leaves_no_template() {
        let config = Config::default();
        let mut builder = TableBuilder::new(&config);
        for src in lines("MACRO A\nNOP\nMEND\nMACRO A\nHLT\nHLT\nMEND\nMACRO B\nRET\nMEND") {
            builder.line(src);
        }

        assert_eq!(builder.errors.len(), 1);
        assert_eq!(builder.tables.template_table().len(), 2);
        assert_eq!(builder.tables.lookup("A").unwrap().template, 0..1);
        assert_eq!(builder.tables.lookup("B").unwrap().template, 1..2);
    }
}
