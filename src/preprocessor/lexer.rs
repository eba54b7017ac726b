//! This lexer splits preprocessor source into lines and tokens.
use std::fmt;
use std::io::{self, BufReader, BufRead, Read};

/// A physical source line, kept verbatim so that lines which are not
/// macro calls can be passed through untouched.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct SourceLine {
    /// 1-based line number in the input.
    pub number: usize,
    pub text: String,
}

impl SourceLine {
    pub fn new<S: Into<String>>(number: usize, text: S) -> Self {
        SourceLine { number, text: text.into() }
    }
}

/// A tokenized line: `[LABEL:] [PRIMARY] [OPERAND[, OPERAND]...]`.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct Line {
    pub label:    Option<String>,
    pub primary:  Option<String>,
    pub operands: Vec<String>,
}

impl Line {
    /// True for blank and comment-only lines.
    pub fn is_empty(&self) -> bool {
        self.label.is_none() && self.primary.is_none() && self.operands.is_empty()
    }
}

impl fmt::Display for Line {
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
        if !self.operands.is_empty() {
            write!(f, "{}{}", sep, self.operands.join(", "))?;
        }
        Ok(())
    }
}

/// Reads every line of the input, numbering them from 1.
pub fn read_lines<T: Read + ?Sized>(reader: Box<T>) -> io::Result<Vec<SourceLine>> {
    let mut lines = Vec::with_capacity(256);

    for (index, line) in BufReader::new(reader).lines().enumerate() {
        lines.push(SourceLine::new(index + 1, line?));
    }

    Ok(lines)
}

/// Splits a line into label, primary token and operands.
///
/// Whitespace and commas both separate tokens; a `;` starts a comment
/// that runs to the end of the line. The first token is a label if it
/// ends with a colon. No operand-count validation happens here.
pub fn tokenize_line(line: &str) -> Line {
    let mut tokens: Vec<String> = Vec::with_capacity(4);

    let mut sb = String::new();
    'mainloop: for c in line.chars() {
        match c {
            ';' => break 'mainloop,
            // Separators bound tokens, so flush whatever has accumulated.
            '\t' | '\n' | '\x0B' | '\x0C' | '\x0D' | ' ' | ',' => {
                if !sb.is_empty() {
                    tokens.push(sb.clone());
                    sb.clear();
                }
            }
            _ => sb.push(c),
        };
    }
    if !sb.is_empty() {
        tokens.push(sb);
    }

    let mut tokens = tokens.into_iter();
    let mut out = Line::default();
    match tokens.next() {
        Some(first) if first.len() > 1 && first.ends_with(':') => {
            out.label = Some(first[..first.len() - 1].to_owned());
            out.primary = tokens.next();
        }
        first => out.primary = first,
    }
    out.operands = tokens.collect();
    out
}
