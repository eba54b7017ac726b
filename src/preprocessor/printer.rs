//! Renders the macro tables and the actual parameter table for inspection.
use term_grid::{Cell, Direction, Filling, Grid, GridOptions};

use super::expansion::ActualParameters;
use super::tables::MacroTables;

fn grid() -> Grid {
    Grid::new(GridOptions {
        filling:   Filling::Spaces(2),
        direction: Direction::LeftToRight,
    })
}

/// Appends a titled grid of `columns` columns; `cells` are row-major.
fn section(out: &mut String, title: &str, columns: usize, cells: Vec<String>) {
    out.push_str(&format!("{}:\n", title));
    if cells.is_empty() {
        out.push_str("  (empty)\n");
    } else {
        let mut grid = grid();
        for cell in cells {
            grid.add(Cell::from(cell));
        }
        out.push_str(&grid.fit_into_columns(columns).to_string());
    }
    out.push('\n');
}

fn bracketed(items: &[String]) -> String {
    format!("[{}]", items.join(", "))
}

/// Renders MNT, PNTAB, KPDTAB, EVNTAB, SSNTAB, SSTAB and MDT in that order.
pub fn render_tables(tables: &MacroTables) -> String {
    let mut out = String::new();

    let mut cells = Vec::new();
    for (idx, def) in tables.macros().iter().enumerate() {
        cells.push(format!("{}:", idx));
        cells.push(def.to_string());
    }
    section(&mut out, "MNT", 2, cells);

    let mut cells = Vec::new();
    for def in tables.macros() {
        cells.push(def.name.clone());
        cells.push(bracketed(tables.parameters_of(def)));
    }
    section(&mut out, "PNTAB", 2, cells);

    let mut cells = Vec::new();
    for (idx, keyword) in tables.keyword_table().iter().enumerate() {
        cells.push(format!("{}:", idx));
        cells.push(keyword.to_string());
    }
    section(&mut out, "KPDTAB", 2, cells);

    let mut cells = Vec::new();
    for def in tables.macros() {
        cells.push(def.name.clone());
        cells.push(bracketed(tables.locals_of(def)));
    }
    section(&mut out, "EVNTAB", 2, cells);

    let mut cells = Vec::new();
    for def in tables.macros() {
        cells.push(def.name.clone());
        cells.push(bracketed(tables.symbols_of(def)));
    }
    section(&mut out, "SSNTAB", 2, cells);

    let mut cells = Vec::new();
    for (idx, sst) in tables.substitution_table().iter().enumerate() {
        cells.push(format!("{}:", idx));
        cells.push(sst.to_string());
    }
    section(&mut out, "SSTAB", 2, cells);

    let mut cells = Vec::new();
    for (idx, line) in tables.template_table().iter().enumerate() {
        cells.push(format!("{}:", idx));
        cells.push(line.to_string());
    }
    section(&mut out, "MDT", 2, cells);

    out
}

/// Renders one row per expansion instance, nested calls indented.
pub fn render_calls(calls: &[ActualParameters]) -> String {
    let mut out = String::new();
    let mut cells = Vec::new();
    for call in calls {
        cells.push(format!("line {}", call.line));
        cells.push(format!("{}{}", "  ".repeat(call.depth.saturating_sub(1)), call));
    }
    section(&mut out, "APTAB", 2, cells);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::Config;
    use super::super::definition::TableBuilder;
    use super::super::expansion::Expander;
    use super::super::lexer::SourceLine;

    fn tables(src: &str) -> MacroTables {
        let lines = src.lines().enumerate().map(|(i, l)| SourceLine::new(i + 1, l)).collect();
        TableBuilder::new(&Config::default()).run(lines).unwrap().tables
    }

    fn rows(rendered: &str) -> Vec<String> {
        rendered.lines()
            .map(|l| l.split_whitespace().collect::<Vec<_>>().join(" "))
            .filter(|l| !l.is_empty())
            .collect()
    }

    #[test]
    fn test_render_tables() {
        let tables = tables("
MACRO
INCR &X, &Y, &REG=AREG
LCL &M
.NEXT MOVER &REG, &X
MOVEM &REG, &M
BC ANY, .NEXT
MEND");
        let rows = rows(&render_tables(&tables));

        for expected in &[
            "MNT:",
            "0: Name=INCR, PosParams=3, KeyParams=1, ExpVars=1, MDT=[0, 4), KPDTAB Ptr=0, SSTAB Ptr=0",
            "PNTAB:",
            "INCR [&X, &Y, &REG]",
            "0: &REG = AREG",
            "INCR [&M]",
            "INCR [NEXT]",
            "0: NEXT: 1",
            "0: LCL (E,1)",
            "1: MOVER (P,3), (P,1)",
            "2: MOVEM (P,3), (E,1)",
            "3: BC ANY, (S,1)",
        ] {
            assert!(rows.iter().any(|r| r == expected), "missing row `{}` in {:#?}", expected, rows);
        }

        let titles: Vec<&String> = rows.iter().filter(|r| r.ends_with(':') && !r.contains(' ')).collect();
        assert_eq!(titles, vec!["MNT:", "PNTAB:", "KPDTAB:", "EVNTAB:", "SSNTAB:", "SSTAB:", "MDT:"]);
    }

    #[test]
    fn test_render_empty_tables() {
        let rendered = render_tables(&MacroTables::default());
        assert_eq!(rendered.matches("(empty)").count(), 7);
    }

    #[test]
    fn test_render_calls() {
        let tables = tables("MACRO\nA &x\nB &x\nMEND\nMACRO\nB &y\nLCL &t\nST &y, &t\nMEND");
        let config = Config::default();
        let source = vec![SourceLine::new(10, "A 7")];
        let expansion = Expander::new(&tables, &config).run(&source);

        assert_eq!(rows(&render_calls(&expansion.calls)), vec![
            "APTAB:",
            "line 10 A (7)",
            "line 10 B (7) [B_t_1]",
        ]);
    }
}
