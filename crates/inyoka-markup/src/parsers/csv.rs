//! Comma separated values rendered as a table.

use super::BlockParser;
use crate::args::ParserCall;
use crate::nodes::{CellAttrs, Node, NodeKind};
use crate::parser::Parser;

/// Builds a table from CSV lines. The last cell of a short row spans the
/// remaining columns.
#[derive(Debug, Clone, Copy)]
pub struct CsvParser;

impl BlockParser for CsvParser {
    fn id(&self) -> &'static str {
        "csv"
    }

    fn build(&self, call: &ParserCall, _parser: &mut Parser<'_>) -> Node {
        let rows: Vec<Vec<String>> = call
            .data
            .lines()
            .map(split_record)
            .filter(|cells| !cells.is_empty())
            .collect();
        let columns = rows.iter().map(Vec::len).max().unwrap_or(0);

        let rows = rows
            .into_iter()
            .map(|cells| {
                let count = cells.len();
                let cells = cells
                    .into_iter()
                    .enumerate()
                    .map(|(index, cell)| {
                        let mut attrs = CellAttrs::default();
                        if index + 1 == count && count < columns {
                            attrs.colspan = u32::try_from(columns - count + 1).unwrap_or(1);
                        }
                        Node::with_children(NodeKind::TableCell(attrs), vec![Node::text(cell)])
                    })
                    .collect();
                Node::with_children(NodeKind::TableRow, cells)
            })
            .collect();
        Node::with_children(NodeKind::Table, rows)
    }
}

/// Split one line into fields. Double quotes group fields and `""` is a
/// literal quote inside a quoted field.
fn split_record(line: &str) -> Vec<String> {
    if line.trim().is_empty() {
        return Vec::new();
    }
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut quoted = false;
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' if quoted && chars.peek() == Some(&'"') => {
                field.push('"');
                chars.next();
            }
            '"' => quoted = !quoted,
            ',' if !quoted => fields.push(std::mem::take(&mut field)),
            c => field.push(c),
        }
    }
    fields.push(field);
    fields
}
