//! Parser for fleetctl's tabular output.
//!
//! fleetctl pads columns with tabs (`UNIT\t\tMACHINE\t\t\tACTIVE`), so cells
//! are separated by runs of tabs and may themselves contain spaces. Tables
//! without any tab in the header fall back to splitting on whitespace runs.
//! Header names are lowercased and become the row keys.

use std::collections::HashMap;

use crate::error::ParseError;

/// One data row: lowercased column name to cell text.
pub type Row = HashMap<String, String>;

/// A data row with its 1-based line number in the raw output.
pub type NumberedRow = (usize, Row);

/// Cell text fleetctl prints for an empty value.
pub const EMPTY_CELL: &str = "-";

pub fn parse(text: &str) -> Result<Vec<NumberedRow>, ParseError> {
    let mut lines = text
        .lines()
        .enumerate()
        .filter(|(_, l)| !l.trim().is_empty());

    let header_line = match lines.next() {
        Some((_, line)) => line,
        None => return Ok(Vec::new()),
    };
    let tabbed = header_line.contains('\t');
    let header: Vec<String> = split_cells(header_line, tabbed)
        .into_iter()
        .map(|h| h.to_ascii_lowercase())
        .collect();

    let mut rows = Vec::new();
    for (index, line) in lines {
        let number = index + 1;
        let cells = split_cells(line, tabbed);
        if cells.len() > header.len() {
            return Err(ParseError::TooManyCells {
                line: number,
                expected: header.len(),
                found: cells.len(),
            });
        }
        let row: Row = header
            .iter()
            .cloned()
            .zip(cells.into_iter().map(str::to_string))
            .collect();
        rows.push((number, row));
    }
    Ok(rows)
}

fn split_cells(line: &str, tabbed: bool) -> Vec<&str> {
    if tabbed {
        line.split('\t')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .collect()
    } else {
        line.split_whitespace().collect()
    }
}

/// The cell for `column`, treating fleetctl's `-` placeholder as absent.
pub fn cell<'a>(row: &'a Row, column: &str) -> Option<&'a str> {
    row.get(column)
        .map(String::as_str)
        .filter(|v| *v != EMPTY_CELL && !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MACHINES: &str = "MACHINE\t\t\t\t\tIP\t\tMETADATA\n\
4ce83dd1b1c94d67af00ba264499b6d0\t10.240.190.254\t-\n\
aafdf1ed253844108ba4f10d75922f2b\t10.240.51.254\tregion=us-west,az=us-west-1\n";

    #[test]
    fn parses_tabbed_machines() {
        let rows = parse(MACHINES).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].1["machine"], "4ce83dd1b1c94d67af00ba264499b6d0");
        assert_eq!(rows[0].1["ip"], "10.240.190.254");
        assert_eq!(cell(&rows[0].1, "metadata"), None);
        assert_eq!(cell(&rows[1].1, "metadata"), Some("region=us-west,az=us-west-1"));
    }

    #[test]
    fn tabbed_cells_keep_inner_spaces() {
        let text = "UNIT\t\tDESC\t\tACTIVE\nweb.service\tMy web server\tactive\n";
        let rows = parse(text).unwrap();
        assert_eq!(rows[0].1["desc"], "My web server");
        assert_eq!(rows[0].1["active"], "active");
    }

    #[test]
    fn whitespace_aligned_fallback() {
        let text = "UNIT          STATE     ACTIVE\nweb.service   launched  active\n";
        let rows = parse(text).unwrap();
        assert_eq!(rows[0].1["unit"], "web.service");
        assert_eq!(rows[0].1["state"], "launched");
    }

    #[test]
    fn empty_and_header_only() {
        assert!(parse("").unwrap().is_empty());
        assert!(parse("\n\n").unwrap().is_empty());
        assert!(parse("MACHINE\tIP\n").unwrap().is_empty());
    }

    #[test]
    fn blank_lines_are_skipped() {
        let text = "UNIT\tACTIVE\n\nweb.service\tactive\n\n";
        let rows = parse(text).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].0, 3);
    }

    #[test]
    fn short_rows_lack_trailing_fields() {
        let rows = parse("UNIT\tSTATE\tMACHINE\nweb.service\tinactive\n").unwrap();
        assert_eq!(rows[0].1.len(), 2);
        assert!(!rows[0].1.contains_key("machine"));
    }

    #[test]
    fn too_many_cells_is_error() {
        let err = parse("UNIT\tSTATE\nweb.service\tlaunched\textra\n").unwrap_err();
        assert_eq!(
            err,
            ParseError::TooManyCells {
                line: 2,
                expected: 2,
                found: 3
            }
        );
    }
}
