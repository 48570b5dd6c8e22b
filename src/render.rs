//! Plain aligned-column table output for command results.

/// Render rows under a header as space-aligned columns.
///
/// Short rows leave their trailing cells blank; column widths fit the widest
/// cell including the header.
pub fn render_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let columns = headers.len();
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate().take(columns) {
            let len = cell.chars().count();
            if len > widths[i] {
                widths[i] = len;
            }
        }
    }

    let mut out = String::new();
    render_row(&mut out, &widths, headers.iter().copied());
    out.push('\n');
    render_row(
        &mut out,
        &widths,
        widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>().iter().map(String::as_str),
    );
    for row in rows {
        out.push('\n');
        render_row(&mut out, &widths, row.iter().map(String::as_str));
    }
    out
}

fn render_row<'a>(out: &mut String, widths: &[usize], cells: impl Iterator<Item = &'a str>) {
    let mut cells: Vec<&str> = cells.collect();
    cells.resize(widths.len(), "");
    let rendered: Vec<String> = cells
        .iter()
        .zip(widths)
        .map(|(cell, width)| format!("{cell:<width$}"))
        .collect();
    out.push_str(rendered.join("  ").trim_end());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn columns_align_to_widest_cell() {
        let table = render_table(
            &["Cluster", "Name", "Status"],
            &[
                vec!["c1".into(), "mx1".into(), "OK".into()],
                vec!["c1".into(), "mx10".into(), "Offline".into()],
            ],
        );
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines[0], "Cluster  Name  Status");
        assert_eq!(lines[1], "-------  ----  ------");
        assert_eq!(lines[2], "c1       mx1   OK");
        assert_eq!(lines[3], "c1       mx10  Offline");
    }

    #[test]
    fn short_rows_pad_with_blanks() {
        let table = render_table(&["A", "B"], &[vec!["x".into()]]);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines[2], "x");
    }

    #[test]
    fn empty_rows_render_header_only() {
        let table = render_table(&["A"], &[]);
        assert_eq!(table.lines().count(), 2);
    }
}
