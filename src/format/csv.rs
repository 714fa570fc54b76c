//! Minimal RFC 4180 style CSV writer

use super::table::Table;

/// Render `table` as CSV: header line, then one line per row, `\n` endings
///
/// Fields containing a comma, double quote, CR or LF are quoted and inner
/// quotes doubled. A table with no columns and no rows renders as an empty
/// string.
pub fn write_csv(table: &Table) -> String {
    if table.columns.is_empty() && table.rows.is_empty() {
        return String::new();
    }

    let mut out = String::new();
    write_record(&mut out, &table.columns);
    for row in &table.rows {
        write_record(&mut out, row);
    }
    out
}

fn write_record(out: &mut String, fields: &[String]) {
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        push_field(out, field);
    }
    out.push('\n');
}

fn push_field(out: &mut String, field: &str) {
    let needs_quotes = field.contains([',', '"', '\r', '\n']);
    if !needs_quotes {
        out.push_str(field);
        return;
    }

    out.push('"');
    for c in field.chars() {
        if c == '"' {
            out.push('"');
        }
        out.push(c);
    }
    out.push('"');
}
