//! Minimal CSV writer for the payment export.
//!
//! Every field is double-quoted, embedded quotes are doubled, and
//! embedded line breaks are flattened to spaces so a row is always one
//! physical line. Rows are CRLF-joined.

fn escape(field: &str) -> String {
    let flat = field.replace("\r\n", " ").replace(['\r', '\n'], " ");
    format!("\"{}\"", flat.replace('"', "\"\""))
}

pub fn to_csv(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(
        headers
            .iter()
            .map(|h| escape(h))
            .collect::<Vec<_>>()
            .join(","),
    );
    for row in rows {
        lines.push(row.iter().map(|f| escape(f)).collect::<Vec<_>>().join(","));
    }
    lines.join("\r\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quotes_everything_and_joins_with_crlf() {
        let csv = to_csv(
            &["A", "B"],
            &[vec!["1".into(), "x".into()], vec!["2".into(), "y".into()]],
        );
        assert_eq!(csv, "\"A\",\"B\"\r\n\"1\",\"x\"\r\n\"2\",\"y\"");
    }

    #[test]
    fn doubles_embedded_quotes() {
        let csv = to_csv(&["A"], &[vec!["say \"hi\"".into()]]);
        assert_eq!(csv, "\"A\"\r\n\"say \"\"hi\"\"\"");
    }

    #[test]
    fn flattens_embedded_newlines() {
        let csv = to_csv(&["A"], &[vec!["line1\nline2\r\nline3".into()]]);
        assert_eq!(csv, "\"A\"\r\n\"line1 line2 line3\"");
    }

    #[test]
    fn empty_rows_produce_header_only() {
        assert_eq!(to_csv(&["A"], &[]), "\"A\"");
    }
}
