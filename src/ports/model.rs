// src/ports/model.rs

use std::fmt;

use serde::Serialize;

/// Snapshot of one listening socket and its owning process.
///
/// `pid` is kept as the tool printed it; it may be `-` when the owner is not
/// visible to the current user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortEntry {
    pub pid: String,
    pub protocol: String,
    pub local_address: String,
    pub foreign_address: String,
    pub state: String,
    pub program_name: String,
}

impl PortEntry {
    /// The PID as a number, when it is one.
    pub fn pid_number(&self) -> Option<u32> {
        super::parse_pid(&self.pid)
    }
}

const HEADERS: [&str; 6] = ["PID", "PROTO", "LOCAL ADDRESS", "FOREIGN ADDRESS", "STATE", "PROGRAM"];

/// Render entries as an aligned text table with a header row.
pub fn format_table(entries: &[PortEntry]) -> String {
    let rows: Vec<[&str; 6]> = entries
        .iter()
        .map(|e| {
            [
                e.pid.as_str(),
                e.protocol.as_str(),
                e.local_address.as_str(),
                e.foreign_address.as_str(),
                e.state.as_str(),
                e.program_name.as_str(),
            ]
        })
        .collect();

    let mut widths = HEADERS.map(str::len);
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.len());
        }
    }

    let mut out = String::new();
    push_row(&mut out, &HEADERS, &widths);
    for row in &rows {
        push_row(&mut out, row, &widths);
    }
    out
}

fn push_row(out: &mut String, cells: &[&str; 6], widths: &[usize; 6]) {
    let line = cells
        .iter()
        .zip(widths)
        .map(|(cell, &width)| format!("{cell:<width$}"))
        .collect::<Vec<_>>()
        .join("  ");
    out.push_str(line.trim_end());
    out.push('\n');
}

impl fmt::Display for PortEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} -> {} {} {}",
            self.pid,
            self.protocol,
            self.local_address,
            self.foreign_address,
            self.state,
            self.program_name
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(pid: &str, program: &str) -> PortEntry {
        PortEntry {
            pid: pid.to_string(),
            protocol: "tcp".to_string(),
            local_address: "0.0.0.0:8080".to_string(),
            foreign_address: "0.0.0.0:*".to_string(),
            state: "LISTEN".to_string(),
            program_name: program.to_string(),
        }
    }

    #[test]
    fn table_columns_are_aligned() {
        let table = format_table(&[entry("1234", "python3"), entry("7", "nginx")]);
        let lines: Vec<&str> = table.lines().collect();

        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("PID   PROTO"));
        let proto_col = lines[0].find("PROTO").unwrap();
        assert_eq!(lines[1].find("tcp"), Some(proto_col));
        assert_eq!(lines[2].find("tcp"), Some(proto_col));
    }

    #[test]
    fn empty_table_has_only_a_header() {
        assert_eq!(format_table(&[]).lines().count(), 1);
    }

    #[test]
    fn dash_pid_has_no_number() {
        assert_eq!(entry("-", "").pid_number(), None);
        assert_eq!(entry("1234", "").pid_number(), Some(1234));
    }
}
