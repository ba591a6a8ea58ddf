// src/ports/mod.rs

//! Listening-port inspection.
//!
//! - [`parser`] turns `netstat` / `lsof` output into [`PortEntry`] rows.
//! - [`inspector`] runs the tools with a timeout and kills owning process
//!   trees.

pub mod inspector;
pub mod model;
pub mod parser;

pub use inspector::{EnumerationTool, KillOutcome, KillReport, PortInspector, platform_tools};
pub use model::{PortEntry, format_table};
pub use parser::{LinuxNetstat, Lsof, PortTableParser, WindowsNetstat};

/// Parse a strictly positive decimal PID: digits only, no sign or padding.
pub fn parse_pid(raw: &str) -> Option<u32> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    raw.parse::<u32>().ok().filter(|pid| *pid > 0)
}

#[cfg(test)]
mod tests {
    use super::parse_pid;

    #[test]
    fn only_plain_positive_integers_are_pids() {
        assert_eq!(parse_pid("1234"), Some(1234));
        assert_eq!(parse_pid("0"), None);
        assert_eq!(parse_pid("-"), None);
        assert_eq!(parse_pid("+12"), None);
        assert_eq!(parse_pid(" 12"), None);
        assert_eq!(parse_pid("not_a_number"), None);
        assert_eq!(parse_pid("99999999999"), None);
    }
}
