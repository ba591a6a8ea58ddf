// src/ports/parser.rs

//! Parsers for the text output of socket-listing utilities.
//!
//! Each tool prints a variable banner, a header row, then whitespace-separated
//! data rows. Column positions differ per tool and platform; they are spelled
//! out as constants in each parser's module. Rows with too few columns or a
//! non-listening state are skipped silently.

use super::model::PortEntry;

/// One tool's output format.
pub trait PortTableParser: Send + Sync {
    /// Extract the listening sockets from the tool's complete stdout.
    fn parse(&self, output: &str) -> Vec<PortEntry>;
}

/// Data rows following the header row that starts with `header`.
///
/// Without a header every line is treated as a candidate row.
fn data_rows<'a>(output: &'a str, header: &str) -> impl Iterator<Item = &'a str> {
    let lines: Vec<&str> = output.lines().collect();
    let start = lines
        .iter()
        .position(|line| line.trim_start().starts_with(header))
        .map_or(0, |i| i + 1);
    lines.into_iter().skip(start)
}

/// `netstat -tunlp` on Linux.
///
/// ```text
/// Proto Recv-Q Send-Q Local Address  Foreign Address  State   PID/Program name
/// tcp        0      0 0.0.0.0:8080   0.0.0.0:*        LISTEN  1234/python3
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct LinuxNetstat;

pub mod linux_netstat {
    pub const HEADER: &str = "Proto";
    pub const PROTO: usize = 0;
    pub const LOCAL: usize = 3;
    pub const FOREIGN: usize = 4;
    pub const STATE: usize = 5;
    pub const PID_PROGRAM: usize = 6;
    pub const MIN_COLUMNS: usize = 7;
    pub const LISTEN_STATE: &str = "LISTEN";
}

impl PortTableParser for LinuxNetstat {
    fn parse(&self, output: &str) -> Vec<PortEntry> {
        use linux_netstat::*;

        data_rows(output, HEADER)
            .filter_map(|line| {
                let parts: Vec<&str> = line.split_whitespace().collect();
                if parts.len() < MIN_COLUMNS || !is_listening(parts[STATE]) {
                    return None;
                }

                // Program names may contain spaces.
                let owner = parts[PID_PROGRAM..].join(" ");
                let (pid, program) = match owner.split_once('/') {
                    Some((pid, program)) => (pid.to_string(), program.to_string()),
                    None => (owner.clone(), String::new()),
                };

                Some(PortEntry {
                    pid,
                    protocol: parts[PROTO].to_string(),
                    local_address: parts[LOCAL].to_string(),
                    foreign_address: parts[FOREIGN].to_string(),
                    state: LISTEN_STATE.to_string(),
                    program_name: program,
                })
            })
            .collect()
    }
}

/// `netstat -ano` on Windows.
///
/// ```text
/// Active Connections
///
///   Proto  Local Address          Foreign Address        State           PID
///   TCP    0.0.0.0:8080           0.0.0.0:0              LISTENING       1234
///   UDP    0.0.0.0:5353           *:*                                    2222
/// ```
///
/// UDP rows carry no state column and are never listening rows.
#[derive(Debug, Clone, Copy, Default)]
pub struct WindowsNetstat;

pub mod windows_netstat {
    pub const HEADER: &str = "Proto";
    pub const PROTO: usize = 0;
    pub const LOCAL: usize = 1;
    pub const FOREIGN: usize = 2;
    pub const STATE: usize = 3;
    pub const MIN_COLUMNS: usize = 5;
    pub const LISTEN_STATE: &str = "LISTENING";
}

impl PortTableParser for WindowsNetstat {
    fn parse(&self, output: &str) -> Vec<PortEntry> {
        use windows_netstat::*;

        data_rows(output, HEADER)
            .filter_map(|line| {
                let parts: Vec<&str> = line.split_whitespace().collect();
                if parts.len() < MIN_COLUMNS || !is_listening(parts[STATE]) {
                    return None;
                }

                Some(PortEntry {
                    pid: parts[parts.len() - 1].to_string(),
                    protocol: parts[PROTO].to_string(),
                    local_address: parts[LOCAL].to_string(),
                    foreign_address: parts[FOREIGN].to_string(),
                    state: LISTEN_STATE.to_string(),
                    program_name: String::new(),
                })
            })
            .collect()
    }
}

/// `lsof -i -P -n`, the POSIX fallback.
///
/// ```text
/// COMMAND   PID USER   FD   TYPE DEVICE SIZE/OFF NODE NAME
/// python3  1234 dev    3u  IPv4  0x1a2b      0t0  TCP *:8080 (LISTEN)
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct Lsof;

pub mod lsof {
    pub const HEADER: &str = "COMMAND";
    pub const COMMAND: usize = 0;
    pub const PID: usize = 1;
    pub const NODE: usize = 7;
    pub const NAME: usize = 8;
    pub const STATE: usize = 9;
    pub const MIN_COLUMNS: usize = 10;
    pub const LISTEN_MARKER: &str = "(LISTEN)";
    pub const LISTEN_STATE: &str = "LISTEN";
}

impl PortTableParser for Lsof {
    fn parse(&self, output: &str) -> Vec<PortEntry> {
        use lsof::*;

        data_rows(output, HEADER)
            .filter_map(|line| {
                let parts: Vec<&str> = line.split_whitespace().collect();
                if parts.len() < MIN_COLUMNS || parts[STATE] != LISTEN_MARKER {
                    return None;
                }

                Some(PortEntry {
                    pid: parts[PID].to_string(),
                    protocol: parts[NODE].to_string(),
                    local_address: parts[NAME].to_string(),
                    foreign_address: String::new(),
                    state: LISTEN_STATE.to_string(),
                    program_name: parts[COMMAND].to_string(),
                })
            })
            .collect()
    }
}

fn is_listening(state: &str) -> bool {
    state.eq_ignore_ascii_case("LISTEN") || state.eq_ignore_ascii_case("LISTENING")
}

#[cfg(test)]
mod tests {
    use super::*;

    const LINUX_NETSTAT: &str = "\
Active Internet connections (only servers)
Proto Recv-Q Send-Q Local Address           Foreign Address         State       PID/Program name
tcp        0      0 0.0.0.0:8080            0.0.0.0:*               LISTEN      1234/python3
tcp        0      0 127.0.0.1:5432          127.0.0.1:40000         ESTABLISHED 99/postgres
tcp6       0      0 :::22                   :::*                    LISTEN      -
udp        0      0 0.0.0.0:68              0.0.0.0:*                           512/dhclient
";

    #[test]
    fn linux_netstat_keeps_only_listening_rows() {
        let entries = LinuxNetstat.parse(LINUX_NETSTAT);

        assert_eq!(entries.len(), 2);
        assert_eq!(
            entries[0],
            PortEntry {
                pid: "1234".to_string(),
                protocol: "tcp".to_string(),
                local_address: "0.0.0.0:8080".to_string(),
                foreign_address: "0.0.0.0:*".to_string(),
                state: "LISTEN".to_string(),
                program_name: "python3".to_string(),
            }
        );
        assert_eq!(entries[1].pid, "-");
        assert_eq!(entries[1].program_name, "");
    }

    #[test]
    fn linux_netstat_program_names_with_spaces() {
        let out = "Proto Recv-Q Send-Q Local Foreign State PID/Program\n\
                   tcp 0 0 0.0.0.0:3000 0.0.0.0:* LISTEN 42/node server.js\n";
        let entries = LinuxNetstat.parse(out);
        assert_eq!(entries[0].pid, "42");
        assert_eq!(entries[0].program_name, "node server.js");
    }

    #[test]
    fn banner_lines_before_header_are_ignored() {
        let out = "(Not all processes could be identified)\n\
                   tcp 0 0 0.0.0.0:1 0.0.0.0:* LISTEN 1/banner\n\
                   Proto Recv-Q Send-Q Local Foreign State PID/Program\n\
                   tcp 0 0 0.0.0.0:2 0.0.0.0:* LISTEN 2/real\n";
        let entries = LinuxNetstat.parse(out);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].pid, "2");
    }

    #[test]
    fn windows_netstat_skips_udp_and_non_listening() {
        let out = "
Active Connections

  Proto  Local Address          Foreign Address        State           PID
  TCP    0.0.0.0:8080           0.0.0.0:0              LISTENING       1234
  TCP    10.0.0.5:50000         1.2.3.4:443            ESTABLISHED     4321
  UDP    0.0.0.0:5353           *:*                                    2222
";
        let entries = WindowsNetstat.parse(out);

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].pid, "1234");
        assert_eq!(entries[0].protocol, "TCP");
        assert_eq!(entries[0].state, "LISTENING");
        assert_eq!(entries[0].foreign_address, "0.0.0.0:0");
    }

    #[test]
    fn lsof_reads_command_and_name_columns() {
        let out = "\
COMMAND   PID USER   FD   TYPE             DEVICE SIZE/OFF NODE NAME
python3  1234 dev    3u  IPv4 0x1a2b3c4d5e6f7a8b      0t0  TCP *:8080 (LISTEN)
curl     4444 dev    5u  IPv4 0x1a2b3c4d5e6f7a8c      0t0  TCP 10.0.0.2:5555->1.1.1.1:443 (ESTABLISHED)
mDNSResp  300 root   8u  IPv4 0x1a2b3c4d5e6f7a8d      0t0  UDP *:5353
";
        let entries = Lsof.parse(out);

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].pid, "1234");
        assert_eq!(entries[0].program_name, "python3");
        assert_eq!(entries[0].protocol, "TCP");
        assert_eq!(entries[0].local_address, "*:8080");
        assert_eq!(entries[0].foreign_address, "");
        assert_eq!(entries[0].state, "LISTEN");
    }

    #[test]
    fn empty_output_yields_nothing() {
        assert!(LinuxNetstat.parse("").is_empty());
        assert!(WindowsNetstat.parse("").is_empty());
        assert!(Lsof.parse("").is_empty());
    }
}
