// tests/parser_props.rs

use proptest::prelude::*;

use procpilot::ports::{parse_pid, LinuxNetstat, Lsof, PortTableParser, WindowsNetstat};

fn parsers() -> Vec<Box<dyn PortTableParser>> {
    vec![Box::new(LinuxNetstat), Box::new(WindowsNetstat), Box::new(Lsof)]
}

// Rows built from a small vocabulary so that headers, states and separators
// actually show up, mixed with arbitrary junk lines.
fn table_strategy() -> impl Strategy<Value = String> {
    let token = prop_oneof![
        Just("Proto".to_string()),
        Just("COMMAND".to_string()),
        Just("LISTEN".to_string()),
        Just("LISTENING".to_string()),
        Just("(LISTEN)".to_string()),
        Just("tcp".to_string()),
        Just("-".to_string()),
        "[0-9]{1,6}(/[a-z]{1,8})?",
        "[a-z0-9.:*]{1,12}",
    ];
    let row = prop_oneof![
        proptest::collection::vec(token, 0..12).prop_map(|t| t.join(" ")),
        "[^\n]{0,60}",
    ];
    proptest::collection::vec(row, 0..20).prop_map(|rows| rows.join("\n"))
}

proptest! {
    #[test]
    fn parsers_only_ever_report_listening_rows(output in table_strategy()) {
        for parser in parsers() {
            for entry in parser.parse(&output) {
                prop_assert!(entry.state == "LISTEN" || entry.state == "LISTENING");
            }
        }
    }

    #[test]
    fn linux_rows_round_trip_their_owner(
        rows in proptest::collection::vec((1u16.., 1u32..4_000_000, any::<bool>()), 0..30)
    ) {
        let mut output = String::from(
            "Active Internet connections (only servers)\n\
             Proto Recv-Q Send-Q Local Address Foreign Address State PID/Program name\n",
        );
        for (port, pid, listening) in &rows {
            let state = if *listening { "LISTEN" } else { "TIME_WAIT" };
            output.push_str(&format!("tcp 0 0 0.0.0.0:{port} 0.0.0.0:* {state} {pid}/svc\n"));
        }

        let entries = LinuxNetstat.parse(&output);
        let expected: Vec<(String, String)> = rows
            .iter()
            .filter(|(_, _, listening)| *listening)
            .map(|(port, pid, _)| (pid.to_string(), format!("0.0.0.0:{port}")))
            .collect();
        let actual: Vec<(String, String)> = entries
            .iter()
            .map(|e| (e.pid.clone(), e.local_address.clone()))
            .collect();

        prop_assert_eq!(actual, expected);
        for entry in &entries {
            prop_assert!(entry.pid_number().is_some());
        }
    }

    #[test]
    fn parse_pid_accepts_exactly_positive_decimals(raw in "[-+ 0-9a-z]{0,12}") {
        let digits_only = !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit());
        match parse_pid(&raw) {
            Some(pid) => {
                prop_assert!(digits_only);
                prop_assert!(pid > 0);
                prop_assert_eq!(pid.to_string(), raw.trim_start_matches('0'));
            }
            None => {
                prop_assert!(!digits_only || raw.parse::<u32>().map_or(true, |n| n == 0));
            }
        }
    }
}
