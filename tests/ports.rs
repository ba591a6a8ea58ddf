// tests/ports.rs

mod common;
use crate::common::{init_tracing, with_timeout};

use std::sync::Arc;
use std::time::{Duration, Instant};

use procpilot::ports::{EnumerationTool, KillOutcome, LinuxNetstat, PortInspector};
use procpilot_test_utils::groups::RecordingGroups;

#[tokio::test]
async fn enumerate_without_any_tool_is_empty() {
    init_tracing();

    let inspector = PortInspector::new().with_tools(vec![
        EnumerationTool::new("procpilot-no-such-tool", &[], Arc::new(LinuxNetstat)),
        EnumerationTool::new("procpilot-no-such-tool-either", &["-x"], Arc::new(LinuxNetstat)),
    ]);

    assert!(with_timeout(inspector.enumerate()).await.is_empty());
}

#[cfg(unix)]
#[tokio::test]
async fn failing_tool_falls_through_to_the_next() {
    init_tracing();

    let fixture = "Active Internet connections (only servers)\n\
        Proto Recv-Q Send-Q Local Address  Foreign Address  State   PID/Program name\n\
        tcp        0      0 0.0.0.0:8080   0.0.0.0:*        LISTEN  1234/python3\n";

    let inspector = PortInspector::new().with_tools(vec![
        EnumerationTool::new("false", &[], Arc::new(LinuxNetstat)),
        EnumerationTool::new("printf", &["%s", fixture], Arc::new(LinuxNetstat)),
    ]);

    let entries = with_timeout(inspector.enumerate()).await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].pid, "1234");
    assert_eq!(entries[0].state, "LISTEN");
    assert_eq!(entries[0].local_address, "0.0.0.0:8080");
    assert_eq!(entries[0].program_name, "python3");
}

#[cfg(unix)]
#[tokio::test]
async fn slow_tool_is_abandoned_after_the_timeout() {
    init_tracing();

    let inspector = PortInspector::new()
        .with_tools(vec![EnumerationTool::new("sleep", &["5"], Arc::new(LinuxNetstat))])
        .with_timeout(Duration::from_millis(100));

    let started = Instant::now();
    let entries = with_timeout(inspector.enumerate()).await;

    assert!(entries.is_empty());
    assert!(started.elapsed() < Duration::from_secs(3));
}

#[test]
fn non_numeric_pids_are_skipped_without_termination() {
    let groups = Arc::new(RecordingGroups::new());
    let inspector = PortInspector::new().with_process_groups(groups.clone());

    let report = inspector.kill(["not_a_number", "-", "not_a_number"]);

    assert_eq!(report.results.len(), 2);
    assert_eq!(report.outcome("not_a_number"), Some(&KillOutcome::Skipped));
    assert_eq!(report.outcome("-"), Some(&KillOutcome::Skipped));
    assert!(!report.has_failures());
    assert!(groups.lookups().is_empty());
    assert!(groups.terminated().is_empty());
}

#[cfg(unix)]
#[test]
fn own_process_group_is_refused() {
    let groups = Arc::new(RecordingGroups::new());
    let inspector = PortInspector::new().with_process_groups(groups.clone());
    let me = std::process::id().to_string();

    let report = inspector.kill([me.as_str()]);

    assert!(matches!(report.outcome(&me), Some(KillOutcome::Failed(_))));
    assert!(report.has_failures());
    assert!(groups.terminated().is_empty());
}

#[cfg(unix)]
#[tokio::test]
async fn kill_takes_down_a_detached_tree() -> Result<(), Box<dyn std::error::Error>> {
    use procpilot::process::{LaunchSpec, NativeProcessGroups, ProcessGroups, Termination};

    init_tracing();

    let mut detached = NativeProcessGroups.spawn_detached(&LaunchSpec {
        command: "sleep 30",
        working_directory: None,
    })?;
    let pid = detached.handle.pid.to_string();

    let groups = Arc::new(RecordingGroups::new());
    let inspector = PortInspector::new().with_process_groups(groups.clone());
    let report = inspector.kill([pid.as_str(), "junk"]);

    assert_eq!(report.outcome(&pid), Some(&KillOutcome::Killed));
    assert_eq!(report.killed().collect::<Vec<_>>(), vec![pid.as_str()]);
    assert_eq!(report.skipped().collect::<Vec<_>>(), vec!["junk"]);
    assert_eq!(groups.terminated().len(), 1);
    assert_eq!(groups.terminated()[0].1, Termination::Forceful);

    let status = with_timeout(detached.child.wait()).await?;
    assert!(!status.success());
    Ok(())
}
