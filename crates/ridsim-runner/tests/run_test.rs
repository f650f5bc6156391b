//! Run-loop tests for the ridsim runner.
//!
//! These drive [`Runner::run`] with pacing disabled, a recording radio and an
//! in-memory control channel, and check what reaches the radio and stdout.

use std::sync::atomic::AtomicBool;

use crossbeam_channel::unbounded;
use ridsim_engine::{FlyMode, MessageKind, RecordingRadio};
use ridsim_runner::{RealTimeConfig, RealTimePacer, Runner, RunnerConfig, TICK_STEP_MS};

// ============================================================================
// Helper Functions
// ============================================================================

const CONFIG: &str = r#"
engine:
  rng_seed: 11
settings:
  uas_id: SN-RUNNER-1
  id_type: 1
  uas_operator: FIN87astrdge12k8
  lat: 47.6
  lng: -122.3
auth:
  auth_type: 1
  data: "0102030405060708090a0b0c0d0e0f10111213141516"
"#;

fn runner() -> Runner<RecordingRadio> {
    let config = RunnerConfig::from_yaml_str(CONFIG).unwrap();
    Runner::new(config, RecordingRadio::new()).unwrap()
}

/// Run for `until_ms` of engine time with `lines` queued on the control
/// channel, returning everything written to stdout.
fn run_with_lines(runner: &mut Runner<RecordingRadio>, lines: &[&str], until_ms: u64) -> String {
    let (tx, rx) = unbounded();
    for line in lines {
        tx.send(line.to_string()).unwrap();
    }
    drop(tx);

    let mut output = Vec::new();
    let mut pacer = RealTimePacer::new(RealTimeConfig::disabled(), runner.now_ms());
    let stop = AtomicBool::new(false);
    runner
        .run(&rx, &mut output, &mut pacer, &stop, Some(until_ms))
        .unwrap();

    String::from_utf8(output).unwrap()
}

// ============================================================================
// Tests
// ============================================================================

#[test]
fn test_run_stops_at_duration() {
    let mut runner = runner();
    run_with_lines(&mut runner, &[], 3_000);

    assert_eq!(runner.now_ms(), 3_000);
    assert!(!runner.radio().sent.is_empty());
}

#[test]
fn test_responses_written_with_terminator() {
    let mut runner = runner();
    let output = run_with_lines(&mut runner, &["$V", "$Q"], 100);

    assert_eq!(output, "$V|1008\r\n$-\r\n");
}

#[test]
fn test_auth_pages_reach_radio() {
    let mut runner = runner();
    // One full 40-phase cycle at 75 ms plus drain slack.
    run_with_lines(&mut runner, &[], 40 * 75 + 10 * TICK_STEP_MS + 500);

    let kinds = runner.radio().kinds();
    let auth = MessageKind::Auth as u8;
    assert!(kinds.contains(&auth));
}

#[test]
fn test_operator_id_sets_ssid() {
    let mut runner = runner();
    run_with_lines(&mut runner, &[], 1_000);

    let first = &runner.radio().sent[0];
    assert_eq!(first.ssid.as_str(), "FIN87astrdge12k8");
}

#[test]
fn test_restart_over_control_channel() {
    let mut runner = runner();
    let output = run_with_lines(&mut runner, &["$SM|0|1|2|30|80|0", "$R", "$V"], 500);

    assert_eq!(output, "$V|1008\r\n");
    assert_eq!(runner.restarts(), 1);
    assert_eq!(runner.engine().settings().fly_mode, FlyMode::Fly);
    assert_eq!(runner.engine().settings().alt, 80);

    // Auth survives the rebuild.
    assert!(!runner.engine().scheduler().auth().is_empty());
}

#[test]
fn test_stop_flag_ends_run_immediately() {
    let mut runner = runner();
    let (_tx, rx) = unbounded::<String>();
    let mut output = Vec::new();
    let mut pacer = RealTimePacer::new(RealTimeConfig::disabled(), 0);
    let stop = AtomicBool::new(true);

    let summary = runner
        .run(&rx, &mut output, &mut pacer, &stop, None)
        .unwrap();

    assert_eq!(summary.ticks, 0);
    assert_eq!(summary.final_ms, 0);
}
