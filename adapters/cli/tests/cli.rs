use std::process::{Command, Output};

const COURTYARD: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/scenarios/courtyard.toml");

fn tilegrid(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_tilegrid"))
        .args(args)
        .output()
        .expect("tilegrid binary runs")
}

fn stdout(output: &Output) -> String {
    String::from_utf8(output.stdout.clone()).expect("stdout is utf-8")
}

#[test]
fn run_prints_every_requested_tick() {
    let output = tilegrid(&["run", COURTYARD, "--ticks", "5"]);
    assert!(output.status.success(), "{output:?}");

    let text = stdout(&output);
    assert!(text.starts_with("setup\n"));
    assert!(text.contains("entity #0 placed at (2, 6)"));
    assert!(text.contains("tick 5\n"));
    assert!(!text.contains("tick 6\n"));
    assert!(text.contains("final\n"));
}

#[test]
fn exported_topology_can_be_inspected() {
    let export = tilegrid(&["topology", "export", COURTYARD]);
    assert!(export.status.success(), "{export:?}");
    let encoded = stdout(&export);
    assert!(encoded.starts_with("tilegrid-topology:v1:16x10:"));

    let inspect = tilegrid(&["topology", "inspect", encoded.trim()]);
    assert!(inspect.status.success(), "{inspect:?}");
    let text = stdout(&inspect);
    assert!(text.starts_with("16x10 grid, 8 void cells\n"));
    assert!(text.contains("  3 .......#........\n"));
}

#[test]
fn missing_scenarios_fail_cleanly() {
    let output = tilegrid(&["run", "does-not-exist.toml"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("failed to read scenario"));
}
