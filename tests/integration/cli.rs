use std::process::Command;

fn arcdream() -> Command {
    Command::new(env!("CARGO_BIN_EXE_arcdream"))
}

#[test]
fn test_explore_prints_solution() {
    let output = arcdream()
        .args([
            "explore",
            "--primitives",
            "scenario",
            "--program",
            "rep_t(fill(0, 3, 3), 2)",
            "--grid",
            "[[[1, 1]]]",
            "-j",
            "2",
            "--timeout",
            "60",
        ])
        .output()
        .expect("Failed to execute arcdream");

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(stdout.contains("rep_t(fill(0, 3, 3), 2) (6 nodes"), "{}", stdout);
    assert!(stdout.contains("fill(1, 1, 2)"), "{}", stdout);
    assert!(stdout.contains("Solved 2/2 targets"), "{}", stdout);
}

#[test]
fn test_explore_rejects_ragged_grid() {
    let output = arcdream()
        .args(["explore", "--grid", "[[[1, 1], [1]]]"])
        .output()
        .expect("Failed to execute arcdream");
    assert!(!output.status.success());
}

#[test]
fn test_dream_saves_a_library_explore_can_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("library.json");

    let output = arcdream()
        .args([
            "dream",
            "--primitives",
            "scenario",
            "--count",
            "4",
            "--rounds",
            "1",
            "--max-cost",
            "12",
            "--timeout",
            "60",
            "-j",
            "2",
            "--save",
        ])
        .arg(&path)
        .output()
        .expect("Failed to execute arcdream");
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(path.exists());

    let output = arcdream()
        .args(["explore", "--primitives", "scenario", "--max-cost", "12", "--library"])
        .arg(&path)
        .output()
        .expect("Failed to execute arcdream");
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Solved 1/1 targets"), "{}", stdout);
}
