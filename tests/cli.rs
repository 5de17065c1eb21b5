use std::io::Write;

use assert_cmd::Command;
use tempfile::NamedTempFile;

fn louvain() -> Command {
    Command::cargo_bin("louvain").unwrap()
}

fn two_triangles() -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    for (a, b) in [(0, 1), (1, 2), (2, 0), (13, 14), (14, 15), (15, 13)] {
        writeln!(file, "{} {}", a, b).unwrap();
    }
    file
}

#[test]
fn test_tsv_output() {
    let graph = two_triangles();
    let output = louvain()
        .arg(graph.path())
        .args(["--concurrency", "1"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines, vec!["0\t0", "1\t0", "2\t0", "13\t1", "14\t1", "15\t1"]);
}

#[test]
fn test_json_output() {
    let graph = two_triangles();
    let output = louvain()
        .arg(graph.path())
        .args(["--concurrency", "1", "--format", "json", "--intermediate"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let document: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(document["levels"], 1);
    assert_eq!(document["community_count"], 2);
    assert!((document["modularity"].as_f64().unwrap() - 0.5).abs() < 1e-9);
    assert_eq!(document["nodes"][3]["node_id"], 13);
    assert_eq!(document["nodes"][3]["intermediate_communities"], serde_json::json!([1]));
}

#[test]
fn test_graph_file_with_seed_and_output_file() {
    let mut graph = tempfile::Builder::new().suffix(".graph").tempfile().unwrap();
    writeln!(graph, "t 6 6").unwrap();
    for node in 0..6 {
        writeln!(graph, "v {} 0 {}", node, if node < 3 { 1 } else { 2 }).unwrap();
    }
    for (a, b) in [(0, 1), (1, 2), (2, 0), (3, 4), (4, 5), (5, 3)] {
        writeln!(graph, "e {} {}", a, b).unwrap();
    }
    let out = NamedTempFile::new().unwrap();

    louvain()
        .arg(graph.path())
        .args(["--concurrency", "1", "--seed-property", "community", "--output"])
        .arg(out.path())
        .assert()
        .success();
    let written = std::fs::read_to_string(out.path()).unwrap();
    assert_eq!(written.lines().count(), 6);
    assert!(written.starts_with("0\t0\n"));
}

#[test]
fn test_config_file() {
    let graph = two_triangles();
    let mut config = NamedTempFile::new().unwrap();
    writeln!(config, "max_levels: 1").unwrap();
    writeln!(config, "concurrency: 1").unwrap();
    louvain()
        .arg(graph.path())
        .arg("--config")
        .arg(config.path())
        .assert()
        .success();
}

#[test]
fn test_invalid_arguments() {
    let graph = two_triangles();
    louvain().arg(graph.path()).args(["--max-levels", "0"]).assert().failure();
    louvain().arg(graph.path()).args(["--seed-property", "missing"]).assert().failure();
    louvain().arg("/nonexistent/graph.txt").assert().failure();
}
