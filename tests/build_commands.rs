#![cfg(unix)]

mod common;

use common::Project;
use common::helpers::{PYTHON_INCLUDE, WORKSPACE};
use std::fs;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

const CONSTANTS_ONLY: &str = r#"
[[extension]]
name = "_constants"
target = "//ccpd/cc_libraries:py_constants"
kind = "shared-library"
"#;

const THERMO_POINT_ONLY: &str = r#"
[[extension]]
name = "thermo_point"
target = "//ccpd/data_types:thermo_point"
kind = "binding-module"
"#;

#[test]
fn builds_default_extensions_and_places_shared_library() {
    let project = Project::new("");

    let output = project
        .build_command(&[])
        .env("FAKE_BAZEL_ARTIFACT", "_constants.so")
        .output()
        .expect("Failed to execute ccpd-build");

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        output.status.success(),
        "build failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(stdout.contains("Building thermo_point"));
    assert!(stdout.contains("Building _constants"));
    assert!(stdout.contains("Built 2 extension(s), copied 1 shared library"));

    let placed = project.path().join("dist/ccpd/cc_libraries/_constants.so");
    assert_eq!(
        fs::read_to_string(&placed).unwrap(),
        "shared object for //ccpd/cc_libraries:py_constants"
    );

    let calls = project.bazel_calls();
    assert_eq!(calls.len(), 3, "two builds and a shutdown: {calls:?}");
    assert!(
        calls
            .first()
            .unwrap()
            .starts_with("build //ccpd/data_types:thermo_point --enable_bzlmod=false")
    );
    assert!(
        calls
            .get(1)
            .unwrap()
            .starts_with("build //ccpd/cc_libraries:py_constants --enable_bzlmod=false")
    );
    assert_eq!(calls.last().unwrap(), "shutdown");
}

#[test]
fn workspace_is_patched_during_build_and_restored_after() {
    let project = Project::new(THERMO_POINT_ONLY);

    let output = project.build_command(&[]).output().unwrap();
    assert!(output.status.success());

    let seen = fs::read_to_string(project.seen_workspace_path()).unwrap();
    assert!(seen.contains(&format!("path = \"{PYTHON_INCLUDE}\"")));
    assert!(!seen.contains("<PYTHON_INCLUDE_PATH>"));
    assert_eq!(project.workspace(), WORKSPACE);
}

#[test]
fn invocation_flags() {
    let project = Project::new(THERMO_POINT_ONLY);

    let output = project.build_command(&[]).output().unwrap();
    assert!(output.status.success());

    let calls = project.bazel_calls();
    let build = calls.first().unwrap();
    let prefix = project.path().join("bt").join("bazel-");
    assert!(build.contains(&format!("--symlink_prefix={}", prefix.display())));
    assert!(build.contains("--compilation_mode=opt"));
    assert!(build.contains("--cxxopt=-std=c++17"));
}

#[test]
fn debug_flag_selects_dbg_mode() {
    let project = Project::new(THERMO_POINT_ONLY);

    let output = project.build_command(&["--debug"]).output().unwrap();
    assert!(output.status.success());
    assert!(
        project
            .bazel_calls()
            .first()
            .unwrap()
            .contains("--compilation_mode=dbg")
    );
}

#[test]
fn failed_build_restores_workspace_and_exits_nonzero() {
    let project = Project::new("");

    let output = project
        .build_command(&[])
        .env("FAKE_BAZEL_EXIT", "2")
        .output()
        .unwrap();

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(!output.status.success());
    assert!(stderr.contains("Failed to build extension thermo_point"));
    assert_eq!(project.workspace(), WORKSPACE);

    // The first failure stops the run; the Bazel server is still shut down.
    let calls = project.bazel_calls();
    assert_eq!(calls.len(), 2, "{calls:?}");
    assert_eq!(calls.last().unwrap(), "shutdown");
}

#[test]
fn binding_module_needs_no_artifact() {
    let project = Project::new(THERMO_POINT_ONLY);

    let output = project.build_command(&[]).output().unwrap();

    assert!(
        output.status.success(),
        "{}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(!project.path().join("dist").exists());
}

#[test]
fn missing_shared_library_is_a_failure() {
    let project = Project::new(CONSTANTS_ONLY);

    let output = project.build_command(&[]).output().unwrap();

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(!output.status.success());
    assert!(stderr.contains("Failed to build extension _constants"));
    assert!(stderr.contains("failed to copy"));
    assert_eq!(project.workspace(), WORKSPACE);
}

#[test]
fn malformed_target_fails_before_any_build() {
    let project = Project::new(
        r#"
[[extension]]
name = "_constants"
target = "ccpd/cc_libraries:py_constants"
kind = "shared-library"
"#,
    );

    let output = project.build_command(&[]).output().unwrap();

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(!output.status.success());
    assert!(stderr.contains("missing `//` prefix"));
    assert!(project.bazel_calls().is_empty());
}

#[test]
fn missing_workspace_prevents_build() {
    let project = Project::new(THERMO_POINT_ONLY);
    fs::remove_file(project.path().join("WORKSPACE")).unwrap();

    let output = project.build_command(&[]).output().unwrap();

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(!output.status.success());
    assert!(stderr.contains("cannot access workspace file"));
    assert!(
        !project
            .bazel_calls()
            .iter()
            .any(|call| call.starts_with("build"))
    );
}

#[test]
fn extension_filter_builds_only_selected() {
    let project = Project::new("");

    let output = project
        .build_command(&["--extension", "thermo_point"])
        .output()
        .unwrap();

    assert!(output.status.success());
    let calls = project.bazel_calls();
    assert_eq!(calls.len(), 2, "{calls:?}");
    assert!(calls.first().unwrap().contains("//ccpd/data_types:thermo_point"));
}

#[test]
fn dry_run_prints_plan_without_running_bazel() {
    let project = Project::new("");

    let output = project.command(&["build", "--dry-run"]).output().unwrap();

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success());
    assert!(stdout.contains("build //ccpd/data_types:thermo_point"));
    assert!(stdout.contains("build //ccpd/cc_libraries:py_constants"));
    assert!(stdout.contains("_constants.so"));
    assert!(stdout.trim_end().ends_with("shutdown"));
    assert!(project.bazel_calls().is_empty());
    assert_eq!(project.workspace(), WORKSPACE);
}

#[test]
fn log_file_records_debug_lines() {
    let project = Project::new(THERMO_POINT_ONLY);
    let log = project.path().join("build.log");

    let output = project
        .command(&["--log-file", log.to_str().unwrap()])
        .args(["build", "--python-include", PYTHON_INCLUDE])
        .output()
        .unwrap();

    assert!(output.status.success());
    let log = fs::read_to_string(&log).unwrap();
    assert!(log.contains("Building extension: thermo_point"));
    assert!(log.contains("Restored"));
}

#[test]
fn list_shows_configured_extensions() {
    let project = Project::new("");

    let output = project.command(&["list"]).output().unwrap();

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success());
    assert!(stdout.contains("thermo_point (binding module)"));
    assert!(stdout.contains("_constants (shared library)"));
    assert!(stdout.contains("target: //ccpd/cc_libraries:py_constants"));
}

#[test]
fn shutdown_command_stops_bazel() {
    let project = Project::new("");

    let output = project.command(&["shutdown"]).output().unwrap();

    assert!(output.status.success());
    assert_eq!(project.bazel_calls(), vec!["shutdown".to_string()]);
}

#[test]
fn sigterm_stops_build_and_restores_workspace() {
    let project = Project::new("");

    let child = project
        .build_command(&[])
        .env("FAKE_BAZEL_SLEEP", "3")
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("Failed to start ccpd-build");

    let deadline = Instant::now() + Duration::from_secs(10);
    while !project.seen_workspace_path().exists() {
        assert!(Instant::now() < deadline, "bazel was never started");
        thread::sleep(Duration::from_millis(20));
    }
    assert_ne!(project.workspace(), WORKSPACE);

    let killed = Command::new("kill")
        .args(["-TERM", &child.id().to_string()])
        .status()
        .unwrap();
    assert!(killed.success());

    let output = child.wait_with_output().unwrap();
    let stderr = String::from_utf8_lossy(&output.stderr);

    // Exits through the error path instead of dying from the signal.
    assert_eq!(output.status.code(), Some(1), "{stderr}");
    assert!(stderr.contains("Received SIGTERM"));
    assert_eq!(project.workspace(), WORKSPACE);

    // No further extension starts, but the server is still shut down.
    let calls = project.bazel_calls();
    assert_eq!(calls.len(), 2, "{calls:?}");
    assert!(calls.first().unwrap().starts_with("build //ccpd/data_types:thermo_point"));
    assert_eq!(calls.last().unwrap(), "shutdown");
}
