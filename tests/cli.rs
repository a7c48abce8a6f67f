//! Integration tests for the `testrunner` binary
//!
//! Tool paths point at small shell scripts so a complete run works without
//! a device, adb or Appium.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::TempDir;

fn testrunner() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_testrunner"));
    cmd.env("NO_COLOR", "1").env("RUST_LOG", "off");
    cmd
}

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn test_plan_prints_invocation_order() {
    let output = testrunner()
        .arg("plan")
        .arg(fixture("plan.json"))
        .output()
        .expect("Failed to run testrunner");

    assert!(output.status.success());
    let text = stdout(&output);
    let order: Vec<&str> = text
        .lines()
        .skip_while(|line| !line.starts_with("Order of tests"))
        .skip(1)
        .take_while(|line| !line.is_empty())
        .collect();
    assert_eq!(
        order,
        vec![
            "Smoke.Enter",
            "Smoke.OpenApplication",
            "Smoke.Menu.Enter",
            "Smoke.Menu.OpenSettings",
            "Smoke.Menu.CloseSettings",
            "Smoke.Menu.Exit",
            "Smoke.Draw.Enter",
            "Smoke.Draw.Line",
            "Smoke.Draw.Exit",
            "Smoke.Exit",
        ]
    );
    assert!(text.contains("10 entries, 4 tests"));
}

#[test]
fn test_yaml_and_json_plans_agree() {
    let json = testrunner()
        .arg("plan")
        .arg(fixture("plan.json"))
        .output()
        .expect("Failed to run testrunner");
    let yaml = testrunner()
        .arg("plan")
        .arg(fixture("plan.yaml"))
        .output()
        .expect("Failed to run testrunner");

    assert!(yaml.status.success());
    assert_eq!(stdout(&json), stdout(&yaml));
}

#[test]
fn test_run_without_platform_is_an_error() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("config.toml");
    fs::write(&config, "").unwrap();

    let output = testrunner()
        .args(["run", "--skip-tests", "--skip-session-run", "--config"])
        .arg(&config)
        .output()
        .expect("Failed to run testrunner");

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Error:"), "stderr: {}", stderr);
    assert!(stderr.contains("platform"), "stderr: {}", stderr);
}

#[test]
fn test_malformed_plan_is_an_error() {
    let dir = TempDir::new().unwrap();
    let plan = dir.path().join("broken.json");
    fs::write(&plan, "{ \"Smoke\": [ ").unwrap();

    let output = testrunner()
        .arg("plan")
        .arg(&plan)
        .output()
        .expect("Failed to run testrunner");

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("broken.json"));
}

#[cfg(unix)]
fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{}", body)).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

#[cfg(unix)]
#[test]
fn test_full_run_with_scripted_tools() {
    let dir = TempDir::new().unwrap();
    let adb = write_script(
        dir.path(),
        "adb",
        "case \"$1\" in\n\
         devices) printf 'List of devices attached\\nemulator-5554\\tdevice\\n\\n' ;;\n\
         esac\n",
    );
    let runner = write_script(
        dir.path(),
        "runner",
        "echo \"selected $1\"\n\
         case \"$1\" in\n\
         *CloseSettings) echo 'Overall result: Failed' ;;\n\
         *) echo 'Overall result: Passed' ;;\n\
         esac\n",
    );
    let log = dir.path().join("tests-log.log");
    let config = dir.path().join("config.toml");
    fs::write(
        &config,
        format!(
            "[general]\nplatform = \"android\"\n\n\
             [android]\nadb = {:?}\n\n\
             [runner]\nprogram = {:?}\nlog_path = {:?}\n",
            adb, runner, log
        ),
    )
    .unwrap();

    let output = testrunner()
        .args(["run", "--skip-server-run", "--skip-session-run", "--config"])
        .arg(&config)
        .arg("--plan")
        .arg(fixture("plan.json"))
        .output()
        .expect("Failed to run testrunner");

    let text = stdout(&output);
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(text.contains("Tests results:"));
    assert!(text.contains("+      |_Smoke.OpenApplication"));
    assert!(text.contains("-          |_Smoke.Menu.CloseSettings"));
    assert!(text.contains("+  |_Smoke.Exit"));

    let log = fs::read_to_string(&log).unwrap();
    assert!(log.contains("selected --test=Smoke.Menu.OpenSettings"));
    assert_eq!(log.matches("Overall result").count(), 4);
}

#[cfg(unix)]
#[test]
fn test_missing_device_still_exits_cleanly() {
    let dir = TempDir::new().unwrap();
    let adb = write_script(
        dir.path(),
        "adb",
        "printf 'List of devices attached\\n\\n'\n",
    );
    let runner = write_script(dir.path(), "runner", "echo 'Overall result: Passed'\n");
    let config = dir.path().join("config.toml");
    fs::write(
        &config,
        format!(
            "[general]\nplatform = \"android\"\n\n\
             [android]\nadb = {:?}\n\n\
             [runner]\nprogram = {:?}\nlog_path = {:?}\n",
            adb,
            runner,
            dir.path().join("tests-log.log")
        ),
    )
    .unwrap();

    let output = testrunner()
        .args(["run", "--skip-session-run", "--config"])
        .arg(&config)
        .arg("--plan")
        .arg(fixture("plan.json"))
        .output()
        .expect("Failed to run testrunner");

    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains("No devices connected"), "stdout: {}", text);
    // Nothing ran, so every test is reported as failed
    assert!(text.contains("-      |_Smoke.OpenApplication"));
}

#[cfg(unix)]
#[test]
fn test_all_stages_skipped_needs_no_test_runner() {
    let dir = TempDir::new().unwrap();
    let adb = write_script(
        dir.path(),
        "adb",
        "printf 'List of devices attached\\nemulator-5554\\tdevice\\n\\n'\n",
    );
    let empty_path = dir.path().join("empty-bin");
    fs::create_dir(&empty_path).unwrap();
    let config = dir.path().join("config.toml");
    fs::write(
        &config,
        format!("[general]\nplatform = \"android\"\n\n[android]\nadb = {:?}\n", adb),
    )
    .unwrap();

    let output = testrunner()
        .env("PATH", &empty_path)
        .args([
            "run",
            "--skip-port-forward",
            "--skip-server-run",
            "--skip-session-run",
            "--skip-tests",
            "--config",
        ])
        .arg(&config)
        .output()
        .expect("Failed to run testrunner");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(output.status.success(), "stderr: {}", stderr);
    assert!(!stderr.contains("Error:"), "stderr: {}", stderr);
    assert!(!stdout(&output).contains("Run stopped"));
}
