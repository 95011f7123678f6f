use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

struct CliTestEnv {
    _temp_dir: TempDir,
    home: PathBuf,
    xdg_config: PathBuf,
    xdg_state: PathBuf,
}

impl CliTestEnv {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let base = temp_dir.path().to_path_buf();
        let home = base.join("home");
        let xdg_config = base.join("xdg-config");
        let xdg_state = base.join("xdg-state");

        fs::create_dir_all(&home).expect("failed to create HOME");
        fs::create_dir_all(&xdg_config).expect("failed to create XDG_CONFIG_HOME");
        fs::create_dir_all(&xdg_state).expect("failed to create XDG_STATE_HOME");

        Self {
            _temp_dir: temp_dir,
            home,
            xdg_config,
            xdg_state,
        }
    }

    fn write_default_config(&self, content: &str) -> PathBuf {
        let path = self.xdg_config.join("pagehit/config.toml");
        write_file(&path, content);
        path
    }
}

fn write_file(path: &Path, content: &str) {
    fs::create_dir_all(path.parent().expect("missing parent")).expect("failed to create dirs");
    fs::write(path, content).expect("failed to write file");
}

fn run_bin(env: &CliTestEnv, args: &[&str]) -> Output {
    let bin_path = PathBuf::from(assert_cmd::cargo::cargo_bin!("pagehit"));

    Command::new(bin_path)
        .args(args)
        .env("HOME", &env.home)
        .env("XDG_CONFIG_HOME", &env.xdg_config)
        .env("XDG_STATE_HOME", &env.xdg_state)
        .env_remove("RUST_LOG")
        .output()
        .unwrap_or_else(|e| panic!("failed to execute pagehit: {e}"))
}

fn assert_success(args: &[&str], output: &Output) {
    if output.status.success() {
        return;
    }

    let rendered_args = args
        .iter()
        .map(|arg| OsString::from(arg).to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(" ");
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    panic!(
        "pagehit {rendered_args} failed\nstatus: {}\nstdout:\n{}\nstderr:\n{}",
        output.status, stdout, stderr
    );
}

#[test]
fn status_without_config_reports_tracking_disabled() {
    let env = CliTestEnv::new();

    let output = run_bin(&env, &["status"]);
    assert_success(&["status"], &output);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Tracking enabled:  false"), "got:\n{stdout}");
    assert!(stdout.contains("Tracking id:       <not set>"));
    assert!(stdout.contains("No hits will be sent"));

    let log_pattern = env.xdg_state.join("pagehit").join("pagehit.*.log");
    assert!(
        stdout.contains(&format!("Log files:         {}", log_pattern.display())),
        "got:\n{stdout}"
    );
}

#[test]
fn status_reads_default_config_location() {
    let env = CliTestEnv::new();
    env.write_default_config(
        r#"
[tracking]
tracking_enabled = true
tracking_id = "UA-12345-1"
delivery_mode = "detached"

[tracking.custom_dimensions]
1 = "member"
"#,
    );

    let output = run_bin(&env, &["status"]);
    assert_success(&["status"], &output);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Tracking id:       UA-12345-1"), "got:\n{stdout}");
    assert!(stdout.contains("Ready:             true"));
    assert!(stdout.contains("Delivery mode:     detached"));
    assert!(stdout.contains("member"));
    assert!(!stdout.contains("No hits will be sent"));
}

#[test]
fn status_honors_explicit_config_flag() {
    let env = CliTestEnv::new();
    let path = env.home.join("site.toml");
    write_file(
        &path,
        r#"
[server]
bind = "0.0.0.0:9000"
cp_trigger = "cp"
"#,
    );
    let path_arg = path.to_string_lossy().into_owned();
    let args = ["--config", path_arg.as_str(), "status"];

    let output = run_bin(&env, &args);
    assert_success(&args, &output);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Bind address:      0.0.0.0:9000"), "got:\n{stdout}");
    assert!(stdout.contains("Control panel:     /cp"));
}

#[test]
fn invalid_config_fails_with_message() {
    let env = CliTestEnv::new();
    env.write_default_config(
        r#"
[tracking]
endpoint_url = "not a url"
"#,
    );

    let output = run_bin(&env, &["status"]);
    assert!(!output.status.success(), "invalid config should fail");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("failed to load configuration"),
        "expected config error, got:\n{stderr}"
    );
}

#[test]
fn serve_rejects_bad_bind_address() {
    let env = CliTestEnv::new();

    let args = ["serve", "--bind", "not-an-address"];
    let output = run_bin(&env, &args);
    assert!(!output.status.success());

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("invalid bind address"), "got:\n{stderr}");
}
