use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn vitiscrap_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("vitiscrap");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    // Port 1 on loopback refuses connections, so every scrape fails fast.
    let config_content = format!(
        r#"[db]
path = "{}/data/vitiscrap.sqlite"

[server]
bind = "127.0.0.1:8931"

[auth]
secret_key = "integration-secret"
token_expire_minutes = 30

[scrape]
base_url = "http://127.0.0.1:1/index.php"
timeout_secs = 2
"#,
        root.display()
    );

    let config_path = config_dir.join("vitiscrap.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_vitiscrap(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = vitiscrap_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .env_remove("VITISCRAP_SECRET_KEY")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run vitiscrap binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

#[test]
fn test_init_creates_database() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_vitiscrap(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
    assert!(tmp.path().join("data/vitiscrap.sqlite").exists());
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success1) = run_vitiscrap(&config_path, &["init"]);
    assert!(success1, "First init failed");

    let (_, _, success2) = run_vitiscrap(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_user_add_and_duplicate() {
    let (_tmp, config_path) = setup_test_env();
    run_vitiscrap(&config_path, &["init"]);

    let args = [
        "user",
        "add",
        "--username",
        "usuario1",
        "--password",
        "senha123",
        "--email",
        "u1@email.com",
    ];
    let (stdout, stderr, success) = run_vitiscrap(&config_path, &args);
    assert!(success, "user add failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("created user usuario1"));

    let (_, stderr, success) = run_vitiscrap(&config_path, &args);
    assert!(!success, "duplicate user add should fail");
    assert!(stderr.contains("already exists"), "stderr: {}", stderr);
}

#[test]
fn test_fetch_rejects_invalid_year() {
    let (_tmp, config_path) = setup_test_env();
    run_vitiscrap(&config_path, &["init"]);

    let (_, stderr, success) = run_vitiscrap(&config_path, &["fetch", "--ano", "1969"]);
    assert!(!success);
    assert!(stderr.contains("invalid year"), "stderr: {}", stderr);
}

#[test]
fn test_fetch_site_down_without_backup() {
    let (_tmp, config_path) = setup_test_env();
    run_vitiscrap(&config_path, &["init"]);

    let (stdout, stderr, success) = run_vitiscrap(
        &config_path,
        &["fetch", "--ano", "2020", "--opcao", "Produção"],
    );
    assert!(!success, "fetch should fail: stdout={}", stdout);
    assert!(stderr.contains("no local backup"), "stderr: {}", stderr);
}

#[test]
fn test_missing_config_fails() {
    let tmp = TempDir::new().unwrap();
    let (_, stderr, success) = run_vitiscrap(&tmp.path().join("nope.toml"), &["init"]);
    assert!(!success);
    assert!(stderr.contains("Failed to read config file"), "stderr: {}", stderr);
}
