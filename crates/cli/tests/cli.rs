use assert_cmd::Command;

const CONTAINER_ENV: &[(&str, &str)] = &[
    ("MONGO_INITDB_ROOT_USERNAME", "root"),
    ("MONGO_INITDB_ROOT_PASSWORD", "rootpass"),
    ("MONGO_USER", "pokeuser"),
    ("MONGO_PASSWORD", "pokepass"),
    ("MONGO_DB", "pokemon"),
];

fn pokebattle() -> Command {
    let mut cmd = Command::cargo_bin("pokebattle").unwrap();
    cmd.env("POKEBATTLE_CONFIG_DIR", "/nonexistent/pokebattle-config")
        .env_remove("POKEBATTLE_ENV")
        .env_remove("RUST_LOG");
    for (name, _) in CONTAINER_ENV {
        cmd.env_remove(name);
    }
    cmd
}

fn with_container_env(mut cmd: Command) -> Command {
    for (name, value) in CONTAINER_ENV {
        cmd.env(name, value);
    }
    cmd
}

#[test]
fn config_prints_redacted_settings() {
    let output = with_container_env(pokebattle())
        .arg("config")
        .output()
        .unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    let printed: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(printed["bootstrap"]["app_username"], "pokeuser");
    assert_eq!(printed["bootstrap"]["app_database"], "pokemon");
    assert_eq!(printed["bootstrap"]["collection"], "battle");
    assert!(!stdout.contains("rootpass"));
    assert!(!stdout.contains("pokepass"));
}

#[test]
fn dry_run_bootstrap_provisions_in_memory() {
    let output = with_container_env(pokebattle())
        .args(["bootstrap", "--dry-run"])
        .output()
        .unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("provisioned user 'pokeuser'"));
    assert!(stdout.contains("collection 'battle'"));
}

#[test]
fn dry_run_verify_reports_provisioned_state() {
    with_container_env(pokebattle())
        .args(["verify", "--dry-run"])
        .assert()
        .success();
}

#[test]
fn dry_run_without_app_password_fails() {
    let output = with_container_env(pokebattle())
        .env("MONGO_PASSWORD", "")
        .args(["bootstrap", "--dry-run"])
        .output()
        .unwrap();

    assert!(!output.status.success());
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("create_user"));
}

#[test]
fn unsupported_environment_fails_to_load() {
    pokebattle()
        .env("POKEBATTLE_ENV", "qa")
        .arg("config")
        .assert()
        .failure();
}
