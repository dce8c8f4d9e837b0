use jobdesk::config::{ConfigError, ConfigLoader};
use std::{
    env, fs,
    path::PathBuf,
    sync::{Mutex, MutexGuard, OnceLock},
};
use tempfile::TempDir;

fn env_lock() -> &'static Mutex<()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(()))
}

fn env_guard() -> MutexGuard<'static, ()> {
    env_lock()
        .lock()
        .unwrap_or_else(|poison| poison.into_inner())
}

const KEYS: &[&str] = &[
    "JOBDESK_PROFILE",
    "JOBDESK_API_BIND_ADDR",
    "JOBDESK_LOG_LEVEL",
    "JOBDESK_OPERATOR_TOKEN",
    "JOBDESK_OPERATOR_TOKENS",
    "JOBDESK_RETRY_SUCCEEDED_JOBS",
    "JOBDESK_DISCARD_MESSAGE",
    "JOBDESK_CRON_ENTRIES_PATH",
    "JOBDESK_LIST_MAX_LIMIT",
];

fn clear_env() {
    for key in KEYS {
        unsafe {
            env::remove_var(key);
        }
    }
}

fn write_env_file(dir: &TempDir, name: &str, contents: &str) {
    let path = dir.path().join(name);
    fs::write(path, contents).unwrap();
}

fn loader(dir: &TempDir) -> ConfigLoader {
    ConfigLoader::with_base_dir(PathBuf::from(dir.path()))
}

#[test]
fn loads_defaults_when_no_env_present() {
    let _guard = env_guard();
    clear_env();
    let dir = TempDir::new().unwrap();
    write_env_file(&dir, ".env", "JOBDESK_OPERATOR_TOKEN=secret\n");

    let cfg = loader(&dir).load().expect("config loads with defaults");

    assert_eq!(cfg.profile, "local");
    assert_eq!(cfg.api_bind_addr, "0.0.0.0:8080");
    assert_eq!(cfg.log_level, "info");
    assert_eq!(cfg.operator_tokens, vec!["secret".to_string()]);
    assert!(!cfg.retry_succeeded_jobs);
    assert_eq!(cfg.discard_message, "Discarded by operator");
    assert!(cfg.cron_entries_path.is_none());
    cfg.bind_addr().expect("default bind addr parses");
}

#[test]
fn layered_env_files_apply_in_order() {
    let _guard = env_guard();
    clear_env();
    let dir = TempDir::new().unwrap();

    write_env_file(
        &dir,
        ".env",
        "JOBDESK_PROFILE=dev\nJOBDESK_API_BIND_ADDR=127.0.0.1:3000\nJOBDESK_OPERATOR_TOKEN=base\n",
    );
    write_env_file(&dir, ".env.local", "JOBDESK_LOG_LEVEL=debug\n");
    write_env_file(&dir, ".env.dev", "JOBDESK_API_BIND_ADDR=127.0.0.1:4000\n");
    write_env_file(&dir, ".env.dev.local", "JOBDESK_LOG_LEVEL=trace\n");

    let cfg = loader(&dir).load().expect("config loads");

    assert_eq!(cfg.profile, "dev");
    assert_eq!(cfg.api_bind_addr, "127.0.0.1:4000");
    assert_eq!(cfg.log_level, "trace");
}

#[test]
fn environment_overrides_files() {
    let _guard = env_guard();
    clear_env();
    let dir = TempDir::new().unwrap();
    write_env_file(
        &dir,
        ".env",
        "JOBDESK_API_BIND_ADDR=127.0.0.1:3000\nJOBDESK_OPERATOR_TOKEN=base\n",
    );

    unsafe {
        env::set_var("JOBDESK_API_BIND_ADDR", "127.0.0.1:5000");
        env::set_var("JOBDESK_OPERATOR_TOKENS", "one, two,,three");
        env::set_var("JOBDESK_RETRY_SUCCEEDED_JOBS", "yes");
        env::set_var("JOBDESK_DISCARD_MESSAGE", "Stopped by on-call");
    }

    let cfg = loader(&dir).load().expect("config loads");
    clear_env();

    assert_eq!(cfg.api_bind_addr, "127.0.0.1:5000");
    assert_eq!(
        cfg.operator_tokens,
        vec!["one".to_string(), "two".to_string(), "three".to_string()]
    );
    assert!(cfg.retry_succeeded_jobs);
    assert!(cfg.retry_policy().allow_succeeded);
    assert_eq!(cfg.discard_message, "Stopped by on-call");
}

#[test]
fn relative_cron_entries_path_resolves_against_base_dir() {
    let _guard = env_guard();
    clear_env();
    let dir = TempDir::new().unwrap();
    write_env_file(
        &dir,
        ".env",
        "JOBDESK_OPERATOR_TOKEN=t\nJOBDESK_CRON_ENTRIES_PATH=config/cron.json\n",
    );

    let cfg = loader(&dir).load().expect("config loads");

    assert_eq!(
        cfg.cron_entries_path,
        Some(dir.path().join("config/cron.json"))
    );
}

#[test]
fn missing_operator_token_is_rejected_outside_test_profile() {
    let _guard = env_guard();
    clear_env();
    let dir = TempDir::new().unwrap();

    let err = loader(&dir).load().unwrap_err();
    assert!(matches!(err, ConfigError::MissingOperatorTokens));

    write_env_file(&dir, ".env", "JOBDESK_PROFILE=test\n");
    let cfg = loader(&dir).load().expect("test profile runs without tokens");
    assert!(cfg.operator_tokens.is_empty());
}

#[test]
fn invalid_values_are_reported() {
    let _guard = env_guard();
    clear_env();
    let dir = TempDir::new().unwrap();

    write_env_file(
        &dir,
        ".env",
        "JOBDESK_OPERATOR_TOKEN=t\nJOBDESK_RETRY_SUCCEEDED_JOBS=maybe\n",
    );
    let err = loader(&dir).load().unwrap_err();
    assert!(matches!(
        err,
        ConfigError::InvalidValue { key: "RETRY_SUCCEEDED_JOBS", .. }
    ));

    write_env_file(
        &dir,
        ".env",
        "JOBDESK_OPERATOR_TOKEN=t\nJOBDESK_LIST_MAX_LIMIT=5000\n",
    );
    let err = loader(&dir).load().unwrap_err();
    assert!(matches!(err, ConfigError::InvalidListMaxLimit { value: 5000 }));

    write_env_file(
        &dir,
        ".env",
        "JOBDESK_OPERATOR_TOKEN=t\nJOBDESK_API_BIND_ADDR=not-an-addr\n",
    );
    let err = loader(&dir).load().unwrap_err();
    assert!(matches!(err, ConfigError::InvalidBindAddr { .. }));
}
