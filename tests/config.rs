// tests/config.rs

mod common;
use crate::common::{ConfigFileBuilder, TestResult};

use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use tempfile::{NamedTempFile, tempdir};

use batchdag::config::{ConfigFile, RawConfigFile, load_and_validate, load_from_str};
use batchdag::errors::BatchdagError;
use batchdag::types::parse_duration;

fn no_env(_: &str) -> Option<String> {
    None
}

fn validate(toml: &str) -> Result<ConfigFile, BatchdagError> {
    let raw = load_from_str(toml)?;
    ConfigFile::from_raw_with_env(raw, no_env)
}

fn expect_config_error(toml: &str, needle: &str) {
    match validate(toml) {
        Err(BatchdagError::ConfigError(msg)) => {
            assert!(msg.contains(needle), "message {msg:?} should mention {needle:?}")
        }
        other => panic!("expected ConfigError mentioning {needle:?}, got {other:?}"),
    }
}

#[test]
fn empty_file_uses_defaults() -> TestResult {
    let cfg = validate("")?;

    assert_eq!(cfg.run.state_root, PathBuf::from("data/luigioutputs"));
    assert_eq!(cfg.run.poll_interval, Duration::from_secs(5));
    assert_eq!(cfg.run.job_timeout, Duration::from_secs(2 * 60 * 60));
    assert_eq!(cfg.run.retry.max_attempts, 3);
    assert_eq!(cfg.cluster.pool.pool_id, "AzureBatch-Pool-Id-17");
    assert_eq!(cfg.cluster.pool.node_count, 2);
    assert_eq!(cfg.cluster.mount, "/mnt/MyAzureFileShare");
    assert_eq!(cfg.video.local_path(), PathBuf::from("data/video/orangutan.mp4"));
    assert_eq!(cfg.video.framerate, 30);
    assert_eq!(cfg.style.cuda, 0);

    // Defaulted suffix is the current UTC hour: %Y%m%d%H.
    assert_eq!(cfg.video.resource_suffix.len(), 10);
    assert!(cfg.video.resource_suffix.chars().all(|c| c.is_ascii_digit()));
    Ok(())
}

#[test]
fn full_file_is_parsed() -> TestResult {
    let cfg = validate(
        r#"
[config]
state_root = "state"
poll_interval = "250ms"
job_timeout = "30m"
submit_attempts = 5
initial_backoff = "1s"
max_backoff = "1m"

[cluster]
pool_id = "gpu-pool"
node_count = 4
vm_size = "STANDARD_NC6"
work_dir = "cluster"
mount = "/mnt/share"
share_root = "share"

[video]
source_url = "https://example.com/clip.mp4"
local_root = "videos"
file_name = "clip.mp4"
styled_name = "styled_clip"
framerate = 24
resource_suffix = "run1"

[style]
artifacts = "models/artifacts.tar.gz"
cuda = 1
"#,
    )?;

    assert_eq!(cfg.run.poll_interval, Duration::from_millis(250));
    assert_eq!(cfg.run.job_timeout, Duration::from_secs(30 * 60));
    assert_eq!(cfg.run.retry.max_attempts, 5);
    assert_eq!(cfg.run.retry.max_backoff, Duration::from_secs(60));
    assert_eq!(cfg.cluster.pool.pool_id, "gpu-pool");
    assert_eq!(cfg.cluster.pool.vm_size, "STANDARD_NC6");
    assert_eq!(cfg.video.resource_suffix, "run1");
    assert_eq!(cfg.video.framerate, 24);
    assert_eq!(cfg.style.artifacts, "models/artifacts.tar.gz");

    let options = cfg.run.proxy_options();
    assert_eq!(options.poll_interval, Duration::from_millis(250));
    Ok(())
}

#[test]
fn credentials_fall_back_to_environment() -> TestResult {
    let env: HashMap<&str, &str> = HashMap::from([
        ("BATCH_ACCOUNT_NAME", "env-account"),
        ("BATCH_ACCOUNT_KEY", "env-key"),
        ("BATCH_ACCOUNT_URL", "https://env.batch"),
        ("STORAGE_ACCOUNT_NAME", "env-storage"),
        ("STORAGE_ACCOUNT_KEY", "env-storage-key"),
    ]);
    let raw = load_from_str(
        r#"
[cluster]
account_name = "file-account"
"#,
    )?;

    let cfg = ConfigFile::from_raw_with_env(raw, |k| env.get(k).map(|v| v.to_string()))?;
    let creds = &cfg.cluster.credentials;

    assert_eq!(creds.account_name.as_deref(), Some("file-account"));
    assert_eq!(creds.account_key.as_deref(), Some("env-key"));
    assert_eq!(creds.account_url.as_deref(), Some("https://env.batch"));
    assert_eq!(creds.storage_account_name.as_deref(), Some("env-storage"));
    assert_eq!(creds.storage_account_key.as_deref(), Some("env-storage-key"));
    Ok(())
}

#[test]
fn invalid_values_are_rejected() {
    expect_config_error("[config]\nsubmit_attempts = 0", "submit_attempts");
    expect_config_error("[config]\npoll_interval = \"0s\"", "poll_interval");
    expect_config_error(
        "[config]\npoll_interval = \"10s\"\njob_timeout = \"5s\"",
        "job_timeout",
    );
    expect_config_error("[config]\njob_timeout = \"5x\"", "job_timeout");
    expect_config_error("[config]\nmax_backoff = \"\"", "max_backoff");
    expect_config_error("[cluster]\nnode_count = 0", "node_count");
    expect_config_error("[cluster]\npool_id = \"  \"", "pool_id");
    expect_config_error("[video]\nframerate = 0", "framerate");
    expect_config_error("[video]\nfile_name = \"\"", "file_name");
}

#[test]
fn oversized_durations_are_rejected() {
    assert_eq!(parse_duration("90m"), Ok(Duration::from_secs(90 * 60)));
    assert_eq!(
        parse_duration("18446744073709551615ms"),
        Ok(Duration::from_millis(u64::MAX))
    );

    let err = parse_duration("18446744073709551615h").unwrap_err();
    assert!(err.contains("too large"), "got {err:?}");
    assert!(parse_duration("307445734561825861m").is_err());

    expect_config_error(
        "[config]\njob_timeout = \"18446744073709551615h\"",
        "[config].job_timeout",
    );
}

#[test]
fn malformed_toml_is_a_toml_error() {
    let err = validate("[config\nstate_root = 1").unwrap_err();
    assert!(matches!(err, BatchdagError::TomlError(_)), "got {err:?}");
}

#[test]
fn load_and_validate_reads_from_disk() -> TestResult {
    let mut file = NamedTempFile::new()?;
    writeln!(file, "[cluster]\npool_id = \"disk-pool\"\n\n[video]\nresource_suffix = \"pinned\"")?;

    let cfg = load_and_validate(file.path())?;
    assert_eq!(cfg.cluster.pool.pool_id, "disk-pool");
    assert_eq!(cfg.video.resource_suffix, "pinned");
    Ok(())
}

#[test]
fn missing_file_is_an_io_error() {
    let err = load_and_validate("/definitely/not/here/Batchdag.toml").unwrap_err();
    assert!(matches!(err, BatchdagError::IoError(_)), "got {err:?}");
}

#[test]
fn builder_roots_everything_in_the_test_dir() -> TestResult {
    let dir = tempdir()?;
    let cfg = ConfigFileBuilder::new(dir.path()).with_pool_id("test-pool").build();

    assert!(cfg.run.state_root.starts_with(dir.path()));
    assert!(cfg.cluster.work_dir.starts_with(dir.path()));
    assert_eq!(cfg.cluster.pool.pool_id, "test-pool");
    assert_eq!(cfg.video.resource_suffix, "2024010112");
    assert!(cfg.cluster.credentials.account_key.is_none());

    let raw = RawConfigFile::default();
    assert!(raw.video.resource_suffix.is_none());
    Ok(())
}
