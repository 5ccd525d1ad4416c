use clap::Parser;
use dupelint::cli::{Cli, Commands, ScanArgs};
use dupelint::config::{AppConfig, ConfigError};
use dupelint::duplicates::OriginalPolicy;
use dupelint::emitter::OverflowPolicy;
use dupelint::scanner::ChecksumAlgorithm;
use std::fs;
use std::sync::Mutex;
use tempfile::tempdir;

// environment variables are process-wide
static ENV_LOCK: Mutex<()> = Mutex::new(());

fn scan_args(argv: &[&str]) -> ScanArgs {
    let mut full = vec!["dupelint", "scan"];
    full.extend_from_slice(argv);
    match Cli::try_parse_from(full).unwrap().command {
        Commands::Scan(args) => args,
        Commands::Algorithms => unreachable!(),
    }
}

#[test]
fn test_config_load_from_toml() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    fs::write(
        &config_path,
        r#"
algorithm = "sha256"
io_threads = 8
original = "path"
follow_symlinks = true
ignore_patterns = ["*.tmp"]
queue_capacity = 16
overflow = "drop-oldest"
"#,
    )
    .unwrap();

    let config = AppConfig::load(Some(config_path.as_path())).unwrap();

    assert_eq!(config.algorithm, "sha256");
    assert_eq!(config.io_threads, 8);
    assert_eq!(config.original, OriginalPolicy::SmallestPath);
    assert!(config.follow_symlinks);
    assert_eq!(config.ignore_patterns, vec!["*.tmp".to_string()]);
    assert_eq!(config.queue_capacity, 16);
    assert_eq!(config.overflow, OverflowPolicy::DropOldest);
    // untouched keys keep their defaults
    assert!(config.two_stage);
    assert_eq!(config.prefix_size, 4096);
}

#[test]
fn test_missing_config_file_falls_back_to_defaults() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let temp_dir = tempdir().unwrap();

    let config = AppConfig::load(Some(temp_dir.path().join("absent.toml").as_path())).unwrap();
    assert_eq!(config, AppConfig::default());
}

#[test]
fn test_precedence_file_env_cli() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    fs::write(
        &config_path,
        "algorithm = \"md5\"\nio_threads = 2\nprefix_size = 1024\n",
    )
    .unwrap();

    std::env::set_var("DUPELINT_IO_THREADS", "6");
    std::env::set_var("DUPELINT_PREFIX_SIZE", "2048");
    let loaded = AppConfig::load(Some(config_path.as_path()));
    std::env::remove_var("DUPELINT_IO_THREADS");
    std::env::remove_var("DUPELINT_PREFIX_SIZE");
    let config = loaded.unwrap();

    assert_eq!(config.algorithm, "md5");
    assert_eq!(config.io_threads, 6);
    assert_eq!(config.prefix_size, 2048);

    let config = config.apply_scan_args(&scan_args(&[
        "/data",
        "--prefix-size",
        "8KiB",
        "--algorithm",
        "xxh3",
        "--original",
        "first",
    ]));
    assert_eq!(config.algorithm, "xxh3");
    assert_eq!(config.io_threads, 6);
    assert_eq!(config.prefix_size, 8192);
    assert_eq!(config.original, OriginalPolicy::FirstDiscovered);

    let finder = config.to_finder_config().unwrap();
    assert_eq!(finder.algorithm, ChecksumAlgorithm::Xxh3);
    assert_eq!(finder.hash_policy.prefix_size, 8192);
    assert_eq!(finder.io_threads, 6);
}

#[test]
fn test_invalid_values_are_rejected_before_scanning() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    fs::write(&config_path, "algorithm = \"crc32\"\n").unwrap();

    let err = AppConfig::load(Some(config_path.as_path())).unwrap_err();
    assert!(matches!(err, ConfigError::UnknownAlgorithm { ref name, .. } if name == "crc32"));
    assert!(err.to_string().contains("blake3"));

    fs::write(&config_path, "io_threads = 0\n").unwrap();
    assert!(matches!(
        AppConfig::load(Some(config_path.as_path())),
        Err(ConfigError::InvalidThreadCount(0))
    ));

    fs::write(&config_path, "io_threads = \"many\"\n").unwrap();
    assert!(matches!(
        AppConfig::load(Some(config_path.as_path())),
        Err(ConfigError::Load(_))
    ));
}

#[test]
fn test_cli_flags_disable_defaults() {
    let config = AppConfig::default().apply_scan_args(&scan_args(&[
        "/data",
        "--no-two-stage",
        "--no-mmap",
        "--merge-directories",
        "--strict",
        "--min-size",
        "1KB",
        "--max-size",
        "1MB",
    ]));

    assert!(!config.two_stage);
    assert!(!config.use_mmap);
    assert!(config.merge_directories);
    assert!(config.strict);
    assert_eq!(config.min_size, Some(1_000));
    assert_eq!(config.max_size, Some(1_000_000));

    let finder = config.to_finder_config().unwrap();
    assert!(!finder.hash_policy.two_stage);
    assert!(finder.strict);
    assert_eq!(finder.walker_config.min_size, Some(1_000));
}
