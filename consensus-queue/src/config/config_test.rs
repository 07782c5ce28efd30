use crate::config::ConfigError;
use crate::config::QueueConfig;

#[test]
fn test_config_defaults() -> anyhow::Result<()> {
    let config = QueueConfig::default().validate()?;

    assert_eq!(128 * 1024 * 1024, config.local_soft_limit_bytes);
    assert_eq!(256 * 1024 * 1024, config.local_hard_limit_bytes);
    assert_eq!(1024 * 1024 * 1024, config.global_soft_limit_bytes);
    assert_eq!(1024 * 1024 * 1024, config.global_hard_limit_bytes);
    assert_eq!(1024 * 1024, config.max_batch_size_bytes);
    assert!(!config.dump_on_full);

    Ok(())
}

#[test]
fn test_config_from_args() -> anyhow::Result<()> {
    let config = QueueConfig::build(&[
        "queue",
        "--local-soft-limit-bytes=5 MiB",
        "--local-hard-limit-bytes=10 MiB",
        "--max-batch-size-bytes=4096",
        "--dump-on-full",
    ])?;

    assert_eq!(5 * 1024 * 1024, config.local_soft_limit_bytes);
    assert_eq!(10 * 1024 * 1024, config.local_hard_limit_bytes);
    assert_eq!(4096, config.max_batch_size_bytes);
    assert!(config.dump_on_full);

    Ok(())
}

#[test]
fn test_invalid_bytes_string() {
    let res = QueueConfig::build(&["queue", "--local-soft-limit-bytes=fifty"]);
    assert!(matches!(res, Err(ConfigError::ParseError { .. })));
}

#[test]
fn test_soft_limit_above_hard_is_rejected() {
    let config = QueueConfig {
        local_soft_limit_bytes: 100,
        local_hard_limit_bytes: 50,
        ..Default::default()
    };
    assert_eq!(
        Err(ConfigError::SoftLimitAboveHard {
            scope: "local",
            soft: 100,
            hard: 50,
        }),
        config.validate()
    );

    let config = QueueConfig {
        global_soft_limit_bytes: 2048,
        global_hard_limit_bytes: 1024,
        ..Default::default()
    };
    assert_eq!(
        Err(ConfigError::SoftLimitAboveHard {
            scope: "global",
            soft: 2048,
            hard: 1024,
        }),
        config.validate()
    );
}

#[test]
fn test_zero_batch_size_is_rejected() {
    let config = QueueConfig {
        max_batch_size_bytes: 0,
        ..Default::default()
    };
    assert_eq!(Err(ConfigError::MaxBatchSizeIs0), config.validate());
}
