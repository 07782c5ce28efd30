//! Replication queue runtime configuration.

use std::str::FromStr;

use anyerror::AnyError;
use clap::Parser;

use crate::config::error::ConfigError;

/// Parse number with unit such as 5.3 KB
fn parse_bytes_with_unit(src: &str) -> Result<u64, ConfigError> {
    let res = byte_unit::Byte::from_str(src).map_err(|e| ConfigError::InvalidNumber {
        invalid: src.to_string(),
        reason: e.to_string(),
    })?;

    Ok(res.as_u64())
}

/// Runtime configuration for a peer message queue.
///
/// All limits are in bytes; defaults accept unit suffixes (`"128 MiB"`).
/// Soft limits govern opportunistic trimming of the all-done prefix; hard
/// limits decide admission of replicate operations. Create a configuration,
/// optionally customize fields, validate it, and pass it to
/// `PeerMessageQueue::new`:
///
/// ```
/// use consensus_queue::QueueConfig;
///
/// let config = QueueConfig {
///     max_batch_size_bytes: 4 * 1024 * 1024,
///     ..Default::default()
/// };
/// let config = config.validate()?;
/// # Ok::<(), consensus_queue::ConfigError>(())
/// ```
#[derive(Clone, Debug, Parser, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct QueueConfig {
    /// The per-queue size of consensus entries to keep in memory. This is a
    /// soft limit: messages in the queue are discarded down to it only if no
    /// peer still needs to replicate them.
    #[clap(long, default_value = "128 MiB", value_parser = parse_bytes_with_unit)]
    pub local_soft_limit_bytes: u64,

    /// The per-queue hard limit: a replicate append that would exceed it is
    /// refused.
    #[clap(long, default_value = "256 MiB", value_parser = parse_bytes_with_unit)]
    pub local_hard_limit_bytes: u64,

    /// Server-wide version of `local_soft_limit_bytes`, applied to the
    /// shared parent tracker.
    #[clap(long, default_value = "1 GiB", value_parser = parse_bytes_with_unit)]
    pub global_soft_limit_bytes: u64,

    /// Server-wide version of `local_hard_limit_bytes`.
    #[clap(long, default_value = "1 GiB", value_parser = parse_bytes_with_unit)]
    pub global_hard_limit_bytes: u64,

    /// The maximum serialized size of one outbound request. A single
    /// operation larger than this still goes out alone, otherwise an
    /// oversized op could never be sent.
    #[clap(long, default_value = "1 MiB", value_parser = parse_bytes_with_unit)]
    pub max_batch_size_bytes: u64,

    /// Whether to dump the full contents of the queue to the log when an
    /// append is refused. Mostly useful for debugging.
    // clap 4 requires `num_args = 0..=1`, or it complains about missing arg error
    // https://github.com/clap-rs/clap/discussions/4374
    #[clap(long,
           default_value_t = false,
           action = clap::ArgAction::Set,
           num_args = 0..=1,
           default_missing_value = "true"
    )]
    pub dump_on_full: bool,
}

impl Default for QueueConfig {
    fn default() -> Self {
        <Self as Parser>::parse_from(Vec::<&'static str>::new())
    }
}

impl QueueConfig {
    /// Build a `QueueConfig` instance from a series of command line
    /// arguments.
    ///
    /// The first element in `args` must be the application name.
    pub fn build(args: &[&str]) -> Result<QueueConfig, ConfigError> {
        let config = <QueueConfig as Parser>::try_parse_from(args).map_err(|e| ConfigError::ParseError {
            source: AnyError::new(&e),
            args: args.iter().map(|x| x.to_string()).collect(),
        })?;

        config.validate()
    }

    /// Validate the state of this config.
    pub fn validate(self) -> Result<QueueConfig, ConfigError> {
        if self.local_soft_limit_bytes > self.local_hard_limit_bytes {
            return Err(ConfigError::SoftLimitAboveHard {
                scope: "local",
                soft: self.local_soft_limit_bytes,
                hard: self.local_hard_limit_bytes,
            });
        }

        if self.global_soft_limit_bytes > self.global_hard_limit_bytes {
            return Err(ConfigError::SoftLimitAboveHard {
                scope: "global",
                soft: self.global_soft_limit_bytes,
                hard: self.global_hard_limit_bytes,
            });
        }

        if self.max_batch_size_bytes == 0 {
            return Err(ConfigError::MaxBatchSizeIs0);
        }

        Ok(self)
    }
}
