//! Unix time → protocol epoch mapping.
//!
//! `epoch = base + floor((ts - genesis) / duration)`. Total over all `i64`
//! timestamps, including those before genesis.

use serde::{Deserialize, Serialize};

/// Shelley hard fork on Cardano mainnet (2020-07-29 21:44:51 UTC).
pub const MAINNET_GENESIS_TIMESTAMP: i64 = 1_596_059_091;
/// Five days.
pub const MAINNET_EPOCH_DURATION_SECS: i64 = 432_000;
/// Epoch index at the Shelley hard fork.
pub const MAINNET_BASE_EPOCH: i64 = 208;

/// Epoch boundary constants for one network.
///
/// Deserializing rejects a non-positive `epoch_duration_secs`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawEpochClock")]
pub struct EpochClock {
    pub genesis_timestamp: i64,
    pub epoch_duration_secs: i64,
    pub base_epoch: i64,
}

#[derive(Deserialize)]
struct RawEpochClock {
    genesis_timestamp: i64,
    epoch_duration_secs: i64,
    base_epoch: i64,
}

impl TryFrom<RawEpochClock> for EpochClock {
    type Error = String;

    fn try_from(raw: RawEpochClock) -> Result<Self, Self::Error> {
        if raw.epoch_duration_secs <= 0 {
            return Err(format!(
                "epoch_duration_secs must be positive, got {}",
                raw.epoch_duration_secs
            ));
        }
        Ok(Self::new(raw.genesis_timestamp, raw.epoch_duration_secs, raw.base_epoch))
    }
}

impl EpochClock {
    /// `epoch_duration_secs` must be positive; a non-positive value is
    /// replaced with one second so the function stays total.
    pub const fn new(genesis_timestamp: i64, epoch_duration_secs: i64, base_epoch: i64) -> Self {
        Self {
            genesis_timestamp,
            epoch_duration_secs: if epoch_duration_secs > 0 { epoch_duration_secs } else { 1 },
            base_epoch,
        }
    }

    pub const fn mainnet() -> Self {
        Self::new(
            MAINNET_GENESIS_TIMESTAMP,
            MAINNET_EPOCH_DURATION_SECS,
            MAINNET_BASE_EPOCH,
        )
    }

    /// Epoch index containing `timestamp_secs`.
    pub fn epoch_of(&self, timestamp_secs: i64) -> i64 {
        let offset = (timestamp_secs as i128) - (self.genesis_timestamp as i128);
        let epochs = offset.div_euclid(self.epoch_duration_secs as i128);
        (self.base_epoch as i128 + epochs) as i64
    }

    /// First second belonging to `epoch`.
    pub fn epoch_start(&self, epoch: i64) -> i64 {
        let delta = (epoch as i128) - (self.base_epoch as i128);
        (self.genesis_timestamp as i128 + delta * self.epoch_duration_secs as i128) as i64
    }

    /// Epoch containing the current wall-clock time.
    pub fn current_epoch(&self) -> i64 {
        self.epoch_of(chrono::Utc::now().timestamp())
    }
}

impl Default for EpochClock {
    fn default() -> Self {
        Self::mainnet()
    }
}

/// [`EpochClock::epoch_of`] over mainnet constants.
pub fn epoch_of(timestamp_secs: i64) -> i64 {
    EpochClock::mainnet().epoch_of(timestamp_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn genesis_maps_to_base_epoch() {
        assert_eq!(epoch_of(MAINNET_GENESIS_TIMESTAMP), MAINNET_BASE_EPOCH);
    }

    #[test]
    fn one_duration_later_is_next_epoch() {
        let clock = EpochClock::mainnet();
        let t = MAINNET_GENESIS_TIMESTAMP + MAINNET_EPOCH_DURATION_SECS;
        assert_eq!(clock.epoch_of(t), MAINNET_BASE_EPOCH + 1);
        assert_eq!(clock.epoch_of(t - 1), MAINNET_BASE_EPOCH);
    }

    #[test]
    fn repeated_calls_agree() {
        let t = 1_700_000_000;
        assert_eq!(epoch_of(t), epoch_of(t));
    }

    #[test]
    fn known_mainnet_epoch() {
        // 2023-11-14 22:13:20 UTC.
        assert_eq!(epoch_of(1_700_000_000), 448);
    }

    #[test]
    fn before_genesis_floors_downward() {
        let clock = EpochClock::new(1_000, 100, 10);
        assert_eq!(clock.epoch_of(999), 9);
        assert_eq!(clock.epoch_of(900), 9);
        assert_eq!(clock.epoch_of(899), 8);
    }

    #[test]
    fn monotonic_over_a_range() {
        let clock = EpochClock::new(0, 7, 0);
        let mut prev = clock.epoch_of(-50);
        for t in -49..200 {
            let e = clock.epoch_of(t);
            assert!(e >= prev);
            prev = e;
        }
    }

    #[test]
    fn epoch_start_inverts_epoch_of() {
        let clock = EpochClock::mainnet();
        for epoch in [208, 300, 451, 520] {
            let start = clock.epoch_start(epoch);
            assert_eq!(clock.epoch_of(start), epoch);
            assert_eq!(clock.epoch_of(start - 1), epoch - 1);
        }
    }

    #[test]
    fn extreme_inputs_do_not_panic() {
        let clock = EpochClock::mainnet();
        let _ = clock.epoch_of(i64::MIN);
        let _ = clock.epoch_of(i64::MAX);
    }

    #[test]
    fn zero_duration_is_coerced() {
        let clock = EpochClock::new(0, 0, 0);
        assert_eq!(clock.epoch_duration_secs, 1);
        assert_eq!(clock.epoch_of(5), 5);
    }

    #[test]
    fn deserialize_rejects_non_positive_duration() {
        for duration in [0, -432_000] {
            let json = serde_json::json!({
                "genesis_timestamp": 0,
                "epoch_duration_secs": duration,
                "base_epoch": 0,
            });
            let err = serde_json::from_value::<EpochClock>(json).unwrap_err();
            assert!(err.to_string().contains("must be positive"));
        }
    }

    #[test]
    fn deserialize_accepts_mainnet() {
        let json = serde_json::to_value(EpochClock::mainnet()).unwrap();
        let clock: EpochClock = serde_json::from_value(json).unwrap();
        assert_eq!(clock, EpochClock::mainnet());
        assert_eq!(clock.epoch_of(1_700_000_000), 448);
    }
}
