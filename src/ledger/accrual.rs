//! Reward accrual
//!
//! `reward = floor(principal * rate * elapsed / (unit_scale * SECONDS_PER_DAY))`
//!
//! A single division happens at the end of each settlement, so truncation
//! is lost independently per settlement: many short settlements never pay
//! more than one settlement over the same span.

use super::error::LedgerError;
use crate::types::{StakePosition, SECONDS_PER_DAY};

/// Reward rate parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccrualParams {
    /// Yield units per `unit_scale` base units per day
    pub rate_per_unit_per_day: u128,
    /// Base units per whole staked unit
    pub unit_scale: u128,
}

impl AccrualParams {
    pub fn new(rate_per_unit_per_day: u128, unit_scale: u128) -> Self {
        Self {
            rate_per_unit_per_day,
            unit_scale,
        }
    }

    /// Reward for `principal` held over `elapsed` seconds
    pub fn reward(&self, principal: u64, elapsed: u64) -> Result<u128, LedgerError> {
        if principal == 0 || elapsed == 0 || self.rate_per_unit_per_day == 0 {
            return Ok(0);
        }

        let numerator = (principal as u128)
            .checked_mul(self.rate_per_unit_per_day)
            .and_then(|v| v.checked_mul(elapsed as u128))
            .ok_or(LedgerError::RewardTooLarge)?;
        let denominator = self
            .unit_scale
            .checked_mul(SECONDS_PER_DAY as u128)
            .ok_or(LedgerError::RewardTooLarge)?;

        Ok(numerator / denominator)
    }
}

/// Settle pending accrual for `position` at `now`
///
/// Untouched and empty positions only have their clock stamped. The stamp
/// never moves backwards, so a clock that steps back cannot shift accrual
/// into the future.
pub fn settle(position: &mut StakePosition, params: &AccrualParams, now: u64) -> Result<(), LedgerError> {
    if !position.is_touched() || position.principal.is_empty() {
        position.last_accrual_time = position.last_accrual_time.max(now);
        return Ok(());
    }

    let elapsed = now.saturating_sub(position.last_accrual_time);
    if elapsed == 0 {
        return Ok(());
    }

    let reward = params.reward(position.plain_amount(), elapsed)?;
    position.accrued_rewards = position
        .accrued_rewards
        .checked_add(reward)
        .ok_or(LedgerError::RewardTooLarge)?;
    position.last_accrual_time = now;
    Ok(())
}

/// Owed rewards plus the live projection at `now`, without settling
pub fn pending(position: &StakePosition, params: &AccrualParams, now: u64) -> Result<u128, LedgerError> {
    if !position.is_touched() || position.principal.is_empty() {
        return Ok(position.accrued_rewards);
    }

    let elapsed = now.saturating_sub(position.last_accrual_time);
    let live = params.reward(position.plain_amount(), elapsed)?;
    position
        .accrued_rewards
        .checked_add(live)
        .ok_or(LedgerError::RewardTooLarge)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ConfidentialPrincipal, Handle, UNIT_SCALE};

    const RATE: u128 = 1_000_000;

    fn params() -> AccrualParams {
        AccrualParams::new(RATE, UNIT_SCALE)
    }

    fn position(amount: u64, last: u64) -> StakePosition {
        StakePosition {
            principal: ConfidentialPrincipal::new(Handle([1; 32]), amount),
            last_accrual_time: last,
            ..Default::default()
        }
    }

    #[test]
    fn test_one_unit_one_day() {
        assert_eq!(params().reward(UNIT_SCALE as u64, SECONDS_PER_DAY).unwrap(), RATE);
    }

    #[test]
    fn test_settle_stamps_untouched() {
        let mut pos = StakePosition::default();
        settle(&mut pos, &params(), 1_000).unwrap();
        assert_eq!(pos.last_accrual_time, 1_000);
        assert_eq!(pos.accrued_rewards, 0);
    }

    #[test]
    fn test_settle_empty_position_no_accrual() {
        let mut pos = position(0, 100);
        pos.accrued_rewards = 9;
        settle(&mut pos, &params(), 100 + SECONDS_PER_DAY).unwrap();
        assert_eq!(pos.accrued_rewards, 9);
        assert_eq!(pos.last_accrual_time, 100 + SECONDS_PER_DAY);
    }

    #[test]
    fn test_settle_keeps_stamp_when_clock_steps_back() {
        let mut empty = position(0, 5_000);
        settle(&mut empty, &params(), 4_000).unwrap();
        assert_eq!(empty.last_accrual_time, 5_000);

        let mut staked = position(UNIT_SCALE as u64, 5_000);
        settle(&mut staked, &params(), 4_000).unwrap();
        assert_eq!(staked.last_accrual_time, 5_000);
        assert_eq!(staked.accrued_rewards, 0);

        // Back at the original stamp plus a day, exactly one day is paid
        settle(&mut staked, &params(), 5_000 + SECONDS_PER_DAY).unwrap();
        assert_eq!(staked.accrued_rewards, RATE);
    }

    #[test]
    fn test_settle_zero_elapsed_is_noop() {
        let mut pos = position(UNIT_SCALE as u64, 500);
        let before = pos.clone();
        settle(&mut pos, &params(), 500).unwrap();
        assert_eq!(pos, before);
    }

    #[test]
    fn test_split_settlement_never_exceeds_single() {
        // 3/7 of a unit over an uneven span; each half rounds down on its own
        let amount = 3 * UNIT_SCALE as u64 / 7;
        let span = 3 * SECONDS_PER_DAY + 17;

        let mut once = position(amount, 1);
        settle(&mut once, &params(), 1 + span).unwrap();

        let mut twice = position(amount, 1);
        settle(&mut twice, &params(), 1 + span / 2).unwrap();
        settle(&mut twice, &params(), 1 + span).unwrap();

        assert!(twice.accrued_rewards < once.accrued_rewards);
    }

    #[test]
    fn test_split_settlement_exact_when_divisible() {
        let mut once = position(UNIT_SCALE as u64, 1);
        settle(&mut once, &params(), 1 + 2 * SECONDS_PER_DAY).unwrap();

        let mut twice = position(UNIT_SCALE as u64, 1);
        settle(&mut twice, &params(), 1 + SECONDS_PER_DAY).unwrap();
        settle(&mut twice, &params(), 1 + 2 * SECONDS_PER_DAY).unwrap();

        assert_eq!(once.accrued_rewards, 2 * RATE);
        assert_eq!(twice.accrued_rewards, once.accrued_rewards);
    }

    #[test]
    fn test_pending_does_not_mutate() {
        let pos = position(UNIT_SCALE as u64, 10);
        assert_eq!(pending(&pos, &params(), 10 + SECONDS_PER_DAY).unwrap(), RATE);
        assert_eq!(pos.accrued_rewards, 0);
        assert_eq!(pos.last_accrual_time, 10);
    }

    #[test]
    fn test_overflowing_product() {
        let huge = AccrualParams::new(u128::MAX / 2, 1);
        assert_eq!(huge.reward(u64::MAX, 10), Err(LedgerError::RewardTooLarge));
    }
}
