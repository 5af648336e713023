//! Dispute deadline: block time of the dispute plus the channel's challenge duration.

use crate::client::LedgerClient;
use crate::error::ProtocolViolation;
use crate::event::Timeout;
use crate::types::{BlockNumber, ChannelParams};
use chrono::{DateTime, TimeDelta, Utc};

/// Attempts to resolve a block timestamp before giving up.
pub const BLOCK_TIME_ATTEMPTS: usize = 5;

/// Challenge duration of `params` (milliseconds on-chain).
pub fn challenge_duration(params: &ChannelParams) -> Result<TimeDelta, ProtocolViolation> {
    let ms = params.challenge_duration;
    i64::try_from(ms)
        .ok()
        .and_then(TimeDelta::try_milliseconds)
        .ok_or(ProtocolViolation::ChallengeDurationOverflow(ms))
}

/// Timestamp of `block`, retried without delay up to [BLOCK_TIME_ATTEMPTS] times.
pub async fn challenge_start<C>(client: &C, block: BlockNumber) -> Result<DateTime<Utc>, ProtocolViolation>
where
    C: LedgerClient + ?Sized,
{
    let mut attempt = 1;
    loop {
        match client.resolve_block_time(block).await {
            Ok(t) => return Ok(t),
            Err(e) if attempt < BLOCK_TIME_ATTEMPTS => {
                tracing::debug!(reason = %e, block, attempt, "block time lookup failed, retrying");
                attempt += 1;
            }
            Err(e) => {
                return Err(ProtocolViolation::BlockTimeUnavailable {
                    block,
                    attempts: attempt,
                    source: e,
                })
            }
        }
    }
}

/// Deadline of a dispute registered in `block`.
pub async fn dispute_timeout<C>(
    client: &C,
    params: &ChannelParams,
    block: BlockNumber,
) -> Result<Timeout, ProtocolViolation>
where
    C: LedgerClient + ?Sized,
{
    let duration = challenge_duration(params)?;
    let start = challenge_start(client, block).await?;
    start
        .checked_add_signed(duration)
        .map(Timeout::at)
        .ok_or(ProtocolViolation::DeadlineOverflow {
            start,
            duration_ms: duration.num_milliseconds(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ClientError;
    use crate::types::{ChannelId, ChannelToken, LiveChannel};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Block clock that fails a fixed number of times before answering.
    struct FlakyClock {
        failures: usize,
        calls: AtomicUsize,
        time: DateTime<Utc>,
    }

    impl FlakyClock {
        fn new(failures: usize) -> Self {
            Self {
                failures,
                calls: AtomicUsize::new(0),
                time: DateTime::from_timestamp_millis(1_700_000_000_000).unwrap(),
            }
        }
    }

    #[async_trait]
    impl LedgerClient for FlakyClock {
        async fn find_by_token(&self, token: &ChannelToken) -> Result<LiveChannel, ClientError> {
            Err(ClientError::NotFound(token.to_string()))
        }

        async fn find_by_id(&self, id: &ChannelId) -> Result<LiveChannel, ClientError> {
            Err(ClientError::NotFound(id.to_string()))
        }

        async fn resolve_block_time(&self, block: BlockNumber) -> Result<DateTime<Utc>, ClientError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                return Err(ClientError::Rpc(format!("timeout fetching block {}", block)));
            }
            Ok(self.time)
        }
    }

    fn params(challenge_duration: u64) -> ChannelParams {
        ChannelParams {
            party_a: [2; 33],
            party_b: [3; 33],
            nonce: [0; 32],
            challenge_duration,
            is_ledger_channel: true,
            is_virtual_channel: false,
        }
    }

    #[test]
    fn duration_bounds() {
        let max = challenge_duration(&params(i64::MAX as u64)).unwrap();
        assert_eq!(max.num_milliseconds(), i64::MAX);
        let err = challenge_duration(&params(i64::MAX as u64 + 1)).unwrap_err();
        assert!(matches!(err, ProtocolViolation::ChallengeDurationOverflow(_)));
        assert_eq!(challenge_duration(&params(0)).unwrap(), TimeDelta::zero());
    }

    #[tokio::test]
    async fn deadline_is_block_time_plus_duration() {
        let clock = FlakyClock::new(0);
        let t = dispute_timeout(&clock, &params(60_000), 1000).await.unwrap();
        assert_eq!(t.deadline, clock.time + TimeDelta::seconds(60));
    }

    #[tokio::test]
    async fn four_failures_then_success() {
        let clock = FlakyClock::new(4);
        let t = dispute_timeout(&clock, &params(1_500), 7).await.unwrap();
        assert_eq!(t.deadline, clock.time + TimeDelta::milliseconds(1_500));
        assert_eq!(clock.calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn five_failures_surface_last_error() {
        let clock = FlakyClock::new(5);
        let err = challenge_start(&clock, 7).await.unwrap_err();
        assert_eq!(clock.calls.load(Ordering::SeqCst), BLOCK_TIME_ATTEMPTS);
        match err {
            ProtocolViolation::BlockTimeUnavailable { block, attempts, source } => {
                assert_eq!(block, 7);
                assert_eq!(attempts, BLOCK_TIME_ATTEMPTS);
                assert!(matches!(source, ClientError::Rpc(_)));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn oversized_duration_fails_before_block_lookup() {
        let clock = FlakyClock::new(0);
        let err = dispute_timeout(&clock, &params(u64::MAX), 1).await.unwrap_err();
        assert!(matches!(err, ProtocolViolation::ChallengeDurationOverflow(u64::MAX)));
        assert_eq!(clock.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn deadline_out_of_calendar_range() {
        let clock = FlakyClock::new(0);
        let err = dispute_timeout(&clock, &params(i64::MAX as u64), 1).await.unwrap_err();
        assert!(matches!(err, ProtocolViolation::DeadlineOverflow { .. }));
    }
}
