//! Common helpers for integration tests: channel fixtures and in-memory ledgers.
//! Some helpers are only used by specific test binaries; allow dead_code to avoid per-binary warnings.
#![allow(dead_code)]

use adjudicator::encoding::{encode_constants, encode_status};
use adjudicator::{
    BlockNumber, CellSource, ChannelConstants, ChannelId, ChannelParams, ChannelState,
    ChannelStatus, ChannelToken, ClientError, HashType, LedgerClient, LiveCell, LiveChannel,
    OutPoint, Script, ScriptPattern,
};
use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use tracing_subscriber::EnvFilter;

pub const PCTS: ScriptPattern = ScriptPattern {
    code_hash: [0x5c; 32],
    hash_type: HashType::Type,
};

pub const CHALLENGE_DURATION_MS: u64 = 60_000;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("adjudicator=debug".parse().unwrap()))
        .with_test_writer()
        .try_init();
}

pub fn params() -> ChannelParams {
    ChannelParams {
        party_a: [2; 33],
        party_b: [3; 33],
        nonce: [0x42; 32],
        challenge_duration: CHALLENGE_DURATION_MS,
        is_ledger_channel: true,
        is_virtual_channel: false,
    }
}

pub fn channel_id() -> ChannelId {
    params().channel_id()
}

pub fn challenge_duration() -> TimeDelta {
    TimeDelta::milliseconds(CHALLENGE_DURATION_MS as i64)
}

pub fn token(n: u8) -> ChannelToken {
    ChannelToken(OutPoint {
        tx_hash: [n; 32],
        index: 0,
    })
}

pub fn constants(token: ChannelToken) -> ChannelConstants {
    ChannelConstants {
        params: params(),
        pcls_code_hash: [0x1c; 32],
        pcls_hash_type: HashType::Type,
        pfls_code_hash: [0x1f; 32],
        pfls_hash_type: HashType::Type,
        pfls_min_capacity: 6_100_000_000,
        thread_token: token,
    }
}

pub fn status(funded: bool, disputed: bool, version: u64) -> ChannelStatus {
    ChannelStatus {
        state: ChannelState {
            channel_id: channel_id(),
            version,
            balances: [500, 500],
            is_final: false,
            app_data: Vec::new(),
        },
        funded,
        disputed,
    }
}

pub fn live(token: ChannelToken, status: ChannelStatus, block: BlockNumber) -> LiveChannel {
    LiveChannel {
        block_number: block,
        constants: constants(token),
        status,
    }
}

pub fn cell(token: ChannelToken, status: &ChannelStatus, block: BlockNumber) -> LiveCell {
    LiveCell {
        out_point: OutPoint {
            tx_hash: [block as u8; 32],
            index: 0,
        },
        type_script: Some(Script {
            code_hash: PCTS.code_hash,
            hash_type: PCTS.hash_type,
            args: encode_constants(&constants(token)),
        }),
        output_data: encode_status(status),
        block_number: block,
    }
}

/// Deterministic header time for `block`.
pub fn block_time(block: BlockNumber) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(1_700_000_000_000 + block as i64 * 1_000).unwrap()
}

/// Lets a test hold one poll in flight.
#[derive(Default)]
pub struct Gate {
    pub entered: Notify,
    pub release: Notify,
}

/// [LedgerClient] that answers polls from a script, then reports "not found".
#[derive(Default)]
pub struct ScriptedLedger {
    polls: Mutex<VecDeque<Result<LiveChannel, ClientError>>>,
    gate: Mutex<Option<(usize, Arc<Gate>)>>,
    block_time_failures: AtomicUsize,
    pub id_calls: AtomicUsize,
    pub token_calls: AtomicUsize,
    pub block_time_calls: AtomicUsize,
}

impl ScriptedLedger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push(&self, live: LiveChannel) {
        self.polls.lock().unwrap().push_back(Ok(live));
    }

    pub fn push_err(&self, e: ClientError) {
        self.polls.lock().unwrap().push_back(Err(e));
    }

    /// Block the poll with index `poll` (0-based) until the gate is released.
    pub fn gate_poll(&self, poll: usize) -> Arc<Gate> {
        let gate = Arc::new(Gate::default());
        *self.gate.lock().unwrap() = Some((poll, Arc::clone(&gate)));
        gate
    }

    /// Fail the next `n` block time lookups.
    pub fn fail_block_time(&self, n: usize) {
        self.block_time_failures.store(n, Ordering::SeqCst);
    }

    pub fn polls(&self) -> usize {
        self.id_calls.load(Ordering::SeqCst) + self.token_calls.load(Ordering::SeqCst)
    }

    async fn next_poll(&self, poll: usize) -> Result<LiveChannel, ClientError> {
        let gate = {
            let mut guard = self.gate.lock().unwrap();
            match guard.as_ref() {
                Some((at, _)) if *at == poll => guard.take().map(|(_, g)| g),
                _ => None,
            }
        };
        if let Some(gate) = gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }
        self.polls
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ClientError::NotFound("script exhausted".into())))
    }
}

#[async_trait]
impl LedgerClient for ScriptedLedger {
    async fn find_by_token(&self, _token: &ChannelToken) -> Result<LiveChannel, ClientError> {
        let poll = self.polls();
        self.token_calls.fetch_add(1, Ordering::SeqCst);
        self.next_poll(poll).await
    }

    async fn find_by_id(&self, _id: &ChannelId) -> Result<LiveChannel, ClientError> {
        let poll = self.polls();
        self.id_calls.fetch_add(1, Ordering::SeqCst);
        self.next_poll(poll).await
    }

    async fn resolve_block_time(&self, block: BlockNumber) -> Result<DateTime<Utc>, ClientError> {
        self.block_time_calls.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .block_time_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(ClientError::Rpc(format!("header {} unavailable", block)));
        }
        Ok(block_time(block))
    }
}

/// [CellSource] over a mutable list of live cells (kept newest first by callers).
#[derive(Default)]
pub struct MemoryCells {
    cells: Mutex<Vec<LiveCell>>,
    timestamps: Mutex<HashMap<BlockNumber, DateTime<Utc>>>,
}

impl MemoryCells {
    pub fn new(cells: Vec<LiveCell>) -> Arc<Self> {
        let source = Self::default();
        for c in &cells {
            source.timestamps.lock().unwrap().insert(c.block_number, block_time(c.block_number));
        }
        *source.cells.lock().unwrap() = cells;
        Arc::new(source)
    }

    pub fn replace(&self, cells: Vec<LiveCell>) {
        let mut timestamps = self.timestamps.lock().unwrap();
        for c in &cells {
            timestamps.insert(c.block_number, block_time(c.block_number));
        }
        *self.cells.lock().unwrap() = cells;
    }
}

#[async_trait]
impl CellSource for MemoryCells {
    async fn live_cells(&self, pattern: &ScriptPattern) -> Result<Vec<LiveCell>, ClientError> {
        Ok(self
            .cells
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.type_script.as_ref().is_some_and(|s| s.matches(pattern)))
            .cloned()
            .collect())
    }

    async fn block_timestamp(&self, block: BlockNumber) -> Result<DateTime<Utc>, ClientError> {
        self.timestamps
            .lock()
            .unwrap()
            .get(&block)
            .copied()
            .ok_or_else(|| ClientError::NotFound(format!("header of block {}", block)))
    }
}
