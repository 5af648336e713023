//! Discovery: finds the live PCTS cell backing a channel.
//!
//! All live cells of the channel type script are fetched, then filtered either by
//! thread token (exact instance) or by the channel id embedded in the cell data.
//! The first match wins; constants and status of a result always come from one cell.

use crate::client::{CellSource, ClientError, LedgerClient, LiveCell};
use crate::encoding::{decode_constants, decode_status};
use crate::types::{BlockNumber, ChannelId, ChannelToken, LiveChannel, Script, ScriptPattern};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// [LedgerClient] over any [CellSource].
#[derive(Debug, Clone)]
pub struct Discovery<S> {
    source: S,
    pcts: ScriptPattern,
}

impl<S: CellSource> Discovery<S> {
    pub fn new(source: S, pcts: ScriptPattern) -> Self {
        Self { source, pcts }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn pcts(&self) -> &ScriptPattern {
        &self.pcts
    }
}

fn channel_script<'a>(cell: &'a LiveCell, pcts: &ScriptPattern) -> Option<&'a Script> {
    cell.type_script.as_ref().filter(|s| s.matches(pcts))
}

/// First cell in `cells` whose constants carry `token`.
pub fn find_with_token(
    cells: &[LiveCell],
    pcts: &ScriptPattern,
    token: &ChannelToken,
) -> Result<LiveChannel, ClientError> {
    for cell in cells {
        let Some(script) = channel_script(cell, pcts) else {
            continue;
        };
        let constants = match decode_constants(&script.args) {
            Ok(c) if c.thread_token == *token => c,
            Ok(_) => continue,
            Err(e) => {
                tracing::trace!(reason = %e, out_point = %cell.out_point, "skipping cell with undecodable args");
                continue;
            }
        };
        let status = decode_status(&cell.output_data).map_err(|e| ClientError::Decode(e.to_string()))?;
        return Ok(LiveChannel {
            block_number: cell.block_number,
            constants,
            status,
        });
    }
    Err(ClientError::NotFound(format!("channel for channel token {}", token)))
}

/// First cell in `cells` whose status carries `id`.
///
/// Only the id inside the status is compared: the type script checks on channel start
/// that it matches the params.
pub fn find_with_id(
    cells: &[LiveCell],
    pcts: &ScriptPattern,
    id: &ChannelId,
) -> Result<LiveChannel, ClientError> {
    for cell in cells {
        let Some(script) = channel_script(cell, pcts) else {
            continue;
        };
        let status = match decode_status(&cell.output_data) {
            Ok(s) if s.state.channel_id == *id => s,
            Ok(_) => continue,
            Err(e) => {
                tracing::trace!(reason = %e, out_point = %cell.out_point, "skipping cell with undecodable data");
                continue;
            }
        };
        let constants = decode_constants(&script.args).map_err(|e| ClientError::Decode(e.to_string()))?;
        return Ok(LiveChannel {
            block_number: cell.block_number,
            constants,
            status,
        });
    }
    Err(ClientError::NotFound(format!("channel for channel id {}", id)))
}

#[async_trait]
impl<S: CellSource> LedgerClient for Discovery<S> {
    async fn find_by_token(&self, token: &ChannelToken) -> Result<LiveChannel, ClientError> {
        let cells = self.source.live_cells(&self.pcts).await?;
        find_with_token(&cells, &self.pcts, token)
    }

    async fn find_by_id(&self, id: &ChannelId) -> Result<LiveChannel, ClientError> {
        let cells = self.source.live_cells(&self.pcts).await?;
        find_with_id(&cells, &self.pcts, id)
    }

    async fn resolve_block_time(&self, block: BlockNumber) -> Result<DateTime<Utc>, ClientError> {
        self.source.block_timestamp(block).await
    }
}
