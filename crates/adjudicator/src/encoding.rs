//! Binary layout of PCTS script args ([ChannelConstants]) and cell data ([ChannelStatus]).
//!
//! Integers are little-endian, booleans are a single `0` or `1` byte, and decoding
//! rejects trailing bytes, so every value has exactly one encoding.

use crate::types::{
    ChannelConstants, ChannelId, ChannelParams, ChannelState, ChannelStatus, ChannelToken,
    HashType, OutPoint,
};
use anyhow::Result;
use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};

pub const OUT_POINT_LEN: usize = 32 + 4;
pub const PARAMS_LEN: usize = 33 + 33 + 32 + 8 + 1 + 1;
pub const CONSTANTS_LEN: usize = PARAMS_LEN + (32 + 1) * 2 + 8 + OUT_POINT_LEN;

type Blake2b256 = Blake2b<U32>;

pub fn blake2b_256(data: &[u8]) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&Blake2b256::digest(data));
    out
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
    what: &'static str,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8], what: &'static str) -> Self {
        Self { data, pos: 0, what }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let left = self.data.len() - self.pos;
        if left < n {
            anyhow::bail!(
                "{}: need {} bytes at offset {}, {} left",
                self.what,
                n,
                self.pos,
                left
            );
        }
        let out = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn bool(&mut self) -> Result<bool> {
        match self.u8()? {
            0 => Ok(false),
            1 => Ok(true),
            b => anyhow::bail!("{}: invalid bool byte {} at offset {}", self.what, b, self.pos - 1),
        }
    }

    fn u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    fn u64(&mut self) -> Result<u64> {
        Ok(u64::from_le_bytes(self.array()?))
    }

    fn hash_type(&mut self) -> Result<HashType> {
        let b = self.u8()?;
        HashType::from_u8(b).ok_or_else(|| anyhow::anyhow!("{}: invalid hash type {}", self.what, b))
    }

    fn finish(self) -> Result<()> {
        if self.pos != self.data.len() {
            anyhow::bail!(
                "{}: {} trailing bytes",
                self.what,
                self.data.len() - self.pos
            );
        }
        Ok(())
    }
}

fn put_out_point(out: &mut Vec<u8>, op: &OutPoint) {
    out.extend_from_slice(&op.tx_hash);
    out.extend_from_slice(&op.index.to_le_bytes());
}

fn put_params(out: &mut Vec<u8>, params: &ChannelParams) {
    out.extend_from_slice(&params.party_a);
    out.extend_from_slice(&params.party_b);
    out.extend_from_slice(&params.nonce);
    out.extend_from_slice(&params.challenge_duration.to_le_bytes());
    out.push(params.is_ledger_channel as u8);
    out.push(params.is_virtual_channel as u8);
}

fn read_params(r: &mut Reader<'_>) -> Result<ChannelParams> {
    Ok(ChannelParams {
        party_a: r.array()?,
        party_b: r.array()?,
        nonce: r.array()?,
        challenge_duration: r.u64()?,
        is_ledger_channel: r.bool()?,
        is_virtual_channel: r.bool()?,
    })
}

pub fn encode_params(params: &ChannelParams) -> Vec<u8> {
    let mut out = Vec::with_capacity(PARAMS_LEN);
    put_params(&mut out, params);
    out
}

pub fn decode_params(data: &[u8]) -> Result<ChannelParams> {
    let mut r = Reader::new(data, "channel params");
    let params = read_params(&mut r)?;
    r.finish()?;
    Ok(params)
}

pub fn encode_constants(c: &ChannelConstants) -> Vec<u8> {
    let mut out = Vec::with_capacity(CONSTANTS_LEN);
    put_params(&mut out, &c.params);
    out.extend_from_slice(&c.pcls_code_hash);
    out.push(c.pcls_hash_type as u8);
    out.extend_from_slice(&c.pfls_code_hash);
    out.push(c.pfls_hash_type as u8);
    out.extend_from_slice(&c.pfls_min_capacity.to_le_bytes());
    put_out_point(&mut out, &c.thread_token.0);
    out
}

/// Decode PCTS type script args.
pub fn decode_constants(args: &[u8]) -> Result<ChannelConstants> {
    let mut r = Reader::new(args, "channel constants");
    let constants = ChannelConstants {
        params: read_params(&mut r)?,
        pcls_code_hash: r.array()?,
        pcls_hash_type: r.hash_type()?,
        pfls_code_hash: r.array()?,
        pfls_hash_type: r.hash_type()?,
        pfls_min_capacity: r.u64()?,
        thread_token: ChannelToken(OutPoint {
            tx_hash: r.array()?,
            index: r.u32()?,
        }),
    };
    r.finish()?;
    Ok(constants)
}

pub fn encode_status(s: &ChannelStatus) -> Vec<u8> {
    let mut out = Vec::with_capacity(32 + 8 * 3 + 3 + 4 + s.state.app_data.len());
    out.extend_from_slice(s.state.channel_id.as_bytes());
    out.extend_from_slice(&s.state.version.to_le_bytes());
    out.extend_from_slice(&s.state.balances[0].to_le_bytes());
    out.extend_from_slice(&s.state.balances[1].to_le_bytes());
    out.push(s.state.is_final as u8);
    out.push(s.funded as u8);
    out.push(s.disputed as u8);
    out.extend_from_slice(&(s.state.app_data.len() as u32).to_le_bytes());
    out.extend_from_slice(&s.state.app_data);
    out
}

/// Decode PCTS cell output data.
pub fn decode_status(data: &[u8]) -> Result<ChannelStatus> {
    let mut r = Reader::new(data, "channel status");
    let channel_id = ChannelId(r.array()?);
    let version = r.u64()?;
    let balances = [r.u64()?, r.u64()?];
    let is_final = r.bool()?;
    let funded = r.bool()?;
    let disputed = r.bool()?;
    let app_data_len = r.u32()? as usize;
    let app_data = r.take(app_data_len)?.to_vec();
    r.finish()?;
    Ok(ChannelStatus {
        state: ChannelState {
            channel_id,
            version,
            balances,
            is_final,
            app_data,
        },
        funded,
        disputed,
    })
}
