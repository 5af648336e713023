//! CkbRpcClient: [CellSource] over a CKB node's JSON-RPC (indexer module).
//!
//! `get_cells` with a prefix search on the type script, paginated through
//! `last_cursor`; `get_header_by_number` for block timestamps.

use crate::client::{CellSource, ClientError, LiveCell};
use crate::config::ClientConfig;
use crate::types::{BlockNumber, HashType, OutPoint, Script, ScriptPattern};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Deserialize)]
struct CellsPage {
    objects: Vec<RpcCell>,
    last_cursor: String,
}

#[derive(Debug, Deserialize)]
struct RpcCell {
    output: RpcOutput,
    output_data: Option<String>,
    out_point: RpcOutPoint,
    block_number: String,
}

#[derive(Debug, Deserialize)]
struct RpcOutput {
    #[serde(rename = "type")]
    type_script: Option<RpcScript>,
}

#[derive(Debug, Deserialize)]
struct RpcScript {
    code_hash: String,
    hash_type: String,
    args: String,
}

#[derive(Debug, Deserialize)]
struct RpcOutPoint {
    tx_hash: String,
    index: String,
}

#[derive(Debug, Deserialize)]
struct RpcHeader {
    timestamp: String,
}

fn decode_err(e: impl std::fmt::Display) -> ClientError {
    ClientError::Decode(e.to_string())
}

fn parse_hex_u64(s: &str) -> Result<u64, ClientError> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    u64::from_str_radix(s, 16).map_err(decode_err)
}

fn parse_hex_bytes(s: &str) -> Result<Vec<u8>, ClientError> {
    hex::decode(s.strip_prefix("0x").unwrap_or(s)).map_err(decode_err)
}

fn parse_hex_bytes_32(s: &str) -> Result<[u8; 32], ClientError> {
    let bytes = parse_hex_bytes(s)?;
    bytes
        .try_into()
        .map_err(|b: Vec<u8>| ClientError::Decode(format!("Expected 32 bytes, got {}", b.len())))
}

impl RpcScript {
    fn into_script(self) -> Result<Script, ClientError> {
        Ok(Script {
            code_hash: parse_hex_bytes_32(&self.code_hash)?,
            hash_type: HashType::from_name(&self.hash_type)
                .ok_or_else(|| ClientError::Decode(format!("unknown hash_type {}", self.hash_type)))?,
            args: parse_hex_bytes(&self.args)?,
        })
    }
}

impl RpcCell {
    fn into_live_cell(self) -> Result<LiveCell, ClientError> {
        let index = parse_hex_u64(&self.out_point.index)?;
        Ok(LiveCell {
            out_point: OutPoint {
                tx_hash: parse_hex_bytes_32(&self.out_point.tx_hash)?,
                index: u32::try_from(index).map_err(decode_err)?,
            },
            type_script: self.output.type_script.map(RpcScript::into_script).transpose()?,
            output_data: match self.output_data {
                Some(d) => parse_hex_bytes(&d)?,
                None => Vec::new(),
            },
            block_number: parse_hex_u64(&self.block_number)?,
        })
    }
}

/// Search key matching every cell whose type script has the given code identity.
fn build_search_key(pattern: &ScriptPattern) -> Value {
    json!({
        "script": {
            "code_hash": format!("0x{}", hex::encode(pattern.code_hash)),
            "hash_type": pattern.hash_type.as_str(),
            "args": "0x",
        },
        "script_type": "type",
        "script_search_mode": "prefix",
        "with_data": true,
    })
}

/// CKB JSON-RPC client.
#[derive(Debug, Clone)]
pub struct CkbRpcClient {
    http_client: reqwest::Client,
    url: String,
    page_size: u32,
}

impl CkbRpcClient {
    pub fn new(url: impl Into<String>, page_size: u32) -> Result<Self, ClientError> {
        let http_client = reqwest::Client::builder().no_proxy().build()?;
        Ok(Self {
            http_client,
            url: url.into(),
            page_size: page_size.max(1),
        })
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self, ClientError> {
        Self::new(config.rpc_url.clone(), config.page_size)
    }

    async fn http_json_rpc(&self, method: &str, params: Value, id: u64) -> Result<Value, ClientError> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params
        });
        let resp = self.http_client.post(&self.url).json(&body).send().await?;
        let json: Value = resp.error_for_status()?.json().await?;
        if let Some(err) = json.get("error") {
            return Err(ClientError::Rpc(err.to_string()));
        }
        json.get("result")
            .cloned()
            .ok_or_else(|| ClientError::Decode("Missing result".into()))
    }

    async fn get_cells(&self, search_key: &Value, after: Option<&str>) -> Result<CellsPage, ClientError> {
        let params = json!([
            search_key,
            "desc",
            format!("0x{:x}", self.page_size),
            after,
        ]);
        let result = self.http_json_rpc("get_cells", params, 1).await?;
        serde_json::from_value(result).map_err(decode_err)
    }

    /// Header timestamp in milliseconds, `None` if the node has no such block.
    async fn get_header_timestamp(&self, block: BlockNumber) -> Result<Option<u64>, ClientError> {
        let params = json!([format!("0x{:x}", block)]);
        let result = self.http_json_rpc("get_header_by_number", params, 2).await?;
        if result.is_null() {
            return Ok(None);
        }
        let header: RpcHeader = serde_json::from_value(result).map_err(decode_err)?;
        parse_hex_u64(&header.timestamp).map(Some)
    }
}

#[async_trait]
impl CellSource for CkbRpcClient {
    async fn live_cells(&self, pattern: &ScriptPattern) -> Result<Vec<LiveCell>, ClientError> {
        let search_key = build_search_key(pattern);
        let mut cells = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let page = self.get_cells(&search_key, cursor.as_deref()).await?;
            let count = page.objects.len();
            for cell in page.objects {
                cells.push(cell.into_live_cell()?);
            }
            tracing::debug!(count, total = cells.len(), "get_cells: page fetched");
            if count < self.page_size as usize {
                break;
            }
            cursor = Some(page.last_cursor);
        }
        Ok(cells)
    }

    async fn block_timestamp(&self, block: BlockNumber) -> Result<DateTime<Utc>, ClientError> {
        let millis = self
            .get_header_timestamp(block)
            .await?
            .ok_or_else(|| ClientError::NotFound(format!("header of block {}", block)))?;
        let millis = i64::try_from(millis).map_err(decode_err)?;
        DateTime::from_timestamp_millis(millis)
            .ok_or_else(|| ClientError::Decode(format!("timestamp {} out of range", millis)))
    }
}
