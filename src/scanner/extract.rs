//! Coinstake extraction.
//!
//! Turns one fetched block into the rows the store needs: a per-height
//! analytics record for every block, plus a stake event and UTXO deltas
//! when the block is proof-of-stake. Resolving input values needs extra
//! `getrawtransaction` calls, which go through the gateway like any other
//! upstream read.

use crate::error::ScanError;
use crate::gateway::Gateway;
use crate::rpc::{ChainRpc, RpcBlock, RpcTransaction};
use crate::store::EventStore;
use crate::types::{BlockAnalytics, BlockType, StakeEvent, Utxo};

/// Everything extracted from one block, not yet written.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub analytics: BlockAnalytics,
    pub event: Option<StakeEvent>,
    /// Outpoints consumed by the coinstake, to be marked spent.
    pub spent_outpoints: Vec<(String, u32)>,
    pub new_utxos: Vec<Utxo>,
}

pub async fn extract_block(
    rpc: &dyn ChainRpc,
    gateway: &Gateway,
    store: &EventStore,
    block: &RpcBlock,
    cooldown_blocks: u64,
) -> Result<Extraction, ScanError> {
    let block_type = match block.block_type.as_str() {
        "minted" => BlockType::Minted,
        "mined" => BlockType::Mined,
        other => {
            return Err(ScanError::Validation(format!(
                "block {} has unknown type '{}'",
                block.height, other
            )))
        }
    };

    if block_type == BlockType::Mined {
        // Coinbase reward only; no stake event, no UTXO bookkeeping.
        let reward = block
            .transactions
            .first()
            .map(|tx| tx.outputs.iter().map(|o| o.value).sum())
            .unwrap_or(0);
        return Ok(Extraction {
            analytics: analytics_for(block, block_type, reward, None),
            event: None,
            spent_outpoints: Vec::new(),
            new_utxos: Vec::new(),
        });
    }

    let coinstake = block.transactions.first().ok_or_else(|| {
        ScanError::Validation(format!("minted block {} has no coinstake", block.height))
    })?;

    let payout_address = coinstake
        .outputs
        .iter()
        .find_map(|o| o.address.clone())
        .ok_or_else(|| {
            ScanError::Validation(format!(
                "coinstake {} has no payout address",
                coinstake.txid
            ))
        })?;

    let stake_amount = resolve_input_value(rpc, gateway, coinstake).await?;
    let total_out: i64 = coinstake.outputs.iter().map(|o| o.value).sum();
    // The coinstake returns the staked principal plus the reward.
    let reward_amount = (total_out - stake_amount).max(0);

    let spent_outpoints: Vec<(String, u32)> = coinstake
        .inputs
        .iter()
        .filter_map(|i| Some((i.txid.clone()?, i.vout?)))
        .collect();

    let stake_age = match spent_outpoints.first() {
        Some((txid, vout)) => store
            .utxo_creation_height(txid, *vout)?
            .map(|h| block.height.saturating_sub(h))
            .unwrap_or(0),
        None => 0,
    };

    let new_utxos = coinstake
        .outputs
        .iter()
        .enumerate()
        .filter(|(_, o)| o.value > 0 && o.address.is_some())
        .map(|(vout, o)| Utxo {
            address: o.address.clone().unwrap_or_default(),
            txid: coinstake.txid.clone(),
            vout: vout as u32,
            value: o.value,
            creation_height: block.height,
            cooldown_until: block.height + cooldown_blocks,
            is_spent: false,
        })
        .collect();

    let event = StakeEvent {
        address: payout_address.clone(),
        txid: coinstake.txid.clone(),
        block_height: block.height,
        block_time: block.time,
        reward_amount,
        stake_amount,
        stake_age,
    };

    Ok(Extraction {
        analytics: analytics_for(block, block_type, reward_amount, Some(payout_address)),
        event: Some(event),
        spent_outpoints,
        new_utxos,
    })
}

/// Sum the values of the outputs a transaction's inputs reference.
/// Coinbase-style inputs without a previous outpoint contribute nothing.
async fn resolve_input_value(
    rpc: &dyn ChainRpc,
    gateway: &Gateway,
    tx: &RpcTransaction,
) -> Result<i64, ScanError> {
    let mut total = 0i64;
    for input in &tx.inputs {
        let (prev_txid, vout) = match (&input.txid, input.vout) {
            (Some(txid), Some(vout)) => (txid, vout),
            _ => continue,
        };
        let prev = gateway
            .execute_with_retry(|| rpc.get_raw_transaction(prev_txid))
            .await?;
        let value = prev
            .outputs
            .get(vout as usize)
            .map(|o| o.value)
            .ok_or_else(|| {
                ScanError::Validation(format!(
                    "input references missing output {}:{}",
                    prev_txid, vout
                ))
            })?;
        total += value;
    }
    Ok(total)
}

fn analytics_for(
    block: &RpcBlock,
    block_type: BlockType,
    reward_amount: i64,
    staker_address: Option<String>,
) -> BlockAnalytics {
    BlockAnalytics {
        height: block.height,
        hash: block.hash.clone(),
        time: block.time,
        block_type,
        difficulty: block.difficulty,
        size: block.size,
        reward_amount,
        staker_address,
    }
}
