//! The tokenization worker. Claims `Paid` orders, submits mint transactions to the chain backend, and records
//! the outcome in the ledger.
//!
//! Mint submissions can succeed on chain even when the client-side call errors or times out, so every failed
//! attempt is followed by a lookup against the backend before the retry counter advances. An order only moves
//! to `Failed` once the whole attempt budget is spent and no transaction can be found for it.

use agrotoken_engine::{
    db_types::{Order, OrderStatusType},
    events::EventProducers,
    MediaApi,
    MediaStore,
    SettlementApi,
    SettlementLedgerDatabase,
    SqliteDatabase,
};
use chain_tools::{ChainApi, MintBackend, MintRequest, TokenMetadata};
use log::*;
use tokio::task::JoinHandle;

use crate::config::MintConfig;

const CLAIM_BATCH_SIZE: i64 = 20;

/// Starts the mint worker. Do not await the returned JoinHandle, as it will run indefinitely.
pub fn start_mint_worker(
    db: SqliteDatabase,
    producers: EventProducers,
    backend: ChainApi,
    config: MintConfig,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(config.poll_interval);
        let api = SettlementApi::new(db.clone(), producers);
        let media = MediaApi::new(db);
        info!("⛓️ Mint worker started");
        loop {
            timer.tick().await;
            run_mint_cycle(&api, &media, &backend, &config).await;
        }
    })
}

/// One pass over the mint queue. Each `Paid` order is claimed through the version-guarded transition, so
/// running several workers against the same database is safe; each order is minted by exactly one of them.
pub async fn run_mint_cycle<B, M, C>(
    api: &SettlementApi<B>,
    media: &MediaApi<M>,
    backend: &C,
    config: &MintConfig,
) where
    B: SettlementLedgerDatabase,
    M: MediaStore,
    C: MintBackend,
{
    let queue = match api.fetch_orders_in_state(OrderStatusType::Paid, CLAIM_BATCH_SIZE).await {
        Ok(orders) => orders,
        Err(e) => {
            error!("⛓️ Could not read the mint queue: {e}");
            return;
        },
    };
    trace!("⛓️ {} orders in the mint queue", queue.len());
    for order in queue {
        match api.claim_for_minting(&order).await {
            Ok(Some(claimed)) => {
                mint_order(api, media, backend, config, &claimed).await;
            },
            Ok(None) => {},
            Err(e) => {
                error!("⛓️ Could not claim order {} for minting: {e}", order.order_id);
            },
        }
    }
}

/// Drives one claimed order to `Minted` or `Failed`. Returns true if the mint was recorded.
pub async fn mint_order<B, M, C>(
    api: &SettlementApi<B>,
    media: &MediaApi<M>,
    backend: &C,
    config: &MintConfig,
    order: &Order,
) -> bool
where
    B: SettlementLedgerDatabase,
    M: MediaStore,
    C: MintBackend,
{
    let media_content_id = match media.pinned_asset_for_crop(&order.crop_id).await {
        Ok(asset) => asset.map(|a| a.content_id),
        Err(e) => {
            warn!("⛓️ Could not look up media for crop {}: {e}. Minting without media.", order.crop_id);
            None
        },
    };
    let request = MintRequest {
        order_id: order.order_id.0.clone(),
        recipient: order.buyer_id.clone(),
        metadata: TokenMetadata {
            crop_id: order.crop_id.clone(),
            amount: order.amount,
            currency: order.currency.clone(),
            media_content_id,
        },
    };
    for attempt in 1..=config.max_attempts {
        match tokio::time::timeout(config.attempt_timeout, backend.mint(&request)).await {
            Ok(Ok(receipt)) => {
                return record_mint(api, order, receipt.txid).await;
            },
            Ok(Err(e)) => {
                warn!("⛓️ Mint attempt {attempt} for order {} failed: {e}", order.order_id);
            },
            Err(_) => {
                warn!("⛓️ Mint attempt {attempt} for order {} timed out", order.order_id);
            },
        }
        // The submission may have landed on chain despite the error. Check before burning another attempt.
        match backend.find_minted(&request.order_id).await {
            Ok(Some(receipt)) => {
                info!("⛓️ Mint for order {} landed despite the failed call (tx {})", order.order_id, receipt.txid);
                return record_mint(api, order, receipt.txid).await;
            },
            Ok(None) => {},
            Err(e) => {
                warn!("⛓️ Could not check the chain for a landed mint of order {}: {e}", order.order_id);
            },
        }
        if attempt < config.max_attempts {
            tokio::time::sleep(config.backoff_base * 2u32.saturating_pow(attempt - 1)).await;
        }
    }
    error!(
        "🚨️ Mint budget exhausted for order {} after {} attempts. Marking it Failed; an operator must requeue it.",
        order.order_id, config.max_attempts
    );
    if let Err(e) = api.fail_mint(&order.order_id).await {
        error!("⛓️ Could not mark order {} as failed: {e}", order.order_id);
    }
    false
}

async fn record_mint<B: SettlementLedgerDatabase>(api: &SettlementApi<B>, order: &Order, txid: String) -> bool {
    match api.complete_mint(&order.order_id, txid).await {
        Ok(minted) => {
            info!("⛓️ Order {} minted in tx {}", minted.order_id, minted.mint_txid.as_deref().unwrap_or("?"));
            true
        },
        Err(e) => {
            error!("⛓️ Could not record the mint for order {}: {e}", order.order_id);
            false
        },
    }
}
