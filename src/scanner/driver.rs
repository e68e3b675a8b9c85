//! Scan driver.
//!
//! One `Scanner` instance owns the whole ingestion pipeline: participant
//! discovery, range determination, the batched block walk, and the
//! post-scan statistics pass. All collaborators are injected; the only
//! mutable state is instance-scoped (guard flags + progress tracker).
//!
//! Concurrency model: batches run strictly in ascending height order.
//! Within a batch, up to `max_concurrent_requests` block fetches are in
//! flight at once, gated by a semaphore and drained through a `JoinSet`.
//! A failing unit is retried through the gateway, then skipped and
//! counted; it never aborts its siblings. Pause/stop flags are polled
//! only at batch boundaries, so an in-flight batch always settles.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::cache::BlockCache;
use crate::config::ScanConfig;
use crate::error::ScanError;
use crate::gateway::{now_ms, Gateway};
use crate::rpc::ChainRpc;
use crate::scanner::extract::{extract_block, Extraction};
use crate::scanner::progress::{ProgressTracker, ScanProgress, ScanState};
use crate::store::EventStore;

pub struct Scanner {
    rpc: Arc<dyn ChainRpc>,
    gateway: Arc<Gateway>,
    store: EventStore,
    cache: Arc<Mutex<BlockCache>>,
    config: ScanConfig,
    running: AtomicBool,
    paused: AtomicBool,
    stopped: AtomicBool,
    progress: Mutex<ProgressTracker>,
}

impl Scanner {
    pub fn new(
        rpc: Arc<dyn ChainRpc>,
        gateway: Arc<Gateway>,
        store: EventStore,
        mut config: ScanConfig,
    ) -> Self {
        // Zero would underflow the batch arithmetic.
        config.batch_size = config.batch_size.max(1);
        config.priority_scan_max_blocks = config.priority_scan_max_blocks.max(1);
        let cache = Arc::new(Mutex::new(BlockCache::new(config.block_cache_capacity)));
        let progress = Mutex::new(ProgressTracker::new(config.max_recorded_errors));
        Self {
            rpc,
            gateway,
            store,
            cache,
            config,
            running: AtomicBool::new(false),
            paused: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            progress,
        }
    }

    pub fn progress(&self) -> ScanProgress {
        self.progress.lock().unwrap().snapshot()
    }

    pub fn pause(&self) {
        log::info!("⏸️ scan paused (takes effect at the next batch boundary)");
        self.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        log::info!("▶️ scan resumed");
        self.paused.store(false, Ordering::SeqCst);
    }

    pub fn stop(&self) {
        log::info!("🛑 scan stop requested, letting the in-flight batch finish");
        self.stopped.store(true, Ordering::SeqCst);
    }

    /// Full bulk scan: discover participants, resume from the highest
    /// indexed height, walk to the chain tip, recompute statistics.
    pub async fn run(&self) -> Result<(), ScanError> {
        self.try_begin()?;
        let result = self.run_inner().await;
        if result.is_err() {
            self.set_state(ScanState::Error);
        }
        self.running.store(false, Ordering::SeqCst);
        result
    }

    /// Priority single-address scan, capped at `priority_scan_max_blocks`
    /// so interactive latency stays bounded. Resumes from the address's
    /// last indexed event height, defaulting to the activation height.
    pub async fn scan_address(&self, address: &str) -> Result<(), ScanError> {
        self.try_begin()?;
        let result = self.scan_address_inner(address).await;
        if result.is_err() {
            self.set_state(ScanState::Error);
        }
        self.running.store(false, Ordering::SeqCst);
        result
    }

    /// Incremental push path, driven by new-block notifications. Feeds
    /// the same store as the bulk scan, with one addition: if the stored
    /// hash at this height no longer matches the canonical one, the
    /// orphaned rows are retracted before re-extraction.
    pub async fn on_block_connected(&self, height: u64, hash: &str) -> Result<(), ScanError> {
        if let Some(stored) = self.store.stored_block_hash(height)? {
            if stored != hash {
                log::info!(
                    "🔀 reorg at height {}: {} replaced by {}",
                    height,
                    stored,
                    hash
                );
                self.store.retract_height(height)?;
            }
        }
        self.cache.lock().unwrap().invalidate(height);

        let rpc = self.rpc.as_ref();
        let block = self
            .gateway
            .execute_with_retry(|| rpc.get_block(hash))
            .await?;

        let extraction =
            extract_block(rpc, &self.gateway, &self.store, &block, self.config.cooldown_blocks)
                .await?;

        let mut touched: HashSet<String> = block
            .transactions
            .iter()
            .flat_map(|tx| tx.outputs.iter().filter_map(|o| o.address.clone()))
            .collect();
        if let Some(event) = &extraction.event {
            touched.insert(event.address.clone());
        }
        // Spent inputs change the owner's UTXO health even when the owner
        // appears nowhere in this block's outputs.
        for (txid, vout) in &extraction.spent_outpoints {
            if let Some(owner) = self.store.utxo_address(txid, *vout)? {
                touched.insert(owner);
            }
        }

        apply_extraction(&self.store, &extraction)?;
        self.cache.lock().unwrap().insert(height, block);

        // Mark known addresses this block touched so the next statistics
        // pass recomputes them.
        let known: HashSet<String> = self.store.known_addresses()?.into_iter().collect();
        for address in touched.intersection(&known) {
            self.store.mark_stale(address)?;
        }

        Ok(())
    }

    fn try_begin(&self) -> Result<(), ScanError> {
        // In-memory guard only; not safe across processes.
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(ScanError::Validation("a scan is already in progress".into()));
        }
        self.paused.store(false, Ordering::SeqCst);
        self.stopped.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn set_state(&self, state: ScanState) {
        self.progress.lock().unwrap().set_state(state);
    }

    async fn run_inner(&self) -> Result<(), ScanError> {
        self.set_state(ScanState::DiscoveringParticipants);
        self.discover_participants().await;

        self.set_state(ScanState::DeterminingRange);
        let tip = self.chain_tip().await?;
        let start = match self.store.max_indexed_height()? {
            Some(h) => h + 1,
            None => self.config.activation_height,
        };

        if start > tip {
            log::info!("✅ already at the chain tip ({}), nothing to scan", tip);
            self.set_state(ScanState::Complete);
            return Ok(());
        }

        log::info!(
            "🚀 scanning heights {}..={} ({} blocks)",
            start,
            tip,
            tip - start + 1
        );
        self.set_state(ScanState::ScanningBlocks);
        self.progress.lock().unwrap().begin(tip - start + 1, now_ms());
        self.scan_range(start, tip).await;

        self.set_state(ScanState::ComputingStatistics);
        let now = chrono::Utc::now().timestamp();
        for address in self.store.addresses_with_events()? {
            crate::stats::recompute_statistics(
                &self.store,
                &address,
                tip,
                now,
                self.config.trend_stability_band_pct,
            )?;
            self.store.clear_stale(&address)?;
        }

        self.set_state(ScanState::Complete);
        let snap = self.progress();
        log::info!(
            "✅ scan complete: {} blocks, {} events, {} errors",
            snap.processed_blocks,
            snap.events_found,
            snap.error_count
        );
        Ok(())
    }

    async fn scan_address_inner(&self, address: &str) -> Result<(), ScanError> {
        self.set_state(ScanState::DeterminingRange);
        let tip = self.chain_tip().await?;
        let start = match self.store.last_event_height(address)? {
            Some(h) => h + 1,
            None => self.config.activation_height,
        };

        if start > tip {
            self.set_state(ScanState::Complete);
            return Ok(());
        }

        let end = tip.min(start + self.config.priority_scan_max_blocks - 1);
        log::info!(
            "🔍 priority scan for {}: heights {}..={}",
            address,
            start,
            end
        );
        self.set_state(ScanState::ScanningBlocks);
        self.progress.lock().unwrap().begin(end - start + 1, now_ms());
        self.scan_range(start, end).await;

        self.set_state(ScanState::ComputingStatistics);
        crate::stats::recompute_statistics(
            &self.store,
            address,
            tip,
            chrono::Utc::now().timestamp(),
            self.config.trend_stability_band_pct,
        )?;
        self.store.clear_stale(address)?;

        self.set_state(ScanState::Complete);
        Ok(())
    }

    async fn chain_tip(&self) -> Result<u64, ScanError> {
        let rpc = self.rpc.as_ref();
        self.gateway
            .execute_with_retry(|| rpc.get_chain_height())
            .await
            .map_err(|e| {
                ScanError::FatalConfiguration(format!("cannot resolve chain tip: {}", e))
            })
    }

    /// Discovery is best-effort: on failure the scan continues against
    /// the participant set already cached in the store.
    async fn discover_participants(&self) {
        let rpc = self.rpc.as_ref();
        match self
            .gateway
            .execute_with_retry(|| rpc.list_participants())
            .await
        {
            Ok(participants) => {
                log::info!("👥 discovered {} participants", participants.len());
                for p in participants {
                    if let Err(e) = self.store.upsert_participant(&p.address, p.name.as_deref()) {
                        log::warn!("failed to cache participant {}: {}", p.address, e);
                        continue;
                    }
                    for addr in &p.primary_addresses {
                        if let Err(e) = self.store.upsert_participant(addr, p.name.as_deref()) {
                            log::warn!("failed to cache address {}: {}", addr, e);
                        }
                    }
                }
            }
            Err(e) => {
                log::warn!("⚠️ participant discovery failed, using cached set: {}", e);
            }
        }
    }

    /// The batched walk. Per-unit failures are recorded and skipped;
    /// this function itself never fails.
    async fn scan_range(&self, start: u64, end: u64) {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_requests));
        let mut next = start;

        while next <= end {
            if self.stopped.load(Ordering::SeqCst) {
                log::info!("🛑 scan stopped before height {}", next);
                break;
            }
            while self.paused.load(Ordering::SeqCst) && !self.stopped.load(Ordering::SeqCst) {
                tokio::time::sleep(Duration::from_millis(200)).await;
            }

            let batch_end = end.min(next + self.config.batch_size - 1);
            let mut set = JoinSet::new();

            for height in next..=batch_end {
                let semaphore = semaphore.clone();
                let rpc = self.rpc.clone();
                let gateway = self.gateway.clone();
                let store = self.store.clone();
                let cache = self.cache.clone();
                let cooldown_blocks = self.config.cooldown_blocks;

                set.spawn(async move {
                    let outcome = match semaphore.acquire_owned().await {
                        Ok(_permit) => {
                            index_height(
                                rpc.as_ref(),
                                &gateway,
                                &store,
                                &cache,
                                height,
                                cooldown_blocks,
                            )
                            .await
                        }
                        Err(_) => Err(ScanError::Transient("scan semaphore closed".into())),
                    };
                    (height, outcome)
                });
            }

            while let Some(joined) = set.join_next().await {
                match joined {
                    Ok((_, Ok(found_event))) => {
                        self.progress.lock().unwrap().record_block(found_event);
                    }
                    Ok((height, Err(e))) => {
                        log::warn!("⚠️ block {} skipped: {}", height, e);
                        self.progress
                            .lock()
                            .unwrap()
                            .record_error(format!("block {}: {}", height, e));
                    }
                    Err(e) => {
                        self.progress
                            .lock()
                            .unwrap()
                            .record_error(format!("scan task failed: {}", e));
                    }
                }
            }

            self.progress.lock().unwrap().recompute_eta(now_ms());
            next = batch_end + 1;
        }
    }
}

/// Fetch one block (cache first), extract, and write. Returns whether a
/// stake event was found.
async fn index_height(
    rpc: &dyn ChainRpc,
    gateway: &Gateway,
    store: &EventStore,
    cache: &Mutex<BlockCache>,
    height: u64,
    cooldown_blocks: u64,
) -> Result<bool, ScanError> {
    let cached = cache.lock().unwrap().get(height);
    let block = match cached {
        Some(block) => block,
        None => {
            let hash = gateway
                .execute_with_retry(|| rpc.get_block_hash(height))
                .await?;
            let block = gateway.execute_with_retry(|| rpc.get_block(&hash)).await?;
            cache.lock().unwrap().insert(height, block.clone());
            block
        }
    };

    let extraction = extract_block(rpc, gateway, store, &block, cooldown_blocks).await?;
    apply_extraction(store, &extraction)
}

fn apply_extraction(store: &EventStore, extraction: &Extraction) -> Result<bool, ScanError> {
    store.upsert_block_analytics(&extraction.analytics)?;
    for utxo in &extraction.new_utxos {
        store.upsert_utxo(utxo)?;
    }
    for (txid, vout) in &extraction.spent_outpoints {
        store.mark_utxo_spent(txid, *vout)?;
    }
    match &extraction.event {
        Some(event) => store.insert_stake_event(event),
        None => Ok(false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::{RpcBlock, RpcError, RpcTransaction, RpcTxInput, RpcTxOutput};
    use crate::types::{Participant, Utxo};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::AtomicU32;

    /// Deterministic chain: every even height is minted with one
    /// coinstake paying `staker-N`, odd heights are mined.
    struct FakeChain {
        tip: u64,
        fail_height: Option<u64>,
        reorged: Mutex<HashMap<u64, RpcBlock>>,
        raw_txs: Mutex<HashMap<String, RpcTransaction>>,
        block_calls: AtomicU32,
    }

    impl FakeChain {
        fn new(tip: u64) -> Self {
            Self {
                tip,
                fail_height: None,
                reorged: Mutex::new(HashMap::new()),
                raw_txs: Mutex::new(HashMap::new()),
                block_calls: AtomicU32::new(0),
            }
        }

        fn block_at(&self, height: u64) -> RpcBlock {
            if let Some(b) = self.reorged.lock().unwrap().get(&height) {
                return b.clone();
            }
            let minted = height % 2 == 0;
            let transactions = if minted {
                vec![RpcTransaction {
                    txid: format!("cs-{}", height),
                    inputs: vec![RpcTxInput { txid: None, vout: None }],
                    outputs: vec![
                        RpcTxOutput { value: 0, address: None },
                        RpcTxOutput {
                            value: 1_000 + height as i64,
                            address: Some(format!("staker-{}", height % 3)),
                        },
                    ],
                }]
            } else {
                vec![RpcTransaction {
                    txid: format!("cb-{}", height),
                    inputs: vec![],
                    outputs: vec![RpcTxOutput {
                        value: 5_000,
                        address: Some("miner".into()),
                    }],
                }]
            };
            RpcBlock {
                height,
                hash: format!("hash-{}", height),
                time: 1_700_000_000 + height as i64 * 600,
                block_type: if minted { "minted".into() } else { "mined".into() },
                difficulty: 1.0,
                size: 400,
                transactions,
            }
        }
    }

    #[async_trait]
    impl ChainRpc for FakeChain {
        async fn get_chain_height(&self) -> Result<u64, RpcError> {
            Ok(self.tip)
        }
        async fn get_block_hash(&self, height: u64) -> Result<String, RpcError> {
            if height > self.tip {
                return Err(RpcError::Rpc { code: -8, message: "out of range".into() });
            }
            Ok(self.block_at(height).hash)
        }
        async fn get_block(&self, hash: &str) -> Result<RpcBlock, RpcError> {
            self.block_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(height) = hash.strip_prefix("hash-").and_then(|h| h.parse().ok()) {
                if self.fail_height == Some(height) {
                    return Err(RpcError::Rpc { code: -5, message: "pruned".into() });
                }
                return Ok(self.block_at(height));
            }
            let reorged = self.reorged.lock().unwrap();
            reorged
                .values()
                .find(|b| b.hash == hash)
                .cloned()
                .ok_or(RpcError::Rpc { code: -5, message: "not found".into() })
        }
        async fn get_raw_transaction(&self, txid: &str) -> Result<RpcTransaction, RpcError> {
            self.raw_txs
                .lock()
                .unwrap()
                .get(txid)
                .cloned()
                .ok_or(RpcError::Rpc { code: -5, message: "not found".into() })
        }
        async fn list_participants(&self) -> Result<Vec<Participant>, RpcError> {
            Ok(vec![Participant {
                address: "staker-0".into(),
                name: Some("alice".into()),
                primary_addresses: vec![],
            }])
        }
        async fn get_participant(&self, _address: &str) -> Result<Participant, RpcError> {
            Err(RpcError::Rpc { code: -5, message: "not found".into() })
        }
    }

    fn fast_config() -> ScanConfig {
        ScanConfig {
            batch_size: 4,
            max_concurrent_requests: 3,
            min_request_spacing_ms: 0,
            requests_per_second: 100_000,
            requests_per_minute: 1_000_000,
            requests_per_hour: 10_000_000,
            burst_limit: 100_000,
            retry_initial_delay_ms: 1,
            retry_max_delay_ms: 2,
            max_retries: 1,
            activation_height: 0,
            ..ScanConfig::default()
        }
    }

    fn scanner_with(chain: Arc<FakeChain>, config: ScanConfig) -> Scanner {
        let store = EventStore::open_in_memory().unwrap();
        let gateway = Arc::new(Gateway::new(&config));
        Scanner::new(chain, gateway, store, config)
    }

    #[tokio::test]
    async fn test_full_scan_indexes_every_height() {
        let chain = Arc::new(FakeChain::new(10));
        let store = EventStore::open_in_memory().unwrap();
        let config = fast_config();
        let gateway = Arc::new(Gateway::new(&config));
        let scanner = Scanner::new(chain, gateway, store.clone(), config);

        scanner.run().await.unwrap();

        let snap = scanner.progress();
        assert_eq!(snap.state, ScanState::Complete);
        assert_eq!(snap.total_blocks, 11);
        assert_eq!(snap.processed_blocks, 11);
        // Heights 0,2,4,6,8,10 are minted.
        assert_eq!(snap.events_found, 6);
        assert_eq!(store.analytics_count().unwrap(), 11);
        // Discovery cached the participant the node reported.
        assert_eq!(store.known_addresses().unwrap(), vec!["staker-0"]);
    }

    #[tokio::test]
    async fn test_rescanning_is_idempotent() {
        let chain = Arc::new(FakeChain::new(10));
        let store = EventStore::open_in_memory().unwrap();
        let config = fast_config();
        let gateway = Arc::new(Gateway::new(&config));
        let scanner = Scanner::new(chain, gateway, store.clone(), config);

        scanner.progress.lock().unwrap().begin(11, 0);
        scanner.scan_range(0, 10).await;
        let events_first = store.event_count().unwrap();
        let analytics_first = store.analytics_count().unwrap();
        assert_eq!(events_first, 6);
        assert_eq!(analytics_first, 11);

        // Walking the identical range again rewrites analytics in place
        // and inserts no duplicate events.
        scanner.progress.lock().unwrap().begin(11, 0);
        scanner.scan_range(0, 10).await;
        assert_eq!(store.event_count().unwrap(), events_first);
        assert_eq!(store.analytics_count().unwrap(), analytics_first);
    }

    #[tokio::test]
    async fn test_failing_block_is_skipped_not_fatal() {
        let mut chain = FakeChain::new(6);
        chain.fail_height = Some(4);
        let scanner = scanner_with(Arc::new(chain), fast_config());

        scanner.run().await.unwrap();

        let snap = scanner.progress();
        assert_eq!(snap.state, ScanState::Complete);
        assert_eq!(snap.error_count, 1);
        assert_eq!(snap.processed_blocks, 7);
        assert!(snap.recent_errors[0].contains("block 4"));
    }

    #[tokio::test]
    async fn test_priority_scan_is_bounded() {
        let chain = Arc::new(FakeChain::new(100));
        let config = ScanConfig {
            priority_scan_max_blocks: 10,
            ..fast_config()
        };
        let scanner = scanner_with(chain, config);

        scanner.scan_address("staker-0").await.unwrap();

        let snap = scanner.progress();
        assert_eq!(snap.state, ScanState::Complete);
        assert_eq!(snap.total_blocks, 10);
        assert_eq!(snap.processed_blocks, 10);
    }

    #[tokio::test]
    async fn test_second_concurrent_scan_rejected() {
        let chain = Arc::new(FakeChain::new(4));
        let scanner = Arc::new(scanner_with(chain, fast_config()));

        scanner
            .running
            .store(true, Ordering::SeqCst);
        let err = scanner.run().await.unwrap_err();
        assert!(matches!(err, ScanError::Validation(_)));
    }

    #[tokio::test]
    async fn test_reorg_replaces_indexed_height() {
        let chain = Arc::new(FakeChain::new(10));
        let store = EventStore::open_in_memory().unwrap();
        let config = fast_config();
        let gateway = Arc::new(Gateway::new(&config));
        let scanner = Scanner::new(chain.clone(), gateway, store.clone(), config);

        scanner.run().await.unwrap();
        assert_eq!(store.stored_block_hash(8).unwrap().unwrap(), "hash-8");

        // The canonical chain replaces height 8 with a different staker.
        let replacement = RpcBlock {
            height: 8,
            hash: "hash-8-prime".into(),
            time: 1_700_004_800,
            block_type: "minted".into(),
            difficulty: 1.0,
            size: 400,
            transactions: vec![RpcTransaction {
                txid: "cs-8-prime".into(),
                inputs: vec![RpcTxInput { txid: None, vout: None }],
                outputs: vec![
                    RpcTxOutput { value: 0, address: None },
                    RpcTxOutput { value: 2_000, address: Some("staker-9".into()) },
                ],
            }],
        };
        chain
            .reorged
            .lock()
            .unwrap()
            .insert(8, replacement);

        let events_before = store.event_count().unwrap();
        scanner.on_block_connected(8, "hash-8-prime").await.unwrap();

        assert_eq!(store.stored_block_hash(8).unwrap().unwrap(), "hash-8-prime");
        // Old event retracted, replacement inserted: same total count.
        assert_eq!(store.event_count().unwrap(), events_before);
        assert_eq!(store.events_for_address("staker-9").unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_live_scan_marks_known_addresses_stale() {
        let chain = Arc::new(FakeChain::new(10));
        let store = EventStore::open_in_memory().unwrap();
        let config = fast_config();
        let gateway = Arc::new(Gateway::new(&config));
        let scanner = Scanner::new(chain, gateway, store.clone(), config);

        store.upsert_participant("staker-0", None).unwrap();

        // Height 6 pays staker-0 (6 % 3 == 0).
        scanner.on_block_connected(6, "hash-6").await.unwrap();
        assert_eq!(store.stale_addresses().unwrap(), vec!["staker-0"]);
    }

    #[tokio::test]
    async fn test_live_scan_marks_spent_input_owner_stale() {
        let chain = Arc::new(FakeChain::new(10));
        let store = EventStore::open_in_memory().unwrap();
        let config = fast_config();
        let gateway = Arc::new(Gateway::new(&config));
        let scanner = Scanner::new(chain.clone(), gateway, store.clone(), config);

        // victim owns an outpoint another staker's coinstake consumes; it
        // never appears in the block's outputs.
        store.upsert_participant("victim", None).unwrap();
        store
            .upsert_utxo(&Utxo {
                address: "victim".into(),
                txid: "prev-v".into(),
                vout: 0,
                value: 40_000,
                creation_height: 3,
                cooldown_until: 503,
                is_spent: false,
            })
            .unwrap();
        chain.raw_txs.lock().unwrap().insert(
            "prev-v".into(),
            RpcTransaction {
                txid: "prev-v".into(),
                inputs: vec![],
                outputs: vec![RpcTxOutput { value: 40_000, address: Some("victim".into()) }],
            },
        );
        chain.reorged.lock().unwrap().insert(
            12,
            RpcBlock {
                height: 12,
                hash: "spend-12".into(),
                time: 1_700_007_200,
                block_type: "minted".into(),
                difficulty: 1.0,
                size: 400,
                transactions: vec![RpcTransaction {
                    txid: "cs-12".into(),
                    inputs: vec![RpcTxInput { txid: Some("prev-v".into()), vout: Some(0) }],
                    outputs: vec![
                        RpcTxOutput { value: 0, address: None },
                        RpcTxOutput { value: 41_000, address: Some("staker-9".into()) },
                    ],
                }],
            },
        );

        scanner.on_block_connected(12, "spend-12").await.unwrap();

        assert_eq!(store.stale_addresses().unwrap(), vec!["victim"]);
        assert!(store.utxos_for_address("victim").unwrap()[0].is_spent);
    }

    #[tokio::test]
    async fn test_zero_batch_size_is_clamped() {
        let chain = Arc::new(FakeChain::new(4));
        let store = EventStore::open_in_memory().unwrap();
        let config = ScanConfig {
            batch_size: 0,
            priority_scan_max_blocks: 0,
            ..fast_config()
        };
        let gateway = Arc::new(Gateway::new(&config));
        let scanner = Scanner::new(chain, gateway, store, config);

        scanner.run().await.unwrap();
        let snap = scanner.progress();
        assert_eq!(snap.state, ScanState::Complete);
        assert_eq!(snap.processed_blocks, 5);

        // The priority cap is clamped the same way: one block, not zero.
        scanner.scan_address("staker-0").await.unwrap();
        assert_eq!(scanner.progress().total_blocks, 1);
    }

    #[tokio::test]
    async fn test_cache_avoids_refetching_within_a_pass() {
        let chain = Arc::new(FakeChain::new(4));
        let store = EventStore::open_in_memory().unwrap();
        let config = fast_config();
        let gateway = Arc::new(Gateway::new(&config));
        let scanner = Scanner::new(chain.clone(), gateway, store, config);

        scanner.on_block_connected(2, "hash-2").await.unwrap();
        let calls_after_first = chain.block_calls.load(Ordering::SeqCst);

        // A range walk over the same heights hits the cache for block 2.
        scanner.progress.lock().unwrap().begin(5, 0);
        scanner.scan_range(0, 4).await;
        let refetches = chain.block_calls.load(Ordering::SeqCst) - calls_after_first;
        assert_eq!(refetches, 4); // heights 0,1,3,4 only
    }
}
