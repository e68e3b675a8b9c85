//! SQLite event store
//!
//! Single source of truth for everything the scanner extracts and the
//! statistics engine derives. Writers rely on natural-key semantics so
//! concurrent scan paths cannot corrupt state: stake events are
//! insert-if-absent on txid (first writer wins), block analytics and all
//! derived rows are upserts (last writer wins).
//!
//! The connection lives behind `Arc<Mutex<..>>`; callers hold the lock
//! only for the duration of one statement or transaction.

use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

use crate::error::ScanError;
use crate::types::{
    AddressStatistics, BlockAnalytics, BlockType, StakeEvent, TrendLabel, TrendMetrics, Utxo,
    UtxoHealth, YieldWindows,
};

/// Idempotent schema, applied on every open. All statements use
/// IF NOT EXISTS so re-running them is a no-op.
const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS stake_events (
    txid            TEXT PRIMARY KEY,
    address         TEXT NOT NULL,
    block_height    INTEGER NOT NULL,
    block_time      INTEGER NOT NULL,
    reward_amount   INTEGER NOT NULL,
    stake_amount    INTEGER NOT NULL,
    stake_age       INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_stake_events_address ON stake_events(address, block_time);
CREATE INDEX IF NOT EXISTS idx_stake_events_height ON stake_events(block_height);

CREATE TABLE IF NOT EXISTS block_analytics (
    height          INTEGER PRIMARY KEY,
    hash            TEXT NOT NULL,
    time            INTEGER NOT NULL,
    block_type      TEXT NOT NULL,
    difficulty      REAL NOT NULL,
    size            INTEGER NOT NULL,
    reward_amount   INTEGER NOT NULL,
    staker_address  TEXT
);

CREATE TABLE IF NOT EXISTS utxos (
    txid            TEXT NOT NULL,
    vout            INTEGER NOT NULL,
    address         TEXT NOT NULL,
    value           INTEGER NOT NULL,
    creation_height INTEGER NOT NULL,
    cooldown_until  INTEGER NOT NULL,
    is_spent        INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (txid, vout)
);
CREATE INDEX IF NOT EXISTS idx_utxos_address ON utxos(address);

CREATE TABLE IF NOT EXISTS participants (
    address         TEXT PRIMARY KEY,
    name            TEXT,
    is_stale        INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS address_statistics (
    address                 TEXT PRIMARY KEY,
    total_stakes            INTEGER NOT NULL,
    total_rewards           INTEGER NOT NULL,
    total_staked            INTEGER NOT NULL,
    first_stake_time        INTEGER,
    last_stake_time         INTEGER,
    yield_all_time          REAL NOT NULL,
    yield_365d              REAL NOT NULL,
    yield_90d               REAL NOT NULL,
    yield_30d               REAL NOT NULL,
    yield_7d                REAL NOT NULL,
    return_ratio            REAL NOT NULL,
    avg_days_between_stakes REAL,
    stakes_per_week         REAL,
    stakes_per_month        REAL,
    utxo_current_count      INTEGER NOT NULL,
    utxo_eligible_count     INTEGER NOT NULL,
    utxo_cooldown_count     INTEGER NOT NULL,
    utxo_current_value      INTEGER NOT NULL,
    utxo_eligible_value     INTEGER NOT NULL,
    utxo_largest_value      INTEGER NOT NULL,
    utxo_smallest_value     INTEGER NOT NULL,
    longest_dry_spell_days  INTEGER NOT NULL,
    current_streak_days     INTEGER NOT NULL,
    best_month              TEXT,
    best_month_rewards      INTEGER NOT NULL,
    worst_month             TEXT,
    worst_month_rewards     INTEGER NOT NULL,
    reward_trend            TEXT NOT NULL,
    frequency_trend         TEXT NOT NULL,
    rank                    INTEGER,
    percentile              REAL,
    computed_at             INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS trend_metrics (
    address             TEXT PRIMARY KEY,
    stake_change_pct    REAL NOT NULL,
    reward_change_pct   REAL NOT NULL,
    view_change_pct     REAL NOT NULL,
    score               REAL NOT NULL,
    computed_at         INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS address_views (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    address     TEXT NOT NULL,
    viewed_at   INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_address_views ON address_views(address, viewed_at);

CREATE TABLE IF NOT EXISTS achievement_earned (
    address     TEXT NOT NULL,
    slug        TEXT NOT NULL,
    earned_at   INTEGER NOT NULL,
    PRIMARY KEY (address, slug)
);

CREATE TABLE IF NOT EXISTS achievement_progress (
    address     TEXT NOT NULL,
    slug        TEXT NOT NULL,
    current     REAL NOT NULL,
    target      REAL NOT NULL,
    percentage  REAL NOT NULL,
    updated_at  INTEGER NOT NULL,
    PRIMARY KEY (address, slug)
);
"#;

#[derive(Clone)]
pub struct EventStore {
    conn: Arc<Mutex<Connection>>,
}

impl EventStore {
    pub fn open(db_path: &str) -> Result<Self, ScanError> {
        let conn = Connection::open(db_path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Self::from_connection(conn)
    }

    /// In-memory store for tests.
    pub fn open_in_memory() -> Result<Self, ScanError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, ScanError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    // ── stake events ────────────────────────────────────────────────

    /// Insert-if-absent on txid. Returns true when the row is new, false
    /// when the event was already indexed (reprocessing is a no-op).
    pub fn insert_stake_event(&self, event: &StakeEvent) -> Result<bool, ScanError> {
        let conn = self.conn.lock().unwrap();
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO stake_events
                (txid, address, block_height, block_time, reward_amount, stake_amount, stake_age)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
            params![
                event.txid,
                event.address,
                event.block_height,
                event.block_time,
                event.reward_amount,
                event.stake_amount,
                event.stake_age,
            ],
        )?;
        Ok(inserted > 0)
    }

    pub fn events_for_address(&self, address: &str) -> Result<Vec<StakeEvent>, ScanError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT txid, address, block_height, block_time, reward_amount, stake_amount, stake_age
             FROM stake_events WHERE address = ? ORDER BY block_time, txid",
        )?;
        let rows = stmt
            .query_map([address], |row| {
                Ok(StakeEvent {
                    txid: row.get(0)?,
                    address: row.get(1)?,
                    block_height: row.get(2)?,
                    block_time: row.get(3)?,
                    reward_amount: row.get(4)?,
                    stake_amount: row.get(5)?,
                    stake_age: row.get(6)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn event_count(&self) -> Result<u64, ScanError> {
        let conn = self.conn.lock().unwrap();
        let n: u64 = conn.query_row("SELECT COUNT(*) FROM stake_events", [], |r| r.get(0))?;
        Ok(n)
    }

    pub fn last_event_height(&self, address: &str) -> Result<Option<u64>, ScanError> {
        let conn = self.conn.lock().unwrap();
        let h: Option<u64> = conn.query_row(
            "SELECT MAX(block_height) FROM stake_events WHERE address = ?",
            [address],
            |r| r.get(0),
        )?;
        Ok(h)
    }

    pub fn addresses_with_events(&self) -> Result<Vec<String>, ScanError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT DISTINCT address FROM stake_events ORDER BY address")?;
        let rows = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// (address, total reward sum) for every address, for the ranking pass.
    pub fn total_rewards_by_address(&self) -> Result<Vec<(String, i64)>, ScanError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT address, SUM(reward_amount) FROM stake_events GROUP BY address",
        )?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn stake_count_between(
        &self,
        address: &str,
        from: i64,
        to: i64,
    ) -> Result<u64, ScanError> {
        let conn = self.conn.lock().unwrap();
        let n: u64 = conn.query_row(
            "SELECT COUNT(*) FROM stake_events
             WHERE address = ? AND block_time >= ? AND block_time < ?",
            params![address, from, to],
            |r| r.get(0),
        )?;
        Ok(n)
    }

    pub fn reward_sum_between(&self, address: &str, from: i64, to: i64) -> Result<i64, ScanError> {
        let conn = self.conn.lock().unwrap();
        let sum: Option<i64> = conn.query_row(
            "SELECT SUM(reward_amount) FROM stake_events
             WHERE address = ? AND block_time >= ? AND block_time < ?",
            params![address, from, to],
            |r| r.get(0),
        )?;
        Ok(sum.unwrap_or(0))
    }

    // ── block analytics ─────────────────────────────────────────────

    /// Upsert on height: re-extraction overwrites, preserving nothing.
    pub fn upsert_block_analytics(&self, analytics: &BlockAnalytics) -> Result<(), ScanError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO block_analytics
                (height, hash, time, block_type, difficulty, size, reward_amount, staker_address)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(height) DO UPDATE SET
                hash = excluded.hash,
                time = excluded.time,
                block_type = excluded.block_type,
                difficulty = excluded.difficulty,
                size = excluded.size,
                reward_amount = excluded.reward_amount,
                staker_address = excluded.staker_address",
            params![
                analytics.height,
                analytics.hash,
                analytics.time,
                analytics.block_type.as_str(),
                analytics.difficulty,
                analytics.size,
                analytics.reward_amount,
                analytics.staker_address,
            ],
        )?;
        Ok(())
    }

    pub fn stored_block_hash(&self, height: u64) -> Result<Option<String>, ScanError> {
        let conn = self.conn.lock().unwrap();
        let hash = conn
            .query_row(
                "SELECT hash FROM block_analytics WHERE height = ?",
                [height],
                |r| r.get(0),
            )
            .optional()?;
        Ok(hash)
    }

    pub fn analytics_count(&self) -> Result<u64, ScanError> {
        let conn = self.conn.lock().unwrap();
        let n: u64 = conn.query_row("SELECT COUNT(*) FROM block_analytics", [], |r| r.get(0))?;
        Ok(n)
    }

    pub fn max_indexed_height(&self) -> Result<Option<u64>, ScanError> {
        let conn = self.conn.lock().unwrap();
        let h: Option<u64> =
            conn.query_row("SELECT MAX(height) FROM block_analytics", [], |r| r.get(0))?;
        Ok(h)
    }

    /// Retract everything indexed at a height. Used by the reorg
    /// reconciliation path before re-extracting the canonical block.
    pub fn retract_height(&self, height: u64) -> Result<(), ScanError> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM stake_events WHERE block_height = ?", [height])?;
        tx.execute("DELETE FROM block_analytics WHERE height = ?", [height])?;
        tx.commit()?;
        Ok(())
    }

    // ── utxos ───────────────────────────────────────────────────────

    pub fn upsert_utxo(&self, utxo: &Utxo) -> Result<(), ScanError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO utxos
                (txid, vout, address, value, creation_height, cooldown_until, is_spent)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(txid, vout) DO UPDATE SET
                address = excluded.address,
                value = excluded.value,
                creation_height = excluded.creation_height,
                cooldown_until = excluded.cooldown_until,
                is_spent = MAX(utxos.is_spent, excluded.is_spent)",
            params![
                utxo.txid,
                utxo.vout,
                utxo.address,
                utxo.value,
                utxo.creation_height,
                utxo.cooldown_until,
                utxo.is_spent,
            ],
        )?;
        Ok(())
    }

    /// Spent is terminal; marking an unknown outpoint is a no-op.
    pub fn mark_utxo_spent(&self, txid: &str, vout: u32) -> Result<bool, ScanError> {
        let conn = self.conn.lock().unwrap();
        let updated = conn.execute(
            "UPDATE utxos SET is_spent = 1 WHERE txid = ? AND vout = ?",
            params![txid, vout],
        )?;
        Ok(updated > 0)
    }

    /// Creation height of a known outpoint; None for outpoints this index
    /// never saw (pre-history inputs).
    pub fn utxo_creation_height(&self, txid: &str, vout: u32) -> Result<Option<u64>, ScanError> {
        let conn = self.conn.lock().unwrap();
        let h = conn
            .query_row(
                "SELECT creation_height FROM utxos WHERE txid = ? AND vout = ?",
                params![txid, vout],
                |r| r.get(0),
            )
            .optional()?;
        Ok(h)
    }

    /// Owning address of an indexed outpoint, if the index has seen it.
    pub fn utxo_address(&self, txid: &str, vout: u32) -> Result<Option<String>, ScanError> {
        let conn = self.conn.lock().unwrap();
        let address = conn
            .query_row(
                "SELECT address FROM utxos WHERE txid = ? AND vout = ?",
                params![txid, vout],
                |r| r.get(0),
            )
            .optional()?;
        Ok(address)
    }

    pub fn utxos_for_address(&self, address: &str) -> Result<Vec<Utxo>, ScanError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT txid, vout, address, value, creation_height, cooldown_until, is_spent
             FROM utxos WHERE address = ? ORDER BY creation_height, txid, vout",
        )?;
        let rows = stmt
            .query_map([address], |row| {
                Ok(Utxo {
                    txid: row.get(0)?,
                    vout: row.get(1)?,
                    address: row.get(2)?,
                    value: row.get(3)?,
                    creation_height: row.get(4)?,
                    cooldown_until: row.get(5)?,
                    is_spent: row.get(6)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // ── participants / stale marks ──────────────────────────────────

    pub fn upsert_participant(&self, address: &str, name: Option<&str>) -> Result<(), ScanError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO participants (address, name) VALUES (?, ?)
             ON CONFLICT(address) DO UPDATE SET name = excluded.name",
            params![address, name],
        )?;
        Ok(())
    }

    pub fn known_addresses(&self) -> Result<Vec<String>, ScanError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT address FROM participants ORDER BY address")?;
        let rows = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn mark_stale(&self, address: &str) -> Result<(), ScanError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE participants SET is_stale = 1 WHERE address = ?",
            [address],
        )?;
        Ok(())
    }

    pub fn stale_addresses(&self) -> Result<Vec<String>, ScanError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT address FROM participants WHERE is_stale = 1")?;
        let rows = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn clear_stale(&self, address: &str) -> Result<(), ScanError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE participants SET is_stale = 0 WHERE address = ?",
            [address],
        )?;
        Ok(())
    }

    // ── derived statistics ──────────────────────────────────────────

    /// Atomic wholesale replacement; the statistics engine owns every
    /// field except rank/percentile, which the ranking pass writes later.
    pub fn replace_statistics(&self, stats: &AddressStatistics) -> Result<(), ScanError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR REPLACE INTO address_statistics (
                address, total_stakes, total_rewards, total_staked,
                first_stake_time, last_stake_time,
                yield_all_time, yield_365d, yield_90d, yield_30d, yield_7d,
                return_ratio, avg_days_between_stakes, stakes_per_week, stakes_per_month,
                utxo_current_count, utxo_eligible_count, utxo_cooldown_count,
                utxo_current_value, utxo_eligible_value, utxo_largest_value, utxo_smallest_value,
                longest_dry_spell_days, current_streak_days,
                best_month, best_month_rewards, worst_month, worst_month_rewards,
                reward_trend, frequency_trend, rank, percentile, computed_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                stats.address,
                stats.total_stakes,
                stats.total_rewards,
                stats.total_staked,
                stats.first_stake_time,
                stats.last_stake_time,
                stats.annualized_yield.all_time,
                stats.annualized_yield.days_365,
                stats.annualized_yield.days_90,
                stats.annualized_yield.days_30,
                stats.annualized_yield.days_7,
                stats.return_ratio,
                stats.avg_days_between_stakes,
                stats.stakes_per_week,
                stats.stakes_per_month,
                stats.utxo_health.current_count,
                stats.utxo_health.eligible_count,
                stats.utxo_health.cooldown_count,
                stats.utxo_health.current_value,
                stats.utxo_health.eligible_value,
                stats.utxo_health.largest_value,
                stats.utxo_health.smallest_value,
                stats.longest_dry_spell_days,
                stats.current_streak_days,
                stats.best_month,
                stats.best_month_rewards,
                stats.worst_month,
                stats.worst_month_rewards,
                stats.reward_trend.as_str(),
                stats.frequency_trend.as_str(),
                stats.rank,
                stats.percentile,
                stats.computed_at,
            ],
        )?;
        Ok(())
    }

    pub fn get_statistics(&self, address: &str) -> Result<Option<AddressStatistics>, ScanError> {
        let conn = self.conn.lock().unwrap();
        let row = conn
            .query_row(
                "SELECT address, total_stakes, total_rewards, total_staked,
                        first_stake_time, last_stake_time,
                        yield_all_time, yield_365d, yield_90d, yield_30d, yield_7d,
                        return_ratio, avg_days_between_stakes, stakes_per_week, stakes_per_month,
                        utxo_current_count, utxo_eligible_count, utxo_cooldown_count,
                        utxo_current_value, utxo_eligible_value, utxo_largest_value,
                        utxo_smallest_value, longest_dry_spell_days, current_streak_days,
                        best_month, best_month_rewards, worst_month, worst_month_rewards,
                        reward_trend, frequency_trend, rank, percentile, computed_at
                 FROM address_statistics WHERE address = ?",
                [address],
                |row| {
                    let reward_trend: String = row.get(28)?;
                    let frequency_trend: String = row.get(29)?;
                    Ok(AddressStatistics {
                        address: row.get(0)?,
                        total_stakes: row.get(1)?,
                        total_rewards: row.get(2)?,
                        total_staked: row.get(3)?,
                        first_stake_time: row.get(4)?,
                        last_stake_time: row.get(5)?,
                        annualized_yield: YieldWindows {
                            all_time: row.get(6)?,
                            days_365: row.get(7)?,
                            days_90: row.get(8)?,
                            days_30: row.get(9)?,
                            days_7: row.get(10)?,
                        },
                        return_ratio: row.get(11)?,
                        avg_days_between_stakes: row.get(12)?,
                        stakes_per_week: row.get(13)?,
                        stakes_per_month: row.get(14)?,
                        utxo_health: UtxoHealth {
                            current_count: row.get(15)?,
                            eligible_count: row.get(16)?,
                            cooldown_count: row.get(17)?,
                            current_value: row.get(18)?,
                            eligible_value: row.get(19)?,
                            largest_value: row.get(20)?,
                            smallest_value: row.get(21)?,
                        },
                        longest_dry_spell_days: row.get(22)?,
                        current_streak_days: row.get(23)?,
                        best_month: row.get(24)?,
                        best_month_rewards: row.get(25)?,
                        worst_month: row.get(26)?,
                        worst_month_rewards: row.get(27)?,
                        reward_trend: TrendLabel::parse(&reward_trend),
                        frequency_trend: TrendLabel::parse(&frequency_trend),
                        rank: row.get(30)?,
                        percentile: row.get(31)?,
                        computed_at: row.get(32)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    /// Wholesale rank assignment from a completed ranking pass.
    pub fn update_ranks(&self, ranks: &[(String, u64, f64)]) -> Result<(), ScanError> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        for (address, rank, percentile) in ranks {
            tx.execute(
                "UPDATE address_statistics SET rank = ?, percentile = ? WHERE address = ?",
                params![rank, percentile, address],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    // ── trend metrics ───────────────────────────────────────────────

    pub fn upsert_trend_metrics(&self, trend: &TrendMetrics) -> Result<(), ScanError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR REPLACE INTO trend_metrics
                (address, stake_change_pct, reward_change_pct, view_change_pct, score, computed_at)
             VALUES (?, ?, ?, ?, ?, ?)",
            params![
                trend.address,
                trend.stake_change_pct,
                trend.reward_change_pct,
                trend.view_change_pct,
                trend.score,
                trend.computed_at,
            ],
        )?;
        Ok(())
    }

    pub fn get_trend_metrics(&self, address: &str) -> Result<Option<TrendMetrics>, ScanError> {
        let conn = self.conn.lock().unwrap();
        let row = conn
            .query_row(
                "SELECT address, stake_change_pct, reward_change_pct, view_change_pct,
                        score, computed_at
                 FROM trend_metrics WHERE address = ?",
                [address],
                |row| {
                    Ok(TrendMetrics {
                        address: row.get(0)?,
                        stake_change_pct: row.get(1)?,
                        reward_change_pct: row.get(2)?,
                        view_change_pct: row.get(3)?,
                        score: row.get(4)?,
                        computed_at: row.get(5)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    // ── views ───────────────────────────────────────────────────────

    pub fn record_view(&self, address: &str, viewed_at: i64) -> Result<(), ScanError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO address_views (address, viewed_at) VALUES (?, ?)",
            params![address, viewed_at],
        )?;
        Ok(())
    }

    pub fn view_count_between(&self, address: &str, from: i64, to: i64) -> Result<u64, ScanError> {
        let conn = self.conn.lock().unwrap();
        let n: u64 = conn.query_row(
            "SELECT COUNT(*) FROM address_views
             WHERE address = ? AND viewed_at >= ? AND viewed_at < ?",
            params![address, from, to],
            |r| r.get(0),
        )?;
        Ok(n)
    }

    // ── achievements ────────────────────────────────────────────────

    /// Idempotent unlock: returns true only on first insertion.
    pub fn insert_earned(
        &self,
        address: &str,
        slug: &str,
        earned_at: i64,
    ) -> Result<bool, ScanError> {
        let conn = self.conn.lock().unwrap();
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO achievement_earned (address, slug, earned_at) VALUES (?, ?, ?)",
            params![address, slug, earned_at],
        )?;
        Ok(inserted > 0)
    }

    pub fn earned_slugs(&self, address: &str) -> Result<Vec<String>, ScanError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare("SELECT slug FROM achievement_earned WHERE address = ? ORDER BY slug")?;
        let rows = stmt
            .query_map([address], |row| row.get(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn upsert_progress(
        &self,
        address: &str,
        slug: &str,
        current: f64,
        target: f64,
        percentage: f64,
        updated_at: i64,
    ) -> Result<(), ScanError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR REPLACE INTO achievement_progress
                (address, slug, current, target, percentage, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)",
            params![address, slug, current, target, percentage, updated_at],
        )?;
        Ok(())
    }

    pub fn delete_progress(&self, address: &str, slug: &str) -> Result<(), ScanError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "DELETE FROM achievement_progress WHERE address = ? AND slug = ?",
            params![address, slug],
        )?;
        Ok(())
    }

    pub fn progress_percentage(
        &self,
        address: &str,
        slug: &str,
    ) -> Result<Option<f64>, ScanError> {
        let conn = self.conn.lock().unwrap();
        let pct = conn
            .query_row(
                "SELECT percentage FROM achievement_progress WHERE address = ? AND slug = ?",
                params![address, slug],
                |r| r.get(0),
            )
            .optional()?;
        Ok(pct)
    }

    pub fn progress_count(&self, address: &str) -> Result<u64, ScanError> {
        let conn = self.conn.lock().unwrap();
        let n: u64 = conn.query_row(
            "SELECT COUNT(*) FROM achievement_progress WHERE address = ?",
            [address],
            |r| r.get(0),
        )?;
        Ok(n)
    }
}
