use crate::model::{
    Address, EvaluationRow, FinderRow, IterationRow, QualityScore, RoundRow, Score,
};
use anyhow::Context;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex};

#[derive(Clone)]
pub struct Store {
    pub(crate) conn: Arc<Mutex<Connection>>,
}

#[derive(Debug, Clone)]
pub struct StoreStats {
    pub total_evaluations: u64,
    pub invalid_evaluations: u64,
    pub completed_rounds: u64,
    /// Mean of valid scores only; the invalid sentinel would poison a raw
    /// average.
    pub average_valid_score: f64,
}

impl Store {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let conn = Connection::open(path).context("failed to open sqlite db")?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn memory() -> anyhow::Result<Self> {
        let conn = Connection::open_in_memory().context("failed to open in-memory sqlite db")?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn init_schema(&self) -> anyhow::Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(crate::storage::schema::DDL)?;
        Ok(())
    }

    // iterations

    pub fn last_iteration(&self) -> anyhow::Result<Option<IterationRow>> {
        let conn = self.conn.lock().unwrap();
        let row = conn
            .query_row(
                "SELECT id, run_timestamp, submissions_fetched FROM iterations
                 ORDER BY run_timestamp DESC LIMIT 1",
                [],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, i64>(2)?,
                    ))
                },
            )
            .optional()?;
        match row {
            Some((id, ts, fetched)) => Ok(Some(IterationRow {
                id,
                run_timestamp: parse_ts(&ts)?,
                submissions_fetched: fetched as u64,
            })),
            None => Ok(None),
        }
    }

    /// Cumulative totals per address, used to derive deltas for the next
    /// iteration. Taken as the per-address maximum because an iteration
    /// only records rows for addresses that moved; totals never decrease.
    pub fn previous_address_totals(&self) -> anyhow::Result<HashMap<Address, u64>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt =
            conn.prepare("SELECT address, max(total_count) FROM address_counts GROUP BY address")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;
        let mut totals = HashMap::new();
        for r in rows {
            let (address, total) = r?;
            totals.insert(address, total as u64);
        }
        Ok(totals)
    }

    /// Persists one iteration plus an `address_counts` row per address with
    /// a positive delta. `totals` falls back to the delta for addresses the
    /// window saw for the first time.
    pub fn store_iteration(
        &self,
        run_timestamp: DateTime<Utc>,
        submissions_fetched: usize,
        deltas: &BTreeMap<Address, u64>,
        totals: &HashMap<Address, u64>,
    ) -> anyhow::Result<i64> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let now = Utc::now().to_rfc3339();
        tx.execute(
            "INSERT INTO iterations(run_timestamp, submissions_fetched, created_at)
             VALUES (?1, ?2, ?3)",
            params![run_timestamp.to_rfc3339(), submissions_fetched as i64, now],
        )?;
        let iteration_id = tx.last_insert_rowid();

        for (address, delta) in deltas {
            let total = totals.get(address).copied().unwrap_or(*delta);
            tx.execute(
                "INSERT INTO address_counts(iteration_id, address, delta_count, total_count, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![iteration_id, address, *delta as i64, total as i64, now],
            )?;
        }
        tx.commit()?;
        Ok(iteration_id)
    }

    // rounds

    pub fn create_round(&self, evaluator: &str) -> anyhow::Result<i64> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO rounds(evaluator, started_at, created_at) VALUES (?1, ?2, ?2)",
            params![evaluator, now],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn complete_round(&self, round_id: i64) -> anyhow::Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE rounds SET completed_at=?1 WHERE id=?2",
            params![Utc::now().to_rfc3339(), round_id],
        )?;
        Ok(())
    }

    /// The scoring basis: the most recently completed round. Rounds left
    /// open by an interrupted process are invisible here.
    pub fn latest_completed_round(&self) -> anyhow::Result<Option<RoundRow>> {
        let conn = self.conn.lock().unwrap();
        let row = conn
            .query_row(
                "SELECT id, evaluator, started_at, completed_at FROM rounds
                 WHERE completed_at IS NOT NULL
                 ORDER BY completed_at DESC LIMIT 1",
                [],
                map_round,
            )
            .optional()?;
        row.map(round_from_raw).transpose()
    }

    pub fn round(&self, round_id: i64) -> anyhow::Result<Option<RoundRow>> {
        let conn = self.conn.lock().unwrap();
        let row = conn
            .query_row(
                "SELECT id, evaluator, started_at, completed_at FROM rounds WHERE id=?1",
                params![round_id],
                map_round,
            )
            .optional()?;
        row.map(round_from_raw).transpose()
    }

    // evaluations

    pub fn insert_evaluation(
        &self,
        round_id: i64,
        submission_id: i64,
        address: &str,
        score: Score,
        rationale: Option<&str>,
    ) -> anyhow::Result<i64> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO evaluations(round_id, submission_id, address, score, rationale, evaluated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                round_id,
                submission_id,
                address,
                score.to_stored(),
                rationale,
                Utc::now().to_rfc3339()
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Ordered by submission id so scoring input is deterministic.
    pub fn round_evaluations(&self, round_id: i64) -> anyhow::Result<Vec<EvaluationRow>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT round_id, submission_id, address, score, rationale FROM evaluations
             WHERE round_id=?1 ORDER BY submission_id",
        )?;
        let rows = stmt.query_map(params![round_id], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, i64>(3)?,
                row.get::<_, Option<String>>(4)?,
            ))
        })?;
        let mut out = Vec::new();
        for r in rows {
            let (round_id, submission_id, address, raw_score, rationale) = r?;
            out.push(EvaluationRow {
                round_id,
                submission_id,
                address,
                score: Score::from_stored(raw_score)?,
                rationale,
            });
        }
        Ok(out)
    }

    /// Every submission id judged in any round; the sampler excludes these
    /// instead of relying on a write-time uniqueness constraint.
    pub fn evaluated_submission_ids(&self) -> anyhow::Result<HashSet<i64>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT DISTINCT submission_id FROM evaluations")?;
        let rows = stmt.query_map([], |row| row.get::<_, i64>(0))?;
        let mut ids = HashSet::new();
        for r in rows {
            ids.insert(r?);
        }
        Ok(ids)
    }

    // derived scores

    pub fn insert_final_scores(
        &self,
        round_id: i64,
        iteration_id: Option<i64>,
        quality: &BTreeMap<Address, QualityScore>,
        finals: &BTreeMap<Address, f64>,
    ) -> anyhow::Result<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let now = Utc::now().to_rfc3339();
        for (address, share) in finals {
            let q = quality.get(address).map(|s| s.final_score).unwrap_or(0.0);
            tx.execute(
                "INSERT INTO final_scores(round_id, iteration_id, address, quality_score, final_score, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![round_id, iteration_id, address, q, share, now],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    // finder registry

    /// Reconciles the registry against the permission snapshot. Permitted
    /// addresses are upserted; addresses that lost permission are
    /// deactivated in place. Rows are never deleted.
    pub fn reconcile_finders(
        &self,
        iteration_id: i64,
        active: &HashSet<Address>,
        permitted: &[Address],
    ) -> anyhow::Result<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let now = Utc::now().to_rfc3339();

        // Blanket downgrade, then upsert the current snapshot on top. The
        // end state is what matters; last_active_iteration_id is preserved.
        tx.execute(
            "UPDATE finders SET has_permission=0, active=0, updated_at=?1",
            params![now],
        )?;

        for address in permitted {
            let is_active = active.contains(address);
            let last_active: Option<i64> = if is_active { Some(iteration_id) } else { None };
            tx.execute(
                "INSERT INTO finders(address, active, has_permission, last_active_iteration_id, created_at, updated_at)
                 VALUES (?1, ?2, 1, ?3, ?4, ?4)
                 ON CONFLICT(address) DO UPDATE SET
                   active=excluded.active,
                   has_permission=1,
                   last_active_iteration_id=COALESCE(excluded.last_active_iteration_id, finders.last_active_iteration_id),
                   updated_at=excluded.updated_at",
                params![address, is_active, last_active, now],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    pub fn finders(&self) -> anyhow::Result<Vec<FinderRow>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT address, active, has_permission, last_active_iteration_id
             FROM finders ORDER BY address",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(FinderRow {
                address: row.get(0)?,
                active: row.get(1)?,
                has_permission: row.get(2)?,
                last_active_iteration_id: row.get(3)?,
            })
        })?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    }

    // stats

    pub fn stats(&self) -> anyhow::Result<StoreStats> {
        let conn = self.conn.lock().unwrap();
        let total_evaluations: i64 =
            conn.query_row("SELECT count(*) FROM evaluations", [], |r| r.get(0))?;
        let invalid_evaluations: i64 = conn.query_row(
            "SELECT count(*) FROM evaluations WHERE score=?1",
            params![crate::model::INVALID_SCORE_SENTINEL],
            |r| r.get(0),
        )?;
        let completed_rounds: i64 = conn.query_row(
            "SELECT count(*) FROM rounds WHERE completed_at IS NOT NULL",
            [],
            |r| r.get(0),
        )?;
        let average_valid_score: f64 = conn.query_row(
            "SELECT COALESCE(avg(score), 0.0) FROM evaluations WHERE score!=?1",
            params![crate::model::INVALID_SCORE_SENTINEL],
            |r| r.get(0),
        )?;
        Ok(StoreStats {
            total_evaluations: total_evaluations as u64,
            invalid_evaluations: invalid_evaluations as u64,
            completed_rounds: completed_rounds as u64,
            average_valid_score,
        })
    }
}

type RawRound = (i64, String, String, Option<String>);

fn map_round(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawRound> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

fn round_from_raw(raw: RawRound) -> anyhow::Result<RoundRow> {
    let (id, evaluator, started_at, completed_at) = raw;
    Ok(RoundRow {
        id,
        evaluator,
        started_at: parse_ts(&started_at)?,
        completed_at: completed_at.as_deref().map(parse_ts).transpose()?,
    })
}

fn parse_ts(raw: &str) -> anyhow::Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(raw)
        .with_context(|| format!("bad stored timestamp: {}", raw))?
        .with_timezone(&Utc))
}
