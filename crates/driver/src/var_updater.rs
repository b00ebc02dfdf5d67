//! Value-at-risk snapshots.
use std::sync::Arc;

use async_trait::async_trait;
use clickhouse::{BlockValueRepository, SyncStatusRepository, VarStatusRepository};
use derive_more::Debug;
use eyre::{Result, eyre};
use primitives::{
    BlockValueRecord, Chain, SubmissionType, SyncStatusRecord, UnixTime, ValueMap,
    VarStatusRecord,
    records::{merge_value_maps, value_at_risk_total},
};
use tracing::{debug, info};

use crate::scheduler::PeriodicTask;

const SECS_PER_DAY: u64 = 86_400;

/// Merge the block values of a window into a snapshot taken at `timestamp`.
///
/// With an empty window the snapshot carries the anchor block and zero value.
pub fn merge_window(
    timestamp: UnixTime,
    anchor: &SyncStatusRecord,
    window: &[BlockValueRecord],
) -> VarStatusRecord {
    let mut var_by_contract = ValueMap::new();
    let mut var_by_type = ValueMap::new();
    for record in window {
        merge_value_maps(&mut var_by_contract, &record.value_by_contract);
        merge_value_maps(&mut var_by_type, &record.value_by_type);
    }
    let (last_l2_block_number, last_l2_block_timestamp) = window
        .iter()
        .max_by_key(|r| r.l2_block_number)
        .map_or((anchor.l2_block_number, anchor.timestamp), |r| {
            (r.l2_block_number, r.l2_block_timestamp)
        });

    VarStatusRecord {
        chain_id: anchor.chain_id,
        timestamp,
        last_l2_block_number,
        last_l2_block_timestamp,
        last_sync_l2_block_number: anchor.l2_block_number,
        last_sync_l1_block_number: anchor.l1_block_number,
        last_sync_timestamp: anchor.timestamp,
        var_total_usd: value_at_risk_total(&var_by_type),
        var_by_contract,
        var_by_type,
    }
}

/// Builds value-at-risk snapshots of one L2 from its block values and finality records.
#[derive(Debug)]
pub struct VarUpdaterController {
    chain: Chain,
    finality: SubmissionType,
    #[debug(skip)]
    blocks: Arc<dyn BlockValueRepository>,
    #[debug(skip)]
    sync: Arc<dyn SyncStatusRepository>,
    #[debug(skip)]
    vars: Arc<dyn VarStatusRepository>,
}

impl VarUpdaterController {
    /// Create an updater; fails for chains without a finality submission type.
    pub fn new(
        chain: Chain,
        blocks: Arc<dyn BlockValueRepository>,
        sync: Arc<dyn SyncStatusRepository>,
        vars: Arc<dyn VarStatusRepository>,
    ) -> Result<Self> {
        let finality = chain
            .finality_submission_type()
            .ok_or_else(|| eyre!("{chain} has no finality submission type"))?;
        Ok(Self { chain, finality, blocks, sync, vars })
    }

    async fn anchor_at(&self, at: UnixTime) -> Result<Option<SyncStatusRecord>> {
        self.sync.latest_sync_status(self.chain.id(), self.finality, at).await
    }

    /// Anchor standing in for finality before the first sync record: nothing
    /// is final, so every stored block counts.
    fn unanchored(&self) -> SyncStatusRecord {
        SyncStatusRecord {
            chain_id: self.chain.id(),
            submission_type: self.finality,
            l2_block_number: 0,
            l2_block_hash: None,
            l1_block_number: None,
            l1_block_hash: None,
            timestamp: UnixTime::ZERO,
        }
    }

    /// Snapshot as of `at`, or `None` when no finality anchor precedes it.
    pub async fn snapshot_at(&self, at: UnixTime) -> Result<Option<VarStatusRecord>> {
        let Some(anchor) = self.anchor_at(at).await? else {
            return Ok(None);
        };
        let window =
            self.blocks.block_values_between(self.chain.id(), anchor.l2_block_number, at).await?;
        Ok(Some(merge_window(at, &anchor, &window)))
    }

    /// Snapshot the newest indexed block once the finality anchor has advanced.
    pub async fn tick(&self) -> Result<()> {
        let chain_id = self.chain.id();
        let Some(tip) = self.blocks.latest_block_value(chain_id).await? else {
            debug!(chain = %self.chain, "No block values yet");
            return Ok(());
        };
        let at = tip.l2_block_timestamp;
        let Some(anchor) = self.anchor_at(at).await? else {
            debug!(chain = %self.chain, "No finality anchor yet");
            return Ok(());
        };
        let last = self.vars.latest_var_status(chain_id).await?;
        if last.is_some_and(|last| anchor.timestamp <= last.last_sync_timestamp) {
            debug!(chain = %self.chain, anchor = anchor.l2_block_number, "Finality has not advanced");
            return Ok(());
        }

        let window =
            self.blocks.block_values_between(chain_id, anchor.l2_block_number, at).await?;
        let snapshot = merge_window(at, &anchor, &window);
        self.vars.upsert_var_statuses(std::slice::from_ref(&snapshot)).await?;
        info!(
            chain = %self.chain,
            timestamp = %snapshot.timestamp,
            blocks = window.len(),
            var_usd = snapshot.var_total_usd,
            "Updated value at risk"
        );
        Ok(())
    }

    /// Walk back from the oldest snapshot (or now) writing one snapshot every
    /// `step_secs`, until `days` before now or until block values run out.
    ///
    /// Steps older than the first finality record count every stored block
    /// up to the step as unfinalized.
    ///
    /// Returns the number of snapshots written.
    pub async fn backfill(&self, days: u64, step_secs: u64) -> Result<usize> {
        self.backfill_from(UnixTime::now(), days, step_secs).await
    }

    /// [`Self::backfill`] with an explicit current time.
    pub async fn backfill_from(&self, now: UnixTime, days: u64, step_secs: u64) -> Result<usize> {
        if step_secs == 0 {
            return Err(eyre!("backfill step must be positive"));
        }
        let chain_id = self.chain.id();
        let horizon = now.saturating_sub_secs(days.saturating_mul(SECS_PER_DAY));
        let Some(earliest_block) = self.blocks.earliest_block_timestamp(chain_id).await? else {
            debug!(chain = %self.chain, "Nothing to backfill");
            return Ok(0);
        };

        let mut at = match self.vars.earliest_var_status(chain_id).await? {
            Some(earliest) if earliest.timestamp.as_secs() < step_secs => return Ok(0),
            Some(earliest) => earliest.timestamp.saturating_sub_secs(step_secs),
            None => now,
        };

        let mut written = 0;
        while at >= horizon && at >= earliest_block {
            let anchor = self.anchor_at(at).await?.unwrap_or_else(|| self.unanchored());
            let window =
                self.blocks.block_values_between(chain_id, anchor.l2_block_number, at).await?;
            let snapshot = merge_window(at, &anchor, &window);
            self.vars.upsert_var_statuses(&[snapshot]).await?;
            written += 1;
            if at.as_secs() < step_secs {
                break;
            }
            at = at.saturating_sub_secs(step_secs);
        }
        info!(chain = %self.chain, snapshots = written, oldest = %at, "Value at risk backfill done");
        Ok(written)
    }
}

#[async_trait]
impl PeriodicTask for VarUpdaterController {
    fn name(&self) -> String {
        format!("{}_var_updater", self.chain)
    }

    async fn run(&self) -> Result<()> {
        self.tick().await
    }
}
