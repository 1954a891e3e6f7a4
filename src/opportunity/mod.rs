use crate::config::app_context::AppContext;
use crate::execution::engine::ExecutionEngine;
use crate::programs::pump_curve::BondingCurveAccount;
use crate::scoring::{self, ScoreReport, TokenAnalysis};
use crate::storage::persistent;
use crate::types::candidate::{CandidateStatus, LaunchSource, NewLaunchCandidate};
use crate::types::error::TradeError;
use crate::types::events::{BusEvent, DiscoveredLaunch};
use crate::types::execution::{Amount, ExitParams, TradeIntent, TradeSide};
use crate::types::strategy::{SnipeMode, Strategy};
use solana_sdk::pubkey::Pubkey;
use spl_token::solana_program::program_pack::Pack;
use spl_token::state::Mint;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Matches discovered launches against every armed strategy, enforces
/// policy, and enqueues idempotent buy jobs.
pub struct OpportunityLoop {
    context: AppContext,
    engine: Arc<ExecutionEngine>,
}

impl OpportunityLoop {
    pub fn new(context: AppContext, engine: Arc<ExecutionEngine>) -> Self {
        Self { context, engine }
    }

    pub async fn run(self, mut events: broadcast::Receiver<BusEvent>) {
        let mut shutdown = self.context.shutdown_signal();
        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("opportunity loop stopping");
                        return;
                    }
                }
                event = events.recv() => match event {
                    Ok(BusEvent::LaunchDiscovered(launch)) => {
                        if let Err(e) = self.handle_launch(launch).await {
                            warn!(error = %e, "launch handling failed");
                        }
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(missed = n, "opportunity loop lagged behind the event bus");
                    }
                    Err(broadcast::error::RecvError::Closed) => return,
                },
            }
        }
    }

    async fn handle_launch(&self, launch: DiscoveredLaunch) -> Result<(), TradeError> {
        let pool = &self.context.db_pool;
        let candidate = match persistent::insert_candidate(
            pool,
            NewLaunchCandidate {
                mint: launch.mint.clone(),
                symbol: launch.symbol.clone(),
                name: launch.name.clone(),
                launch_source: launch.launch_source,
                discovery_method: launch.discovery_method,
                metadata_provenance: launch.metadata_provenance.clone(),
                raw_payload: launch.raw_payload.clone(),
            },
        )
        .await?
        {
            Some(candidate) => candidate,
            None => {
                debug!(mint = %launch.mint, source = %launch.launch_source, "duplicate launch ignored");
                return Ok(());
            }
        };

        let settings = self.context.get_settings().await;
        let auto_execute = settings.execution.auto_execute_enabled;
        let scoring_config = settings.scoring.clone();
        drop(settings);

        // the global gate comes before any job exists, so a later enable
        // cannot flush an accidental backlog
        if !auto_execute {
            persistent::mark_candidate_status(
                pool,
                candidate.id,
                CandidateStatus::Accepted,
                Some("auto_execute_disabled"),
            )
            .await?;
            return Ok(());
        }

        let strategies = persistent::load_enabled_auto_strategies(pool, "solana").await?;
        if strategies.is_empty() {
            return persistent::mark_candidate_status(
                pool,
                candidate.id,
                CandidateStatus::Rejected,
                Some("no_armed_strategies"),
            )
            .await;
        }

        // snipe mode is per user: score once per mode with that mode's
        // metadata budget, so a speed user is never slowed by a quality user
        let modes: Vec<SnipeMode> = {
            let mut seen = Vec::new();
            for strategy in &strategies {
                if !seen.contains(&strategy.snipe_mode) {
                    seen.push(strategy.snipe_mode);
                }
            }
            seen
        };
        let mut reports: HashMap<SnipeMode, ScoreReport> = HashMap::new();
        for mode in modes {
            let analysis = self.analyze(&launch, mode.metadata_budget()).await;
            reports.insert(mode, scoring::score(&analysis, &scoring_config));
        }

        let mut jobs = JoinSet::new();
        let mut job_count = 0usize;
        let mut reject_reasons: Vec<&'static str> = Vec::new();
        for strategy in &strategies {
            let report = &reports[&strategy.snipe_mode];
            match self.filter_strategy(strategy, &launch, report).await {
                Ok(()) => {}
                Err(reason) => {
                    reject_reasons.push(reason);
                    continue;
                }
            }

            let intent = self.buy_intent(strategy, &launch, candidate.id);
            let engine = self.engine.clone();
            jobs.spawn(async move {
                match engine.execute_trade(intent).await {
                    Ok(execution) => {
                        debug!(execution_id = %execution.id, "buy job finished");
                    }
                    Err(TradeError::AlreadyExecuted) | Err(TradeError::ConcurrentOperation) => {
                        debug!("buy job deduped");
                    }
                    Err(e) => warn!(error = %e, "buy job failed"),
                }
            });
            job_count += 1;
        }

        if job_count > 0 {
            persistent::mark_candidate_status(pool, candidate.id, CandidateStatus::Accepted, None)
                .await?;
            info!(mint = %launch.mint, jobs = job_count, "candidate accepted");
            // keep the candidate in the pipeline until every job is terminal
            let pool = pool.clone();
            let candidate_id = candidate.id;
            tokio::spawn(async move {
                while jobs.join_next().await.is_some() {}
                if let Err(e) = persistent::complete_opportunity_if_terminal(&pool, candidate_id).await
                {
                    warn!(candidate_id, error = %e, "opportunity rollup failed");
                }
            });
        } else {
            let reason = reports
                .values()
                .find_map(|r| r.hard_stop.as_deref())
                .or_else(|| reject_reasons.first().copied())
                .unwrap_or("no_matching_strategy");
            persistent::mark_candidate_status(
                pool,
                candidate.id,
                CandidateStatus::Rejected,
                Some(reason),
            )
            .await?;
            info!(mint = %launch.mint, reason, "candidate rejected");
        }
        Ok(())
    }

    async fn filter_strategy(
        &self,
        strategy: &Strategy,
        launch: &DiscoveredLaunch,
        report: &ScoreReport,
    ) -> Result<(), &'static str> {
        let settings = persistent::load_user_settings(&self.context.db_pool, strategy.user_id)
            .await
            .map_err(|_| "user_settings_missing")?;
        if settings.kill_switch {
            return Err("kill_switch");
        }
        if report.hard_stop.is_some() {
            return Err("hard_stop");
        }
        if report.total < strategy.min_score {
            return Err("score_below_min");
        }
        if !strategy.allows_launchpad(launch.launch_source.launchpad()) {
            return Err("launchpad_not_allowed");
        }
        if !strategy.allows_mint(&launch.mint) {
            return Err("allowlist_miss");
        }
        if let Some(min_liquidity) = strategy.min_liquidity_sol {
            // pump.fun candidates have no liquidity figure yet; the check
            // only binds when liquidity is actually known
            match self.known_liquidity(launch).await {
                Some(liquidity) if liquidity < min_liquidity => return Err("below_min_liquidity"),
                Some(_) => {}
                None => {
                    debug!(mint = %launch.mint, "min_liquidity bypassed, liquidity unknown");
                }
            }
        }
        Ok(())
    }

    fn buy_intent(
        &self,
        strategy: &Strategy,
        launch: &DiscoveredLaunch,
        candidate_id: i32,
    ) -> TradeIntent {
        TradeIntent {
            user_id: strategy.user_id,
            mint: launch.mint.clone(),
            side: TradeSide::Buy,
            amount: Amount::Sol(strategy.max_per_trade_sol),
            slippage_bps: strategy.slippage_bps,
            priority_fee_lamports: strategy.priority_fee_lamports,
            idempotency_key: TradeIntent::buy_key(strategy.id, &launch.mint),
            source_tag: Some(format!("candidate:{candidate_id}")),
            position_id: None,
            strategy_id: Some(strategy.id),
            launch_candidate_id: Some(candidate_id),
            launch_source: launch.launch_source,
            bonding_curve: launch.bonding_curve.clone(),
            exit_params: Some(ExitParams {
                tp_percent: strategy.tp_percent,
                sl_percent: strategy.sl_percent,
                trailing_activation_percent: strategy
                    .trailing_enabled
                    .then_some(strategy.trailing_activation_percent),
                trailing_distance_percent: strategy
                    .trailing_enabled
                    .then_some(strategy.trailing_distance_percent),
                max_hold_seconds: strategy.max_hold_seconds,
            }),
            exit_trigger: None,
            allow_retry: false,
        }
    }

    async fn known_liquidity(&self, launch: &DiscoveredLaunch) -> Option<f64> {
        let curve = launch.bonding_curve.as_ref()?;
        let curve_pubkey = Pubkey::from_str(curve).ok()?;
        let account = self.context.rpc.get_account_optional(&curve_pubkey).await.ok()??;
        let parsed = BondingCurveAccount::parse(&account.data).ok()?;
        Some(parsed.real_sol_reserves as f64 / 1e9)
    }

    /// Build the scorer's input within the snipe mode's metadata budget.
    /// Speed mode skips metadata entirely; on-chain basics are always read.
    async fn analyze(
        &self,
        launch: &DiscoveredLaunch,
        metadata_budget: Option<Duration>,
    ) -> TokenAnalysis {
        let mut analysis = TokenAnalysis {
            mint: launch.mint.clone(),
            is_legacy_spl: !launch.is_token_2022,
            dbc_pool_missing: launch.launch_source == LaunchSource::Bags
                && launch.bonding_curve.is_none()
                && launch.discovery_method == crate::types::candidate::DiscoveryMethod::Onchain,
            ..TokenAnalysis::default()
        };

        let mut supply = None;
        if let Ok(mint_pubkey) = Pubkey::from_str(&launch.mint) {
            if let Ok(Some(account)) = self.context.rpc.get_account_optional(&mint_pubkey).await {
                if let Ok(mint_state) = Mint::unpack(&account.data) {
                    analysis.freeze_authority = Some(mint_state.freeze_authority.is_some());
                    analysis.mint_authority = Some(mint_state.mint_authority.is_some());
                    supply = Some(mint_state.supply);
                }
            }

            // quality mode pays for a holder-distribution read
            if metadata_budget >= SnipeMode::Quality.metadata_budget() {
                if let (Ok(largest), Some(supply)) = (
                    self.context.rpc.get_token_largest_amounts(&mint_pubkey).await,
                    supply.filter(|s| *s > 0),
                ) {
                    analysis.holder_count = Some(largest.len() as u32);
                    let top10: u64 = largest.iter().take(10).sum();
                    analysis.top10_concentration_percent =
                        Some(top10 as f64 / supply as f64 * 100.0);
                }
            }
        }
        analysis.liquidity_sol = self.known_liquidity(launch).await;

        if let Some(budget) = metadata_budget {
            let uri = launch
                .raw_payload
                .get("uri")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            if !uri.is_empty() {
                match tokio::time::timeout(budget, self.fetch_token_json(&uri)).await {
                    Ok(Some(metadata)) => {
                        analysis.has_twitter =
                            Some(field_present(&metadata, "twitter"));
                        analysis.has_website =
                            Some(field_present(&metadata, "website"));
                        analysis.has_image = Some(field_present(&metadata, "image"));
                    }
                    Ok(None) => {}
                    Err(_) => {
                        debug!(mint = %launch.mint, "metadata fetch exceeded snipe mode budget");
                    }
                }
            }
        }
        analysis
    }

    async fn fetch_token_json(&self, uri: &str) -> Option<serde_json::Value> {
        let response = self.context.http.get(uri).send().await.ok()?;
        if !response.status().is_success() {
            return None;
        }
        response.json().await.ok()
    }
}

fn field_present(metadata: &serde_json::Value, field: &str) -> bool {
    metadata
        .get(field)
        .and_then(|v| v.as_str())
        .map(|s| !s.is_empty())
        .unwrap_or(false)
}
