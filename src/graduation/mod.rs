use crate::config::app_context::AppContext;
use crate::programs::pump_curve::BondingCurveAccount;
use crate::programs::registry::{self, PUMPFUN_PROGRAM_PUBKEY};
use crate::storage::persistent;
use crate::types::error::TradeError;
use solana_sdk::pubkey::Pubkey;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Polls bonding curves for every mint that still has a PRE_GRADUATION
/// position. A closed curve account or `complete = true` means the token
/// migrated; all matching positions flip to POST_GRADUATION in one bulk
/// transaction.
pub struct GraduationMonitor {
    context: AppContext,
}

impl GraduationMonitor {
    pub fn new(context: &AppContext) -> Self {
        Self {
            context: context.clone(),
        }
    }

    pub async fn run(self) {
        let settings = self.context.get_settings().await;
        if !settings.graduation.enabled {
            info!("graduation monitor disabled");
            return;
        }
        let poll_interval = Duration::from_millis(settings.graduation.poll_interval_ms);
        drop(settings);

        let mut shutdown = self.context.shutdown_signal();
        let mut ticker = tokio::time::interval(poll_interval);
        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("graduation monitor stopping");
                        return;
                    }
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.poll_once().await {
                        warn!(error = %e, "graduation poll failed");
                    }
                }
            }
        }
    }

    async fn poll_once(&self) -> Result<(), TradeError> {
        let curves = persistent::load_pre_graduation_curves(&self.context.db_pool).await?;
        for (mint, curve) in curves {
            match self.is_graduated(&mint, curve.as_deref()).await {
                Ok(true) => {
                    let graduated =
                        persistent::graduate_all_positions_for_mint(&self.context.db_pool, &mint)
                            .await?;
                    info!(mint = %mint, positions = graduated.len(), "mint graduated to AMM pricing");
                }
                Ok(false) => {}
                Err(e) => {
                    debug!(mint = %mint, error = %e, "graduation check deferred");
                }
            }
        }
        Ok(())
    }

    async fn is_graduated(&self, mint: &str, curve: Option<&str>) -> Result<bool, TradeError> {
        let curve_pubkey = match curve {
            Some(address) => {
                Pubkey::from_str(address).map_err(|_| TradeError::InvalidAddress(address.into()))?
            }
            None => {
                let mint_pubkey = Pubkey::from_str(mint)
                    .map_err(|_| TradeError::InvalidAddress(mint.to_string()))?;
                registry::bonding_curve_pda(&mint_pubkey, &PUMPFUN_PROGRAM_PUBKEY)
            }
        };
        match self.context.rpc.get_account_optional(&curve_pubkey).await? {
            // the launchpad closes the curve account at migration
            None => Ok(true),
            Some(account) => Ok(BondingCurveAccount::parse(&account.data)?.complete),
        }
    }
}
