pub mod amm;
pub mod bonding_curve;

use crate::types::candidate::LaunchSource;
use crate::types::error::TradeError;
use crate::types::execution::TradeSide;
use crate::types::position::LifecycleState;
use async_trait::async_trait;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::transaction::VersionedTransaction;
use std::sync::Arc;

/// A swap the execution engine wants routed. Amounts are already resolved to
/// base units: lamports in for buys, token base units in for sells.
#[derive(Debug, Clone)]
pub struct SwapIntent {
    pub user: Pubkey,
    pub mint: Pubkey,
    pub side: TradeSide,
    pub amount_in: u64,
    pub slippage_bps: u16,
    pub priority_fee_lamports: u64,
    pub launch_source: LaunchSource,
    /// Known curve/pool account, when discovery recorded one.
    pub bonding_curve: Option<Pubkey>,
}

/// A priced route. `raw` keeps the venue response for the Execution row.
#[derive(Debug, Clone)]
pub struct Quote {
    pub expected_out: u64,
    pub min_out: u64,
    pub price_sol_per_token: f64,
    pub route_label: String,
    pub raw: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct SwapResult {
    pub signature: solana_sdk::signature::Signature,
    pub endpoint: String,
    pub latency: std::time::Duration,
}

/// quote/build/execute over one venue class.
#[async_trait]
pub trait SwapRouter: Send + Sync {
    fn name(&self) -> &'static str;

    async fn quote(&self, intent: &SwapIntent) -> Result<Quote, TradeError>;

    /// Build the unsigned transaction for a quote. Signing happens in the
    /// external signer; this never sees key material.
    async fn build(
        &self,
        intent: &SwapIntent,
        quote: &Quote,
    ) -> Result<VersionedTransaction, TradeError>;

    /// Broadcast an already-signed transaction.
    async fn execute(&self, signed_tx: &VersionedTransaction) -> Result<SwapResult, TradeError>;
}

/// Both router variants, selected strictly by lifecycle state.
#[derive(Clone)]
pub struct RouterSet {
    pub bonding_curve: Arc<bonding_curve::BondingCurveRouter>,
    pub amm: Arc<amm::AmmRouter>,
}

impl RouterSet {
    /// Pre-graduation always routes to the originating launchpad's bonding
    /// curve; post-graduation always to the AMM. Unknown lifecycle is an
    /// error, never a guess.
    pub fn route(
        &self,
        mint: &Pubkey,
        lifecycle_state: Option<LifecycleState>,
    ) -> Result<Arc<dyn SwapRouter>, TradeError> {
        match lifecycle_state {
            Some(LifecycleState::PreGraduation) => Ok(self.bonding_curve.clone()),
            Some(LifecycleState::PostGraduation) => Ok(self.amm.clone()),
            Some(LifecycleState::Closed) | None => {
                Err(TradeError::LifecycleUnknown(mint.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // route() selection is pure; build a RouterSet without any live context
    fn router_set_for_tests() -> RouterSet {
        RouterSet {
            bonding_curve: Arc::new(bonding_curve::BondingCurveRouter::stub_for_tests()),
            amm: Arc::new(amm::AmmRouter::stub_for_tests()),
        }
    }

    #[test]
    fn routes_by_lifecycle_state() {
        let set = router_set_for_tests();
        let mint = Pubkey::new_unique();
        assert_eq!(
            set.route(&mint, Some(LifecycleState::PreGraduation))
                .unwrap()
                .name(),
            "bonding_curve"
        );
        assert_eq!(
            set.route(&mint, Some(LifecycleState::PostGraduation))
                .unwrap()
                .name(),
            "amm"
        );
    }

    #[test]
    fn unknown_lifecycle_never_guesses() {
        let set = router_set_for_tests();
        let mint = Pubkey::new_unique();
        assert!(matches!(
            set.route(&mint, None),
            Err(TradeError::LifecycleUnknown(_))
        ));
        assert!(matches!(
            set.route(&mint, Some(LifecycleState::Closed)),
            Err(TradeError::LifecycleUnknown(_))
        ));
    }
}
