use crate::config::app_context::AppContext;
use crate::config::constants::AMM_QUOTE_TIMEOUT;
use crate::programs::pump_curve::BondingCurveAccount;
use crate::programs::registry::{self, PUMPFUN_PROGRAM_PUBKEY, WSOL_MINT_ADDRESS};
use crate::types::error::TradeError;
use crate::types::position::{Position, PricingSource};
use solana_sdk::pubkey::Pubkey;
use std::str::FromStr;
use tracing::debug;

/// Prices a position from whichever source its lifecycle pins. The match on
/// `pricing_source` lives here and nowhere else.
pub struct PositionPricer {
    context: AppContext,
    quote_base_url: String,
}

impl PositionPricer {
    pub async fn new(context: &AppContext) -> Self {
        let quote_base_url = context.get_settings().await.amm.quote_base_url.clone();
        Self {
            context: context.clone(),
            quote_base_url,
        }
    }

    pub async fn price(&self, position: &Position) -> Result<f64, TradeError> {
        match position.pricing_source {
            PricingSource::BondingCurve => self.curve_price(position).await,
            PricingSource::AmmPool => self.amm_price(&position.mint).await,
        }
    }

    /// Spot price from on-chain curve reserves. A missing curve account
    /// means the token migrated; the graduation monitor owns that
    /// transition, so pricing reports it as unknown rather than guessing.
    async fn curve_price(&self, position: &Position) -> Result<f64, TradeError> {
        if let Some(cached) = self.context.price_cache.get(&position.mint) {
            return Ok(cached);
        }
        let curve_pubkey = match &position.bonding_curve {
            Some(curve) => Pubkey::from_str(curve)
                .map_err(|_| TradeError::InvalidAddress(curve.clone()))?,
            None => {
                let mint = Pubkey::from_str(&position.mint)
                    .map_err(|_| TradeError::InvalidAddress(position.mint.clone()))?;
                registry::bonding_curve_pda(&mint, &PUMPFUN_PROGRAM_PUBKEY)
            }
        };
        let account = self
            .context
            .rpc
            .get_account_optional(&curve_pubkey)
            .await?
            .ok_or_else(|| TradeError::LifecycleUnknown(position.mint.clone()))?;
        let curve = BondingCurveAccount::parse(&account.data)?;
        if curve.complete {
            return Err(TradeError::LifecycleUnknown(position.mint.clone()));
        }
        let price = curve.price_sol_per_token();
        self.context.price_cache.put(&position.mint, price);
        debug!(mint = %position.mint, price, "curve price refreshed");
        Ok(price)
    }

    /// Aggregator quote for one whole token, cached with jitter so a crowd
    /// of positions on one mint re-quotes smoothly.
    async fn amm_price(&self, mint: &str) -> Result<f64, TradeError> {
        if let Some(cached) = self.context.amm_quote_cache.get(mint) {
            return Ok(cached);
        }
        const ONE_TOKEN: u64 = 1_000_000;
        let url = format!(
            "{}/quote?inputMint={}&outputMint={}&amount={}&slippageBps=100",
            self.quote_base_url.trim_end_matches('/'),
            mint,
            WSOL_MINT_ADDRESS,
            ONE_TOKEN,
        );
        let response = self
            .context
            .http
            .get(&url)
            .timeout(AMM_QUOTE_TIMEOUT)
            .send()
            .await
            .map_err(|e| TradeError::QuoteFailed(e.to_string()))?;
        if !response.status().is_success() {
            return Err(TradeError::QuoteFailed(format!(
                "price quote returned {}",
                response.status()
            )));
        }
        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| TradeError::QuoteFailed(e.to_string()))?;
        let out_lamports = body
            .get("outAmount")
            .and_then(|v| v.as_str())
            .and_then(|s| s.parse::<u64>().ok())
            .ok_or_else(|| TradeError::QuoteFailed("missing outAmount".into()))?;
        let price = out_lamports as f64 / 1e9;
        self.context.amm_quote_cache.put(mint, price);
        debug!(mint = %mint, price, "amm price refreshed");
        Ok(price)
    }
}
