use crate::config::constants::{AMM_QUOTE_TIMEOUT, BROADCAST_TIMEOUT};
use crate::programs::registry::WSOL_MINT_ADDRESS;
use crate::router::{Quote, SwapIntent, SwapResult, SwapRouter};
use crate::solana::rpc_fanout::RpcFanout;
use crate::types::error::TradeError;
use crate::types::execution::TradeSide;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::json;
use solana_sdk::transaction::VersionedTransaction;
use tracing::{debug, instrument};

/// Post-graduation router: quotes through a Jupiter-compatible aggregator
/// and swaps with the versioned transaction it assembles.
pub struct AmmRouter {
    rpc: RpcFanout,
    http: reqwest::Client,
    quote_base_url: String,
}

impl AmmRouter {
    pub fn new(rpc: RpcFanout, http: reqwest::Client, quote_base_url: String) -> Self {
        Self {
            rpc,
            http,
            quote_base_url,
        }
    }

    #[cfg(test)]
    pub fn stub_for_tests() -> Self {
        use solana_sdk::commitment_config::CommitmentConfig;
        Self {
            rpc: RpcFanout::new(
                &["http://localhost:8899".to_string()],
                CommitmentConfig::confirmed(),
            ),
            http: reqwest::Client::new(),
            quote_base_url: "http://localhost:0".to_string(),
        }
    }

    fn pair_for(&self, intent: &SwapIntent) -> (String, String) {
        match intent.side {
            TradeSide::Buy => (WSOL_MINT_ADDRESS.to_string(), intent.mint.to_string()),
            TradeSide::Sell => (intent.mint.to_string(), WSOL_MINT_ADDRESS.to_string()),
        }
    }

    fn quote_from_response(
        intent: &SwapIntent,
        body: serde_json::Value,
    ) -> Result<Quote, TradeError> {
        let expected_out = body
            .get("outAmount")
            .and_then(|v| v.as_str())
            .and_then(|s| s.parse::<u64>().ok())
            .ok_or_else(|| TradeError::QuoteFailed("missing outAmount".into()))?;
        if expected_out == 0 {
            return Err(TradeError::NoLiquidity(intent.mint.to_string()));
        }
        let min_out = body
            .get("otherAmountThreshold")
            .and_then(|v| v.as_str())
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or_else(|| {
                let slip = expected_out as u128 * intent.slippage_bps as u128 / 10_000;
                (expected_out as u128 - slip) as u64
            });
        // route label for observability, e.g. which venue the aggregator hit
        let route_label = body
            .get("routePlan")
            .and_then(|v| v.as_array())
            .and_then(|plan| plan.first())
            .and_then(|leg| leg.pointer("/swapInfo/label"))
            .and_then(|v| v.as_str())
            .unwrap_or("unknown")
            .to_string();

        let price_sol_per_token = match intent.side {
            TradeSide::Buy => {
                let sol_in = intent.amount_in as f64 / 1e9;
                let tokens_out = expected_out as f64 / 1e6;
                if tokens_out > 0.0 {
                    sol_in / tokens_out
                } else {
                    0.0
                }
            }
            TradeSide::Sell => {
                let tokens_in = intent.amount_in as f64 / 1e6;
                let sol_out = expected_out as f64 / 1e9;
                if tokens_in > 0.0 {
                    sol_out / tokens_in
                } else {
                    0.0
                }
            }
        };

        Ok(Quote {
            expected_out,
            min_out,
            price_sol_per_token,
            route_label,
            raw: body,
        })
    }
}

#[async_trait]
impl SwapRouter for AmmRouter {
    fn name(&self) -> &'static str {
        "amm"
    }

    #[instrument(skip(self), fields(mint = %intent.mint, side = %intent.side))]
    async fn quote(&self, intent: &SwapIntent) -> Result<Quote, TradeError> {
        let (input_mint, output_mint) = self.pair_for(intent);
        let url = format!(
            "{}/quote?inputMint={}&outputMint={}&amount={}&slippageBps={}",
            self.quote_base_url.trim_end_matches('/'),
            input_mint,
            output_mint,
            intent.amount_in,
            intent.slippage_bps
        );
        let response = self
            .http
            .get(&url)
            .timeout(AMM_QUOTE_TIMEOUT)
            .send()
            .await
            .map_err(|e| TradeError::QuoteFailed(e.to_string()))?;
        if !response.status().is_success() {
            return Err(TradeError::QuoteFailed(format!(
                "aggregator returned {}",
                response.status()
            )));
        }
        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| TradeError::QuoteFailed(e.to_string()))?;
        let quote = Self::quote_from_response(intent, body)?;
        debug!(route = %quote.route_label, expected_out = quote.expected_out, "amm quote");
        Ok(quote)
    }

    async fn build(
        &self,
        intent: &SwapIntent,
        quote: &Quote,
    ) -> Result<VersionedTransaction, TradeError> {
        let response = self
            .http
            .post(format!(
                "{}/swap",
                self.quote_base_url.trim_end_matches('/')
            ))
            .timeout(AMM_QUOTE_TIMEOUT)
            .json(&json!({
                "quoteResponse": quote.raw,
                "userPublicKey": intent.user.to_string(),
                "prioritizationFeeLamports": intent.priority_fee_lamports,
                "wrapAndUnwrapSol": true,
            }))
            .send()
            .await
            .map_err(|e| TradeError::QuoteFailed(e.to_string()))?;
        if !response.status().is_success() {
            return Err(TradeError::QuoteFailed(format!(
                "swap build returned {}",
                response.status()
            )));
        }
        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| TradeError::QuoteFailed(e.to_string()))?;
        let encoded = body
            .get("swapTransaction")
            .and_then(|v| v.as_str())
            .ok_or_else(|| TradeError::QuoteFailed("missing swapTransaction".into()))?;
        let bytes = BASE64
            .decode(encoded)
            .map_err(|e| TradeError::QuoteFailed(format!("bad base64: {e}")))?;
        bincode::deserialize(&bytes)
            .map_err(|e| TradeError::QuoteFailed(format!("bad swap transaction: {e}")))
    }

    async fn execute(&self, signed_tx: &VersionedTransaction) -> Result<SwapResult, TradeError> {
        let outcome = self.rpc.broadcast(signed_tx, BROADCAST_TIMEOUT).await?;
        Ok(SwapResult {
            signature: outcome.signature,
            endpoint: outcome.endpoint,
            latency: outcome.latency,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::candidate::LaunchSource;
    use solana_sdk::pubkey::Pubkey;

    fn intent(side: TradeSide, amount_in: u64) -> SwapIntent {
        SwapIntent {
            user: Pubkey::new_unique(),
            mint: Pubkey::new_unique(),
            side,
            amount_in,
            slippage_bps: 300,
            priority_fee_lamports: 0,
            launch_source: LaunchSource::Bags,
            bonding_curve: None,
        }
    }

    #[test]
    fn parses_aggregator_quote_with_route_label() {
        let body = json!({
            "outAmount": "2500000",
            "otherAmountThreshold": "2425000",
            "routePlan": [{"swapInfo": {"label": "Meteora DLMM"}}],
        });
        let quote = AmmRouter::quote_from_response(&intent(TradeSide::Buy, 1_000_000_000), body)
            .unwrap();
        assert_eq!(quote.expected_out, 2_500_000);
        assert_eq!(quote.min_out, 2_425_000);
        assert_eq!(quote.route_label, "Meteora DLMM");
        // 1 SOL for 2.5 tokens
        assert!((quote.price_sol_per_token - 0.4).abs() < 1e-9);
    }

    #[test]
    fn zero_out_amount_is_no_liquidity() {
        let body = json!({"outAmount": "0"});
        assert!(matches!(
            AmmRouter::quote_from_response(&intent(TradeSide::Sell, 1_000_000), body),
            Err(TradeError::NoLiquidity(_))
        ));
    }

    #[test]
    fn missing_out_amount_is_quote_failure() {
        let body = json!({"something": "else"});
        assert!(matches!(
            AmmRouter::quote_from_response(&intent(TradeSide::Buy, 1), body),
            Err(TradeError::QuoteFailed(_))
        ));
    }

    #[test]
    fn threshold_defaults_to_slippage_math() {
        let body = json!({"outAmount": "10000"});
        let quote =
            AmmRouter::quote_from_response(&intent(TradeSide::Sell, 1_000_000), body).unwrap();
        // 3% slippage on 10000
        assert_eq!(quote.min_out, 9_700);
    }
}
