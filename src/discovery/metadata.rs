use crate::config::constants::{METADATA_REST_TIMEOUT, TX_FETCH_BACKOFF, TX_FETCH_RETRIES};
use crate::programs::metaplex;
use crate::programs::registry;
use crate::solana::rpc_fanout::RpcFanout;
use serde_derive::Deserialize;
use solana_sdk::pubkey::Pubkey;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Where a candidate's metadata actually came from. Fallbacks never
/// masquerade as the real thing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataProvenance {
    Inline,
    Rest,
    OnchainMetaplex,
    Synthetic,
}

impl MetadataProvenance {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetadataProvenance::Inline => "inline",
            MetadataProvenance::Rest => "rest",
            MetadataProvenance::OnchainMetaplex => "onchain_metaplex",
            MetadataProvenance::Synthetic => "synthetic",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedMetadata {
    pub name: String,
    pub symbol: String,
    pub uri: String,
    pub provenance: MetadataProvenance,
}

#[derive(Debug, Deserialize)]
struct RestCoin {
    name: Option<String>,
    symbol: Option<String>,
    #[serde(alias = "image_uri", alias = "uri")]
    image_uri: Option<String>,
}

/// Deterministic synthetic identity for a mint whose metadata could not be
/// resolved anywhere.
pub fn synthetic_metadata(mint: &Pubkey) -> ResolvedMetadata {
    let mint_str = mint.to_string();
    ResolvedMetadata {
        name: format!("pump.pro-{}", &mint_str[..6]),
        symbol: mint_str[..4].to_string(),
        uri: String::new(),
        provenance: MetadataProvenance::Synthetic,
    }
}

/// pump.pro metadata fallback chain: REST API, then the on-chain Metaplex
/// Metadata PDA, then a synthetic identity. Each step is tagged so a
/// fallback can never silently pass as a primary source.
pub async fn resolve_pump_pro_metadata(
    http: &reqwest::Client,
    rest_base: &str,
    rpc: &RpcFanout,
    mint: &Pubkey,
) -> ResolvedMetadata {
    match fetch_rest_metadata(http, rest_base, mint).await {
        Ok(metadata) => return metadata,
        Err(e) => warn!(mint = %mint, error = %e, "pump.pro REST metadata failed, trying metaplex"),
    }
    match fetch_metaplex_metadata(rpc, mint).await {
        Ok(metadata) => return metadata,
        Err(e) => warn!(mint = %mint, error = %e, "metaplex metadata failed, synthesizing"),
    }
    synthetic_metadata(mint)
}

async fn fetch_rest_metadata(
    http: &reqwest::Client,
    rest_base: &str,
    mint: &Pubkey,
) -> anyhow::Result<ResolvedMetadata> {
    let url = format!("{}/coins/{}", rest_base.trim_end_matches('/'), mint);
    let response = http
        .get(&url)
        .header("Accept", "application/json")
        .timeout(METADATA_REST_TIMEOUT)
        .send()
        .await?;
    if !response.status().is_success() {
        anyhow::bail!("REST metadata returned {}", response.status());
    }
    let coin: RestCoin = response.json().await?;
    let (name, symbol) = match (coin.name, coin.symbol) {
        (Some(name), Some(symbol)) if !name.is_empty() && !symbol.is_empty() => (name, symbol),
        _ => anyhow::bail!("REST metadata incomplete"),
    };
    debug!(mint = %mint, "metadata resolved via REST");
    Ok(ResolvedMetadata {
        name,
        symbol,
        uri: coin.image_uri.unwrap_or_default(),
        provenance: MetadataProvenance::Rest,
    })
}

async fn fetch_metaplex_metadata(
    rpc: &RpcFanout,
    mint: &Pubkey,
) -> anyhow::Result<ResolvedMetadata> {
    let pda = registry::metadata_pda(mint);
    let mut attempt = 0u32;
    loop {
        match rpc.get_account_optional(&pda).await {
            Ok(Some(account)) => {
                let parsed = metaplex::parse_metadata_account(&account.data)?;
                debug!(mint = %mint, "metadata resolved via metaplex PDA");
                return Ok(ResolvedMetadata {
                    name: parsed.name,
                    symbol: parsed.symbol,
                    uri: parsed.uri,
                    provenance: MetadataProvenance::OnchainMetaplex,
                });
            }
            // freshly created metadata may not be visible yet
            Ok(None) | Err(_) if attempt + 1 < TX_FETCH_RETRIES => {
                attempt += 1;
                sleep(TX_FETCH_BACKOFF).await;
            }
            Ok(None) => anyhow::bail!("metadata PDA not found"),
            Err(e) => return Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn synthetic_identity_is_deterministic_and_tagged() {
        let mint = Pubkey::from_str("So11111111111111111111111111111111111111112").unwrap();
        let synthetic = synthetic_metadata(&mint);
        assert_eq!(synthetic.name, "pump.pro-So1111");
        assert_eq!(synthetic.symbol, "So11");
        assert_eq!(synthetic.uri, "");
        assert_eq!(synthetic.provenance, MetadataProvenance::Synthetic);
        assert_eq!(synthetic.provenance.as_str(), "synthetic");
    }
}
