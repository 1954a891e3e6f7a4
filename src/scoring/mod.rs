use crate::config::settings::ScoringConfig;
use serde_derive::{Deserialize, Serialize};
use strum_macros::Display;

/// Everything the scorer can know about a launch. `None` means unknown, and
/// unknowns score conservatively rather than failing.
#[derive(Debug, Clone, Default)]
pub struct TokenAnalysis {
    pub mint: String,
    pub is_legacy_spl: bool,
    /// Freeze authority present on the mint.
    pub freeze_authority: Option<bool>,
    /// Mint authority still live.
    pub mint_authority: Option<bool>,
    pub sell_tax_percent: Option<f64>,
    pub honeypot_suspected: bool,
    pub liquidity_sol: Option<f64>,
    pub lp_locked: Option<bool>,
    pub holder_count: Option<u32>,
    pub top10_concentration_percent: Option<f64>,
    pub deployer_rug_count: Option<u32>,
    pub deployer_success_count: Option<u32>,
    pub deployer_blacklisted: bool,
    pub ownership_renounced: Option<bool>,
    pub can_pause_or_blacklist: Option<bool>,
    pub est_slippage_percent: Option<f64>,
    /// Gas cost relative to position size, as a fraction.
    pub gas_cost_ratio: Option<f64>,
    pub has_twitter: Option<bool>,
    pub has_website: Option<bool>,
    pub has_image: Option<bool>,
    /// Meteora DBC launches must carry their pool init addresses.
    pub dbc_pool_missing: bool,
}

/// Category weights. The documented scale is the sum, not an assumed 35.
pub mod weights {
    pub const SELLABILITY: i32 = 12;
    pub const SUPPLY_INTEGRITY: i32 = 8;
    pub const LIQUIDITY_CONTROL: i32 = 10;
    pub const DISTRIBUTION: i32 = 9;
    pub const DEPLOYER_PROVENANCE: i32 = 8;
    pub const POST_LAUNCH_CONTROLS: i32 = 7;
    pub const EXECUTION_RISK: i32 = 6;

    pub const SCALE_MAX: i32 = SELLABILITY
        + SUPPLY_INTEGRITY
        + LIQUIDITY_CONTROL
        + DISTRIBUTION
        + DEPLOYER_PROVENANCE
        + POST_LAUNCH_CONTROLS
        + EXECUTION_RISK;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    Skip,
    Tiny,
    Tradable,
    Best,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryScore {
    pub category: String,
    pub score: i32,
    pub max: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreReport {
    pub total: i32,
    pub scale_max: i32,
    pub min_qualification_score: i32,
    pub per_category: Vec<CategoryScore>,
    pub hard_stop: Option<String>,
    pub reasons: Vec<String>,
    pub decision: Decision,
}

/// Fail-closed gate ahead of scoring. A hard stop short-circuits with its
/// reason attached; social-metadata stops are soft unless strict mode is on
/// (the documented pump.pro relaxation).
pub fn hard_stop(analysis: &TokenAnalysis, config: &ScoringConfig) -> Option<String> {
    if analysis.honeypot_suspected {
        return Some("honeypot_suspected".to_string());
    }
    if analysis.is_legacy_spl && analysis.freeze_authority == Some(true) {
        return Some("freeze_authority_present".to_string());
    }
    if analysis.deployer_blacklisted {
        return Some("deployer_blacklisted".to_string());
    }
    if analysis.dbc_pool_missing {
        return Some("dbc_pool_addresses_missing".to_string());
    }
    if config.strict_social_metadata
        && (analysis.has_twitter == Some(false)
            || analysis.has_website == Some(false)
            || analysis.has_image == Some(false))
    {
        return Some("social_metadata_missing".to_string());
    }
    None
}

fn score_sellability(a: &TokenAnalysis, reasons: &mut Vec<String>) -> i32 {
    let mut score = 0;
    match a.freeze_authority {
        Some(false) => score += 5,
        Some(true) => reasons.push("freeze_authority_present".into()),
        None => score += 2,
    }
    match a.sell_tax_percent {
        Some(tax) if tax <= 1.0 => score += 4,
        Some(tax) if tax <= 5.0 => score += 2,
        Some(_) => reasons.push("high_sell_tax".into()),
        None => score += 2,
    }
    if !a.honeypot_suspected {
        score += 3;
    }
    score.min(weights::SELLABILITY)
}

fn score_supply_integrity(a: &TokenAnalysis, reasons: &mut Vec<String>) -> i32 {
    match a.mint_authority {
        Some(false) => weights::SUPPLY_INTEGRITY,
        Some(true) => {
            reasons.push("mint_authority_live".into());
            0
        }
        None => weights::SUPPLY_INTEGRITY / 2,
    }
}

fn score_liquidity_control(a: &TokenAnalysis, reasons: &mut Vec<String>) -> i32 {
    let mut score = 0;
    match a.liquidity_sol {
        Some(liq) if liq >= 50.0 => score += 6,
        Some(liq) if liq >= 10.0 => score += 4,
        Some(liq) if liq > 0.0 => score += 2,
        Some(_) => reasons.push("no_liquidity".into()),
        None => score += 2,
    }
    match a.lp_locked {
        Some(true) => score += 4,
        Some(false) => reasons.push("lp_unlocked".into()),
        None => score += 1,
    }
    score.min(weights::LIQUIDITY_CONTROL)
}

fn score_distribution(a: &TokenAnalysis, reasons: &mut Vec<String>) -> i32 {
    let mut score = 0;
    match a.holder_count {
        Some(h) if h >= 100 => score += 4,
        Some(h) if h >= 20 => score += 2,
        Some(_) => {}
        None => score += 1,
    }
    match a.top10_concentration_percent {
        Some(c) if c <= 30.0 => score += 5,
        Some(c) if c <= 60.0 => score += 2,
        Some(_) => reasons.push("concentrated_supply".into()),
        None => score += 2,
    }
    score.min(weights::DISTRIBUTION)
}

fn score_deployer(a: &TokenAnalysis, reasons: &mut Vec<String>) -> i32 {
    let mut score = 0;
    match a.deployer_rug_count {
        Some(0) => score += 5,
        Some(_) => reasons.push("deployer_prior_rugs".into()),
        None => score += 2,
    }
    match a.deployer_success_count {
        Some(s) if s > 0 => score += 3,
        _ => score += 1,
    }
    score.min(weights::DEPLOYER_PROVENANCE)
}

fn score_post_launch_controls(a: &TokenAnalysis, reasons: &mut Vec<String>) -> i32 {
    let mut score = 0;
    match a.ownership_renounced {
        Some(true) => score += 4,
        Some(false) => reasons.push("ownership_not_renounced".into()),
        None => score += 2,
    }
    match a.can_pause_or_blacklist {
        Some(false) => score += 3,
        Some(true) => reasons.push("pause_or_blacklist_capability".into()),
        None => score += 1,
    }
    score.min(weights::POST_LAUNCH_CONTROLS)
}

fn score_execution_risk(a: &TokenAnalysis, reasons: &mut Vec<String>) -> i32 {
    let mut score = 0;
    match a.est_slippage_percent {
        Some(s) if s <= 2.0 => score += 3,
        Some(s) if s <= 10.0 => score += 1,
        Some(_) => reasons.push("high_expected_slippage".into()),
        None => score += 1,
    }
    match a.gas_cost_ratio {
        Some(r) if r <= 0.01 => score += 3,
        Some(r) if r <= 0.05 => score += 1,
        Some(_) => reasons.push("gas_heavy_for_size".into()),
        None => score += 1,
    }
    score.min(weights::EXECUTION_RISK)
}

/// Score a launch. Hard stops decide SKIP outright; otherwise the weighted
/// categories produce a total on the configured scale and a threshold
/// decision.
pub fn score(analysis: &TokenAnalysis, config: &ScoringConfig) -> ScoreReport {
    let mut reasons = Vec::new();

    if let Some(stop) = hard_stop(analysis, config) {
        return ScoreReport {
            total: 0,
            scale_max: weights::SCALE_MAX,
            min_qualification_score: config.min_qualification_score,
            per_category: vec![],
            hard_stop: Some(stop.clone()),
            reasons: vec![stop],
            decision: Decision::Skip,
        };
    }

    let per_category = vec![
        CategoryScore {
            category: "sellability".into(),
            score: score_sellability(analysis, &mut reasons),
            max: weights::SELLABILITY,
        },
        CategoryScore {
            category: "supply_integrity".into(),
            score: score_supply_integrity(analysis, &mut reasons),
            max: weights::SUPPLY_INTEGRITY,
        },
        CategoryScore {
            category: "liquidity_control".into(),
            score: score_liquidity_control(analysis, &mut reasons),
            max: weights::LIQUIDITY_CONTROL,
        },
        CategoryScore {
            category: "distribution".into(),
            score: score_distribution(analysis, &mut reasons),
            max: weights::DISTRIBUTION,
        },
        CategoryScore {
            category: "deployer_provenance".into(),
            score: score_deployer(analysis, &mut reasons),
            max: weights::DEPLOYER_PROVENANCE,
        },
        CategoryScore {
            category: "post_launch_controls".into(),
            score: score_post_launch_controls(analysis, &mut reasons),
            max: weights::POST_LAUNCH_CONTROLS,
        },
        CategoryScore {
            category: "execution_risk".into(),
            score: score_execution_risk(analysis, &mut reasons),
            max: weights::EXECUTION_RISK,
        },
    ];
    let total: i32 = per_category.iter().map(|c| c.score).sum();

    let floor = config.min_qualification_score;
    let decision = if total < floor {
        Decision::Skip
    } else if total < floor + 10 {
        Decision::Tiny
    } else if total < weights::SCALE_MAX * 4 / 5 {
        Decision::Tradable
    } else {
        Decision::Best
    };

    ScoreReport {
        total,
        scale_max: weights::SCALE_MAX,
        min_qualification_score: floor,
        per_category,
        hard_stop: None,
        reasons,
        decision,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(strict: bool) -> ScoringConfig {
        ScoringConfig {
            min_qualification_score: 23,
            strict_social_metadata: strict,
        }
    }

    fn clean_analysis() -> TokenAnalysis {
        TokenAnalysis {
            mint: "TestMint".into(),
            is_legacy_spl: true,
            freeze_authority: Some(false),
            mint_authority: Some(false),
            sell_tax_percent: Some(0.0),
            honeypot_suspected: false,
            liquidity_sol: Some(80.0),
            lp_locked: Some(true),
            holder_count: Some(250),
            top10_concentration_percent: Some(20.0),
            deployer_rug_count: Some(0),
            deployer_success_count: Some(3),
            deployer_blacklisted: false,
            ownership_renounced: Some(true),
            can_pause_or_blacklist: Some(false),
            est_slippage_percent: Some(1.0),
            gas_cost_ratio: Some(0.005),
            has_twitter: Some(true),
            has_website: Some(true),
            has_image: Some(true),
            dbc_pool_missing: false,
        }
    }

    #[test]
    fn scale_is_documented_not_35() {
        assert!(weights::SCALE_MAX >= 58 && weights::SCALE_MAX <= 63);
        let report = score(&clean_analysis(), &config(false));
        assert_eq!(report.scale_max, weights::SCALE_MAX);
        assert_eq!(report.min_qualification_score, 23);
    }

    #[test]
    fn clean_token_scores_best() {
        let report = score(&clean_analysis(), &config(false));
        assert_eq!(report.total, weights::SCALE_MAX);
        assert_eq!(report.decision, Decision::Best);
        assert!(report.hard_stop.is_none());
    }

    #[test]
    fn freeze_authority_on_legacy_spl_is_a_hard_stop() {
        let mut analysis = clean_analysis();
        analysis.freeze_authority = Some(true);
        let report = score(&analysis, &config(false));
        assert_eq!(report.hard_stop.as_deref(), Some("freeze_authority_present"));
        assert_eq!(report.decision, Decision::Skip);
        assert_eq!(report.total, 0);
    }

    #[test]
    fn blacklisted_deployer_and_missing_dbc_pool_stop() {
        let mut analysis = clean_analysis();
        analysis.deployer_blacklisted = true;
        assert!(hard_stop(&analysis, &config(false)).is_some());

        let mut analysis = clean_analysis();
        analysis.dbc_pool_missing = true;
        assert_eq!(
            hard_stop(&analysis, &config(false)).as_deref(),
            Some("dbc_pool_addresses_missing")
        );
    }

    #[test]
    fn social_metadata_stop_is_soft_unless_strict() {
        let mut analysis = clean_analysis();
        analysis.has_twitter = Some(false);
        assert!(hard_stop(&analysis, &config(false)).is_none());
        assert_eq!(
            hard_stop(&analysis, &config(true)).as_deref(),
            Some("social_metadata_missing")
        );
    }

    #[test]
    fn below_floor_skips_and_reasons_accumulate() {
        let analysis = TokenAnalysis {
            mint: "Rug".into(),
            is_legacy_spl: true,
            freeze_authority: Some(false),
            mint_authority: Some(true),
            sell_tax_percent: Some(25.0),
            liquidity_sol: Some(0.0),
            lp_locked: Some(false),
            holder_count: Some(3),
            top10_concentration_percent: Some(95.0),
            deployer_rug_count: Some(4),
            deployer_success_count: Some(0),
            ownership_renounced: Some(false),
            can_pause_or_blacklist: Some(true),
            est_slippage_percent: Some(40.0),
            gas_cost_ratio: Some(0.2),
            ..TokenAnalysis::default()
        };
        let report = score(&analysis, &config(false));
        assert_eq!(report.decision, Decision::Skip);
        assert!(report.total < 23);
        assert!(report.reasons.contains(&"mint_authority_live".to_string()));
        assert!(report.reasons.contains(&"concentrated_supply".to_string()));
    }

    #[test]
    fn unknowns_score_conservatively_not_zero() {
        let analysis = TokenAnalysis {
            mint: "Unknown".into(),
            ..TokenAnalysis::default()
        };
        let report = score(&analysis, &config(false));
        assert!(report.total > 0);
        assert!(report.total < weights::SCALE_MAX);
    }
}
