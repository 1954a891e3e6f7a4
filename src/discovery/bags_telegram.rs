use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;
use thiserror::Error;

const MIN_MESSAGE_LEN: usize = 8;
const MINT_MIN_LEN: usize = 32;
const MINT_MAX_LEN: usize = 44;

static LABELLED_MINT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?im)^\s*(?:Mint|CA|Contract)\s*:\s*([1-9A-HJ-NP-Za-km-z]+)\s*$").unwrap()
});
static URL_MINT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(?:dexscreener\.com/solana/|solscan\.io/token/|birdeye\.so/token/)([1-9A-HJ-NP-Za-km-z]+)",
    )
    .unwrap()
});
static STANDALONE_MINT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*([1-9A-HJ-NP-Za-km-z]{32,44})\s*$").unwrap());
static DOLLAR_SYMBOL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$([A-Za-z0-9]{1,12})\b").unwrap());
static PAREN_SYMBOL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\(([A-Za-z0-9]{1,12})\)").unwrap());
static NAME_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?im)^\s*Name\s*:\s*(.+?)\s*$").unwrap());

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BagsParseError {
    #[error("empty_message")]
    EmptyMessage,
    #[error("message_too_short")]
    MessageTooShort,
    #[error("no_mint_found")]
    NoMintFound,
    #[error("ambiguous_mint_candidates")]
    AmbiguousMintCandidates,
    #[error("invalid_mint")]
    InvalidMint,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedBagsLaunch {
    pub mint: String,
    pub symbol: Option<String>,
    pub name: Option<String>,
}

fn validate_mint(candidate: &str) -> Result<String, BagsParseError> {
    if candidate.len() < MINT_MIN_LEN || candidate.len() > MINT_MAX_LEN {
        return Err(BagsParseError::InvalidMint);
    }
    // regexes only admit the base58 alphabet, the length check is the rest
    Ok(candidate.to_string())
}

/// Deterministic parser for Bags launch announcements. Labelled mints win;
/// URL mints come next; a single standalone base58 line is accepted; more
/// than one unlabelled candidate fails closed.
pub fn parse_bags_message(message: &str) -> Result<ParsedBagsLaunch, BagsParseError> {
    let trimmed = message.trim();
    if trimmed.is_empty() {
        return Err(BagsParseError::EmptyMessage);
    }
    if trimmed.len() < MIN_MESSAGE_LEN {
        return Err(BagsParseError::MessageTooShort);
    }

    let mint = extract_mint(trimmed)?;
    let symbol = DOLLAR_SYMBOL
        .captures(trimmed)
        .or_else(|| PAREN_SYMBOL.captures(trimmed))
        .map(|c| c[1].to_uppercase());
    let name = NAME_LINE.captures(trimmed).map(|c| c[1].to_string());

    Ok(ParsedBagsLaunch { mint, symbol, name })
}

fn extract_mint(message: &str) -> Result<String, BagsParseError> {
    if let Some(captures) = LABELLED_MINT.captures(message) {
        return validate_mint(&captures[1]);
    }

    let url_mints: BTreeSet<String> = URL_MINT
        .captures_iter(message)
        .map(|c| c[1].to_string())
        .collect();
    match url_mints.len() {
        1 => return validate_mint(url_mints.iter().next().unwrap()),
        0 => {}
        _ => return Err(BagsParseError::AmbiguousMintCandidates),
    }

    let standalone: BTreeSet<String> = STANDALONE_MINT
        .captures_iter(message)
        .map(|c| c[1].to_string())
        .collect();
    match standalone.len() {
        1 => validate_mint(standalone.iter().next().unwrap()),
        0 => Err(BagsParseError::NoMintFound),
        _ => Err(BagsParseError::AmbiguousMintCandidates),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WSOL: &str = "So11111111111111111111111111111111111111112";

    #[test]
    fn labelled_mint_with_symbol_and_name() {
        let message = format!("🚀 New Launch: $BAGS\nMint: {WSOL}\nName: Bags Test Token");
        let parsed = parse_bags_message(&message).unwrap();
        assert_eq!(parsed.mint, WSOL);
        assert_eq!(parsed.symbol.as_deref(), Some("BAGS"));
        assert_eq!(parsed.name.as_deref(), Some("Bags Test Token"));
    }

    #[test]
    fn two_unlabelled_addresses_fail_closed() {
        let other = "4k3Dyjzvzp8eMZWUXbBCjEvwSkkk59S5iCNLY3QrkX6R";
        let message = format!("fresh launch\n{WSOL}\n{other}");
        assert_eq!(
            parse_bags_message(&message),
            Err(BagsParseError::AmbiguousMintCandidates)
        );
    }

    #[test]
    fn parser_is_deterministic() {
        let message = format!("something $ABC\n{WSOL}");
        assert_eq!(parse_bags_message(&message), parse_bags_message(&message));
    }

    #[test]
    fn labelled_mint_beats_stray_addresses() {
        let other = "4k3Dyjzvzp8eMZWUXbBCjEvwSkkk59S5iCNLY3QrkX6R";
        let message = format!("CA: {WSOL}\nalso seen {other}");
        assert_eq!(parse_bags_message(&message).unwrap().mint, WSOL);
    }

    #[test]
    fn url_forms_are_recognized() {
        for url in [
            format!("https://dexscreener.com/solana/{WSOL}"),
            format!("https://solscan.io/token/{WSOL}"),
            format!("https://birdeye.so/token/{WSOL}?chain=solana"),
        ] {
            let message = format!("new bags launch\n{url}");
            assert_eq!(parse_bags_message(&message).unwrap().mint, WSOL, "{url}");
        }
    }

    #[test]
    fn paren_symbol_is_uppercased() {
        let message = format!("Bags launch (bgs)\nMint: {WSOL}");
        assert_eq!(
            parse_bags_message(&message).unwrap().symbol.as_deref(),
            Some("BGS")
        );
    }

    #[test]
    fn rejects_empty_short_and_mintless() {
        assert_eq!(parse_bags_message("   "), Err(BagsParseError::EmptyMessage));
        assert_eq!(parse_bags_message("hi"), Err(BagsParseError::MessageTooShort));
        assert_eq!(
            parse_bags_message("a new token launched today, no address given"),
            Err(BagsParseError::NoMintFound)
        );
    }

    #[test]
    fn labelled_mint_with_bad_length_is_invalid() {
        let message = "Mint: 4k3Dyjzvzp8eMZW\nName: Short";
        assert_eq!(parse_bags_message(message), Err(BagsParseError::InvalidMint));
    }
}
