use crate::types::error::TradeError;

/// Byte offset of the name field: key (1) + update authority (32) + mint (32).
const DATA_OFFSET: usize = 1 + 32 + 32;

/// On-chain token metadata, parsed from the fixed Metaplex Metadata layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenMetadata {
    pub name: String,
    pub symbol: String,
    pub uri: String,
}

/// Parse a Metaplex Metadata account. Each string field is a u32 length
/// followed by that many bytes, null-padded to a fixed width (32-byte name,
/// 10-byte symbol, 200-byte uri); padding is stripped.
pub fn parse_metadata_account(data: &[u8]) -> Result<TokenMetadata, TradeError> {
    let mut cursor = DATA_OFFSET;
    let name = read_padded_string(data, &mut cursor)?;
    let symbol = read_padded_string(data, &mut cursor)?;
    let uri = read_padded_string(data, &mut cursor)?;
    Ok(TokenMetadata { name, symbol, uri })
}

fn read_padded_string(data: &[u8], cursor: &mut usize) -> Result<String, TradeError> {
    let len_end = *cursor + 4;
    if data.len() < len_end {
        return Err(TradeError::Rpc("metadata account truncated".into()));
    }
    let len = u32::from_le_bytes(data[*cursor..len_end].try_into().unwrap()) as usize;
    let str_end = len_end + len;
    if data.len() < str_end {
        return Err(TradeError::Rpc("metadata string overruns account".into()));
    }
    let raw = &data[len_end..str_end];
    *cursor = str_end;
    let trimmed = raw
        .iter()
        .position(|&b| b == 0)
        .map(|zero| &raw[..zero])
        .unwrap_or(raw);
    String::from_utf8(trimmed.to_vec())
        .map_err(|e| TradeError::Rpc(format!("metadata string not utf-8: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_padded(buf: &mut Vec<u8>, s: &str, width: usize) {
        buf.extend_from_slice(&(width as u32).to_le_bytes());
        let mut bytes = s.as_bytes().to_vec();
        bytes.resize(width, 0);
        buf.extend_from_slice(&bytes);
    }

    fn account_with(name: &str, symbol: &str, uri: &str) -> Vec<u8> {
        let mut buf = vec![0u8; DATA_OFFSET];
        write_padded(&mut buf, name, 32);
        write_padded(&mut buf, symbol, 10);
        write_padded(&mut buf, uri, 200);
        buf
    }

    #[test]
    fn round_trips_known_length_strings_modulo_padding() {
        let data = account_with("Bags Test Token", "BAGS", "https://example.org/meta.json");
        let parsed = parse_metadata_account(&data).unwrap();
        assert_eq!(parsed.name, "Bags Test Token");
        assert_eq!(parsed.symbol, "BAGS");
        assert_eq!(parsed.uri, "https://example.org/meta.json");
        // determinism
        assert_eq!(parsed, parse_metadata_account(&data).unwrap());
    }

    #[test]
    fn full_width_strings_survive_unpadded() {
        let symbol = "ABCDEFGHIJ"; // exactly 10 bytes, no null terminator
        let data = account_with("x", symbol, "");
        assert_eq!(parse_metadata_account(&data).unwrap().symbol, symbol);
    }

    #[test]
    fn truncated_account_is_an_error() {
        let data = account_with("Name", "SYM", "uri");
        assert!(parse_metadata_account(&data[..DATA_OFFSET + 10]).is_err());
        assert!(parse_metadata_account(&[0u8; 4]).is_err());
    }
}
