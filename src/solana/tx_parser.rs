use crate::types::error::TradeError;
use crate::types::execution::{Fill, TradeSide};
use crate::utils::decimals::lamports_to_sol;
use solana_sdk::message::VersionedMessage;
use solana_sdk::pubkey::Pubkey;
use solana_transaction_status::option_serializer::OptionSerializer;
use solana_transaction_status::{
    EncodedTransactionWithStatusMeta, UiTransactionStatusMeta, UiTransactionTokenBalance,
};
use std::str::FromStr;

/// An instruction resolved against the full account-key table, whether the
/// message was legacy or versioned.
#[derive(Debug, Clone)]
pub struct DecodedInstruction {
    pub program_id: Pubkey,
    pub accounts: Vec<Pubkey>,
    pub data: Vec<u8>,
}

fn deserialize_opt<T: Clone>(item: &OptionSerializer<T>) -> Option<T> {
    match item {
        OptionSerializer::Some(val) => Some(val.clone()),
        _ => None,
    }
}

/// The complete account-key table of a transaction: static keys plus, for
/// versioned messages, the addresses loaded from lookup tables (writable
/// first, then readonly, as the runtime orders them).
pub fn account_keys(
    tx: &EncodedTransactionWithStatusMeta,
) -> Result<Vec<Pubkey>, TradeError> {
    let versioned = tx
        .transaction
        .decode()
        .ok_or_else(|| TradeError::Rpc("transaction not decodable".into()))?;
    let mut keys: Vec<Pubkey> = versioned.message.static_account_keys().to_vec();
    if let VersionedMessage::V0(_) = versioned.message {
        if let Some(meta) = &tx.meta {
            if let Some(loaded) = deserialize_opt(&meta.loaded_addresses) {
                for addr in loaded.writable.iter().chain(loaded.readonly.iter()) {
                    keys.push(
                        Pubkey::from_str(addr)
                            .map_err(|e| TradeError::Rpc(format!("bad loaded address: {e}")))?,
                    );
                }
            }
        }
    }
    Ok(keys)
}

/// Walk every top-level instruction of a fetched transaction, resolving
/// program ids and account lists. Handles both legacy and versioned messages.
pub fn walk_instructions(
    tx: &EncodedTransactionWithStatusMeta,
) -> Result<Vec<DecodedInstruction>, TradeError> {
    let versioned = tx
        .transaction
        .decode()
        .ok_or_else(|| TradeError::Rpc("transaction not decodable".into()))?;
    let keys = account_keys(tx)?;
    let compiled = versioned.message.instructions();
    let mut decoded = Vec::with_capacity(compiled.len());
    for ix in compiled {
        let program_id = *keys
            .get(ix.program_id_index as usize)
            .ok_or_else(|| TradeError::Rpc("program id index out of range".into()))?;
        let accounts = ix
            .accounts
            .iter()
            .filter_map(|i| keys.get(*i as usize).copied())
            .collect();
        decoded.push(DecodedInstruction {
            program_id,
            accounts,
            data: ix.data.clone(),
        });
    }
    Ok(decoded)
}

fn token_amount_for(
    balances: &[UiTransactionTokenBalance],
    owner: &str,
    mint: &str,
) -> u64 {
    balances
        .iter()
        .filter(|b| {
            b.mint == mint
                && matches!(&b.owner, OptionSerializer::Some(o) if o == owner)
        })
        .filter_map(|b| b.ui_token_amount.amount.parse::<u64>().ok())
        .sum()
}

/// Compute the filled amounts of a confirmed swap from balance deltas:
/// tokens from pre/post token balances, SOL from pre/post lamport balances
/// with the fee backed out.
pub fn parse_fill(
    meta: &UiTransactionStatusMeta,
    keys: &[Pubkey],
    user: &Pubkey,
    mint: &str,
    side: TradeSide,
    token_decimals: u8,
) -> Result<Fill, TradeError> {
    let owner = user.to_string();
    let pre_tokens = deserialize_opt(&meta.pre_token_balances)
        .map(|b| token_amount_for(&b, &owner, mint))
        .unwrap_or(0);
    let post_tokens = deserialize_opt(&meta.post_token_balances)
        .map(|b| token_amount_for(&b, &owner, mint))
        .unwrap_or(0);

    let user_index = keys
        .iter()
        .position(|k| k == user)
        .ok_or_else(|| TradeError::Rpc("user not in transaction accounts".into()))?;
    let pre_sol = *meta
        .pre_balances
        .get(user_index)
        .ok_or_else(|| TradeError::Rpc("pre balance missing".into()))?;
    let post_sol = *meta
        .post_balances
        .get(user_index)
        .ok_or_else(|| TradeError::Rpc("post balance missing".into()))?;
    // fee is always paid by account 0; back it out only when that is the user
    let fee = if user_index == 0 { meta.fee } else { 0 };

    let (tokens, sol_lamports) = match side {
        TradeSide::Buy => (
            post_tokens.saturating_sub(pre_tokens),
            pre_sol.saturating_sub(post_sol).saturating_sub(fee),
        ),
        TradeSide::Sell => (
            pre_tokens.saturating_sub(post_tokens),
            post_sol.saturating_sub(pre_sol).saturating_add(fee),
        ),
    };

    if tokens == 0 {
        return Err(TradeError::Rpc("no token delta in confirmed swap".into()));
    }
    let sol = lamports_to_sol(sol_lamports);
    let tokens_ui = tokens as f64 / 10f64.powi(token_decimals as i32);
    Ok(Fill {
        tokens,
        sol,
        price_per_token: if tokens_ui > 0.0 { sol / tokens_ui } else { 0.0 },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_transaction_status::UiTransactionTokenBalance;
    use solana_account_decoder::parse_token::UiTokenAmount;

    fn token_balance(account_index: u8, mint: &str, owner: &str, amount: u64) -> UiTransactionTokenBalance {
        UiTransactionTokenBalance {
            account_index,
            mint: mint.to_string(),
            ui_token_amount: UiTokenAmount {
                ui_amount: None,
                decimals: 6,
                amount: amount.to_string(),
                ui_amount_string: String::new(),
            },
            owner: OptionSerializer::Some(owner.to_string()),
            program_id: OptionSerializer::None,
        }
    }

    fn meta_with(
        pre_balances: Vec<u64>,
        post_balances: Vec<u64>,
        fee: u64,
        pre_tokens: Vec<UiTransactionTokenBalance>,
        post_tokens: Vec<UiTransactionTokenBalance>,
    ) -> UiTransactionStatusMeta {
        UiTransactionStatusMeta {
            err: None,
            status: Ok(()),
            fee,
            pre_balances,
            post_balances,
            inner_instructions: OptionSerializer::None,
            log_messages: OptionSerializer::None,
            pre_token_balances: OptionSerializer::Some(pre_tokens),
            post_token_balances: OptionSerializer::Some(post_tokens),
            rewards: OptionSerializer::None,
            loaded_addresses: OptionSerializer::None,
            return_data: OptionSerializer::None,
            compute_units_consumed: OptionSerializer::None,
        }
    }

    #[test]
    fn buy_fill_from_balance_deltas() {
        let user = Pubkey::new_unique();
        let mint = Pubkey::new_unique().to_string();
        let owner = user.to_string();
        // user pays 1 SOL + 5000 fee, receives 1_000_000_000 base units (1000 tokens)
        let meta = meta_with(
            vec![2_000_000_000, 0],
            vec![999_995_000, 0],
            5_000,
            vec![],
            vec![token_balance(1, &mint, &owner, 1_000_000_000)],
        );
        let fill = parse_fill(&meta, &[user, Pubkey::new_unique()], &user, &mint, TradeSide::Buy, 6).unwrap();
        assert_eq!(fill.tokens, 1_000_000_000);
        assert!((fill.sol - 1.0).abs() < 1e-9);
        assert!((fill.price_per_token - 0.001).abs() < 1e-9);
    }

    #[test]
    fn sell_fill_adds_back_the_fee() {
        let user = Pubkey::new_unique();
        let mint = Pubkey::new_unique().to_string();
        let owner = user.to_string();
        // user sells 500 tokens, lamport balance rises by 0.5 SOL minus fee
        let meta = meta_with(
            vec![1_000_000_000],
            vec![1_499_995_000],
            5_000,
            vec![token_balance(0, &mint, &owner, 500_000_000)],
            vec![],
        );
        let fill = parse_fill(&meta, &[user], &user, &mint, TradeSide::Sell, 6).unwrap();
        assert_eq!(fill.tokens, 500_000_000);
        assert!((fill.sol - 0.5).abs() < 1e-9);
    }

    #[test]
    fn zero_token_delta_is_an_error() {
        let user = Pubkey::new_unique();
        let mint = Pubkey::new_unique().to_string();
        let meta = meta_with(vec![1_000], vec![900], 0, vec![], vec![]);
        assert!(parse_fill(&meta, &[user], &user, &mint, TradeSide::Buy, 6).is_err());
    }

    use solana_sdk::instruction::CompiledInstruction;
    use solana_sdk::message::v0;
    use solana_sdk::message::{Message, MessageHeader, VersionedMessage};
    use solana_sdk::transaction::VersionedTransaction;
    use solana_transaction_status::{EncodedTransaction, TransactionBinaryEncoding};

    fn encode(tx: VersionedTransaction) -> EncodedTransactionWithStatusMeta {
        use base64::engine::general_purpose::STANDARD as BASE64;
        use base64::Engine;
        EncodedTransactionWithStatusMeta {
            transaction: EncodedTransaction::Binary(
                BASE64.encode(bincode::serialize(&tx).unwrap()),
                TransactionBinaryEncoding::Base64,
            ),
            meta: None,
            version: None,
        }
    }

    fn create_like_instruction() -> (CompiledInstruction, Vec<Pubkey>) {
        let program = Pubkey::new_unique();
        let mint = Pubkey::new_unique();
        let user = Pubkey::new_unique();
        let ix = CompiledInstruction {
            program_id_index: 2,
            accounts: vec![1],
            data: vec![214, 144, 76, 236, 95, 139, 49, 180],
        };
        (ix, vec![user, mint, program])
    }

    #[test]
    fn walks_legacy_message_instructions() {
        let (ix, keys) = create_like_instruction();
        let message = Message {
            header: MessageHeader {
                num_required_signatures: 1,
                num_readonly_signed_accounts: 0,
                num_readonly_unsigned_accounts: 1,
            },
            account_keys: keys.clone(),
            recent_blockhash: solana_sdk::hash::Hash::default(),
            instructions: vec![ix],
        };
        let tx = VersionedTransaction {
            signatures: vec![solana_sdk::signature::Signature::default()],
            message: VersionedMessage::Legacy(message),
        };
        let decoded = walk_instructions(&encode(tx)).unwrap();
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].program_id, keys[2]);
        assert_eq!(decoded[0].accounts, vec![keys[1]]);
        assert_eq!(&decoded[0].data[..8], &[214, 144, 76, 236, 95, 139, 49, 180]);
    }

    #[test]
    fn walks_versioned_message_instructions() {
        let (ix, keys) = create_like_instruction();
        let message = v0::Message {
            header: MessageHeader {
                num_required_signatures: 1,
                num_readonly_signed_accounts: 0,
                num_readonly_unsigned_accounts: 1,
            },
            account_keys: keys.clone(),
            recent_blockhash: solana_sdk::hash::Hash::default(),
            instructions: vec![ix],
            address_table_lookups: vec![],
        };
        let tx = VersionedTransaction {
            signatures: vec![solana_sdk::signature::Signature::default()],
            message: VersionedMessage::V0(message),
        };
        // same decoder serves both encodings
        let decoded = walk_instructions(&encode(tx)).unwrap();
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].program_id, keys[2]);
    }
}
