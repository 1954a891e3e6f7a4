use thiserror::Error;

/// Trading-path error taxonomy. Business code matches on variants (or on
/// [`TradeError::code`]), never on message text.
#[derive(Error, Debug, Clone)]
pub enum TradeError {
    // -- input, never retried --
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("invalid token address: {0}")]
    InvalidAddress(String),
    #[error("amount out of bounds: {0}")]
    AmountOutOfBounds(String),

    // -- policy, not retried automatically --
    #[error("kill switch is engaged")]
    KillSwitch,
    #[error("max open positions reached")]
    MaxPositionsReached,
    #[error("hourly trade limit reached")]
    RateLimit,
    #[error("token not allowed by allowlist")]
    AllowlistMiss,
    #[error("insufficient funds: need {needed_sol} SOL, have {available_sol} SOL")]
    InsufficientFunds {
        needed_sol: f64,
        available_sol: f64,
    },

    // -- market --
    #[error("no liquidity for mint {0}")]
    NoLiquidity(String),
    #[error("quote failed: {0}")]
    QuoteFailed(String),
    #[error("honeypot detected: {0}")]
    HoneypotDetected(String),

    // -- concurrency, benign idempotent replays --
    #[error("another trade is in flight for this user+mint")]
    ConcurrentOperation,
    #[error("intent already executed under this idempotency key")]
    AlreadyExecuted,
    #[error("trigger state mismatch: {0}")]
    TriggerStateMismatch(String),

    // -- execution, retryable only under a new idempotency key --
    #[error("simulation failed: {detail}")]
    SimulationFailed { detail: String, transient: bool },
    #[error("broadcast failed: {0}")]
    BroadcastFailed(String),
    #[error("transaction not finalized before timeout")]
    ConfirmationTimeout,
    #[error("transaction reverted: {0}")]
    TransactionReverted(String),

    // -- routing --
    #[error("lifecycle state unknown for mint {0}")]
    LifecycleUnknown(String),

    // -- infrastructure --
    #[error("rpc error: {0}")]
    Rpc(String),
    #[error("database error: {0}")]
    Database(String),
    #[error("signer error: {0}")]
    Signer(String),
    #[error("all rpc endpoints failed")]
    AllEndpointsFailed,
}

impl TradeError {
    /// Structured code persisted on the Execution row and carried in
    /// notifications.
    pub fn code(&self) -> &'static str {
        match self {
            TradeError::InvalidInput(_) => "INVALID_INPUT",
            TradeError::InvalidAddress(_) => "INVALID_ADDRESS",
            TradeError::AmountOutOfBounds(_) => "AMOUNT_OUT_OF_BOUNDS",
            TradeError::KillSwitch => "KILL_SWITCH",
            TradeError::MaxPositionsReached => "MAX_POSITIONS_REACHED",
            TradeError::RateLimit => "RATE_LIMIT",
            TradeError::AllowlistMiss => "ALLOWLIST_MISS",
            TradeError::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            TradeError::NoLiquidity(_) => "NO_LIQUIDITY",
            TradeError::QuoteFailed(_) => "QUOTE_FAILED",
            TradeError::HoneypotDetected(_) => "HONEYPOT_DETECTED",
            TradeError::ConcurrentOperation => "CONCURRENT_OPERATION",
            TradeError::AlreadyExecuted => "ALREADY_EXECUTED",
            TradeError::TriggerStateMismatch(_) => "TRIGGER_STATE_MISMATCH",
            TradeError::SimulationFailed { .. } => "SIMULATION_FAILED",
            TradeError::BroadcastFailed(_) => "BROADCAST_FAILED",
            TradeError::ConfirmationTimeout => "CONFIRMATION_TIMEOUT",
            TradeError::TransactionReverted(_) => "TRANSACTION_REVERTED",
            TradeError::LifecycleUnknown(_) => "LIFECYCLE_UNKNOWN",
            TradeError::Rpc(_) => "RPC_ERROR",
            TradeError::Database(_) => "DATABASE_ERROR",
            TradeError::Signer(_) => "SIGNER_ERROR",
            TradeError::AllEndpointsFailed => "ALL_ENDPOINTS_FAILED",
        }
    }

    /// Whether the same semantic intent may be retried under a fresh
    /// idempotency key. Fatal errors must never be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            TradeError::QuoteFailed(_)
            | TradeError::BroadcastFailed(_)
            | TradeError::ConfirmationTimeout
            | TradeError::Rpc(_)
            | TradeError::AllEndpointsFailed => true,
            TradeError::SimulationFailed { transient, .. } => *transient,
            _ => false,
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            TradeError::InvalidInput(_)
                | TradeError::InvalidAddress(_)
                | TradeError::AmountOutOfBounds(_)
                | TradeError::HoneypotDetected(_)
                | TradeError::InsufficientFunds { .. }
                | TradeError::KillSwitch
        )
    }
}

impl From<diesel::result::Error> for TradeError {
    fn from(e: diesel::result::Error) -> Self {
        TradeError::Database(e.to_string())
    }
}

impl From<diesel_async::pooled_connection::deadpool::PoolError> for TradeError {
    fn from(e: diesel_async::pooled_connection::deadpool::PoolError) -> Self {
        TradeError::Database(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatal_errors_are_not_retryable() {
        let honeypot = TradeError::HoneypotDetected("round trip loss 99%".into());
        assert!(honeypot.is_fatal());
        assert!(!honeypot.is_retryable());
        assert_eq!(honeypot.code(), "HONEYPOT_DETECTED");
    }

    #[test]
    fn transient_simulation_failure_is_retryable() {
        let transient = TradeError::SimulationFailed {
            detail: "blockhash not found".into(),
            transient: true,
        };
        assert!(transient.is_retryable());
        let deterministic = TradeError::SimulationFailed {
            detail: "custom program error 0x1".into(),
            transient: false,
        };
        assert!(!deterministic.is_retryable());
    }

    #[test]
    fn idempotency_hits_are_benign() {
        assert!(!TradeError::AlreadyExecuted.is_retryable());
        assert!(!TradeError::AlreadyExecuted.is_fatal());
        assert!(!TradeError::ConcurrentOperation.is_fatal());
    }
}
