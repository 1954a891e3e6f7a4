pub mod candidate;
pub mod error;
pub mod events;
pub mod execution;
pub mod outbox;
pub mod position;
pub mod strategy;
pub mod user;
