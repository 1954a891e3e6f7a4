pub mod decimals;
pub mod serdealizers;
