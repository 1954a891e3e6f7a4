pub mod persistent;
pub mod price_cache;
