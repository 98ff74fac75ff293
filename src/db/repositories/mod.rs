pub mod interpretations;
pub mod kv_store;

pub use kv_store::LATEST_READING_KEY;
