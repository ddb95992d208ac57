pub mod quotes;
pub mod reactions;
