use std::sync::LazyLock;

pub mod version;

pub static STARTUP_TIME: LazyLock<std::time::SystemTime> =
    LazyLock::new(std::time::SystemTime::now);

/// name of the cookie carrying the anonymous visitor token.
pub const USER_COOKIE: &str = "quote_user_id";
/// upper bound of a stored `user_identifier`.
pub const MAX_USER_IDENTIFIER_LEN: usize = 100;

pub const MAX_SOURCE_LEN: usize = 200;
pub const MAX_QUOTES_PER_SOURCE: i64 = 3;
pub const DEFAULT_WEIGHT: i64 = 1;

pub const TOP_QUOTES_LIMIT: i64 = 10;
