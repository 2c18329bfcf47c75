use const_format::concatcp;

pub const SLASH_SEPARATOR: &str = "/";

// Reserved bucket, all admin and peer APIs live below it.
pub const SYSTEM_RESERVED_BUCKET: &str = "hulk";
pub const SYSTEM_RESERVED_BUCKET_PATH: &str = concatcp!(SLASH_SEPARATOR, SYSTEM_RESERVED_BUCKET);

pub const ADMIN_PATH_PREFIX: &str = concatcp!(SYSTEM_RESERVED_BUCKET_PATH, "/admin");
pub const ADMIN_API_VERSION: &str = "v3";
pub const ADMIN_API_PREFIX: &str = concatcp!(ADMIN_PATH_PREFIX, SLASH_SEPARATOR, ADMIN_API_VERSION);

pub const HULK_USER_AGENT: &str = concatcp!("Hulk-Heal/", env!("CARGO_PKG_VERSION"));
