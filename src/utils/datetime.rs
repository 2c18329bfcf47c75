use chrono::Utc;

pub type DateTime = chrono::DateTime<Utc>;

pub fn now() -> DateTime {
    Utc::now()
}

// Zero value for timestamps a peer left unset.
pub fn epoch() -> DateTime {
    DateTime::from(std::time::UNIX_EPOCH)
}
