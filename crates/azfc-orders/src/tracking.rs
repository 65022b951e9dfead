use chrono::{DateTime, Utc};

/// Callers regenerate on collision at most this many times.
pub const TRACKING_GENERATION_ATTEMPTS: usize = 3;

const PREFIX: &str = "AZFC-";

/// `AZFC-YYMMDD-XXXXXX`: UTC date plus six uppercase hex chars from 3 random bytes.
pub fn generate_tracking_number(now: DateTime<Utc>) -> String {
    tracking_number_from(now, rand::random::<[u8; 3]>())
}

/// Deterministic form of [`generate_tracking_number`].
pub fn tracking_number_from(now: DateTime<Utc>, suffix: [u8; 3]) -> String {
    format!(
        "{PREFIX}{}-{:02X}{:02X}{:02X}",
        now.format("%y%m%d"),
        suffix[0],
        suffix[1],
        suffix[2]
    )
}

/// Shape check only; does not look the number up.
pub fn is_valid_tracking_number(s: &str) -> bool {
    let Some(rest) = s.strip_prefix(PREFIX) else {
        return false;
    };
    let Some((date, suffix)) = rest.split_once('-') else {
        return false;
    };
    date.len() == 6
        && date.bytes().all(|b| b.is_ascii_digit())
        && suffix.len() == 6
        && suffix
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'A'..=b'F').contains(&b))
}
