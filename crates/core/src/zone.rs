#![forbid(unsafe_code)]

use time::UtcOffset;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ZoneError(String);

impl std::fmt::Display for ZoneError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid utc offset {:?} (expected +HH:MM)", self.0)
    }
}

impl std::error::Error for ZoneError {}

/// Parses `+HH:MM`, `-HH:MM`, `Z` or `UTC`.
pub fn parse_utc_offset(raw: &str) -> Result<UtcOffset, ZoneError> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("z") || raw.eq_ignore_ascii_case("utc") {
        return Ok(UtcOffset::UTC);
    }
    let err = || ZoneError(raw.to_string());

    let bytes = raw.as_bytes();
    if !raw.is_ascii() || bytes.len() != 6 || bytes[3] != b':' {
        return Err(err());
    }
    let sign: i8 = match bytes[0] {
        b'+' => 1,
        b'-' => -1,
        _ => return Err(err()),
    };
    let hours = raw[1..3].parse::<i8>().map_err(|_| err())?;
    let minutes = raw[4..6].parse::<i8>().map_err(|_| err())?;
    if !(0..=23).contains(&hours) || !(0..=59).contains(&minutes) {
        return Err(err());
    }
    UtcOffset::from_hms(sign * hours, sign * minutes, 0).map_err(|_| err())
}

pub fn format_utc_offset(offset: UtcOffset) -> String {
    let (hours, minutes, _) = offset.as_hms();
    let sign = if offset.is_negative() { '-' } else { '+' };
    format!("{sign}{:02}:{:02}", hours.unsigned_abs(), minutes.unsigned_abs())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_signed_offsets() {
        assert_eq!(parse_utc_offset("+00:00").expect("utc"), UtcOffset::UTC);
        assert_eq!(parse_utc_offset("Z").expect("z"), UtcOffset::UTC);
        let ist = parse_utc_offset("+05:30").expect("ist");
        assert_eq!(ist.as_hms(), (5, 30, 0));
        let west = parse_utc_offset("-08:00").expect("pst");
        assert_eq!(west.as_hms(), (-8, 0, 0));
        assert_eq!(format_utc_offset(west), "-08:00");
        assert_eq!(format_utc_offset(ist), "+05:30");
    }

    #[test]
    fn rejects_malformed_offsets() {
        for raw in ["", "05:30", "+5:30", "+24:00", "+05:60", "+0530", "+aa:bb"] {
            assert!(parse_utc_offset(raw).is_err(), "{raw} should be rejected");
        }
    }
}
