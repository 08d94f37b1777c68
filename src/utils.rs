//! Formatting helpers and filename validation

use crate::error::{Error, Result};

/// Units and decimal places used by [`sizeof_human`]
const SIZE_UNITS: [(&str, usize); 6] = [
    ("B", 0),
    ("kB", 0),
    ("MB", 1),
    ("GB", 2),
    ("TB", 2),
    ("PB", 2),
];

/// Seconds per unit for [`time_human`], largest first
const TIME_UNITS: [(u64, &str, &str, &str); 7] = [
    (29_030_400, "year", "years", "y"),
    (2_419_200, "month", "months", "mo"),
    (604_800, "week", "weeks", "w"),
    (86_400, "day", "days", "d"),
    (3_600, "hour", "hours", "h"),
    (60, "minute", "minutes", "m"),
    (1, "second", "seconds", "s"),
];

/// Human-readable formatting for a byte count
///
/// Sizes are scaled by powers of 1024 up to petabytes. Kilobytes and bytes
/// have no decimals, megabytes one, everything larger two. The integer part
/// uses `,` as a thousands separator.
///
/// # Examples
///
/// ```
/// use relay_dl::utils::sizeof_human;
///
/// assert_eq!(sizeof_human(0), "0 bytes");
/// assert_eq!(sizeof_human(1), "1 byte");
/// assert_eq!(sizeof_human(175_799_789), "167.7 MB");
/// ```
pub fn sizeof_human(num: u64) -> String {
    match num {
        0 => return "0 bytes".to_string(),
        1 => return "1 byte".to_string(),
        _ => {}
    }

    let mut exponent = 0;
    let mut scaled = num;
    while scaled >= 1024 && exponent < SIZE_UNITS.len() - 1 {
        scaled /= 1024;
        exponent += 1;
    }

    let quotient = num as f64 / 1024f64.powi(exponent as i32);
    let (unit, decimals) = SIZE_UNITS[exponent];
    format!("{} {}", group_thousands(&format!("{quotient:.decimals$}")), unit)
}

/// Insert `,` separators into the integer part of a formatted number
fn group_thousands(formatted: &str) -> String {
    let (int_part, frac_part) = match formatted.split_once('.') {
        Some((int_part, frac_part)) => (int_part, Some(frac_part)),
        None => (formatted, None),
    };

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    match frac_part {
        Some(frac) => format!("{grouped}.{frac}"),
        None => grouped,
    }
}

/// Human-readable formatting for a duration in seconds
///
/// Months are four weeks and years twelve such months. Zero-valued units are
/// omitted.
///
/// # Examples
///
/// ```
/// use relay_dl::utils::time_human;
///
/// assert_eq!(
///     time_human(175_799_789, false),
///     "6 years, 2 weeks, 4 days, 17 hours, 16 minutes, 29 seconds"
/// );
/// assert_eq!(time_human(589, true), "9m49s");
/// assert_eq!(time_human(0, false), "0 seconds");
/// ```
pub fn time_human(secs: u64, short: bool) -> String {
    if secs == 0 {
        return if short { "0s" } else { "0 seconds" }.to_string();
    }

    let mut remaining = secs;
    let mut parts = Vec::new();

    for (interval, singular, plural, abbrev) in TIME_UNITS {
        let count = remaining / interval;
        if count == 0 {
            continue;
        }
        remaining -= count * interval;

        let part = if short {
            format!("{count}{abbrev}")
        } else if count == 1 {
            format!("{count} {singular}")
        } else {
            format!("{count} {plural}")
        };
        parts.push(part);
    }

    parts.join(if short { "" } else { ", " })
}

/// Check that a filename names a single entry inside the download directory
///
/// Rejects empty names, `.` and `..`, and anything containing a path separator
/// or a NUL byte.
///
/// # Examples
///
/// ```
/// use relay_dl::utils::validate_filename;
///
/// assert!(validate_filename("report.pdf").is_ok());
/// assert!(validate_filename("../report.pdf").is_err());
/// ```
pub fn validate_filename(filename: &str) -> Result<()> {
    let invalid = filename.trim().is_empty()
        || filename == "."
        || filename == ".."
        || filename.contains(['/', '\\', '\0']);

    if invalid {
        return Err(Error::InvalidFilename(filename.to_string()));
    }
    Ok(())
}
