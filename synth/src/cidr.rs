use crate::error::{Error, Result};
use regex::Regex;
use std::sync::OnceLock;

static CIDR: OnceLock<Regex> = OnceLock::new();

/// Check that a value is syntactically valid IPv4 CIDR notation
///
/// Only the shape of the value is checked. Overlap between blocks is the
/// caller's concern.
pub fn check(value: &str, what: &str) -> Result<()> {
    let re = CIDR.get_or_init(|| {
        Regex::new(r"^(\d{1,3})\.(\d{1,3})\.(\d{1,3})\.(\d{1,3})/(\d{1,2})$").unwrap()
    });

    let malformed = || {
        Error::Configuration(format!(
            "{what} is not valid IPv4 CIDR notation: {value:?}"
        ))
    };

    let captures = re.captures(value.trim()).ok_or_else(malformed)?;

    for octet in 1..=4 {
        let octet: u32 = captures[octet].parse().map_err(|_| malformed())?;

        if octet > 255 {
            return Err(malformed());
        }
    }

    let prefix: u32 = captures[5].parse().map_err(|_| malformed())?;

    if prefix > 32 {
        return Err(malformed());
    }

    Ok(())
}
