//! Algérie Poste CCP/RIP arithmetic.
//!
//! # Responsibility
//! - Normalize postal current account numbers (CCP) to their 10-digit form.
//! - Derive the CCP clé, the RIP and the RIP clé.
//!
//! # Invariants
//! - Every function here is pure; the same input always yields the same output.
//! - Invalid input never produces partial results: derived fields stay empty.
//! - A valid RIP is always `RIP_LENGTH` characters long.

use serde::{Deserialize, Serialize};

/// Bank (`007`) and agency (`99999`) prefix shared by every postal RIP.
pub const RIP_PREFIX: &str = "00799999";
/// Number of digits in a normalized CCP account.
pub const CCP_DIGITS: usize = 10;
/// Length of a rendered RIP: prefix + account + 2-digit checksum.
pub const RIP_LENGTH: usize = RIP_PREFIX.len() + CCP_DIGITS + 2;

const CLE_FIRST_WEIGHT: u32 = 4;
const RIP_PREFIX_REMAINDER: u64 = 85;

/// Derived identifiers for one CCP account.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CcpRecord {
    /// Normalized 10-digit account, or empty when invalid.
    pub ccp: String,
    /// 2-digit CCP check key.
    pub cle: String,
    /// Full postal identity record.
    pub rip: String,
    /// Trailing 2-digit key of `rip`.
    pub rip_cle: String,
    pub valid: bool,
}

impl CcpRecord {
    /// Record returned for rejected input.
    pub fn invalid() -> Self {
        Self::default()
    }
}

/// Normalizes raw account input to exactly 10 digits.
///
/// Returns `None` for empty input, non-digit characters, or more than 10
/// digits. Surrounding whitespace is ignored.
pub fn normalize_ccp(input: &str) -> Option<String> {
    let trimmed = input.trim();
    if trimmed.is_empty()
        || trimmed.len() > CCP_DIGITS
        || !trimmed.bytes().all(|byte| byte.is_ascii_digit())
    {
        return None;
    }
    Some(format!("{trimmed:0>width$}", width = CCP_DIGITS))
}

/// Computes the 2-digit CCP clé, or an empty string for invalid input.
pub fn ccp_cle(input: &str) -> String {
    match normalize_ccp(input) {
        Some(ccp) => format!("{:02}", weighted_sum(&ccp) % 100),
        None => String::new(),
    }
}

/// Computes the RIP for an account, or an empty string for invalid input.
pub fn calculate_rip(input: &str) -> String {
    match normalize_ccp(input) {
        Some(ccp) => {
            let checksum = rip_checksum(&ccp);
            format!("{RIP_PREFIX}{ccp}{checksum:02}")
        }
        None => String::new(),
    }
}

/// Returns the trailing 2-character key of a RIP, left-padded with zeros.
pub fn rip_cle(rip: &str) -> String {
    let chars = rip.chars().collect::<Vec<_>>();
    if chars.is_empty() {
        return String::new();
    }
    let tail = chars[chars.len().saturating_sub(2)..]
        .iter()
        .collect::<String>();
    format!("{tail:0>2}")
}

/// Computes the full clé/RIP/RIP-clé triple.
pub fn compute_ccp(input: &str) -> CcpRecord {
    let Some(ccp) = normalize_ccp(input) else {
        return CcpRecord::invalid();
    };

    let cle = format!("{:02}", weighted_sum(&ccp) % 100);
    let rip = format!("{RIP_PREFIX}{ccp}{:02}", rip_checksum(&ccp));
    let rip_cle = rip_cle(&rip);
    CcpRecord {
        ccp,
        cle,
        rip,
        rip_cle,
        valid: true,
    }
}

// Digits are weighted 4, 5, ... 13 starting from the least-significant end.
fn weighted_sum(ccp: &str) -> u32 {
    ccp.bytes()
        .rev()
        .zip(CLE_FIRST_WEIGHT..)
        .map(|(digit, weight)| u32::from(digit - b'0') * weight)
        .sum()
}

fn rip_checksum(ccp: &str) -> u64 {
    let account = ccp
        .bytes()
        .fold(0_u64, |acc, digit| acc * 10 + u64::from(digit - b'0'));
    let remainder = (account * 100) % 97;
    let shifted = remainder + RIP_PREFIX_REMAINDER;
    if shifted > 97 {
        97 - (shifted - 97)
    } else {
        97 - shifted
    }
}

#[cfg(test)]
mod tests {
    use super::{
        calculate_rip, ccp_cle, compute_ccp, normalize_ccp, rip_cle, CcpRecord, RIP_LENGTH,
        RIP_PREFIX,
    };

    #[test]
    fn normalize_pads_short_accounts() {
        assert_eq!(normalize_ccp("12").as_deref(), Some("0000000012"));
        assert_eq!(normalize_ccp(" 1234567890 ").as_deref(), Some("1234567890"));
    }

    #[test]
    fn normalize_rejects_bad_input() {
        assert_eq!(normalize_ccp(""), None);
        assert_eq!(normalize_ccp("   "), None);
        assert_eq!(normalize_ccp("12a4"), None);
        assert_eq!(normalize_ccp("-123"), None);
        assert_eq!(normalize_ccp("12345678901"), None);
        assert_eq!(normalize_ccp("١٢٣"), None);
    }

    #[test]
    fn known_vector_1234567890() {
        let record = compute_ccp("1234567890");
        assert!(record.valid);
        assert_eq!(record.ccp, "1234567890");
        assert_eq!(record.cle, "45");
        assert_eq!(record.rip, "00799999123456789006");
        assert_eq!(record.rip_cle, "06");
    }

    #[test]
    fn known_vector_short_account() {
        let record = compute_ccp("12");
        assert_eq!(record.cle, "13");
        assert_eq!(record.rip, "00799999000000001273");
        assert_eq!(record.rip_cle, "73");
    }

    #[test]
    fn low_remainder_takes_direct_branch() {
        // 100 % 97 == 3, so 3 + 85 stays below 97.
        assert_eq!(calculate_rip("1"), "00799999000000000109");
        assert_eq!(ccp_cle("1"), "04");
    }

    #[test]
    fn cle_is_two_digits_for_all_digit_inputs() {
        for input in ["0", "7", "99", "4000000", "9999999999", "0000000000", "31415926"] {
            let cle = ccp_cle(input);
            assert_eq!(cle.len(), 2, "input {input}");
            assert!(cle.bytes().all(|b| b.is_ascii_digit()), "input {input}");
        }
    }

    #[test]
    fn rip_has_constant_shape() {
        for input in ["0", "1", "12", "123456", "9999999999", "0012345678"] {
            let rip = calculate_rip(input);
            assert_eq!(rip.len(), RIP_LENGTH, "input {input}");
            assert!(rip.starts_with(RIP_PREFIX));
            assert_eq!(&rip[8..18], normalize_ccp(input).unwrap());
            assert_eq!(rip_cle(&rip), &rip[18..]);
        }
    }

    #[test]
    fn invalid_input_yields_empty_record() {
        for input in ["", "abc", "12.5", "12345678901"] {
            assert_eq!(compute_ccp(input), CcpRecord::invalid());
            assert_eq!(ccp_cle(input), "");
            assert_eq!(calculate_rip(input), "");
        }
    }

    #[test]
    fn rip_cle_pads_short_values() {
        assert_eq!(rip_cle("7"), "07");
        assert_eq!(rip_cle(""), "");
        assert_eq!(rip_cle("123"), "23");
    }

    #[test]
    fn compute_is_deterministic() {
        assert_eq!(compute_ccp("0012345678"), compute_ccp("12345678"));
    }
}
