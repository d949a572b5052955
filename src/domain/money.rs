use thiserror::Error;

/// Money is an integer count of the currency's smallest unit (cents for EUR/USD).
pub type Cents = i64;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseCentsError {
    #[error("invalid money format")]
    InvalidFormat,

    #[error("amount out of range")]
    Overflow,
}

/// Format cents as a decimal string with two fraction digits.
/// Example: 5000 -> "50.00", -1234 -> "-12.34"
pub fn format_cents(cents: Cents) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{}{}.{:02}", sign, abs / 100, abs % 100)
}

/// Parse a decimal string into cents.
/// Example: "50.00" -> 5000, "12.5" -> 1250, "100" -> 10000.
/// Extra fraction digits are truncated.
pub fn parse_cents(input: &str) -> Result<Cents, ParseCentsError> {
    let input = input.trim();
    let (negative, digits) = match input.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, input),
    };

    let (units_str, fraction_str) = match digits.split_once('.') {
        Some((units, fraction)) if !fraction.contains('.') => (units, fraction),
        Some(_) => return Err(ParseCentsError::InvalidFormat),
        None => (digits, ""),
    };

    if units_str.is_empty() && fraction_str.is_empty() {
        return Err(ParseCentsError::InvalidFormat);
    }
    if !units_str.chars().chain(fraction_str.chars()).all(|c| c.is_ascii_digit()) {
        return Err(ParseCentsError::InvalidFormat);
    }

    let units: u64 = if units_str.is_empty() {
        0
    } else {
        units_str.parse().map_err(|_| ParseCentsError::Overflow)?
    };

    let fraction: u64 = match fraction_str.len() {
        0 => 0,
        1 => fraction_str.parse::<u64>().map_err(|_| ParseCentsError::InvalidFormat)? * 10,
        _ => fraction_str[..2]
            .parse()
            .map_err(|_| ParseCentsError::InvalidFormat)?,
    };

    // The magnitude is unsigned so that i64::MIN, one past i64::MAX, still parses.
    let magnitude = units
        .checked_mul(100)
        .and_then(|c| c.checked_add(fraction))
        .ok_or(ParseCentsError::Overflow)?;
    let cents = if negative {
        0i64.checked_sub_unsigned(magnitude)
    } else {
        i64::try_from(magnitude).ok()
    };
    cents.ok_or(ParseCentsError::Overflow)
}

/// The debit and credit deltas for moving `amount` between two accounts.
/// Returns `None` unless the amount is strictly positive.
pub fn transfer_deltas(amount: Cents) -> Option<(Cents, Cents)> {
    if amount > 0 {
        Some((-amount, amount))
    } else {
        None
    }
}
