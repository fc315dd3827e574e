//! Shared currency formatting
//!
//! Every renderer that prints money goes through `format_amount` so all
//! four report formats agree on symbol, grouping and rounding.

use rust_decimal::{Decimal, RoundingStrategy};

/// Display symbol for an ISO 4217 code. Unknown codes fall back to the
/// code itself.
pub fn symbol(code: &str) -> &str {
    match code {
        "EUR" => "€",
        "USD" => "$",
        "GBP" => "£",
        "JPY" => "¥",
        "CHF" => "CHF",
        "SEK" | "NOK" | "DKK" => "kr",
        other => other,
    }
}

/// Format an amount with its currency symbol, thousands separators and
/// two decimal places, e.g. `€1,234.56`.
pub fn format_amount(amount: Decimal, code: &str) -> String {
    let rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    let negative = rounded.is_sign_negative();
    let abs = rounded.abs();
    let text = format!("{abs:.2}");
    let (whole, frac) = text.split_once('.').unwrap_or((text.as_str(), "00"));
    let grouped = group_thousands(whole);

    let symbol = symbol(code);
    let sign = if negative { "-" } else { "" };
    if symbol == code {
        // No known symbol; keep the code readable with a space
        format!("{sign}{code} {grouped}.{frac}")
    } else {
        format!("{sign}{symbol}{grouped}.{frac}")
    }
}

fn group_thousands(digits: &str) -> String {
    let chars: Vec<char> = digits.chars().collect();
    let mut out = String::with_capacity(chars.len() + chars.len() / 3);
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && (chars.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(*c);
    }
    out
}
