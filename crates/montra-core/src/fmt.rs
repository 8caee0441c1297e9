//! Currency formatting

/// Default display currency
pub const DEFAULT_CURRENCY: &str = "PKR";

/// Format an amount with thousands separators ("PKR 12,000", "-PKR 1,250.50")
///
/// Whole amounts drop the fractional part.
pub fn currency(val: f64, code: &str) -> String {
    let negative = val < 0.0;
    let fixed = format!("{:.2}", val.abs());
    let (int_part, dec_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut with_commas = String::new();
    for (i, c) in int_part.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            with_commas.push(',');
        }
        with_commas.push(c);
    }
    let with_commas: String = with_commas.chars().rev().collect();

    let body = if dec_part == "00" {
        with_commas
    } else {
        format!("{with_commas}.{dec_part}")
    };

    if negative && fixed != "0.00" {
        format!("-{code} {body}")
    } else {
        format!("{code} {body}")
    }
}
