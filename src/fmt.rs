use rust_decimal::Decimal;

/// Format an amount with thousands separators and two decimals: -1,234.56
pub fn amount(val: Decimal) -> String {
    let fixed = format!("{:.2}", val.abs().round_dp(2));
    let (int_part, dec_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut with_commas = String::new();
    for (i, c) in int_part.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            with_commas.push(',');
        }
        with_commas.push(c);
    }
    let with_commas: String = with_commas.chars().rev().collect();

    if val.is_sign_negative() && !val.is_zero() {
        format!("-{with_commas}.{dec_part}")
    } else {
        format!("{with_commas}.{dec_part}")
    }
}

/// Percent with one decimal: 12.5%
pub fn pct(val: Decimal) -> String {
    format!("{:.1}%", val)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_amount_formatting() {
        assert_eq!(amount(dec("1234.56")), "1,234.56");
        assert_eq!(amount(dec("-500")), "-500.00");
        assert_eq!(amount(Decimal::ZERO), "0.00");
        assert_eq!(amount(dec("1000000.99")), "1,000,000.99");
        assert_eq!(amount(dec("42.1")), "42.10");
        assert_eq!(amount(dec("-4.50")), "-4.50");
    }

    #[test]
    fn test_pct_formatting() {
        assert_eq!(pct(dec("88.4")), "88.4%");
        assert_eq!(pct(dec("100")), "100.0%");
    }
}
