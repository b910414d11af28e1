/// Total for `quantity` tickets, in paise.
pub fn line_total(unit_price: i64, quantity: i32) -> i64 {
    unit_price.saturating_mul(i64::from(quantity))
}

/// Formats paise as rupees, e.g. `₹1,250.50`.
pub fn format_currency(paise: i64) -> String {
    let sign = if paise < 0 { "-" } else { "" };
    let abs = paise.unsigned_abs();
    let rupees = abs / 100;
    let fraction = abs % 100;
    format!("{sign}₹{}.{fraction:02}", group_thousands(rupees))
}

fn group_thousands(mut value: u64) -> String {
    let mut groups = Vec::new();
    loop {
        if value < 1000 {
            groups.push(value.to_string());
            break;
        }
        groups.push(format!("{:03}", value % 1000));
        value /= 1000;
    }
    groups.reverse();
    groups.join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_currency() {
        assert_eq!(format_currency(0), "₹0.00");
        assert_eq!(format_currency(4_500), "₹45.00");
        assert_eq!(format_currency(125_050), "₹1,250.50");
        assert_eq!(format_currency(123_456_789), "₹1,234,567.89");
        assert_eq!(format_currency(-6_000), "-₹60.00");
    }

    #[test]
    fn test_line_total() {
        assert_eq!(line_total(150_000, 3), 450_000);
        assert_eq!(line_total(i64::MAX, 2), i64::MAX);
    }
}
