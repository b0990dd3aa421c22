//! Amount behaviour tests

use core_kernel::{Amount, AmountError};
use rust_decimal_macros::dec;
use std::str::FromStr;

#[test]
fn test_parse_and_display() {
    let amount = Amount::from_str("12.5").unwrap();
    assert_eq!(amount.to_string(), "12.50");
    assert_eq!(amount, Amount::from_cents(1250));
}

#[test]
fn test_parse_rejects_garbage() {
    assert!(matches!(
        Amount::from_str("not-a-number"),
        Err(AmountError::Invalid(_))
    ));
}

#[test]
fn test_nine_digit_bound_on_construction() {
    assert!(Amount::new(dec!(9999999.99)).is_ok());
    assert!(Amount::new(dec!(-9999999.99)).is_ok());
    assert!(Amount::new(dec!(10000000.00)).is_err());
}

#[test]
fn test_sum_of_amounts() {
    let total: Amount = [Amount::from_cents(100), Amount::from_cents(-30)]
        .into_iter()
        .sum();
    assert_eq!(total, Amount::from_cents(70));
}

#[test]
fn test_serde_is_transparent() {
    let amount = Amount::from_cents(1234);
    let json = serde_json::to_string(&amount).unwrap();
    assert_eq!(json, "\"12.34\"");
    let back: Amount = serde_json::from_str(&json).unwrap();
    assert_eq!(back, amount);
}
