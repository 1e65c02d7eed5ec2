//! Gift module - gift codes, promotion codes and the gift lifecycle.

mod gift_code;
mod state;

pub use gift_code::{
    gift_code_metadata, GiftCode, GiftCodeRef, PromotionCode, GIFT_GIVER_SUBSCRIPTION_KEY,
};
pub use state::{check_redeemable, GiftState};

/// Gift coupon name for a product, as the provider limits coupon names to
/// 40 characters.
pub fn gift_coupon_name(prefix: &str, product_name: &str) -> String {
    format!("{}{}", prefix, product_name).chars().take(40).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coupon_name_is_truncated() {
        let name = gift_coupon_name("Gift Card: ", "The Complete Contemporary Fiction Collection");
        assert_eq!(name.chars().count(), 40);
        assert!(name.starts_with("Gift Card: The Complete"));
        assert_eq!(gift_coupon_name("Gift Card: ", "Classics"), "Gift Card: Classics");
    }
}
