use serde::{Deserialize, Serialize};

use bazaar_core::{Money, ValueObject};

/// Monetary summary of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderAmounts {
    pub subtotal: Money,
    #[serde(default)]
    pub tax_amount: Money,
    #[serde(default)]
    pub shipping_cost: Money,
    #[serde(default)]
    pub discount_amount: Money,
    pub total: Money,
}

impl ValueObject for OrderAmounts {}

impl OrderAmounts {
    /// `subtotal + tax + shipping - discount`, or `None` if out of range.
    pub fn computed_total(&self) -> Option<Money> {
        self.subtotal
            .checked_add(self.tax_amount)?
            .checked_add(self.shipping_cost)?
            .checked_sub(self.discount_amount)
    }

    /// `item_sum` is `None` when the line totals overflowed.
    pub fn collect_errors(&self, item_sum: Option<Money>, errors: &mut Vec<String>) {
        let fields = [
            ("subtotal", self.subtotal),
            ("tax_amount", self.tax_amount),
            ("shipping_cost", self.shipping_cost),
            ("discount_amount", self.discount_amount),
        ];
        for (name, value) in fields {
            if value.is_negative() {
                errors.push(format!("{name} may not be negative"));
            }
        }
        if self.total < Money::from_minor(1) {
            errors.push("total must be at least 0.01".to_string());
        }
        match self.computed_total() {
            Some(computed) if !self.total.within_cent_of(computed) => errors.push(format!(
                "total {} does not match subtotal + tax + shipping - discount = {computed}",
                self.total
            )),
            Some(_) => {}
            None => errors.push("order amounts are out of range".to_string()),
        }
        match item_sum {
            Some(sum) if !self.subtotal.within_cent_of(sum) => errors.push(format!(
                "subtotal {} does not match the sum of line totals {sum}",
                self.subtotal
            )),
            Some(_) => {}
            None => errors.push("sum of line totals is out of range".to_string()),
        }
    }
}
