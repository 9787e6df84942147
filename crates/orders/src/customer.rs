//! Customer snapshot captured when an order is placed.

use serde::{Deserialize, Serialize};

use bazaar_core::{DomainError, ValueObject};

const MAX_LINE: usize = 255;
const MAX_ZIP: usize = 20;
const MAX_PHONE: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub street: String,
    pub city: String,
    pub state: String,
    pub country: String,
    pub zip_code: String,
}

impl ValueObject for Address {}

impl Address {
    /// Push one message per offending field, prefixed with `label`.
    pub fn collect_errors(&self, label: &str, errors: &mut Vec<String>) {
        let fields = [
            ("street", &self.street, MAX_LINE),
            ("city", &self.city, MAX_LINE),
            ("state", &self.state, MAX_LINE),
            ("country", &self.country, MAX_LINE),
            ("zip_code", &self.zip_code, MAX_ZIP),
        ];
        for (name, value, max) in fields {
            if value.trim().is_empty() {
                errors.push(format!("{label}.{name} is required"));
            } else if value.chars().count() > max {
                errors.push(format!("{label}.{name} may not exceed {max} characters"));
            }
        }
    }
}

/// Contact details, frozen onto the order at creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerContact {
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub shipping_address: Address,
    pub billing_address: Address,
}

impl ValueObject for CustomerContact {}

impl CustomerContact {
    pub fn collect_errors(&self, errors: &mut Vec<String>) {
        let email = self.email.trim();
        if email.is_empty() || !email.contains('@') {
            errors.push("customer_email must be a valid email address".to_string());
        }
        if let Some(phone) = &self.phone {
            if phone.chars().count() > MAX_PHONE {
                errors.push(format!("customer_phone may not exceed {MAX_PHONE} characters"));
            }
        }
        self.shipping_address.collect_errors("shipping_address", errors);
        self.billing_address.collect_errors("billing_address", errors);
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        let mut errors = Vec::new();
        self.collect_errors(&mut errors);
        if errors.is_empty() {
            Ok(())
        } else {
            Err(DomainError::validation(errors.join("; ")))
        }
    }
}
