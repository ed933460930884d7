//! Supplier profiles stored as embedded records.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::connectors::Metadata;

/// Namespace supplier records are written to by default.
pub const DEFAULT_SUPPLIER_NAMESPACE: &str = "dmc";

/// A supplier profile. Blank fields are treated as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Supplier {
    /// Company name.
    pub name: String,
    /// Country.
    #[serde(default)]
    pub country: Option<String>,
    /// Postal address.
    #[serde(default)]
    pub address: Option<String>,
    /// Phone number.
    #[serde(default)]
    pub phone: Option<String>,
    /// Contact email.
    #[serde(default)]
    pub email: Option<String>,
    /// Public listing page.
    #[serde(default)]
    pub listing_url: Option<String>,
    /// Free-text description. Embedded but not stored as its own metadata key.
    #[serde(default)]
    pub description: Option<String>,
}

fn present(field: &Option<String>) -> Option<&str> {
    field.as_deref().filter(|v| !v.is_empty())
}

impl Supplier {
    /// Creates a profile with only a name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Text that gets embedded for this supplier.
    #[must_use]
    pub fn text(&self) -> String {
        let mut text = format!("Company Name: {} \n ", self.name);
        let lines = [
            ("Country", &self.country),
            ("Address", &self.address),
            ("Phone", &self.phone),
            ("Email", &self.email),
            ("Listing_url", &self.listing_url),
            ("Description", &self.description),
        ];
        for (label, value) in lines {
            if let Some(value) = present(value) {
                text.push_str(&format!("{}: {} \n ", label, value));
            }
        }
        text
    }

    /// Record metadata: every contact field (blank when absent) plus the
    /// embedded text.
    #[must_use]
    pub fn metadata(&self, text: &str) -> Metadata {
        let field = |v: &Option<String>| Value::String(v.clone().unwrap_or_default());
        Metadata::from([
            ("name".to_string(), Value::String(self.name.clone())),
            ("country".to_string(), field(&self.country)),
            ("address".to_string(), field(&self.address)),
            ("phone".to_string(), field(&self.phone)),
            ("email".to_string(), field(&self.email)),
            ("listing_url".to_string(), field(&self.listing_url)),
            ("text".to_string(), Value::String(text.to_string())),
        ])
    }
}
