//! Mapping of pre-redesign product names onto the modern catalog.
//!
//! Legacy products encoded the membership in their name, e.g.
//! `both_solidarity`, `classic_monthly`, `contemporary_annual`. The modern
//! catalog has one product per (selection, cadence) pair.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::catalog::BillingInterval;
use crate::domain::foundation::Metadata;

/// Book selection of a modern membership product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Selection {
    Solidarity,
    AllBooks,
    Classics,
    Contemporary,
}

impl Selection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Selection::Solidarity => "solidarity",
            Selection::AllBooks => "all_books",
            Selection::Classics => "classics",
            Selection::Contemporary => "contemporary",
        }
    }
}

/// One of the eight modern membership products.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModernProduct {
    pub selection: Selection,
    pub annual: bool,
}

impl ModernProduct {
    pub const ALL: [ModernProduct; 8] = [
        ModernProduct::new(Selection::Solidarity, true),
        ModernProduct::new(Selection::Solidarity, false),
        ModernProduct::new(Selection::AllBooks, true),
        ModernProduct::new(Selection::AllBooks, false),
        ModernProduct::new(Selection::Classics, true),
        ModernProduct::new(Selection::Classics, false),
        ModernProduct::new(Selection::Contemporary, true),
        ModernProduct::new(Selection::Contemporary, false),
    ];

    pub const fn new(selection: Selection, annual: bool) -> Self {
        Self { selection, annual }
    }

    /// Configuration key, e.g. `classics_annual`.
    pub fn key(&self) -> String {
        format!(
            "{}_{}",
            self.selection.as_str(),
            if self.annual { "annual" } else { "monthly" }
        )
    }
}

impl fmt::Display for ModernProduct {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// The legacy name carried no recognisable selection marker.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Legacy product '{name}' does not match any modern product")]
pub struct ClassificationError {
    pub name: String,
}

/// Result of classifying one legacy name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub product: ModernProduct,
    /// The name that was classified.
    pub legacy_name: String,
    pub is_contemporary: bool,
    pub is_classic: bool,
    pub is_both: bool,
    pub is_solidarity: bool,
}

impl Classification {
    /// Flags stored on re-created prices for later auditing.
    pub fn flag_metadata(&self) -> Metadata {
        let flag = |b: bool| if b { "true" } else { "false" }.to_string();
        let mut metadata = Metadata::new();
        metadata.insert("is_contemporary".into(), flag(self.is_contemporary));
        metadata.insert("is_classic".into(), flag(self.is_classic));
        metadata.insert("is_both".into(), flag(self.is_both));
        metadata.insert("is_solidarity".into(), flag(self.is_solidarity));
        metadata.insert("is_annual".into(), flag(self.product.annual));
        metadata
    }

    /// Display nickname for the re-created price.
    pub fn nickname(&self) -> String {
        self.legacy_name.replace('_', " ")
    }
}

/// Classifies a legacy product name.
///
/// Solidarity wins over every other marker, then classic, contemporary and
/// finally both. Matching is case-insensitive.
pub fn classify(name: &str, interval: BillingInterval) -> Result<Classification, ClassificationError> {
    let lower = name.to_lowercase();
    let is_solidarity = lower.contains("solidarity");
    let is_classic = lower.contains("classic");
    let is_contemporary = lower.contains("contemporary");
    let is_both = lower.contains("both");

    let selection = if is_solidarity {
        Selection::Solidarity
    } else if is_classic {
        Selection::Classics
    } else if is_contemporary {
        Selection::Contemporary
    } else if is_both {
        Selection::AllBooks
    } else {
        return Err(ClassificationError {
            name: name.to_string(),
        });
    };

    Ok(Classification {
        product: ModernProduct::new(selection, interval == BillingInterval::Year),
        legacy_name: name.to_string(),
        is_contemporary,
        is_classic,
        is_both,
        is_solidarity,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn solidarity_takes_precedence() {
        let c = classify("both_solidarity", BillingInterval::Year).unwrap();
        assert_eq!(c.product, ModernProduct::new(Selection::Solidarity, true));
        assert!(c.is_both);
    }

    #[test]
    fn classic_beats_contemporary_and_both() {
        let c = classify("classic_contemporary_both", BillingInterval::Month).unwrap();
        assert_eq!(c.product, ModernProduct::new(Selection::Classics, false));
    }

    #[test]
    fn interval_selects_cadence() {
        assert!(classify("contemporary_monthly", BillingInterval::Year)
            .unwrap()
            .product
            .annual);
        assert_eq!(
            classify("Both_Standard", BillingInterval::Month).unwrap().product,
            ModernProduct::new(Selection::AllBooks, false)
        );
    }

    #[test]
    fn unknown_names_are_not_guessed() {
        let err = classify("poetry_pamphlets", BillingInterval::Month).unwrap_err();
        assert_eq!(err.name, "poetry_pamphlets");
    }

    #[test]
    fn nickname_and_flags() {
        let c = classify("classic_gift", BillingInterval::Year).unwrap();
        assert_eq!(c.nickname(), "classic gift");
        let flags = c.flag_metadata();
        assert_eq!(flags.get("is_classic").unwrap(), "true");
        assert_eq!(flags.get("is_annual").unwrap(), "true");
        assert_eq!(flags.get("is_solidarity").unwrap(), "false");
    }

    #[test]
    fn keys_are_unique() {
        let keys: std::collections::BTreeSet<_> =
            ModernProduct::ALL.iter().map(|p| p.key()).collect();
        assert_eq!(keys.len(), 8);
    }
}
