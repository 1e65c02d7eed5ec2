//! Country allow-list accepted by the payment processor's shipping-address
//! collector.

use std::collections::BTreeSet;

use once_cell::sync::Lazy;

/// Codes the processor's checkout accepts for shipping address collection.
static PROCESSOR_ALLOWED_COUNTRIES: Lazy<BTreeSet<&'static str>> = Lazy::new(|| {
    [
        "AC", "AD", "AE", "AF", "AG", "AI", "AL", "AM", "AO", "AQ", "AR", "AT", "AU", "AW", "AX",
        "AZ", "BA", "BB", "BD", "BE", "BF", "BG", "BH", "BI", "BJ", "BL", "BM", "BN", "BO", "BQ",
        "BR", "BS", "BT", "BV", "BW", "BY", "BZ", "CA", "CD", "CF", "CG", "CH", "CI", "CK", "CL",
        "CM", "CN", "CO", "CR", "CV", "CW", "CY", "CZ", "DE", "DJ", "DK", "DM", "DO", "DZ", "EC",
        "EE", "EG", "EH", "ER", "ES", "ET", "FI", "FJ", "FK", "FO", "FR", "GA", "GB", "GD", "GE",
        "GF", "GG", "GH", "GI", "GL", "GM", "GN", "GP", "GQ", "GR", "GS", "GT", "GU", "GW", "GY",
        "HK", "HN", "HR", "HT", "HU", "ID", "IE", "IL", "IM", "IN", "IO", "IQ", "IS", "IT", "JE",
        "JM", "JO", "JP", "KE", "KG", "KH", "KI", "KM", "KN", "KR", "KW", "KY", "KZ", "LA", "LB",
        "LC", "LI", "LK", "LR", "LS", "LT", "LU", "LV", "LY", "MA", "MC", "MD", "ME", "MF", "MG",
        "MK", "ML", "MM", "MN", "MO", "MQ", "MR", "MS", "MT", "MU", "MV", "MW", "MX", "MY", "MZ",
        "NA", "NC", "NE", "NG", "NI", "NL", "NO", "NP", "NR", "NU", "NZ", "OM", "PA", "PE", "PF",
        "PG", "PH", "PK", "PL", "PM", "PN", "PR", "PS", "PT", "PY", "QA", "RE", "RO", "RS", "RU",
        "RW", "SA", "SB", "SC", "SE", "SG", "SH", "SI", "SJ", "SK", "SL", "SM", "SN", "SO", "SR",
        "SS", "ST", "SV", "SX", "SZ", "TA", "TC", "TD", "TF", "TG", "TH", "TJ", "TK", "TL", "TM",
        "TN", "TO", "TR", "TT", "TV", "TW", "TZ", "UA", "UG", "US", "UY", "UZ", "VA", "VC", "VE",
        "VG", "VN", "VU", "WF", "WS", "XK", "YE", "YT", "ZA", "ZM", "ZW", "ZZ",
    ]
    .into_iter()
    .collect()
});

/// Immutable set of ISO-3166 alpha-2 codes zones may use.
///
/// Injected into the resolver so tests and deployments can substitute
/// their own list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountryAllowList {
    codes: BTreeSet<String>,
}

impl CountryAllowList {
    /// The processor's own list.
    pub fn processor_default() -> Self {
        Self {
            codes: PROCESSOR_ALLOWED_COUNTRIES
                .iter()
                .map(|c| c.to_string())
                .collect(),
        }
    }

    /// Builds a list from arbitrary codes; blanks are dropped, case is normalised.
    pub fn from_codes<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            codes: codes
                .into_iter()
                .filter_map(|c| normalise(c.as_ref()))
                .collect(),
        }
    }

    pub fn contains(&self, code: &str) -> bool {
        normalise(code).map_or(false, |c| self.codes.contains(&c))
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.codes.iter().map(String::as_str)
    }
}

impl Default for CountryAllowList {
    fn default() -> Self {
        Self::processor_default()
    }
}

/// Upper-cases and trims a country code; `None` for blanks.
pub(crate) fn normalise(code: &str) -> Option<String> {
    let code = code.trim();
    if code.is_empty() {
        None
    } else {
        Some(code.to_ascii_uppercase())
    }
}
