//! Country to shipping zone resolution.
//!
//! # Precedence
//!
//! 1. Non rest-of-world zones whose (allow-listed) countries include the code.
//! 2. Among several matches, the zone with the fewest configured countries.
//!    Equal counts fall back to zone code order so the result is stable.
//! 3. Otherwise the rest-of-world zone. When none is configured a synthetic
//!    one with a zero rate stands in, so resolution never fails.

use std::collections::BTreeSet;

use crate::domain::catalog::{Currency, Money};
use crate::domain::foundation::ValidationError;

use super::countries::normalise;
use super::{CountryAllowList, ShippingZone, ZoneCode};

/// Resolves countries to zones over a fixed snapshot of configured zones.
#[derive(Debug, Clone)]
pub struct ShippingZoneResolver {
    zones: Vec<ShippingZone>,
    default_zone: ShippingZone,
    allow_list: CountryAllowList,
}

impl ShippingZoneResolver {
    /// Builds a resolver. Fails if zone codes repeat or more than one zone is
    /// marked rest-of-world.
    pub fn new(
        zones: Vec<ShippingZone>,
        allow_list: CountryAllowList,
    ) -> Result<Self, ValidationError> {
        let mut seen = BTreeSet::new();
        for zone in &zones {
            if !seen.insert(zone.code.clone()) {
                return Err(ValidationError::invalid_format(
                    "zone_code",
                    format!("duplicate zone code {}", zone.code),
                ));
            }
        }

        let mut rest_of_world = zones.iter().filter(|z| z.rest_of_world);
        let configured_default = rest_of_world.next().cloned();
        if rest_of_world.next().is_some() {
            return Err(ValidationError::invalid_format(
                "rest_of_world",
                "only one zone may be the rest-of-world default",
            ));
        }

        let default_zone = configured_default.unwrap_or_else(|| {
            let currency = zones
                .first()
                .map(|z| z.rate.currency().clone())
                .unwrap_or_else(Currency::gbp);
            ShippingZone {
                code: ZoneCode::rest_of_world(),
                nickname: "Rest of World".to_string(),
                countries: Vec::new(),
                rate: Money::zero(currency),
                rest_of_world: true,
            }
        });

        Ok(Self {
            zones,
            default_zone,
            allow_list,
        })
    }

    /// Zone for an ISO alpha-2 code (any case). Absent or unknown codes get
    /// the default zone.
    pub fn resolve(&self, country: Option<&str>) -> &ShippingZone {
        let Some(country) = country.and_then(normalise) else {
            return &self.default_zone;
        };
        if !self.allow_list.contains(&country) {
            return &self.default_zone;
        }

        self.specific_zones()
            .filter(|z| z.contains(&country))
            .min_by(|a, b| {
                Self::configured_count(a)
                    .cmp(&Self::configured_count(b))
                    .then_with(|| a.code.cmp(&b.code))
            })
            .unwrap_or(&self.default_zone)
    }

    /// The rest-of-world zone, persisted or synthetic.
    pub fn default_zone(&self) -> &ShippingZone {
        &self.default_zone
    }

    /// Zone with `code`, falling back to the default zone.
    pub fn by_code(&self, code: &ZoneCode) -> &ShippingZone {
        self.zones
            .iter()
            .find(|z| &z.code == code)
            .unwrap_or(&self.default_zone)
    }

    pub fn zones(&self) -> &[ShippingZone] {
        &self.zones
    }

    /// Countries a zone actually ships to, sorted.
    ///
    /// Specific zones get their configured countries intersected with the
    /// allow-list. The rest-of-world zone uses its configured countries when
    /// it has any, otherwise every allow-listed country not claimed by a
    /// specific zone.
    pub fn effective_countries(&self, zone: &ShippingZone) -> Vec<String> {
        let allowed = |codes: &[String]| -> BTreeSet<String> {
            codes
                .iter()
                .filter_map(|c| normalise(c))
                .filter(|c| self.allow_list.contains(c))
                .collect()
        };

        if !zone.rest_of_world || !zone.countries.is_empty() {
            return allowed(&zone.countries).into_iter().collect();
        }

        let claimed: BTreeSet<String> = self
            .specific_zones()
            .flat_map(|z| z.countries.iter().filter_map(|c| normalise(c)))
            .collect();

        self.allow_list
            .iter()
            .filter(|c| !claimed.contains(*c))
            .map(str::to_string)
            .collect()
    }

    fn specific_zones(&self) -> impl Iterator<Item = &ShippingZone> {
        self.zones.iter().filter(|z| !z.rest_of_world)
    }

    /// Distinct configured countries, allow-listed or not.
    fn configured_count(zone: &ShippingZone) -> usize {
        zone.countries
            .iter()
            .filter_map(|c| normalise(c))
            .collect::<BTreeSet<_>>()
            .len()
    }
}
