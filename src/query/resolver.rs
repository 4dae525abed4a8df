//! Lookup-or-create resolution of county and place names
//!
//! Postal code writes name their county and place instead of referencing
//! them by id. The resolver maps such a pair onto concrete rows:
//!
//! 1. County by exact name, inserted when absent
//! 2. Place by (name, county id), inserted when absent
//!
//! County inserts go through `ON CONFLICT(name) DO NOTHING`; when another
//! writer wins the race the lookup simply runs again and finds its row.

use crate::Result;
use crate::Error;
use crate::model::{County, Place};
use crate::storage::SqliteStore;

/// Lookups attempted before a county race is reported as a conflict
const MAX_COUNTY_ATTEMPTS: usize = 3;

/// Outcome of resolving a county / place name pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub county: County,
    pub place: Place,
    pub created_county: bool,
    pub created_place: bool,
}

impl Resolution {
    pub fn place_id(&self) -> i64 {
        self.place.id
    }
}

/// Resolves county and place names to rows, creating them when missing
pub struct Resolver<'a> {
    store: &'a SqliteStore,
}

impl<'a> Resolver<'a> {
    pub fn new(store: &'a SqliteStore) -> Self {
        Self { store }
    }

    /// Resolve inside the caller's transaction.
    ///
    /// Inserts zero, one or two rows and never renames existing ones.
    pub fn resolve(&self, county_name: &str, place_name: &str) -> Result<Resolution> {
        let (county, created_county) = self.county(county_name)?;
        let (place, created_place) = match self.store.find_place(place_name, county.id)? {
            Some(place) => (place, false),
            None => (self.store.insert_place(place_name, county.id)?, true),
        };

        tracing::debug!(
            county = %county.name,
            place = %place.name,
            place_id = place.id,
            created_county,
            created_place,
            "resolved place"
        );

        Ok(Resolution { county, place, created_county, created_place })
    }

    fn county(&self, name: &str) -> Result<(County, bool)> {
        for attempt in 1..=MAX_COUNTY_ATTEMPTS {
            if let Some(county) = self.store.find_county_by_name(name)? {
                return Ok((county, false));
            }
            if let Some(county) = self.store.insert_county_or_ignore(name)? {
                return Ok((county, true));
            }
            tracing::debug!(county = name, attempt, "county insert lost a race, looking up again");
        }
        Err(Error::Conflict(format!("could not resolve county '{}'", name)))
    }
}
