//! Query engine implementation
//!
//! Provides the read side of the API:
//! - County listing with name substring filter
//! - Place listing by county and initial letter, or distinct initial letters
//! - Postal code listing
//! - Single-entity fetches with the same relation expansion as listings
//!
//! Relations are expanded with batched secondary queries.

use std::collections::BTreeSet;
use serde::{Deserialize, Serialize};
use crate::{Error, Result};
use crate::model::{
    County, CountyWithPlaces, Place, PlaceDetail, PlaceWithCounty, PostalCode, PostalCodeDetail,
};
use crate::storage::SqliteStore;
use crate::validation::ValidationErrors;

/// Query parameters of `GET /counties`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CountyFilter {
    pub needle: Option<String>,
}

/// Query parameters of `GET /places`
///
/// Kept as raw strings so a malformed `county_id` becomes a field error.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlaceFilter {
    pub county_id: Option<String>,
    pub letter: Option<String>,
    pub distinct_letters: Option<String>,
}

impl PlaceFilter {
    pub fn county_id(&self) -> std::result::Result<Option<i64>, ValidationErrors> {
        match non_empty(&self.county_id) {
            None => Ok(None),
            Some(raw) => raw.parse::<i64>().map(Some).map_err(|_| {
                ValidationErrors::single("county_id", "The county id field must be an integer.")
            }),
        }
    }

    pub fn letter(&self) -> Option<&str> {
        non_empty(&self.letter)
    }

    pub fn wants_distinct_letters(&self) -> bool {
        self.distinct_letters.as_deref() == Some("true")
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Result of a place listing
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum PlaceListing {
    Places(Vec<PlaceDetail>),
    Letters(Vec<String>),
}

/// Query engine over the entity store
pub struct QueryEngine<'a> {
    store: &'a SqliteStore,
}

impl<'a> QueryEngine<'a> {
    /// Create a new query engine
    pub fn new(store: &'a SqliteStore) -> Self {
        Self { store }
    }

    /// Counties whose name contains the needle (all when absent)
    pub fn list_counties(&self, filter: &CountyFilter) -> Result<Vec<County>> {
        self.store.list_counties(non_empty(&filter.needle))
    }

    /// A county with its places
    pub fn show_county(&self, id: i64) -> Result<CountyWithPlaces> {
        let county = self
            .store
            .get_county(id)?
            .ok_or_else(|| Error::not_found("County", id))?;
        let places = self.store.places_in_county(id)?;
        Ok(CountyWithPlaces { county, places })
    }

    /// Places matching the filter, or their distinct initials when requested.
    ///
    /// `letter` does not apply to the distinct-letters listing.
    pub fn list_places(&self, filter: &PlaceFilter) -> Result<PlaceListing> {
        let county_id = filter.county_id()?;
        if filter.wants_distinct_letters() {
            return Ok(PlaceListing::Letters(self.distinct_letters(county_id)?));
        }
        let places = self.store.list_places(county_id, filter.letter())?;
        Ok(PlaceListing::Places(self.expand_places(places)?))
    }

    /// Sorted, deduplicated, uppercased first characters of place names
    pub fn distinct_letters(&self, county_id: Option<i64>) -> Result<Vec<String>> {
        let letters: BTreeSet<String> = self
            .store
            .place_names(county_id)?
            .iter()
            .filter_map(|name| name.trim().chars().next())
            .map(|c| c.to_uppercase().collect())
            .collect();
        Ok(letters.into_iter().collect())
    }

    /// A place with its county and postal codes
    pub fn show_place(&self, id: i64) -> Result<PlaceDetail> {
        let place = self
            .store
            .get_place(id)?
            .ok_or_else(|| Error::not_found("Place", id))?;
        self.expand_places(vec![place])?
            .pop()
            .ok_or_else(|| Error::not_found("Place", id))
    }

    /// All postal codes with place and county
    pub fn list_postal_codes(&self) -> Result<Vec<PostalCodeDetail>> {
        let codes = self.store.list_postal_codes()?;
        self.expand_postal_codes(codes)
    }

    /// A postal code with place and county
    pub fn show_postal_code(&self, id: i64) -> Result<PostalCodeDetail> {
        let code = self
            .store
            .get_postal_code(id)?
            .ok_or_else(|| Error::not_found("PostalCode", id))?;
        self.expand_postal_codes(vec![code])?
            .pop()
            .ok_or_else(|| Error::not_found("PostalCode", id))
    }

    /// Attach county and postal codes to each place
    pub fn expand_places(&self, places: Vec<Place>) -> Result<Vec<PlaceDetail>> {
        let county_ids: Vec<i64> = places.iter().map(|p| p.county_id).collect::<BTreeSet<_>>().into_iter().collect();
        let place_ids: Vec<i64> = places.iter().map(|p| p.id).collect();
        let counties = self.store.counties_by_ids(&county_ids)?;
        let mut codes = self.store.postal_codes_by_place_ids(&place_ids)?;

        Ok(places
            .into_iter()
            .map(|place| PlaceDetail {
                county: counties.get(&place.county_id).cloned(),
                postal_codes: codes.remove(&place.id).unwrap_or_default(),
                place,
            })
            .collect())
    }

    /// Attach place and the place's county to each postal code
    pub fn expand_postal_codes(&self, codes: Vec<PostalCode>) -> Result<Vec<PostalCodeDetail>> {
        let place_ids: Vec<i64> = codes.iter().map(|c| c.place_id).collect::<BTreeSet<_>>().into_iter().collect();
        let places = self.store.places_by_ids(&place_ids)?;
        let county_ids: Vec<i64> = places.values().map(|p| p.county_id).collect::<BTreeSet<_>>().into_iter().collect();
        let counties = self.store.counties_by_ids(&county_ids)?;

        Ok(codes
            .into_iter()
            .map(|code| PostalCodeDetail {
                place: places.get(&code.place_id).map(|place| PlaceWithCounty {
                    county: counties.get(&place.county_id).cloned(),
                    place: place.clone(),
                }),
                postal_code: code,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> SqliteStore {
        let store = SqliteStore::open_in_memory().unwrap();
        let borsod = store.insert_county("Borsod-Abaúj-Zemplén").unwrap();
        let heves = store.insert_county("Heves").unwrap();
        let miskolc = store.insert_place("Miskolc", borsod.id).unwrap();
        store.insert_place("ózd", borsod.id).unwrap();
        store.insert_place("Mezőkövesd", borsod.id).unwrap();
        store.insert_place("Eger", heves.id).unwrap();
        store.insert_postal_code("3525", miskolc.id).unwrap();
        store.insert_postal_code("3530", miskolc.id).unwrap();
        store
    }

    fn places(listing: PlaceListing) -> Vec<PlaceDetail> {
        match listing {
            PlaceListing::Places(places) => places,
            PlaceListing::Letters(_) => panic!("expected places"),
        }
    }

    #[test]
    fn test_distinct_letters_by_county() {
        let store = seeded();
        let engine = QueryEngine::new(&store);
        let filter = PlaceFilter {
            county_id: Some("1".into()),
            letter: Some("E".into()),
            distinct_letters: Some("true".into()),
        };

        match engine.list_places(&filter).unwrap() {
            PlaceListing::Letters(letters) => assert_eq!(letters, vec!["M", "Ó"]),
            PlaceListing::Places(_) => panic!("expected letters"),
        }

        assert_eq!(engine.distinct_letters(None).unwrap(), vec!["E", "M", "Ó"]);
    }

    #[test]
    fn test_place_listing_expands_relations() {
        let store = seeded();
        let engine = QueryEngine::new(&store);
        let filter = PlaceFilter { letter: Some("mis".into()), ..Default::default() };

        let found = places(engine.list_places(&filter).unwrap());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].county.as_ref().unwrap().name, "Borsod-Abaúj-Zemplén");
        assert_eq!(found[0].postal_codes.len(), 2);
    }

    #[test]
    fn test_distinct_letters_flag_must_be_true() {
        let store = seeded();
        let engine = QueryEngine::new(&store);
        let filter = PlaceFilter { distinct_letters: Some("false".into()), ..Default::default() };
        assert_eq!(places(engine.list_places(&filter).unwrap()).len(), 4);
    }

    #[test]
    fn test_invalid_county_id_is_a_validation_error() {
        let store = seeded();
        let engine = QueryEngine::new(&store);
        let filter = PlaceFilter { county_id: Some("abc".into()), ..Default::default() };
        assert!(matches!(engine.list_places(&filter), Err(Error::Validation(_))));
    }

    #[test]
    fn test_show_postal_code_nests_place_and_county() {
        let store = seeded();
        let engine = QueryEngine::new(&store);

        let detail = engine.show_postal_code(1).unwrap();
        let place = detail.place.unwrap();
        assert_eq!(place.place.name, "Miskolc");
        assert_eq!(place.county.unwrap().name, "Borsod-Abaúj-Zemplén");

        assert!(matches!(engine.show_postal_code(42), Err(Error::NotFound { .. })));
    }

    #[test]
    fn test_show_county_lists_places() {
        let store = seeded();
        let engine = QueryEngine::new(&store);

        let county = engine.show_county(2).unwrap();
        assert_eq!(county.county.name, "Heves");
        assert_eq!(county.places.len(), 1);
        assert!(matches!(engine.show_county(9), Err(Error::NotFound { .. })));
    }

    #[test]
    fn test_orphans_expand_to_none() {
        let store = seeded();
        store.delete_county(1).unwrap();
        let engine = QueryEngine::new(&store);

        let miskolc = engine.show_place(1).unwrap();
        assert!(miskolc.county.is_none());
        assert_eq!(miskolc.postal_codes.len(), 2);

        let code = engine.show_postal_code(1).unwrap();
        assert!(code.place.unwrap().county.is_none());
    }
}
