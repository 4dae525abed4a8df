//! Record mutator - validated writes for all three entity types
//!
//! Every write runs in one transaction: either all of its rows change or
//! none do. Store-dependent validation (name uniqueness, county existence)
//! happens here, after the body has been parsed.

use crate::{Error, Result};
use crate::model::{County, Place, PostalCode};
use crate::query::Resolver;
use crate::storage::SqliteStore;
use crate::validation::{
    CountyInput, Input, NewPlace, NewPostalCode, PlaceChanges, PostalCodeChanges, ValidationErrors,
};

const NAME_TAKEN: &str = "The name has already been taken.";
const COUNTY_INVALID: &str = "The selected county id is invalid.";

/// Applies creates, partial updates and deletes to the store
pub struct RecordMutator<'a> {
    store: &'a SqliteStore,
}

impl<'a> RecordMutator<'a> {
    pub fn new(store: &'a SqliteStore) -> Self {
        Self { store }
    }

    // ========== Counties ==========

    pub fn create_county(&self, input: &Input) -> Result<County> {
        let mut errors = ValidationErrors::new();
        let county = CountyInput::parse(input, &mut errors);
        if let Some(county) = &county {
            if self.store.county_name_taken(&county.name, None)? {
                errors.add("name", NAME_TAKEN);
            }
        }
        let county = errors.finish(county)?;

        let created = self.store.insert_county(&county.name).map_err(name_conflict)?;
        tracing::info!(id = created.id, name = %created.name, "created county");
        Ok(created)
    }

    /// Rename a county; `name` is required and unique among other counties
    pub fn update_county(&self, id: i64, input: &Input) -> Result<County> {
        let existing = self
            .store
            .get_county(id)?
            .ok_or_else(|| Error::not_found("County", id))?;

        let mut errors = ValidationErrors::new();
        let county = CountyInput::parse(input, &mut errors);
        if let Some(county) = &county {
            if self.store.county_name_taken(&county.name, Some(id))? {
                errors.add("name", NAME_TAKEN);
            }
        }
        let county = errors.finish(county)?;

        if county.name != existing.name {
            self.store.update_county_name(id, &county.name).map_err(name_conflict)?;
            tracing::info!(id, from = %existing.name, to = %county.name, "renamed county");
        }
        Ok(County { id, name: county.name })
    }

    pub fn delete_county(&self, id: i64) -> Result<()> {
        if !self.store.delete_county(id)? {
            return Err(Error::not_found("County", id));
        }
        tracing::info!(id, "deleted county");
        Ok(())
    }

    // ========== Places ==========

    pub fn create_place(&self, input: &Input) -> Result<Place> {
        let mut errors = ValidationErrors::new();
        let place = NewPlace::parse(input, &mut errors);
        if let Some(place) = &place {
            self.check_county_exists(place.county_id, &mut errors)?;
        }
        let place = errors.finish(place)?;

        let created = self.store.insert_place(&place.name, place.county_id)?;
        tracing::info!(id = created.id, name = %created.name, county_id = created.county_id, "created place");
        Ok(created)
    }

    /// Overwrite whichever of `name` / `county_id` is supplied.
    ///
    /// `county_id` is a raw id here; places are never resolved by name.
    pub fn update_place(&self, id: i64, input: &Input) -> Result<Place> {
        let existing = self
            .store
            .get_place(id)?
            .ok_or_else(|| Error::not_found("Place", id))?;

        let mut errors = ValidationErrors::new();
        let changes = PlaceChanges::parse(input, &mut errors);
        if let Some(county_id) = changes.county_id {
            self.check_county_exists(county_id, &mut errors)?;
        }
        errors.into_result()?;

        self.store.update_place(id, changes.name.as_deref(), changes.county_id)?;
        let updated = Place {
            id,
            name: changes.name.unwrap_or(existing.name),
            county_id: changes.county_id.unwrap_or(existing.county_id),
        };
        tracing::info!(id, name = %updated.name, county_id = updated.county_id, "updated place");
        Ok(updated)
    }

    pub fn delete_place(&self, id: i64) -> Result<()> {
        if !self.store.delete_place(id)? {
            return Err(Error::not_found("Place", id));
        }
        tracing::info!(id, "deleted place");
        Ok(())
    }

    // ========== Postal codes ==========

    /// Create a postal code, resolving or creating its county and place
    pub fn create_postal_code(&self, input: &Input) -> Result<PostalCode> {
        let mut errors = ValidationErrors::new();
        let new_code = NewPostalCode::parse(input, &mut errors);
        let new_code = errors.finish(new_code)?;

        let tx = self.store.transaction()?;
        let resolution = Resolver::new(self.store).resolve(&new_code.county_name, &new_code.place_name)?;
        let created = self.store.insert_postal_code(&new_code.postal_code, resolution.place_id())?;
        tx.commit()?;

        tracing::info!(
            id = created.id,
            postal_code = %created.postal_code,
            place_id = created.place_id,
            created_county = resolution.created_county,
            created_place = resolution.created_place,
            "created postal code"
        );
        Ok(created)
    }

    /// Partial update of a postal code.
    ///
    /// The place is re-resolved only when both `place_name` and
    /// `county_name` are supplied; either one alone leaves it untouched.
    pub fn update_postal_code(&self, id: i64, input: &Input) -> Result<PostalCode> {
        let existing = self
            .store
            .get_postal_code(id)?
            .ok_or_else(|| Error::not_found("PostalCode", id))?;

        let mut errors = ValidationErrors::new();
        let changes = PostalCodeChanges::parse(input, &mut errors);
        errors.into_result()?;

        let tx = self.store.transaction()?;
        let place_id = match changes.relocation() {
            Some((county_name, place_name)) => {
                Resolver::new(self.store).resolve(county_name, place_name)?.place_id()
            }
            None => existing.place_id,
        };
        let new_place_id = (place_id != existing.place_id).then_some(place_id);

        if changes.postal_code.is_some() || new_place_id.is_some() {
            self.store.update_postal_code(id, changes.postal_code.as_deref(), new_place_id)?;
        }
        tx.commit()?;

        let updated = PostalCode {
            id,
            postal_code: changes.postal_code.unwrap_or(existing.postal_code),
            place_id,
        };
        tracing::info!(id, postal_code = %updated.postal_code, place_id, "updated postal code");
        Ok(updated)
    }

    pub fn delete_postal_code(&self, id: i64) -> Result<()> {
        if !self.store.delete_postal_code(id)? {
            return Err(Error::not_found("PostalCode", id));
        }
        tracing::info!(id, "deleted postal code");
        Ok(())
    }

    fn check_county_exists(&self, county_id: i64, errors: &mut ValidationErrors) -> Result<()> {
        if self.store.get_county(county_id)?.is_none() {
            errors.add("county_id", COUNTY_INVALID);
        }
        Ok(())
    }
}

/// A unique violation that slipped past the pre-check is still a field error
fn name_conflict(err: Error) -> Error {
    match err {
        Error::Conflict(_) => ValidationErrors::single("name", NAME_TAKEN).into(),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    fn input(value: Value) -> Input {
        Input::from_value(value).unwrap()
    }

    fn budapest(store: &SqliteStore) -> PostalCode {
        RecordMutator::new(store)
            .create_postal_code(&input(json!({
                "postal_code": "1011",
                "place_name": "Budapest",
                "county_name": "Budapest"
            })))
            .unwrap()
    }

    #[test]
    fn test_create_postal_code_creates_county_and_place_once() {
        let store = SqliteStore::open_in_memory().unwrap();
        let first = budapest(&store);
        assert_eq!(store.count_counties().unwrap(), 1);
        assert_eq!(store.count_places().unwrap(), 1);

        let second = budapest(&store);
        assert_eq!(first.place_id, second.place_id);
        assert_eq!(store.count_counties().unwrap(), 1);
        assert_eq!(store.count_places().unwrap(), 1);
        assert_eq!(store.count_postal_codes().unwrap(), 2);
    }

    #[test]
    fn test_create_postal_code_in_existing_county() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.insert_county("Pest").unwrap();

        RecordMutator::new(&store)
            .create_postal_code(&input(json!({
                "postal_code": "2000",
                "place_name": "Szentendre",
                "county_name": "Pest"
            })))
            .unwrap();

        assert_eq!(store.count_counties().unwrap(), 1);
        assert_eq!(store.count_places().unwrap(), 1);
    }

    #[test]
    fn test_create_postal_code_validation_writes_nothing() {
        let store = SqliteStore::open_in_memory().unwrap();
        let err = RecordMutator::new(&store)
            .create_postal_code(&input(json!({"postal_code": "1011", "place_name": "Budapest"})))
            .unwrap_err();

        match err {
            Error::Validation(errors) => assert!(errors.has("county_name")),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(store.count_counties().unwrap(), 0);
    }

    #[test]
    fn test_update_with_only_place_name_keeps_place() {
        let store = SqliteStore::open_in_memory().unwrap();
        let code = budapest(&store);
        let mutator = RecordMutator::new(&store);

        let updated = mutator
            .update_postal_code(code.id, &input(json!({"place_name": "Érd"})))
            .unwrap();

        assert_eq!(updated.place_id, code.place_id);
        assert_eq!(store.get_postal_code(code.id).unwrap().unwrap().place_id, code.place_id);
        assert_eq!(store.count_places().unwrap(), 1);
    }

    #[test]
    fn test_update_with_both_names_relocates() {
        let store = SqliteStore::open_in_memory().unwrap();
        let code = budapest(&store);
        let mutator = RecordMutator::new(&store);

        let updated = mutator
            .update_postal_code(
                code.id,
                &input(json!({"postal_code": "2030", "place_name": "Érd", "county_name": "Pest"})),
            )
            .unwrap();

        assert_ne!(updated.place_id, code.place_id);
        let stored = store.get_postal_code(code.id).unwrap().unwrap();
        assert_eq!(stored, updated);
        assert_eq!(store.count_counties().unwrap(), 2);
    }

    #[test]
    fn test_update_postal_code_only_changes_code() {
        let store = SqliteStore::open_in_memory().unwrap();
        let code = budapest(&store);

        let updated = RecordMutator::new(&store)
            .update_postal_code(code.id, &input(json!({"postal_code": "1012"})))
            .unwrap();

        assert_eq!(updated.postal_code, "1012");
        assert_eq!(updated.place_id, code.place_id);
    }

    #[test]
    fn test_update_missing_postal_code_is_not_found() {
        let store = SqliteStore::open_in_memory().unwrap();
        let err = RecordMutator::new(&store)
            .update_postal_code(999, &input(json!({"postal_code": "1018"})))
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { entity: "PostalCode", id: 999 }));
    }

    #[test]
    fn test_county_rename_to_taken_name_is_rejected() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mutator = RecordMutator::new(&store);
        let baranya = mutator.create_county(&input(json!({"name": "Baranya"}))).unwrap();
        mutator.create_county(&input(json!({"name": "Tolna"}))).unwrap();

        let err = mutator.update_county(baranya.id, &input(json!({"name": "Tolna"}))).unwrap_err();
        match err {
            Error::Validation(errors) => assert_eq!(errors.messages("name"), [NAME_TAKEN]),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(store.get_county(baranya.id).unwrap().unwrap().name, "Baranya");

        // Keeping its own name is fine
        mutator.update_county(baranya.id, &input(json!({"name": "Baranya"}))).unwrap();
    }

    #[test]
    fn test_county_update_requires_name() {
        let store = SqliteStore::open_in_memory().unwrap();
        let county = store.insert_county("Zala").unwrap();
        let err = RecordMutator::new(&store).update_county(county.id, &input(json!({}))).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_place_requires_existing_county() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mutator = RecordMutator::new(&store);

        let err = mutator.create_place(&input(json!({"name": "Gyula", "county_id": 7}))).unwrap_err();
        match err {
            Error::Validation(errors) => assert_eq!(errors.messages("county_id"), [COUNTY_INVALID]),
            other => panic!("unexpected error: {other}"),
        }

        let bekes = store.insert_county("Békés").unwrap();
        let place = mutator
            .create_place(&input(json!({"name": "Gyula", "county_id": bekes.id})))
            .unwrap();
        assert_eq!(place.county_id, bekes.id);
    }

    #[test]
    fn test_place_partial_update() {
        let store = SqliteStore::open_in_memory().unwrap();
        let county = store.insert_county("Vas").unwrap();
        let place = store.insert_place("Kőszeg", county.id).unwrap();
        let mutator = RecordMutator::new(&store);

        let renamed = mutator.update_place(place.id, &input(json!({"name": "Sárvár"}))).unwrap();
        assert_eq!(renamed.name, "Sárvár");
        assert_eq!(renamed.county_id, county.id);

        let err = mutator.update_place(place.id, &input(json!({"county_id": 55}))).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(store.get_place(place.id).unwrap().unwrap().county_id, county.id);
    }

    #[test]
    fn test_delete_county_keeps_children() {
        let store = SqliteStore::open_in_memory().unwrap();
        let code = budapest(&store);
        let mutator = RecordMutator::new(&store);

        mutator.delete_county(1).unwrap();
        assert!(store.get_place(code.place_id).unwrap().is_some());
        assert!(store.get_postal_code(code.id).unwrap().is_some());

        assert!(matches!(mutator.delete_county(1), Err(Error::NotFound { .. })));
    }
}
