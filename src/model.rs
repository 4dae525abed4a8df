//! Entity records and their relation-expanded read shapes

use serde::{Deserialize, Serialize};

/// Top-level administrative region
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct County {
    pub id: i64,
    pub name: String,
}

/// A settlement belonging to one county
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Place {
    pub id: i64,
    pub name: String,
    pub county_id: i64,
}

/// A postal code string belonging to one place
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostalCode {
    pub id: i64,
    pub postal_code: String,
    pub place_id: i64,
}

/// County with its places, returned by `GET /counties/{id}`
#[derive(Debug, Clone, Serialize)]
pub struct CountyWithPlaces {
    #[serde(flatten)]
    pub county: County,
    pub places: Vec<Place>,
}

/// Place with its county and postal codes.
///
/// `county` is `None` when the county row was deleted after the place was
/// written; deletes never cascade.
#[derive(Debug, Clone, Serialize)]
pub struct PlaceDetail {
    #[serde(flatten)]
    pub place: Place,
    pub county: Option<County>,
    #[serde(rename = "postalCodes")]
    pub postal_codes: Vec<PostalCode>,
}

/// Place with its county, nested under a postal code
#[derive(Debug, Clone, Serialize)]
pub struct PlaceWithCounty {
    #[serde(flatten)]
    pub place: Place,
    pub county: Option<County>,
}

/// Postal code with `place` and `place.county` expanded
#[derive(Debug, Clone, Serialize)]
pub struct PostalCodeDetail {
    #[serde(flatten)]
    pub postal_code: PostalCode,
    pub place: Option<PlaceWithCounty>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_place_detail_shape() {
        let detail = PlaceDetail {
            place: Place { id: 3, name: "Szeged".into(), county_id: 7 },
            county: Some(County { id: 7, name: "Csongrád".into() }),
            postal_codes: vec![PostalCode { id: 1, postal_code: "6720".into(), place_id: 3 }],
        };

        let value = serde_json::to_value(&detail).unwrap();
        assert_eq!(value["id"], 3);
        assert_eq!(value["county_id"], 7);
        assert_eq!(value["county"]["name"], "Csongrád");
        assert_eq!(value["postalCodes"][0]["postal_code"], "6720");
    }

    #[test]
    fn test_orphaned_postal_code_serializes_null_place() {
        let detail = PostalCodeDetail {
            postal_code: PostalCode { id: 1, postal_code: "1011".into(), place_id: 99 },
            place: None,
        };

        let value = serde_json::to_value(&detail).unwrap();
        assert_eq!(value["place_id"], 99);
        assert!(value["place"].is_null());
    }
}
