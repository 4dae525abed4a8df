pub mod engine;
pub mod resolver;

pub use engine::{QueryEngine, CountyFilter, PlaceFilter, PlaceListing};
pub use resolver::{Resolver, Resolution};
