pub mod catalog;
pub mod geocoding;
pub mod itinerary;
pub mod trips;
