pub mod ngsi;
pub mod observation;
pub mod station;
