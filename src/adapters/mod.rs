pub mod context_broker;
pub mod weather_service;
