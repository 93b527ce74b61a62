pub mod compliance;
pub mod goals;
pub mod interval;
pub mod models;
pub mod overlap;
pub mod validation;
