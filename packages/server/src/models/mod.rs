pub mod alert;
pub mod auth;
pub mod detection;
pub mod document;
pub mod plot;
pub mod shared;
