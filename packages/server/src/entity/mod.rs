pub mod alert;
pub mod document;
pub mod plot;
pub mod user;
