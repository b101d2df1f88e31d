// Domain and request/response models
pub mod booking;
pub mod common;
pub mod ledger;
pub mod requests;
