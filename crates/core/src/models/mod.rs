pub mod earnings;
pub mod holding;
pub mod ledger;
pub mod quote;
pub mod settings;
pub mod views;
