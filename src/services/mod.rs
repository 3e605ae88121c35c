pub mod aggregator;
pub mod cohort;
pub mod ledger;
pub mod reconciler;
pub mod reports;
pub mod time_parser;
