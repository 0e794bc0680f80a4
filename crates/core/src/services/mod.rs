pub mod earnings_service;
pub mod holding_service;
pub mod quote_service;
pub mod report_service;
pub mod scheduler;
pub mod snapshot_service;
