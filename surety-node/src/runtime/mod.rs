pub mod builder;
pub mod oracle_driver;
pub mod scenario;
pub mod source;
