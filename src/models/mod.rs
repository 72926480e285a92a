pub mod analysis;
pub mod patient;
pub mod profile;
pub mod report;
