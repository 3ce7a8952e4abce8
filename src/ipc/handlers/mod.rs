pub mod analysis;
pub mod core;
pub mod export;
pub mod manual;
pub mod reports;
pub mod settings;
pub mod sheets;
pub mod students;
