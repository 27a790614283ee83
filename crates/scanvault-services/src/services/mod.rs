#[cfg(feature = "clamav")]
pub mod clamav;
pub mod file_service;
pub mod scanner;
pub mod token;
