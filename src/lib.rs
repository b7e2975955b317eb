pub mod records;
pub mod session;
pub mod sheets;
pub mod tools;
pub mod utils;
pub mod week;
