pub mod quiz;
pub mod user;
