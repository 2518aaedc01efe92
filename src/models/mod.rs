pub mod profile;
pub mod token;
pub mod user;
