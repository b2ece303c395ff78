pub mod preferences;
pub mod sessions;
pub mod users;
