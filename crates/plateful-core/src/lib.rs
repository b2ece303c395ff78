pub mod access;
pub mod preferences;
pub mod session;
