//! Account module: own-profile management and user administration.

pub mod manager;

pub use manager::AccountManager;
