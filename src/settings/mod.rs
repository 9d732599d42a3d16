pub mod account;

pub use account::{AccountConfig, AccountType, DEFAULT_CONTAINER};
