pub mod assistant;
pub mod auth;
pub mod bills;
pub mod cli;
pub mod command;
pub mod config;
pub mod database;
pub mod models;
pub mod notify;
pub mod store;
pub mod summary;
pub mod utils;

pub use config::Config;
pub use database::Database;
pub use models::{Bill, Document, Note, Task};
pub use store::Store;
pub use utils::Profile;
