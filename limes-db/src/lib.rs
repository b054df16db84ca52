pub mod commitments;
pub mod domains;
pub mod error;
pub mod mail;
pub mod metrics;
pub mod projects;
pub mod rates;
pub mod resources;
pub mod services;
pub mod store;

pub use error::{Error, Result};
pub use store::Store;
