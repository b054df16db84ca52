pub mod capacity_scrape;
pub mod confirmation;
pub mod consistency;
pub mod keystone_sync;
pub mod quota;
pub mod rate_scrape;

pub use capacity_scrape::{CapacityScrape, CapacityScrapeTask};
pub use consistency::Consistency;
pub use keystone_sync::KeystoneSync;
