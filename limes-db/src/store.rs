//! The shared database handle. Every worker holds a clone of [`Store`] and
//! reaches its per-aggregate repository through an accessor method, mirroring
//! the context-plus-ops-struct split used elsewhere for per-aggregate
//! database access.

use deadpool_postgres::Pool;

use crate::commitments::CommitmentRepo;
use crate::domains::DomainRepo;
use crate::mail::MailRepo;
use crate::metrics::MetricsRepo;
use crate::projects::ProjectRepo;
use crate::rates::RateRepo;
use crate::resources::ResourceRepo;
use crate::services::ServiceRepo;

#[derive(Clone)]
pub struct Store {
    pool: Pool,
}

impl Store {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    pub fn domains(&self) -> DomainRepo<'_> {
        DomainRepo::new(&self.pool)
    }

    pub fn projects(&self) -> ProjectRepo<'_> {
        ProjectRepo::new(&self.pool)
    }

    pub fn services(&self) -> ServiceRepo<'_> {
        ServiceRepo::new(&self.pool)
    }

    pub fn resources(&self) -> ResourceRepo<'_> {
        ResourceRepo::new(&self.pool)
    }

    pub fn commitments(&self) -> CommitmentRepo<'_> {
        CommitmentRepo::new(&self.pool)
    }

    pub fn rates(&self) -> RateRepo<'_> {
        RateRepo::new(&self.pool)
    }

    pub fn mail(&self) -> MailRepo<'_> {
        MailRepo::new(&self.pool)
    }

    pub fn metrics(&self) -> MetricsRepo<'_> {
        MetricsRepo::new(&self.pool)
    }
}
