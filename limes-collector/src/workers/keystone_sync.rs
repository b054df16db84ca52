use std::sync::Arc;
use std::time::Duration;

use limes_model::config::ClusterConfig;

use crate::discovery::DiscoverySource;
use crate::runner::CronJob;
use crate::util::{Error, KEYSTONE_SYNC_INITIAL_DELAY, KEYSTONE_SYNC_INTERVAL};

/// Reconciles domains and projects from the external identity store into
/// the local tables (§4.2).
pub struct KeystoneSync<D: DiscoverySource> {
    store: limes_db::Store,
    source: D,
    config: Arc<ClusterConfig>,
}

impl<D: DiscoverySource> KeystoneSync<D> {
    pub fn new(store: limes_db::Store, source: D, config: Arc<ClusterConfig>) -> Self {
        Self { store, source, config }
    }

    async fn sync(&self) -> Result<(), Error> {
        let discovered = self.source.list_domains().await?;
        let discovered: Vec<_> = discovered
            .into_iter()
            .filter(|d| !self.config.discovery.exclude_domain_names.contains(&d.name))
            .collect();

        let existing = self.store.domains().list_all().await?;

        for domain in &existing {
            if !discovered.iter().any(|d| d.id == domain.external_id) {
                self.store.domains().delete(domain.id).await?;
            }
        }

        for discovered_domain in &discovered {
            let existing_domain = existing.iter().find(|d| d.external_id == discovered_domain.id);

            let domain_id = match existing_domain {
                Some(d) => {
                    if d.name != discovered_domain.name {
                        self.store.domains().rename(d.id, &discovered_domain.name).await?;
                    }
                    d.id
                }
                None => {
                    self.store
                        .domains()
                        .insert(&discovered_domain.id, &discovered_domain.name)
                        .await?
                }
            };

            self.sync_projects(domain_id, discovered_domain).await?;
        }

        Ok(())
    }

    async fn sync_projects(
        &self,
        domain_id: limes_model::ids::DomainId,
        discovered_domain: &crate::discovery::DiscoveredDomain,
    ) -> Result<(), Error> {
        let discovered_projects: Vec<_> = discovered_domain
            .projects
            .iter()
            .filter(|p| !self.config.discovery.exclude_project_names.contains(&p.name))
            .collect();

        let existing = self.store.projects().list_by_domain(domain_id).await?;

        for project in &existing {
            if !discovered_projects.iter().any(|p| p.id == project.external_id) {
                // §4.2: terminal commitments are cleared first; a project
                // with live commitments is retained for a future pass.
                self.store.projects().try_delete(project.id).await?;
            }
        }

        for discovered_project in &discovered_projects {
            let existing_project = existing.iter().find(|p| p.external_id == discovered_project.id);

            match existing_project {
                Some(p) => {
                    if p.name != discovered_project.name {
                        self.store.projects().rename(p.id, &discovered_project.name).await?;
                    }
                }
                None => {
                    // Parent lookup is by external id among this batch;
                    // cross-domain parents are not modeled (§1 scope).
                    let parent_id = discovered_project
                        .parent_id
                        .as_ref()
                        .and_then(|parent_ext| existing.iter().find(|p| &p.external_id == parent_ext))
                        .map(|p| p.id);

                    let project_id = self
                        .store
                        .projects()
                        .insert(domain_id, &discovered_project.id, &discovered_project.name, parent_id)
                        .await?;
                    self.store.services().materialize_for_project(project_id).await?;
                }
            }
        }

        Ok(())
    }
}

impl<D: DiscoverySource> CronJob for KeystoneSync<D> {
    fn name(&self) -> &'static str {
        "keystone_sync"
    }

    fn interval(&self) -> Duration {
        KEYSTONE_SYNC_INTERVAL
    }

    fn initial_delay(&self) -> Duration {
        KEYSTONE_SYNC_INITIAL_DELAY
    }

    async fn run_once(&self) -> anyhow::Result<()> {
        self.sync().await?;
        Ok(())
    }
}
