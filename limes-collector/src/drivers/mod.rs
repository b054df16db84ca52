//! HTTP client for the liquid driver wire contract (§6). One [`LiquidDriver`]
//! per configured service; [`DriverRegistry`] resolves a service type to its
//! bound driver, or `None` if no driver is configured for it (§4.4 step 2).

use std::collections::HashMap;
use std::sync::Arc;

use limes_model::config::ClusterConfig;
use limes_model::driver::{
    RateScrapeReport, RateScrapeRequest, ServiceCapacityReport, ServiceInfo, ServiceUsageReport, SetQuotaRequest,
};

use crate::util::Error;

#[derive(Clone)]
pub struct LiquidDriver {
    client: reqwest::Client,
    base_url: String,
}

impl LiquidDriver {
    pub fn new(client: reqwest::Client, base_url: String) -> Self {
        Self { client, base_url }
    }

    pub async fn info(&self) -> Result<ServiceInfo, Error> {
        self.get("/info").await
    }

    /// Invokes `ScrapeCapacity` (§6), passing the backchannel's base URL so
    /// the driver can call `GetResourceDemand` back into the collector
    /// while it builds the report (§4.4 step 3).
    pub async fn capacity_report(&self, backchannel_url: &str) -> Result<ServiceCapacityReport, Error> {
        let resp = self
            .client
            .get(format!("{}/capacity-report", self.base_url))
            .query(&[("backchannel", backchannel_url)])
            .send()
            .await
            .map_err(|err| Error::Driver(err.to_string()))?;
        let body = ensure_success(resp).await?;
        serde_json::from_str(&body).map_err(|err| Error::InvalidDriverResponse(format!("capacity-report: {err}")))
    }

    pub async fn usage_report(&self, project_uuid: uuid::Uuid) -> Result<ServiceUsageReport, Error> {
        self.get(&format!("/usage-report?project={project_uuid}")).await
    }

    pub async fn set_quota(&self, project_uuid: uuid::Uuid, request: &SetQuotaRequest) -> Result<(), Error> {
        let resp = self
            .client
            .put(format!("{}/quota?project={project_uuid}", self.base_url))
            .json(request)
            .send()
            .await
            .map_err(|err| Error::Driver(err.to_string()))?;
        ensure_success(resp).await.map(|_| ())
    }

    pub async fn scrape_rates(
        &self,
        project_uuid: uuid::Uuid,
        request: &RateScrapeRequest,
    ) -> Result<RateScrapeReport, Error> {
        let resp = self
            .client
            .post(format!("{}/rate-scrape?project={project_uuid}", self.base_url))
            .json(request)
            .send()
            .await
            .map_err(|err| Error::Driver(err.to_string()))?;
        let body = ensure_success(resp).await?;
        serde_json::from_str(&body)
            .map_err(|err| Error::InvalidDriverResponse(format!("rate-scrape: {err}")))
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, Error> {
        let resp = self
            .client
            .get(format!("{}{path}", self.base_url))
            .send()
            .await
            .map_err(|err| Error::Driver(err.to_string()))?;
        let body = ensure_success(resp).await?;
        serde_json::from_str(&body).map_err(|err| Error::InvalidDriverResponse(format!("{path}: {err}")))
    }
}

async fn ensure_success(resp: reqwest::Response) -> Result<String, Error> {
    let status = resp.status();
    let body = resp
        .text()
        .await
        .map_err(|err| Error::Driver(format!("reading response body: {err}")))?;
    if status.is_success() {
        Ok(body)
    } else {
        Err(Error::Driver(format!("driver returned {status}: {body}")))
    }
}

/// Maps a service type to its bound driver, per the cluster configuration
/// (§5: "the cluster configuration ... is loaded once at startup and
/// treated as read-only").
#[derive(Clone)]
pub struct DriverRegistry {
    drivers: HashMap<String, LiquidDriver>,
}

impl DriverRegistry {
    pub fn from_config(config: &Arc<ClusterConfig>, client: reqwest::Client) -> Self {
        let drivers = config
            .services
            .iter()
            .map(|svc| {
                (
                    svc.service_type.clone(),
                    LiquidDriver::new(client.clone(), svc.driver_endpoint.clone()),
                )
            })
            .collect();
        Self { drivers }
    }

    pub fn get(&self, service_type: &str) -> Option<&LiquidDriver> {
        self.drivers.get(service_type)
    }
}
