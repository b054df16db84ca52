//! The external identity store interface keystone sync consumes (§4.2).
//! The wire format a concrete discovery plugin speaks is out of scope
//! (§1); this module only defines the shape the collector needs and one
//! HTTP-JSON implementation good enough to drive the rest of the pipeline.

use serde::Deserialize;

use crate::util::Error;

#[derive(Debug, Clone, Deserialize)]
pub struct DiscoveredDomain {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub projects: Vec<DiscoveredProject>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiscoveredProject {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub parent_id: Option<String>,
}

pub trait DiscoverySource: Send + Sync {
    fn list_domains(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<DiscoveredDomain>, Error>> + Send;
}

#[derive(Clone)]
pub struct HttpDiscoverySource {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpDiscoverySource {
    pub fn new(client: reqwest::Client, endpoint: String) -> Self {
        Self { client, endpoint }
    }
}

impl DiscoverySource for HttpDiscoverySource {
    async fn list_domains(&self) -> Result<Vec<DiscoveredDomain>, Error> {
        let resp = self
            .client
            .get(&self.endpoint)
            .send()
            .await
            .map_err(|err| Error::Driver(err.to_string()))?;
        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|err| Error::Driver(format!("reading discovery response: {err}")))?;
        if !status.is_success() {
            return Err(Error::Driver(format!("discovery source returned {status}: {body}")));
        }
        serde_json::from_str(&body).map_err(|err| Error::InvalidDriverResponse(format!("discovery: {err}")))
    }
}
