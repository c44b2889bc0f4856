//! Access to the counters endpoint of the controller api.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use tracing::{debug, trace, warn};

use crate::domain::{CTVConfig, CTVError};
use crate::model::filter::FilterField;
use crate::model::sort::ColumnId;

/// Authority that allows a user to modify the flow, including resetting counters.
pub const ROLE_DFM: &str = "ROLE_DFM";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Counter {
    pub id: String,
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
}

impl Counter {
    pub fn new(
        id: impl Into<String>,
        context: impl Into<String>,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            context: Some(context.into()),
            name: Some(name.into()),
            value: Some(value.into()),
        }
    }

    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            context: None,
            name: None,
            value: None,
        }
    }

    pub fn column_value(&self, column: ColumnId) -> Option<&str> {
        match column {
            ColumnId::Context => self.context.as_deref(),
            ColumnId::Name => self.name.as_deref(),
            ColumnId::Value => self.value.as_deref(),
            ColumnId::Actions => None,
        }
    }

    pub fn filter_value(&self, field: FilterField) -> &str {
        match field {
            FilterField::Name => self.name.as_deref().unwrap_or(""),
            FilterField::Context => self.context.as_deref().unwrap_or(""),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CountersReport {
    #[serde(default)]
    pub generated: Option<String>,
    #[serde(default)]
    pub counters: Option<Vec<Counter>>,
}

#[derive(Debug, Deserialize)]
struct CountersEnvelope {
    counters: CountersReport,
}

#[derive(Debug, Deserialize)]
struct CounterEnvelope {
    counter: Counter,
}

#[derive(Debug, Deserialize)]
struct AuthoritiesEnvelope {
    #[serde(default)]
    authorities: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserRoles {
    pub authorities: Vec<String>,
}

impl UserRoles {
    pub fn new<I, S>(authorities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            authorities: authorities.into_iter().map(Into::into).collect(),
        }
    }

    pub fn privileged() -> Self {
        Self::new([ROLE_DFM])
    }

    /// Whether the user may reset counters. The server enforces this on its own.
    pub fn is_dfm(&self) -> bool {
        self.authorities.iter().any(|a| a == ROLE_DFM)
    }
}

#[async_trait]
pub trait CountersApi: Send + Sync {
    async fn counters(&self) -> Result<CountersReport, CTVError>;
    async fn reset_counter(&self, id: &str) -> Result<Counter, CTVError>;
    async fn authorities(&self) -> Result<UserRoles, CTVError>;
}

pub struct HttpCountersApi {
    base_url: String,
    token: Option<String>,
    timeout: Duration,
    http_client: Client,
}

impl HttpCountersApi {
    pub fn new(config: &CTVConfig) -> Result<Self, CTVError> {
        if config.base_url.trim().is_empty() {
            return Err(CTVError::InvalidConfig("base url is empty".into()));
        }
        let http_client = Client::builder().build()?;
        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
            timeout: config.request_timeout,
            http_client,
        })
    }

    pub fn counters_url(&self) -> String {
        format!("{}/controller/counters", self.base_url)
    }

    pub fn counter_url(&self, id: &str) -> String {
        format!("{}/{}", self.counters_url(), urlencoding::encode(id))
    }

    pub fn authorities_url(&self) -> String {
        format!("{}/controller/authorities", self.base_url)
    }

    fn prepare(&self, request: RequestBuilder) -> RequestBuilder {
        let request = request
            .timeout(self.timeout)
            .header(reqwest::header::ACCEPT, "application/json");
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn body(response: Response) -> Result<String, CTVError> {
        let status = response.status();
        if status.is_success() {
            Ok(response.text().await?)
        } else {
            let message = response.text().await.unwrap_or_default();
            Err(CTVError::Http {
                status: status.as_u16(),
                message,
            })
        }
    }
}

#[async_trait]
impl CountersApi for HttpCountersApi {
    async fn counters(&self) -> Result<CountersReport, CTVError> {
        let url = self.counters_url();
        debug!("GET {url}");
        let response = self.prepare(self.http_client.get(&url)).send().await?;
        let body = Self::body(response).await?;
        parse_counters(&body)
    }

    async fn reset_counter(&self, id: &str) -> Result<Counter, CTVError> {
        let url = self.counter_url(id);
        debug!("PUT {url}");
        let response = self.prepare(self.http_client.put(&url)).send().await?;
        let body = Self::body(response).await?;
        parse_counter(&body)
    }

    async fn authorities(&self) -> Result<UserRoles, CTVError> {
        let url = self.authorities_url();
        debug!("GET {url}");
        let response = self.prepare(self.http_client.get(&url)).send().await?;
        let body = Self::body(response).await?;
        let envelope: AuthoritiesEnvelope = serde_json::from_str(&body)?;
        trace!("Authorities: {:?}", envelope.authorities);
        Ok(UserRoles::new(envelope.authorities))
    }
}

/// Figures out the roles of the current user. `forced` short-circuits the lookup;
/// a failed lookup leaves the user without privileges.
pub async fn resolve_roles(api: &dyn CountersApi, forced: Option<bool>) -> UserRoles {
    match forced {
        Some(true) => UserRoles::privileged(),
        Some(false) => UserRoles::default(),
        None => match api.authorities().await {
            Ok(roles) => roles,
            Err(e) => {
                warn!("Could not look up authorities, assuming read only access: {e}");
                UserRoles::default()
            }
        },
    }
}

pub fn parse_counters(body: &str) -> Result<CountersReport, CTVError> {
    let envelope: CountersEnvelope = serde_json::from_str(body)?;
    Ok(envelope.counters)
}

pub fn parse_counter(body: &str) -> Result<Counter, CTVError> {
    let envelope: CounterEnvelope = serde_json::from_str(body)?;
    Ok(envelope.counter)
}
