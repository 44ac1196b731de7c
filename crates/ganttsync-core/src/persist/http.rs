use std::time::Duration;

use serde_json::Value;
use tracing::debug;

use super::{PersistResponse, PersistenceClient, TransportError};
use crate::config::EndpointConfig;
use crate::intent::PersistRequest;
use crate::tree::table::{LoadError, TaskRow, parse_table};

const USER_AGENT: &str = concat!("ganttsync/", env!("CARGO_PKG_VERSION"));

/// Blocking HTTP client for the edit and data endpoints.
///
/// Requests are form-encoded POSTs; responses are JSON.
pub struct HttpClient {
    agent: ureq::Agent,
    edit_url: String,
    data_url: String,
}

impl HttpClient {
    #[must_use]
    pub fn new(endpoint: &EndpointConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(endpoint.timeout_secs))
            .user_agent(USER_AGENT)
            .build();
        Self {
            agent,
            edit_url: endpoint.edit_url(),
            data_url: endpoint.data_url(),
        }
    }

    #[must_use]
    pub fn edit_url(&self) -> &str {
        &self.edit_url
    }

    /// Fetch the full task table from the data endpoint.
    ///
    /// # Errors
    ///
    /// [`LoadError::Transport`] when the request fails, otherwise whatever
    /// [`parse_table`] reports.
    pub fn fetch_table(&self) -> Result<Vec<TaskRow>, LoadError> {
        debug!(url = %self.data_url, "fetching task table");
        let response = self
            .agent
            .get(&self.data_url)
            .set("Accept", "application/json")
            .call()
            .map_err(TransportError::from)?;
        let body: Value = response
            .into_json()
            .map_err(|err| TransportError::Decode(err.to_string()))?;
        parse_table(body)
    }
}

impl PersistenceClient for HttpClient {
    fn submit(&mut self, request: &PersistRequest) -> Result<PersistResponse, TransportError> {
        let pairs = request.form_pairs();
        let form: Vec<(&str, &str)> = pairs
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
            .collect();

        debug!(url = %self.edit_url, action = %request.action(), "posting edit");
        let response = self
            .agent
            .post(&self.edit_url)
            .set("Accept", "application/json")
            .send_form(&form)?;
        let body: Value = response
            .into_json()
            .map_err(|err| TransportError::Decode(err.to_string()))?;
        PersistResponse::from_value(body)
    }
}
