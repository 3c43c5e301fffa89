//! Error-reporting connector
//!
//! Each report is POSTed as JSON to the configured collector endpoint.

use async_trait::async_trait;
use reqwest::Client;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use crate::connector::Connector;
use crate::error::ConnectorError;
use crate::events::ErrorReport;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(2);

pub struct ErrorCollectorConnector {
    endpoint: Option<String>,
    client: Mutex<Option<Client>>,
}

impl ErrorCollectorConnector {
    pub fn new(endpoint: Option<String>) -> Self {
        Self {
            endpoint,
            client: Mutex::new(None),
        }
    }

    fn client(&self) -> MutexGuard<'_, Option<Client>> {
        self.client.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl Connector for ErrorCollectorConnector {
    type Payload = ErrorReport;

    fn name(&self) -> &'static str {
        "error-reporting"
    }

    async fn connect(&self) -> Result<(), ConnectorError> {
        if self.endpoint.is_none() {
            return Err(ConnectorError::NotConfigured("error collector endpoint"));
        }

        let mut client = self.client();
        if client.is_none() {
            *client = Some(Client::builder().timeout(REQUEST_TIMEOUT).build()?);
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.client().is_some()
    }

    async fn send(&self, report: ErrorReport) -> Result<(), ConnectorError> {
        // reqwest::Client is a cheap handle; clone it so no lock spans the request
        let client = self.client().clone().ok_or(ConnectorError::NotConnected)?;
        let endpoint = self
            .endpoint
            .as_deref()
            .ok_or(ConnectorError::NotConfigured("error collector endpoint"))?;

        let response = client.post(endpoint).json(&report).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ConnectorError::Rejected {
                status: status.as_u16(),
            });
        }
        Ok(())
    }

    async fn close(&self) -> Result<(), ConnectorError> {
        self.client().take();
        Ok(())
    }
}
