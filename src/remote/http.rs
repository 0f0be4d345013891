// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! reqwest implementation of [`AppOpticsApi`].

use super::{AppOpticsApi, ClientFactory, RemoteConfig, RemoteError, Result};
use crate::types::remote::{Alert, AlertDefinition, Chart, RemoteService, Space};
use async_trait::async_trait;
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, instrument};

/// Shares one connection pool between all per-resource clients
#[derive(Clone)]
pub struct HttpClientFactory {
    http: reqwest::Client,
}

impl HttpClientFactory {
    pub fn new(timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("appoptics-operator/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { http })
    }
}

impl ClientFactory for HttpClientFactory {
    type Client = HttpClient;

    fn client(&self, config: RemoteConfig) -> HttpClient {
        HttpClient {
            http: self.http.clone(),
            config,
        }
    }
}

#[derive(Clone, Debug)]
pub struct HttpClient {
    http: reqwest::Client,
    config: RemoteConfig,
}

#[derive(Serialize)]
struct SpaceBody<'a> {
    name: &'a str,
}

#[derive(Serialize)]
struct AssociationBody {
    service: i64,
}

impl HttpClient {
    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder> {
        let url = self.config.base_url.join(path)?;
        Ok(self
            .http
            .request(method, url)
            .basic_auth(&self.config.token, Some(""))
            .header(reqwest::header::ACCEPT, "application/json"))
    }

    async fn execute(&self, path: &str, request: RequestBuilder) -> Result<String> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        debug!(path, status = status.as_u16(), "AppOptics response");

        if status.is_success() {
            Ok(body)
        } else {
            Err(RemoteError::from_response(path, status.as_u16(), body))
        }
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let body = self.execute(path, self.request(Method::GET, path)?).await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        payload: &B,
    ) -> Result<T> {
        let request = self.request(Method::POST, path)?.json(payload);
        let body = self.execute(path, request).await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Like `post`, for endpoints whose response body is irrelevant
    async fn post_ignoring_body<B: Serialize + ?Sized>(&self, path: &str, payload: &B) -> Result<()> {
        let request = self.request(Method::POST, path)?.json(payload);
        self.execute(path, request).await.map(|_| ())
    }

    async fn put<B: Serialize + ?Sized>(&self, path: &str, payload: &B) -> Result<()> {
        let request = self.request(Method::PUT, path)?.json(payload);
        self.execute(path, request).await.map(|_| ())
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let request = self.request(Method::DELETE, path)?;
        self.execute(path, request).await.map(|_| ())
    }
}

#[async_trait]
impl AppOpticsApi for HttpClient {
    #[instrument(skip(self))]
    async fn create_space(&self, name: &str) -> Result<Space> {
        self.post("spaces", &SpaceBody { name }).await
    }

    async fn retrieve_space(&self, id: i64) -> Result<Space> {
        self.get(&format!("spaces/{}", id)).await
    }

    #[instrument(skip(self))]
    async fn update_space(&self, id: i64, name: &str) -> Result<()> {
        self.put(&format!("spaces/{}", id), &SpaceBody { name }).await
    }

    #[instrument(skip(self))]
    async fn delete_space(&self, id: i64) -> Result<()> {
        self.delete(&format!("spaces/{}", id)).await
    }

    async fn list_charts(&self, space_id: i64) -> Result<Vec<Chart>> {
        self.get(&format!("spaces/{}/charts", space_id)).await
    }

    #[instrument(skip(self, chart), fields(chart = %chart.name))]
    async fn create_chart(&self, space_id: i64, chart: &Chart) -> Result<Chart> {
        self.post(&format!("spaces/{}/charts", space_id), chart).await
    }

    #[instrument(skip(self))]
    async fn delete_chart(&self, space_id: i64, chart_id: i64) -> Result<()> {
        self.delete(&format!("spaces/{}/charts/{}", space_id, chart_id))
            .await
    }

    #[instrument(skip(self, service), fields(title = %service.title))]
    async fn create_service(&self, service: &RemoteService) -> Result<RemoteService> {
        self.post("services", service).await
    }

    async fn retrieve_service(&self, id: i64) -> Result<RemoteService> {
        self.get(&format!("services/{}", id)).await
    }

    #[instrument(skip(self, service))]
    async fn update_service(&self, id: i64, service: &RemoteService) -> Result<()> {
        self.put(&format!("services/{}", id), service).await
    }

    #[instrument(skip(self))]
    async fn delete_service(&self, id: i64) -> Result<()> {
        self.delete(&format!("services/{}", id)).await
    }

    #[instrument(skip(self, alert), fields(name = %alert.name))]
    async fn create_alert(&self, alert: &AlertDefinition) -> Result<Alert> {
        self.post("alerts", alert).await
    }

    async fn retrieve_alert(&self, id: i64) -> Result<Alert> {
        self.get(&format!("alerts/{}", id)).await
    }

    #[instrument(skip(self, alert))]
    async fn update_alert(&self, id: i64, alert: &AlertDefinition) -> Result<()> {
        self.put(&format!("alerts/{}", id), alert).await
    }

    #[instrument(skip(self))]
    async fn delete_alert(&self, id: i64) -> Result<()> {
        self.delete(&format!("alerts/{}", id)).await
    }

    #[instrument(skip(self))]
    async fn associate_service(&self, alert_id: i64, service_id: i64) -> Result<()> {
        self.post_ignoring_body(
            &format!("alerts/{}/services", alert_id),
            &AssociationBody {
                service: service_id,
            },
        )
        .await
    }

    #[instrument(skip(self))]
    async fn disassociate_service(&self, alert_id: i64, service_id: i64) -> Result<()> {
        self.delete(&format!("alerts/{}/services/{}", alert_id, service_id))
            .await
    }
}
