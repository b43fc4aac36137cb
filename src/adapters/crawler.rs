use crate::config::toml_config::{CrawlerConfig, DEFAULT_PER_PAGE};
use crate::domain::model::OfferingDescriptor;
use crate::utils::error::{BrokerError, Result};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

const SEARCH_PATH: &str = "/api/search";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    status: String,
    #[serde(default)]
    message: Option<String>,
    data: Option<SearchData>,
}

#[derive(Debug, Deserialize)]
struct SearchData {
    total_count: usize,
    count_in_response: usize,
    #[serde(default)]
    items: Vec<DataverseItem>,
}

/// A dataverse as returned by the Dataverse search API.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DataverseItem {
    pub name: String,
    pub identifier: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub description: String,
}

/// 從 Dataverse 伺服器分頁搜尋 dataverse，產生 registry 描述
pub struct RegistryCrawler {
    client: Client,
    server_url: String,
    server_alias: String,
    per_page: usize,
    max_results: Option<usize>,
}

impl RegistryCrawler {
    pub fn new(server_url: &str, server_alias: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            server_url: server_url.trim_end_matches('/').to_string(),
            server_alias: server_alias.to_string(),
            per_page: DEFAULT_PER_PAGE,
            max_results: None,
        })
    }

    pub fn from_config(config: &CrawlerConfig, timeout: Duration) -> Result<Self> {
        let crawler = Self::new(&config.server_url, &config.server_alias, timeout)?
            .with_per_page(config.per_page.unwrap_or(DEFAULT_PER_PAGE));
        Ok(match config.max_results {
            Some(max) => crawler.with_max_results(max),
            None => crawler,
        })
    }

    pub fn with_per_page(mut self, per_page: usize) -> Self {
        self.per_page = per_page.max(1);
        self
    }

    /// 0 means no limit.
    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = (max_results > 0).then_some(max_results);
        self
    }

    pub async fn search_dataverses(&self) -> Result<Vec<DataverseItem>> {
        let mut dataverses = Vec::new();
        let mut start = 0usize;

        loop {
            let mut per_page = self.per_page;
            if let Some(max) = self.max_results {
                per_page = per_page.min(max - start);
            }

            let url = format!("{}{}", self.server_url, SEARCH_PATH);
            tracing::debug!("Searching {} start={} per_page={}", url, start, per_page);

            let response = self
                .client
                .get(&url)
                .query(&[
                    ("q", "*".to_string()),
                    ("type", "dataverse".to_string()),
                    ("start", start.to_string()),
                    ("per_page", per_page.to_string()),
                ])
                .send()
                .await?;
            let page: SearchResponse = response.json().await?;

            if page.status != "OK" {
                return Err(BrokerError::SearchError {
                    message: format!(
                        "status {}: {}",
                        page.status,
                        page.message.unwrap_or_default()
                    ),
                });
            }
            let data = page.data.ok_or_else(|| BrokerError::SearchError {
                message: "response has no data".to_string(),
            })?;

            if data.total_count == 0 {
                return Err(BrokerError::SearchError {
                    message: "No results from search query".to_string(),
                });
            }

            let received = data.count_in_response.min(data.items.len());
            dataverses.extend(data.items.into_iter().take(received));
            start += received;

            let exhausted = received == 0 || start >= data.total_count;
            let capped = self.max_results.is_some_and(|max| start >= max);
            if exhausted || capped {
                break;
            }
        }

        tracing::info!(
            "🔍 Found {} dataverses on {}",
            dataverses.len(),
            self.server_url
        );
        Ok(dataverses)
    }

    pub async fn crawl(&self) -> Result<Vec<OfferingDescriptor>> {
        let items = self.search_dataverses().await?;
        Ok(items.iter().map(|item| self.to_descriptor(item)).collect())
    }

    /// Service id is `<alias>-<identifier>`; plan id appends `-default`.
    pub fn to_descriptor(&self, item: &DataverseItem) -> OfferingDescriptor {
        let service_id = format!("{}-{}", self.server_alias, item.identifier);
        OfferingDescriptor {
            plan_id: format!("{}-default", service_id),
            service_id,
            server_name: self.server_alias.clone(),
            server_url: self.server_url.clone(),
            display_name: item.name.clone(),
            identifier: item.identifier.clone(),
            url: item.url.clone(),
            description: item.description.clone(),
            image_url: item.image_url.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn item(n: usize) -> serde_json::Value {
        json!({
            "name": format!("Dataverse {}", n),
            "type": "dataverse",
            "url": format!("https://demo.dataverse.org/dataverse/dv{}", n),
            "identifier": format!("dv{}", n),
            "published_at": "2019-03-01T00:00:00Z"
        })
    }

    fn page(total: usize, items: Vec<serde_json::Value>) -> serde_json::Value {
        json!({
            "status": "OK",
            "data": {
                "q": "*",
                "total_count": total,
                "start": 0,
                "count_in_response": items.len(),
                "items": items
            }
        })
    }

    #[tokio::test]
    async fn test_paginates_until_total_count() {
        let server = MockServer::start();
        let first = server.mock(|when, then| {
            when.method(GET)
                .path("/api/search")
                .query_param("type", "dataverse")
                .query_param("start", "0")
                .query_param("per_page", "2");
            then.status(200).json_body(page(3, vec![item(1), item(2)]));
        });
        let second = server.mock(|when, then| {
            when.method(GET)
                .path("/api/search")
                .query_param("start", "2")
                .query_param("per_page", "2");
            then.status(200).json_body(page(3, vec![item(3)]));
        });

        let crawler = RegistryCrawler::new(&server.base_url(), "demo", Duration::from_secs(5))
            .unwrap()
            .with_per_page(2);
        let descriptors = crawler.crawl().await.unwrap();

        first.assert();
        second.assert();
        assert_eq!(descriptors.len(), 3);
        assert_eq!(descriptors[0].service_id, "demo-dv1");
        assert_eq!(descriptors[0].plan_id, "demo-dv1-default");
        assert_eq!(descriptors[0].server_name, "demo");
        assert_eq!(descriptors[2].display_name, "Dataverse 3");
        assert_eq!(
            descriptors[2].coordinates(),
            "https://demo.dataverse.org/dataverse/dv3"
        );
    }

    #[tokio::test]
    async fn test_max_results_limits_page_size() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/api/search")
                .query_param("start", "0")
                .query_param("per_page", "1");
            then.status(200).json_body(page(50, vec![item(1)]));
        });

        let crawler = RegistryCrawler::new(&server.base_url(), "demo", Duration::from_secs(5))
            .unwrap()
            .with_per_page(10)
            .with_max_results(1);
        let items = crawler.search_dataverses().await.unwrap();

        mock.assert_hits(1);
        assert_eq!(items.len(), 1);
    }

    #[tokio::test]
    async fn test_error_status_fails() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/api/search");
            then.status(200)
                .json_body(json!({"status": "ERROR", "message": "Search is disabled"}));
        });

        let crawler =
            RegistryCrawler::new(&server.base_url(), "demo", Duration::from_secs(5)).unwrap();
        let result = crawler.search_dataverses().await;

        match result {
            Err(BrokerError::SearchError { message }) => {
                assert!(message.contains("Search is disabled"))
            }
            other => panic!("expected SearchError, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_no_results_fails() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/api/search");
            then.status(200).json_body(page(0, vec![]));
        });

        let crawler =
            RegistryCrawler::new(&server.base_url(), "demo", Duration::from_secs(5)).unwrap();
        assert!(matches!(
            crawler.search_dataverses().await,
            Err(BrokerError::SearchError { .. })
        ));
    }
}
