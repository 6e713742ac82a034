//! Scopus library implementation.
//!
//! Uses the Elsevier Scopus Search API for sizing and paging through queries.
//! API documentation: <https://dev.elsevier.com/documentation/ScopusSearchAPI.wadl>

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

use crate::library::{Library, LibraryError, Pacing};
use crate::models::{Publication, PublicationBuilder, Request, Response};
use crate::utils::HttpClient;

const SCOPUS_API_BASE: &str = "https://api.elsevier.com";
const SEARCH_PATH: &str = "/content/search/scopus";

/// Elsevier allows this many concurrent requests per API key
const SCOPUS_MAX_CONCURRENT: usize = 6;

pub const KEY_LINK_ABSTRACT: &str = "link_abstract";
pub const KEY_EID: &str = "eid";
pub const KEY_ISSN: &str = "issn";
pub const KEY_DOI: &str = "doi";
pub const KEY_PAGE_RANGE: &str = "page_range";
pub const KEY_VOLUME: &str = "volume";
pub const KEY_PUBLICATION_NAME: &str = "publication_name";
pub const KEY_ARTICLE_NUMBER: &str = "article_number";
pub const KEY_AGGREGATION_TYPE: &str = "aggregation_type";
pub const KEY_SUBTYPE: &str = "subtype";
pub const KEY_CITED_BY_COUNT: &str = "cited_by_count";
pub const KEY_AFFILIATION: &str = "affiliation";

/// Scopus by Elsevier
///
/// Requires an API key from <https://dev.elsevier.com/>.
#[derive(Debug, Clone)]
pub struct ScopusLibrary {
    client: Arc<HttpClient>,
    api_key: String,
    base_url: String,
    pacing: Pacing,
}

impl ScopusLibrary {
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> Result<Self, LibraryError> {
        Ok(Self {
            client: Arc::new(HttpClient::with_timeout(timeout)?),
            api_key: api_key.into(),
            base_url: SCOPUS_API_BASE.to_string(),
            pacing: Pacing::MaxConcurrent(
                NonZeroUsize::new(SCOPUS_MAX_CONCURRENT).unwrap_or(NonZeroUsize::MIN),
            ),
        })
    }

    /// Point the library at another API host
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Replace the default pacing constraint
    pub fn with_pacing(mut self, pacing: Pacing) -> Self {
        self.pacing = pacing;
        self
    }

    fn search_url(&self, request: &Request) -> String {
        format!(
            "{}{}?query={}&count={}&start={}",
            self.base_url,
            SEARCH_PATH,
            urlencoding::encode(&request.query),
            request.per_page,
            request.offset()
        )
    }

    async fn search(&self, request: &Request) -> Result<SearchResults, LibraryError> {
        let response = self
            .client
            .client()
            .get(self.search_url(request))
            .header("X-ELS-APIKey", &self.api_key)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| LibraryError::Network(format!("Failed to search Scopus: {}", e)))?;

        if response.status() != reqwest::StatusCode::OK {
            let message = response
                .headers()
                .get("X-Els-Status")
                .and_then(|v| v.to_str().ok())
                .filter(|v| !v.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| response.status().to_string());
            return Err(LibraryError::Api(message));
        }

        let page: SearchPage = response.json().await.map_err(|e| {
            LibraryError::Parse(format!("Failed to parse Scopus response: {}", e))
        })?;
        Ok(page.results)
    }
}

#[async_trait]
impl Library for ScopusLibrary {
    fn id(&self) -> &str {
        "scopus"
    }

    fn name(&self) -> &str {
        "Scopus by ELSEVIER"
    }

    fn pacing(&self) -> Pacing {
        self.pacing
    }

    #[instrument(skip(self, request), fields(page = request.page, per_page = request.per_page))]
    async fn fetch_page(&self, request: &Request) -> Result<Response, LibraryError> {
        let results = self.search(request).await?;
        let literature = map_publications(results.entries)?;
        Ok(Response::new(request.clone(), literature))
    }

    #[instrument(skip(self, request))]
    async fn total_count(&self, request: &Request) -> Result<usize, LibraryError> {
        let results = self.search(request).await?;
        results.total.trim().parse().map_err(|e| {
            LibraryError::Parse(format!(
                "unexpected totalResults {:?}: {}",
                results.total, e
            ))
        })
    }
}

fn map_publications(entries: Vec<SearchEntry>) -> Result<Vec<Publication>, LibraryError> {
    entries
        .into_iter()
        // An empty result set comes back as a single entry carrying only an error
        .filter(|entry| entry.error.is_none())
        .enumerate()
        .map(|(i, entry)| {
            entry.to_publication().map_err(|e| {
                LibraryError::Parse(format!("search result {}, {}: {}", i, entry.eid, e))
            })
        })
        .collect()
}

// Scopus API response types

#[derive(Debug, Deserialize)]
struct SearchPage {
    #[serde(rename = "search-results")]
    results: SearchResults,
}

#[derive(Debug, Deserialize)]
struct SearchResults {
    #[serde(rename = "opensearch:totalResults", default)]
    total: String,
    #[serde(rename = "entry", default)]
    entries: Vec<SearchEntry>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SearchEntry {
    error: Option<String>,
    #[serde(rename = "dc:title")]
    title: String,
    eid: String,
    #[serde(rename = "prism:coverDate")]
    cover_date: String,
    #[serde(rename = "dc:creator")]
    creator: String,
    #[serde(rename = "prism:issn")]
    issn: String,
    #[serde(rename = "prism:doi")]
    doi: String,
    #[serde(rename = "prism:pageRange")]
    page_range: String,
    #[serde(rename = "prism:volume")]
    volume: String,
    #[serde(rename = "prism:publicationName")]
    publication_name: String,
    #[serde(rename = "article-number")]
    article_number: String,
    #[serde(rename = "prism:aggregationType")]
    aggregation_type: String,
    subtype: String,
    #[serde(rename = "citedby-count")]
    cited_by_count: String,
    #[serde(rename = "link")]
    links: Vec<SearchLink>,
    #[serde(rename = "affiliation")]
    affiliations: Vec<SearchAffiliation>,
}

#[derive(Debug, Deserialize)]
struct SearchLink {
    #[serde(rename = "@ref", default)]
    tag: String,
    #[serde(rename = "@href", default)]
    href: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SearchAffiliation {
    #[serde(rename = "affilname")]
    name: Option<String>,
    #[serde(rename = "affiliation-city")]
    city: Option<String>,
    #[serde(rename = "affiliation-country")]
    country: Option<String>,
}

impl SearchEntry {
    fn to_publication(&self) -> Result<Publication, chrono::ParseError> {
        let cover_date = NaiveDate::parse_from_str(&self.cover_date, "%Y-%m-%d")?;
        let abstract_link = self
            .links
            .iter()
            .find(|link| link.tag == "scopus")
            .map(|link| link.href.clone())
            .unwrap_or_default();

        Ok(
            PublicationBuilder::new(self.title.clone(), self.creator.clone(), cover_date)
                .value(KEY_LINK_ABSTRACT, abstract_link)
                .value(KEY_EID, self.eid.clone())
                .value(KEY_ISSN, self.issn.clone())
                .value(KEY_DOI, self.doi.clone())
                .value(KEY_PAGE_RANGE, self.page_range.clone())
                .value(KEY_VOLUME, self.volume.clone())
                .value(KEY_PUBLICATION_NAME, self.publication_name.clone())
                .value(KEY_ARTICLE_NUMBER, self.article_number.clone())
                .value(KEY_AGGREGATION_TYPE, self.aggregation_type.clone())
                .value(KEY_SUBTYPE, self.subtype.clone())
                .value(KEY_CITED_BY_COUNT, self.cited_by_count.clone())
                .value(KEY_AFFILIATION, self.affiliation())
                .build(),
        )
    }

    /// Affiliations as "name, city, country" joined by "; ", skipping empty parts
    fn affiliation(&self) -> String {
        self.affiliations
            .iter()
            .map(|a| {
                [&a.name, &a.city, &a.country]
                    .into_iter()
                    .filter_map(|part| part.as_deref())
                    .filter(|part| !part.is_empty())
                    .collect::<Vec<_>>()
                    .join(", ")
            })
            .filter(|a| !a.is_empty())
            .collect::<Vec<_>>()
            .join("; ")
    }
}
