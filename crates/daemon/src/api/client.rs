use reqwest::{header::HeaderMap, header::HeaderValue, Client};
use serde::de::DeserializeOwned;
use url::Url;

use common::document::Document;
use common::events::{EventDispatcher, SyncEvent};
use common::index::Tag;

use super::error::ApiError;
use super::types::{DocumentInfo, DocumentMetadata, Page};
use crate::config::RemoteConfig;
use crate::snapshot::Snapshot;

/// Fetches documents and tags and forwards them as sync events
#[derive(Debug, Clone)]
pub struct DocumentStoreClient {
    /// `<base>/api/`, always with a trailing slash
    api: Url,
    client: Client,
    events: EventDispatcher,
}

impl DocumentStoreClient {
    pub fn new(config: &RemoteConfig, events: EventDispatcher) -> Result<Self, ApiError> {
        let mut authorization = HeaderValue::from_str(&format!("Token {}", config.token))
            .map_err(|_| ApiError::InvalidToken)?;
        authorization.set_sensitive(true);

        let mut default_headers = HeaderMap::new();
        default_headers.insert("Accept", HeaderValue::from_static("application/json"));
        default_headers.insert("Authorization", authorization);

        let client = Client::builder()
            .default_headers(default_headers)
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()?;

        let mut base = config.base_url.clone();
        if !base.path().ends_with('/') {
            base.set_path(&format!("{}/", base.path()));
        }

        Ok(Self {
            api: base.join("api/")?,
            client,
            events,
        })
    }

    /// Get the API root all relative links resolve against
    pub fn api_url(&self) -> &Url {
        &self.api
    }

    /// Resolve an API link
    ///
    /// Relative links are joined onto the API root. Absolute links (the
    /// `next` links of paginated listings) keep their path and query but take
    /// the scheme, host and port of the configured base, since the store
    /// may report an internal address.
    pub fn resolve(&self, link: &str) -> Result<Url, ApiError> {
        if !link.contains("://") {
            return Ok(self.api.join(link)?);
        }

        let mut url = Url::parse(link)?;
        url.set_scheme(self.api.scheme())
            .map_err(|_| ApiError::Rebase(link.to_string()))?;
        url.set_host(self.api.host_str())?;
        url.set_port(self.api.port())
            .map_err(|_| ApiError::Rebase(link.to_string()))?;
        Ok(url)
    }

    async fn json<T: DeserializeOwned>(&self, link: &str) -> Result<T, ApiError> {
        let url = self.resolve(link)?;
        tracing::debug!(%url, "GET");
        let response = self.client.get(url).send().await?;

        if response.status().is_success() {
            Ok(response.json::<T>().await?)
        } else {
            Err(ApiError::HttpStatus(
                response.status(),
                response.text().await?,
            ))
        }
    }

    /// Follow `next` links until the listing is exhausted
    ///
    /// Returns the collected results and the `all` id list of the first
    /// page that reported one.
    async fn get_all<T: DeserializeOwned>(
        &self,
        link: &str,
    ) -> Result<(Vec<T>, Option<Vec<u64>>), ApiError> {
        let mut results = Vec::new();
        let mut all = None;
        let mut next = Some(link.to_string());

        while let Some(link) = next {
            let page: Page<T> = self.json(&link).await?;
            if all.is_none() {
                all = page.all;
            }
            results.extend(page.results);
            next = page.next;
        }

        Ok((results, all))
    }

    /// Fetch every tag, reconcile deleted ones and upsert the rest
    pub async fn refresh_tags(&self) -> Result<Vec<Tag>, ApiError> {
        let (tags, all): (Vec<Tag>, _) = self.get_all("tags/").await?;
        let ids = all.unwrap_or_else(|| tags.iter().map(|tag| tag.id).collect());

        self.events.dispatch(SyncEvent::CanonicalTagIds(ids))?;
        self.events.dispatch(SyncEvent::TagsAdded(tags.clone()))?;
        tracing::info!(count = tags.len(), "refreshed tags");
        Ok(tags)
    }

    /// Fetch the ids of every existing document and prune the rest
    pub async fn refresh_document_ids(&self) -> Result<Vec<u64>, ApiError> {
        let page: Page<serde_json::Value> = self.json("documents/?page_size=1").await?;
        // Without `all` an empty list would prune every document
        let ids = page.all.ok_or(ApiError::MissingAllIds)?;

        self.events
            .dispatch(SyncEvent::CanonicalDocumentIds(ids.clone()))?;
        tracing::info!(count = ids.len(), "refreshed document ids");
        Ok(ids)
    }

    async fn document_metadata(&self, id: u64) -> Result<DocumentMetadata, ApiError> {
        self.json(&format!("documents/{}/metadata/", id)).await
    }

    /// Fetch one document with its media metadata and upsert it
    pub async fn fetch_document(&self, id: u64) -> Result<Document, ApiError> {
        let link = format!("documents/{}/", id);
        let (info, metadata) = tokio::try_join!(
            self.json::<DocumentInfo>(&link),
            self.document_metadata(id),
        )?;
        let document = info.with_metadata(metadata);

        self.events
            .dispatch(SyncEvent::DocumentsAdded(vec![document.clone()]))?;
        Ok(document)
    }

    /// Fetch every document, reconcile deleted ones and upsert the rest
    ///
    /// Documents are dispatched one by one as their metadata arrives, so the
    /// filesystem fills up while the fetch is still running.
    pub async fn refresh_documents(&self) -> Result<Vec<Document>, ApiError> {
        let (infos, all): (Vec<DocumentInfo>, _) = self.get_all("documents/").await?;
        let ids = all.unwrap_or_else(|| infos.iter().map(|info| info.id).collect());
        self.events.dispatch(SyncEvent::CanonicalDocumentIds(ids))?;

        let mut documents = Vec::with_capacity(infos.len());
        for info in infos {
            let metadata = self.document_metadata(info.id).await?;
            let document = info.with_metadata(metadata);
            self.events
                .dispatch(SyncEvent::DocumentsAdded(vec![document.clone()]))?;
            documents.push(document);
        }

        tracing::info!(count = documents.len(), "refreshed documents");
        Ok(documents)
    }

    /// Full refresh: tags first so documents never reference unknown tags
    pub async fn refresh_all(&self) -> Result<Snapshot, ApiError> {
        let tags = self.refresh_tags().await?;
        let documents = self.refresh_documents().await?;
        Ok(Snapshot { documents, tags })
    }
}
