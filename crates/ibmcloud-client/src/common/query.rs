//! Query utilities for the VPC API
//!
//! VPC collections are returned as `{ "<key>": [...], "next": { "href": "..." } }`.

use crate::common::HttpClient;
use crate::error::IbmCloudError;
use serde::Deserialize;
use tracing::debug;

/// Link to the next page of a VPC collection
#[derive(Debug, Clone, Deserialize)]
struct PageLink {
    href: String,
}

/// Fetch every page of a VPC collection, following `next.href`
pub async fn fetch_all_pages<T: for<'de> Deserialize<'de>>(
    http: &HttpClient,
    path: &str,
    key: &str,
) -> Result<Vec<T>, IbmCloudError> {
    let mut all_results = Vec::new();
    let mut url = http.build_url(path);

    loop {
        debug!("Fetching page: {}", url);
        let mut page: serde_json::Value = http.get(&url).await?;

        let items = page
            .get_mut(key)
            .map(serde_json::Value::take)
            .unwrap_or(serde_json::Value::Array(Vec::new()));
        let items: Vec<T> = serde_json::from_value(items)?;
        all_results.extend(items);

        let next = page
            .get("next")
            .cloned()
            .and_then(|n| serde_json::from_value::<PageLink>(n).ok());
        match next {
            Some(link) => url = http.build_url(&link.href),
            None => break,
        }
    }

    Ok(all_results)
}
