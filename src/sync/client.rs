use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use url::Url;

use crate::{core::entities::DaySnapshot, utils::time::date_key};

/// The remote key-value store behind the sync engine. Callers treat any error as "no remote
/// data"; implementations just report what happened.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RemoteStore: Send + Sync + 'static {
    async fn fetch_day(&self, date: NaiveDate) -> Result<DaySnapshot>;

    /// Full replacement of the stored day, no merge.
    async fn push_day(&self, date: NaiveDate, snapshot: DaySnapshot) -> Result<()>;

    async fn fetch_presets(&self) -> Result<Vec<String>>;

    async fn push_presets(&self, presets: Vec<String>) -> Result<()>;
}

/// HTTP implementation speaking the worker contract: bearer token, `/api/day/{date}` and
/// `/api/presets`, JSON bodies.
pub struct HttpRemoteStore {
    client: Client,
    base: Url,
    token: String,
}

impl HttpRemoteStore {
    pub fn new(base_url: &str, token: &str) -> Result<Self> {
        let base = Url::parse(base_url).with_context(|| format!("invalid api url {base_url}"))?;
        Ok(Self {
            client: Client::new(),
            base,
            token: token.to_string(),
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| anyhow::anyhow!("api url cannot be a base"))?;
            path.pop_if_empty();
            for segment in segments {
                path.push(segment);
            }
        }
        Ok(url)
    }

    async fn get_json<V: serde::de::DeserializeOwned>(&self, url: Url) -> Result<V> {
        let response = self
            .client
            .get(url.clone())
            .bearer_auth(&self.token)
            .send()
            .await?;
        if !response.status().is_success() {
            bail!("remote returned {} for GET {url}", response.status());
        }
        Ok(response.json().await?)
    }

    async fn put_json<V: serde::Serialize>(&self, url: Url, body: &V) -> Result<()> {
        let response = self
            .client
            .put(url.clone())
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await?;
        if !response.status().is_success() {
            bail!("remote returned {} for PUT {url}", response.status());
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteStore for HttpRemoteStore {
    async fn fetch_day(&self, date: NaiveDate) -> Result<DaySnapshot> {
        self.get_json(self.endpoint(&["api", "day", &date_key(date)])?)
            .await
    }

    async fn push_day(&self, date: NaiveDate, snapshot: DaySnapshot) -> Result<()> {
        self.put_json(self.endpoint(&["api", "day", &date_key(date)])?, &snapshot)
            .await
    }

    async fn fetch_presets(&self) -> Result<Vec<String>> {
        self.get_json(self.endpoint(&["api", "presets"])?).await
    }

    async fn push_presets(&self, presets: Vec<String>) -> Result<()> {
        self.put_json(self.endpoint(&["api", "presets"])?, &presets)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_join_cleanly() -> Result<()> {
        let store = HttpRemoteStore::new("https://onto.example.com", "t")?;
        assert_eq!(
            store.endpoint(&["api", "day", "2026-03-07"])?.as_str(),
            "https://onto.example.com/api/day/2026-03-07"
        );

        let slashed = HttpRemoteStore::new("https://onto.example.com/", "t")?;
        assert_eq!(
            slashed.endpoint(&["api", "presets"])?.as_str(),
            "https://onto.example.com/api/presets"
        );
        Ok(())
    }
}
