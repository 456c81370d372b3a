///! Client for the ZTF metadata/light-curve service
///!
///! Two endpoints: `oid/full/json` for a single object and
///! `circle/full/json` for cone searches with optional filter/field
///! include-exclude lists. Responses are JSON keyed by OID. Failures follow
///! the catalog-wide policy: non-2xx or malformed payloads are "no result".

use std::collections::{BTreeMap, BTreeSet};

use anyhow::{Context, Result, bail};

use super::types::ZtfObject;
use crate::cache::QueryCache;
use crate::config::BackendConfig;
use ztf_common::{ConeSearch, ConeSearchKey, EqCoord, SeparationFrom};

pub const DEFAULT_API_VERSION: &str = "v1";

/// Include/exclude lists for the circle endpoint. Sets, so two requests that
/// differ only in listing order are the same request (and the same cache
/// key).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CircleFilters {
    pub filters: BTreeSet<String>,
    pub not_filters: BTreeSet<String>,
    pub fieldids: BTreeSet<u32>,
    pub not_fieldids: BTreeSet<u32>,
}

impl CircleFilters {
    fn cache_key(&self) -> (Vec<String>, Vec<String>, Vec<u32>, Vec<u32>) {
        (
            self.filters.iter().cloned().collect(),
            self.not_filters.iter().cloned().collect(),
            self.fieldids.iter().copied().collect(),
            self.not_fieldids.iter().copied().collect(),
        )
    }
}

type CircleKey = (
    ConeSearchKey,
    (Vec<String>, Vec<String>, Vec<u32>, Vec<u32>),
    String,
);

pub struct ZtfApi {
    client: reqwest::Client,
    base_url: String,
    oid_cache: QueryCache<(u64, String), Option<ZtfObject>>,
    circle_cache: QueryCache<CircleKey, Option<BTreeMap<u64, ZtfObject>>>,
}

impl ZtfApi {
    pub fn new(config: &BackendConfig) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(config.request_timeout())
                .build()
                .expect("Failed to build reqwest client"),
            base_url: config.ztf_api_base_url.trim_end_matches('/').to_string(),
            oid_cache: QueryCache::new(config.cache_ttl()),
            circle_cache: QueryCache::new(config.cache_ttl()),
        }
    }

    fn oid_url(&self, version: &str) -> String {
        format!("{}/{}/oid/full/json", self.base_url, version)
    }

    fn circle_url(&self, version: &str) -> String {
        format!("{}/{}/circle/full/json", self.base_url, version)
    }

    /// Single-object lookup by OID. Memoized; `None` for unknown OIDs and
    /// for remote failures alike.
    pub async fn find_oid(&self, oid: u64, version: &str) -> Option<ZtfObject> {
        self.oid_cache
            .get_or_fetch((oid, version.to_string()), || async move {
                match self.fetch_oid(oid, version).await {
                    Ok(object) => object,
                    Err(e) => {
                        tracing::warn!("ZTF oid lookup failed for {}: {:#}", oid, e);
                        None
                    }
                }
            })
            .await
    }

    async fn fetch_oid(&self, oid: u64, version: &str) -> Result<Option<ZtfObject>> {
        let response = self
            .client
            .get(self.oid_url(version))
            .query(&[("oid", oid.to_string())])
            .send()
            .await
            .context("Failed to reach the ZTF database API")?;
        if !response.status().is_success() {
            bail!("ZTF database API returned HTTP {}", response.status());
        }
        let mut payload: BTreeMap<String, ZtfObject> = response
            .json()
            .await
            .context("Malformed ZTF oid payload")?;
        Ok(payload.remove(&oid.to_string()))
    }

    pub async fn get_meta(&self, oid: u64, version: &str) -> Option<super::types::ZtfMeta> {
        Some(self.find_oid(oid, version).await?.meta)
    }

    pub async fn get_lc(&self, oid: u64, version: &str) -> Option<Vec<super::types::ZtfObs>> {
        Some(self.find_oid(oid, version).await?.lc)
    }

    pub async fn get_coord(&self, oid: u64, version: &str) -> Option<(f64, f64)> {
        let meta = self.get_meta(oid, version).await?;
        Some((meta.coord.ra, meta.coord.dec))
    }

    pub async fn get_coord_string(&self, oid: u64, version: &str) -> Option<String> {
        let (ra, dec) = self.get_coord(oid, version).await?;
        Some(format!("{ra:.5}, {dec:.5}"))
    }

    /// Cone search. Separations for the whole result set are computed in one
    /// pass with the query-point trigonometry evaluated once.
    pub async fn find_circle(
        &self,
        query: &ConeSearch,
        filters: &CircleFilters,
        version: &str,
    ) -> Option<BTreeMap<u64, ZtfObject>> {
        let key = (query.cache_key(), filters.cache_key(), version.to_string());
        self.circle_cache
            .get_or_fetch(key, || async move {
                match self.fetch_circle(query, filters, version).await {
                    Ok(objects) => Some(objects),
                    Err(e) => {
                        tracing::warn!("ZTF circle search failed: {:#}", e);
                        None
                    }
                }
            })
            .await
    }

    async fn fetch_circle(
        &self,
        query: &ConeSearch,
        filters: &CircleFilters,
        version: &str,
    ) -> Result<BTreeMap<u64, ZtfObject>> {
        let mut params: Vec<(&str, String)> = vec![
            ("ra", query.coord.ra.to_string()),
            ("dec", query.coord.dec.to_string()),
            ("radius_arcsec", query.radius_arcsec.to_string()),
        ];
        for f in &filters.filters {
            params.push(("filter", f.clone()));
        }
        for f in &filters.not_filters {
            params.push(("not_filter", f.clone()));
        }
        for id in &filters.fieldids {
            params.push(("fieldid", id.to_string()));
        }
        for id in &filters.not_fieldids {
            params.push(("not_fieldid", id.to_string()));
        }

        let response = self
            .client
            .get(self.circle_url(version))
            .query(&params)
            .send()
            .await
            .context("Failed to reach the ZTF database API")?;
        if !response.status().is_success() {
            bail!("ZTF database API returned HTTP {}", response.status());
        }
        let payload: BTreeMap<String, ZtfObject> = response
            .json()
            .await
            .context("Malformed ZTF circle payload")?;

        let from = SeparationFrom::new(&query.coord);
        let mut objects = BTreeMap::new();
        for (oid, mut object) in payload {
            let oid: u64 = oid
                .parse()
                .with_context(|| format!("non-numeric OID key {oid:?}"))?;
            let coord = EqCoord::new(object.meta.coord.ra, object.meta.coord.dec)?;
            object.separation = Some(from.to_arcsec(&coord));
            objects.insert(oid, object);
        }
        Ok(objects)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api_for(server: &mockito::Server) -> ZtfApi {
        let mut config = BackendConfig::default();
        config.ztf_api_base_url = format!("{}/api/", server.url());
        ZtfApi::new(&config)
    }

    const OID_BODY: &str = r#"{
        "695211400003925": {
            "meta": {
                "coord": {"ra": 62.17128, "dec": 61.38461},
                "filter": "zr", "fieldid": 695, "rcid": 13
            },
            "lc": [
                {"mjd": 58200.31, "mag": 17.1, "magerr": 0.05},
                {"mjd": 58203.35, "mag": 17.3, "magerr": 0.06}
            ]
        }
    }"#;

    #[tokio::test]
    async fn test_find_oid_is_memoized() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v1/oid/full/json")
            .match_query(mockito::Matcher::UrlEncoded(
                "oid".to_string(),
                "695211400003925".to_string(),
            ))
            .with_status(200)
            .with_body(OID_BODY)
            .expect(1)
            .create_async()
            .await;

        let api = api_for(&server);
        let first = api.find_oid(695211400003925, "v1").await.unwrap();
        assert_eq!(first.lc.len(), 2);

        // second identical lookup must be served from cache
        let second = api.find_oid(695211400003925, "v1").await.unwrap();
        assert_eq!(second.meta.fieldid, Some(695));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_coord_string_has_five_decimals() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/v1/oid/full/json")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body(OID_BODY)
            .create_async()
            .await;

        let api = api_for(&server);
        assert_eq!(
            api.get_coord_string(695211400003925, "v1").await.unwrap(),
            "62.17128, 61.38461"
        );
    }

    #[tokio::test]
    async fn test_unknown_oid_and_outage_are_none() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/v1/oid/full/json")
            .match_query(mockito::Matcher::Any)
            .with_status(404)
            .create_async()
            .await;

        let api = api_for(&server);
        assert!(api.find_oid(1, "v1").await.is_none());
        assert!(api.get_coord(1, "v1").await.is_none());
        assert!(api.get_coord_string(1, "v1").await.is_none());
    }

    #[tokio::test]
    async fn test_circle_computes_bulk_separations() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/v1/circle/full/json")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body(
                r#"{
                "1": {"meta": {"coord": {"ra": 10.0, "dec": 20.0}}, "lc": []},
                "2": {"meta": {"coord": {"ra": 10.0, "dec": 20.001}}, "lc": []}
            }"#,
            )
            .create_async()
            .await;

        let api = api_for(&server);
        let query = ConeSearch::new(10.0, 20.0, 10.0).unwrap();
        let objects = api
            .find_circle(&query, &CircleFilters::default(), "v1")
            .await
            .unwrap();
        assert_eq!(objects.len(), 2);
        assert!(objects[&1].separation.unwrap() < 1e-9);
        // 0.001 deg = 3.6 arcsec
        assert!((objects[&2].separation.unwrap() - 3.6).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_circle_filter_order_does_not_change_cache_key() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v1/circle/full/json")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body("{}")
            .expect(1)
            .create_async()
            .await;

        let api = api_for(&server);
        let query = ConeSearch::new(10.0, 20.0, 10.0).unwrap();

        let a = CircleFilters {
            filters: ["zg".to_string(), "zr".to_string()].into_iter().collect(),
            ..Default::default()
        };
        // same set, built in the opposite order
        let b = CircleFilters {
            filters: ["zr".to_string(), "zg".to_string()].into_iter().collect(),
            ..Default::default()
        };

        api.find_circle(&query, &a, "v1").await;
        api.find_circle(&query, &b, "v1").await;
        mock.assert_async().await;
    }
}
