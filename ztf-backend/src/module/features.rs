///! Light-curve feature service client
///!
///! Posts an object's light curve to the feature-extraction service and
///! returns the feature vector keyed by feature name. Memoized per OID.

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use serde::Serialize;
use serde_json::{Map, Value};

use super::ztf::ZtfApi;
use crate::cache::QueryCache;
use crate::config::BackendConfig;

#[derive(Serialize)]
struct FeatureObs {
    t: f64,
    m: f64,
    err: f64,
}

#[derive(Serialize)]
struct FeatureRequest {
    light_curve: Vec<FeatureObs>,
}

pub struct LightCurveFeatures {
    client: reqwest::Client,
    base_url: String,
    api: Arc<ZtfApi>,
    cache: QueryCache<(u64, String), Option<Map<String, Value>>>,
}

impl LightCurveFeatures {
    pub fn new(api: Arc<ZtfApi>, config: &BackendConfig) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(config.request_timeout())
                .build()
                .expect("Failed to build reqwest client"),
            base_url: config.features_api_url.clone(),
            api,
            cache: QueryCache::new(config.cache_ttl()),
        }
    }

    /// Feature vector for an OID, or `None` when the object is unknown or
    /// the feature service fails.
    pub async fn features(&self, oid: u64, version: &str) -> Option<Map<String, Value>> {
        self.cache
            .get_or_fetch((oid, version.to_string()), || async move {
                let lc = self.api.get_lc(oid, version).await?;
                match self.post_light_curve(&lc).await {
                    Ok(features) => Some(features),
                    Err(e) => {
                        tracing::warn!("Feature extraction failed for {}: {:#}", oid, e);
                        None
                    }
                }
            })
            .await
    }

    async fn post_light_curve(
        &self,
        lc: &[super::ztf::ZtfObs],
    ) -> Result<Map<String, Value>> {
        let request = FeatureRequest {
            light_curve: lc
                .iter()
                .map(|obs| FeatureObs {
                    t: obs.mjd,
                    m: obs.mag,
                    err: obs.magerr,
                })
                .collect(),
        };
        let response = self
            .client
            .post(&self.base_url)
            .json(&request)
            .send()
            .await
            .context("Failed to reach the light-curve feature service")?;
        if !response.status().is_success() {
            bail!("Feature service returned HTTP {}", response.status());
        }
        response
            .json()
            .await
            .context("Malformed feature service payload")
    }
}
