///! Transient model-fit service client
///!
///! Wraps the sncosmo-based fitting service: fit a model to difference-flux
///! observations, sample the fitted model curve, list available models.
///! Unlike the catalog adapters this is an interactive tool, so failures
///! propagate to the caller instead of degrading to "no result".

use anyhow::{Context, Result, bail};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::cache::QueryCache;
use crate::config::BackendConfig;

const ZERO_POINT: f64 = 8.9;
const ZP_SYSTEM: &str = "ab";
const EBV: f64 = 0.03;
const REDSHIFT_BOUNDS: [f64; 2] = [0.05, 0.3];
const CURVE_SAMPLES: u32 = 2000;

/// One difference-flux observation, the unit the fit service works in.
#[derive(Debug, Clone, Serialize)]
pub struct FluxObs {
    pub mjd: f64,
    pub flux: f64,
    pub fluxerr: f64,
    /// ZTF band name, e.g. "zg" or "zr".
    pub band: String,
}

pub struct ModelFit {
    client: reqwest::Client,
    base_url: String,
    curve_cache: QueryCache<String, Vec<Map<String, Value>>>,
}

impl ModelFit {
    pub fn new(config: &BackendConfig) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(config.request_timeout())
                .build()
                .expect("Failed to build reqwest client"),
            base_url: config.model_fit_api_url.trim_end_matches('/').to_string(),
            curve_cache: QueryCache::new(config.cache_ttl()),
        }
    }

    /// Fit `model` to the observations; returns the fitted parameter map.
    pub async fn fit(
        &self,
        observations: &[FluxObs],
        model: &str,
    ) -> Result<Map<String, Value>> {
        let light_curve: Vec<Value> = observations
            .iter()
            .map(|obs| {
                // "zg" -> "ztfg", the band naming the service registers
                let band = format!("ztf{}", obs.band.get(1..).unwrap_or_default());
                serde_json::json!({
                    "mjd": obs.mjd,
                    "flux": obs.flux,
                    "fluxerr": obs.fluxerr,
                    "zp": ZERO_POINT,
                    "zpsys": ZP_SYSTEM,
                    "band": band,
                })
            })
            .collect();
        let body = serde_json::json!({
            "light_curve": light_curve,
            "ebv": EBV,
            "name_model": model,
            "redshift": REDSHIFT_BOUNDS,
        });

        let response = self
            .client
            .post(format!("{}/sncosmo/fit", self.base_url))
            .json(&body)
            .send()
            .await
            .context("Failed to reach the model-fit service")?;
        if !response.status().is_success() {
            bail!("Model-fit service returned HTTP {}", response.status());
        }
        let mut payload: Map<String, Value> = response
            .json()
            .await
            .context("Malformed fit payload")?;
        match payload.remove("parameters") {
            Some(Value::Object(parameters)) => Ok(parameters),
            other => bail!("fit payload has no parameter map: {other:?}"),
        }
    }

    /// Sample the fitted model curve. Memoized on the full request shape.
    #[allow(clippy::too_many_arguments)]
    pub async fn get_curve(
        &self,
        parameters: &Map<String, Value>,
        model: &str,
        band_ref: &str,
        brightness_type: &str,
        band_list: &[String],
        mjd_min: f64,
        mjd_max: f64,
    ) -> Result<Vec<Map<String, Value>>> {
        let body = serde_json::json!({
            "parameters": parameters,
            "name_model": model,
            "zp": ZERO_POINT,
            "zpsys": ZP_SYSTEM,
            "band_list": band_list,
            "t_min": mjd_min,
            "t_max": mjd_max,
            "count": CURVE_SAMPLES,
            "brightness_type": brightness_type,
            "band_ref": band_ref,
        });
        let key = body.to_string();

        if let Some(curve) = self.curve_cache.get(&key).await {
            return Ok(curve);
        }

        let response = self
            .client
            .post(format!("{}/sncosmo/get_curve", self.base_url))
            .json(&body)
            .send()
            .await
            .context("Failed to reach the model-fit service")?;
        if !response.status().is_success() {
            bail!("Model-fit service returned HTTP {}", response.status());
        }
        let mut payload: Map<String, Value> = response
            .json()
            .await
            .context("Malformed curve payload")?;
        let curve = match payload.remove("bright") {
            Some(Value::Array(points)) => points
                .into_iter()
                .map(|point| match point {
                    Value::Object(map) => Ok(map),
                    other => bail!("expected an object per curve point, got {other}"),
                })
                .collect::<Result<Vec<_>>>()?,
            other => bail!("curve payload has no bright records: {other:?}"),
        };

        self.curve_cache.insert(key, curve.clone()).await;
        Ok(curve)
    }

    /// Names of the models the service can fit.
    pub async fn models(&self) -> Result<Vec<String>> {
        let response = self
            .client
            .get(format!("{}/models", self.base_url))
            .send()
            .await
            .context("Failed to reach the model-fit service")?;
        if !response.status().is_success() {
            bail!("Model-fit service returned HTTP {}", response.status());
        }
        let mut payload: Map<String, Value> = response
            .json()
            .await
            .context("Malformed model-list payload")?;
        match payload.remove("models") {
            Some(Value::Array(models)) => Ok(models
                .into_iter()
                .filter_map(|m| m.as_str().map(str::to_string))
                .collect()),
            other => bail!("model-list payload has no models array: {other:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service_for(server: &mockito::Server) -> ModelFit {
        let mut config = BackendConfig::default();
        config.model_fit_api_url = format!("{}/api/v1", server.url());
        ModelFit::new(&config)
    }

    #[tokio::test]
    async fn test_fit_renames_bands_and_returns_parameters() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/v1/sncosmo/fit")
            .match_body(mockito::Matcher::PartialJsonString(
                r#"{"name_model": "salt2", "ebv": 0.03,
                    "light_curve": [{"band": "ztfg", "zp": 8.9, "zpsys": "ab"}]}"#
                    .to_string(),
            ))
            .with_status(200)
            .with_body(r#"{"parameters": {"t0": 58810.2, "x0": 0.001, "z": 0.12}}"#)
            .create_async()
            .await;

        let fit = service_for(&server);
        let observations = vec![FluxObs {
            mjd: 58800.0,
            flux: 1.2e-5,
            fluxerr: 1.0e-6,
            band: "zg".to_string(),
        }];
        let parameters = fit.fit(&observations, "salt2").await.unwrap();
        assert_eq!(parameters["z"], serde_json::json!(0.12));
    }

    #[tokio::test]
    async fn test_get_curve_is_memoized() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/v1/sncosmo/get_curve")
            .with_status(200)
            .with_body(r#"{"bright": [{"mjd": 58800.0, "flux": 1.0e-5}]}"#)
            .expect(1)
            .create_async()
            .await;

        let fit = service_for(&server);
        let parameters = Map::new();
        let bands = vec!["ztfg".to_string()];
        for _ in 0..2 {
            let curve = fit
                .get_curve(&parameters, "salt2", "ztfg", "flux", &bands, 58790.0, 58850.0)
                .await
                .unwrap();
            assert_eq!(curve.len(), 1);
        }
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_models_list() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/v1/models")
            .with_status(200)
            .with_body(r#"{"models": ["salt2", "nugent-sn1a"]}"#)
            .create_async()
            .await;

        let fit = service_for(&server);
        assert_eq!(fit.models().await.unwrap(), vec!["salt2", "nugent-sn1a"]);
    }

    #[tokio::test]
    async fn test_fit_failure_propagates() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/v1/sncosmo/fit")
            .with_status(500)
            .create_async()
            .await;

        let fit = service_for(&server);
        assert!(fit.fit(&[], "salt2").await.is_err());
    }
}
