///! ZTF periodic-variable catalog cone search (JSON REST API)

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use serde_json::Value;

use super::types::{CatalogDescriptor, ColumnSpec, RawRow, RecordId};
use super::ConeSearchCatalog;
use crate::config::BackendConfig;
use ztf_common::{AngleUnit, CellValue, ConeSearch};

const PERIODIC_OBJECT_URL: &str = "http://variables.cn:88/lcz.php";

static DESCRIPTOR: CatalogDescriptor = CatalogDescriptor {
    name: "ZTF periodic",
    id_column: "SourceID",
    ra_column: "RAdeg",
    dec_column: "DEdeg",
    ra_unit: AngleUnit::Degrees,
    columns: &[
        ColumnSpec { raw: "link", label: "ZTF ID" },
        ColumnSpec { raw: "separation", label: "Separation, arcsec" },
        ColumnSpec { raw: "Type", label: "Type" },
        ColumnSpec { raw: "Per", label: "Period, days" },
        ColumnSpec { raw: "Per_g", label: "zg period, days" },
        ColumnSpec { raw: "Per_r", label: "zr period, days" },
        ColumnSpec { raw: "Amp_g", label: "zg amplitude" },
        ColumnSpec { raw: "Amp_r", label: "zr amplitude" },
    ],
};

pub struct ZtfPeriodicQuery {
    client: reqwest::Client,
    api_url: String,
}

impl ZtfPeriodicQuery {
    pub fn new(config: &BackendConfig) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(config.request_timeout())
                .build()
                .expect("Failed to build reqwest client"),
            api_url: config.ztf_periodic_api_url.clone(),
        }
    }
}

#[async_trait]
impl ConeSearchCatalog for ZtfPeriodicQuery {
    fn descriptor(&self) -> &CatalogDescriptor {
        &DESCRIPTOR
    }

    fn object_url(&self, id: &RecordId) -> String {
        format!(
            "{PERIODIC_OBJECT_URL}?SourceID={}",
            urlencoding::encode(&id.to_string())
        )
    }

    async fn query_region(&self, query: &ConeSearch) -> Result<Vec<RawRow>> {
        let response = self
            .client
            .get(&self.api_url)
            .query(&[
                ("ra", query.coord.ra.to_string()),
                ("dec", query.coord.dec.to_string()),
                ("radius_arcsec", query.radius_arcsec.to_string()),
            ])
            .send()
            .await
            .context("Failed to reach the ZTF periodic API")?;
        if !response.status().is_success() {
            bail!("ZTF periodic API returned HTTP {}", response.status());
        }

        let records: Vec<Value> = response
            .json()
            .await
            .context("Malformed ZTF periodic payload")?;
        let rows = records
            .into_iter()
            .map(|record| match record {
                Value::Object(map) => Ok(map
                    .iter()
                    .map(|(k, v)| (k.clone(), CellValue::from_json(v)))
                    .collect::<RawRow>()),
                other => bail!("expected a JSON object per row, got {other}"),
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(rows)
    }
}
