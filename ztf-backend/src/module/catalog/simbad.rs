///! SIMBAD cone search (VOTable)

use anyhow::{Context, Result, bail};

use super::types::{CatalogDescriptor, ColumnSpec, RawRow, RecordId};
use super::votable::parse_votable;
use super::ConeSearchCatalog;
use crate::config::BackendConfig;
use async_trait::async_trait;
use ztf_common::{AngleUnit, ConeSearch};

const SIMBAD_OBJECT_URL: &str = "//simbad.u-strasbg.fr/simbad/sim-id";

/// Extra VOTable fields requested on top of the basic cone search: distance,
/// R/V photometry, object types and variable-star data.
const VOTABLE_FIELDS: &str = "distance,fluxdata(R),fluxdata(V),otype,otypes,v*";

static DESCRIPTOR: CatalogDescriptor = CatalogDescriptor {
    name: "SIMBAD",
    id_column: "MAIN_ID",
    ra_column: "RA",
    dec_column: "DEC",
    // SIMBAD reports RA as sexagesimal hour angle, DEC as sexagesimal degrees
    ra_unit: AngleUnit::Hours,
    columns: &[
        ColumnSpec { raw: "link", label: "MAIN_ID" },
        ColumnSpec { raw: "separation", label: "Separation, arcsec" },
        ColumnSpec { raw: "OTYPE", label: "Main type" },
        ColumnSpec { raw: "OTYPES", label: "Other types" },
        ColumnSpec { raw: "V__vartyp", label: "Variable type" },
        ColumnSpec { raw: "V__period", label: "Period" },
        ColumnSpec { raw: "Distance_distance", label: "Distance" },
        ColumnSpec { raw: "Distance_unit", label: "Distance unit" },
    ],
};

pub struct SimbadQuery {
    client: reqwest::Client,
    base_url: String,
}

impl SimbadQuery {
    pub fn new(config: &BackendConfig) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(config.request_timeout())
                .build()
                .expect("Failed to build reqwest client"),
            base_url: config.simbad_base_url.trim_end_matches('/').to_string(),
        }
    }

    fn coo_url(&self) -> String {
        format!("{}/simbad/sim-coo", self.base_url)
    }
}

#[async_trait]
impl ConeSearchCatalog for SimbadQuery {
    fn descriptor(&self) -> &CatalogDescriptor {
        &DESCRIPTOR
    }

    fn object_url(&self, id: &RecordId) -> String {
        format!(
            "{}?Ident={}",
            SIMBAD_OBJECT_URL,
            urlencoding::encode(&id.to_string())
        )
    }

    async fn query_region(&self, query: &ConeSearch) -> Result<Vec<RawRow>> {
        let response = self
            .client
            .get(self.coo_url())
            .query(&[
                (
                    "Coord",
                    format!("{} {:+}", query.coord.ra, query.coord.dec),
                ),
                ("Radius", query.radius_arcsec.to_string()),
                ("Radius.unit", "arcsec".to_string()),
                ("output.format", "votable".to_string()),
                ("output.params", VOTABLE_FIELDS.to_string()),
            ])
            .send()
            .await
            .context("Failed to reach SIMBAD")?;
        if !response.status().is_success() {
            bail!("SIMBAD returned HTTP {}", response.status());
        }
        let body = response
            .text()
            .await
            .context("Failed to read SIMBAD response body")?;

        let tables = parse_votable(&body)?;
        // cone searches answer with a single table; absent or empty means no match
        Ok(tables
            .into_iter()
            .find(|t| !t.is_empty())
            .map(|t| t.to_rows())
            .unwrap_or_default())
    }
}
