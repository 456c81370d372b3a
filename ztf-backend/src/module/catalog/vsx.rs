///! AAVSO VSX cone search through VizieR (catalog B/vsx/vsx)

use anyhow::Result;
use async_trait::async_trait;

use super::types::{CatalogDescriptor, ColumnSpec, RawRow, RecordId};
use super::vizier::VizierClient;
use super::ConeSearchCatalog;
use crate::config::BackendConfig;
use ztf_common::{AngleUnit, ConeSearch};

const VSX_CATALOG: &str = "B/vsx/vsx";
const VSX_OBJECT_URL: &str = "//www.aavso.org/vsx/index.php";

static DESCRIPTOR: CatalogDescriptor = CatalogDescriptor {
    name: "VSX",
    id_column: "OID",
    ra_column: "RAJ2000",
    dec_column: "DEJ2000",
    // VizieR serves VSX positions in decimal degrees
    ra_unit: AngleUnit::Degrees,
    columns: &[
        ColumnSpec { raw: "link", label: "Designation" },
        ColumnSpec { raw: "separation", label: "Separation, arcsec" },
        ColumnSpec { raw: "Name", label: "Name" },
        ColumnSpec { raw: "Period", label: "Period, days" },
        ColumnSpec {
            raw: "Type",
            label: r#"<a href="https://aavso.org/vsx/help/VariableStarTypeDesignationsInVSX.pdf">Variability type</a>"#,
        },
        ColumnSpec { raw: "max", label: "Maximum mag" },
        ColumnSpec { raw: "n_max", label: "Band of max mag" },
        ColumnSpec { raw: "min", label: "Minimum mag" },
        ColumnSpec { raw: "n_min", label: "Band of min mag" },
    ],
};

pub struct VsxQuery {
    vizier: VizierClient,
}

impl VsxQuery {
    pub fn new(config: &BackendConfig) -> Self {
        Self {
            vizier: VizierClient::new(config),
        }
    }
}

#[async_trait]
impl ConeSearchCatalog for VsxQuery {
    fn descriptor(&self) -> &CatalogDescriptor {
        &DESCRIPTOR
    }

    fn object_url(&self, id: &RecordId) -> String {
        format!("{VSX_OBJECT_URL}?view=detail.top&oid={id}")
    }

    async fn query_region(&self, query: &ConeSearch) -> Result<Vec<RawRow>> {
        let tables = self.vizier.query_region(query, Some(VSX_CATALOG), &[], None).await?;
        Ok(tables
            .into_iter()
            .find(|t| !t.is_empty())
            .map(|t| t.to_rows())
            .unwrap_or_default())
    }
}
