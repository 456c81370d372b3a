///! GCVS cone search through VizieR (catalog B/gcvs/gcvs_cat)

use anyhow::Result;
use async_trait::async_trait;

use super::types::{CatalogDescriptor, ColumnSpec, RawRow, RecordId};
use super::vizier::VizierClient;
use super::ConeSearchCatalog;
use crate::config::BackendConfig;
use ztf_common::{AngleUnit, ConeSearch};

const GCVS_CATALOG: &str = "B/gcvs/gcvs_cat";
const GCVS_SEARCH_URL: &str = "http://www.sai.msu.su/gcvs/cgi-bin/search.cgi";

const OUT_COLUMNS: &[&str] = &[
    "GCVS", "RAJ2000", "DEJ2000", "VarType", "magMax", "Period", "SpType", "VarTypeII",
    "VarName", "Simbad",
];

static DESCRIPTOR: CatalogDescriptor = CatalogDescriptor {
    name: "GCVS",
    id_column: "GCVS",
    ra_column: "RAJ2000",
    dec_column: "DEJ2000",
    ra_unit: AngleUnit::Hours,
    columns: &[
        ColumnSpec { raw: "link", label: "Designation" },
        ColumnSpec { raw: "separation", label: "Separation, arcsec" },
        ColumnSpec { raw: "Period", label: "Period, days" },
        ColumnSpec {
            raw: "VarType",
            label: r#"<a href="http://cdsarc.u-strasbg.fr/viz-bin/getCatFile_Redirect/?-plus=-%2b&B/gcvs/./vartype.txt">Type of variability</a>"#,
        },
        ColumnSpec { raw: "SpType", label: "Spectral type" },
    ],
};

pub struct GcvsQuery {
    vizier: VizierClient,
}

impl GcvsQuery {
    pub fn new(config: &BackendConfig) -> Self {
        Self {
            vizier: VizierClient::new(config),
        }
    }
}

#[async_trait]
impl ConeSearchCatalog for GcvsQuery {
    fn descriptor(&self) -> &CatalogDescriptor {
        &DESCRIPTOR
    }

    fn object_url(&self, id: &RecordId) -> String {
        // the GCVS search form wants '+' for spaces
        let qid = urlencoding::encode(&id.to_string()).replace("%20", "+");
        format!("{GCVS_SEARCH_URL}?search={qid}")
    }

    async fn query_region(&self, query: &ConeSearch) -> Result<Vec<RawRow>> {
        let tables = self
            .vizier
            .query_region(query, Some(GCVS_CATALOG), OUT_COLUMNS, None)
            .await?;
        Ok(tables
            .into_iter()
            .find(|t| !t.is_empty())
            .map(|t| t.to_rows())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_url_uses_plus_encoding() {
        let config = BackendConfig::default();
        let gcvs = GcvsQuery::new(&config);
        assert_eq!(
            gcvs.object_url(&RecordId::Text("RR Lyr".to_string())),
            "http://www.sai.msu.su/gcvs/cgi-bin/search.cgi?search=RR+Lyr"
        );
    }

    #[tokio::test]
    async fn test_find_against_vizier_votable() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/viz-bin/votable")
            .match_query(mockito::Matcher::UrlEncoded(
                "-source".to_string(),
                GCVS_CATALOG.to_string(),
            ))
            .with_status(200)
            .with_body(
                r#"<VOTABLE><RESOURCE><TABLE name="B/gcvs/gcvs_cat">
                <FIELD name="GCVS" datatype="char"/>
                <FIELD name="RAJ2000" datatype="char"/>
                <FIELD name="DEJ2000" datatype="char"/>
                <FIELD name="VarType" datatype="char"/>
                <FIELD name="Period" datatype="double"/>
                <FIELD name="SpType" datatype="char"/>
                <DATA><TABLEDATA>
                  <TR><TD>RR Lyr</TD><TD>19 25 28</TD><TD>+42 47 04</TD><TD>RRAB</TD><TD>0.56686776</TD><TD>A5.0-F7.0</TD></TR>
                </TABLEDATA></DATA>
            </TABLE></RESOURCE></VOTABLE>"#,
            )
            .create_async()
            .await;

        let mut config = BackendConfig::default();
        config.vizier_base_url = server.url();
        let gcvs = GcvsQuery::new(&config);

        let query = ConeSearch::new(291.366, 42.784, 60.0).unwrap();
        let records = gcvs.find(&query).await.unwrap();
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.id, RecordId::Text("RR Lyr".to_string()));
        // RA column is hour angle: 19h25m28s is ~291.37 deg
        assert!((record.ra_deg - 291.366_67).abs() < 1e-3);
        assert!(record.separation_arcsec < query.radius_arcsec);
        assert_eq!(record.extra["Period"], serde_json::json!(0.56686776));
        assert_eq!(record.extra["VarType"], serde_json::json!("RRAB"));
        assert_eq!(record.link, r#"<a href="http://www.sai.msu.su/gcvs/cgi-bin/search.cgi?search=RR+Lyr">RR Lyr</a>"#);
    }
}
