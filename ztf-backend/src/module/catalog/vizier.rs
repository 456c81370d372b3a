///! VizieR cone-search client, generic catalog lookup, CDS dataset details

use anyhow::{Context, Result, bail};
use serde_json::Value;

use super::votable::{VoTable, parse_votable};
use crate::cache::QueryCache;
use crate::config::BackendConfig;
use ztf_common::{ConeSearch, ConeSearchKey};

/// Thin client for the VizieR VOTable endpoint, shared by the GCVS and VSX
/// adapters and by [`FindVizier`].
pub struct VizierClient {
    client: reqwest::Client,
    base_url: String,
}

impl VizierClient {
    pub fn new(config: &BackendConfig) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(config.request_timeout())
                .build()
                .expect("Failed to build reqwest client"),
            base_url: config.vizier_base_url.trim_end_matches('/').to_string(),
        }
    }

    fn votable_url(&self) -> String {
        format!("{}/viz-bin/votable", self.base_url)
    }

    /// Cone search, optionally restricted to one `-source` catalog and an
    /// explicit output column list.
    pub async fn query_region(
        &self,
        query: &ConeSearch,
        source: Option<&str>,
        columns: &[&str],
        row_limit: Option<usize>,
    ) -> Result<Vec<VoTable>> {
        let mut params: Vec<(&str, String)> = vec![
            (
                "-c",
                format!("{} {:+}", query.coord.ra, query.coord.dec),
            ),
            ("-c.u", "arcsec".to_string()),
            ("-c.r", query.radius_arcsec.to_string()),
            ("-c.geom", "r".to_string()),
        ];
        if let Some(source) = source {
            params.push(("-source", source.to_string()));
        }
        for column in columns {
            params.push(("-out", column.to_string()));
        }
        if let Some(limit) = row_limit {
            params.push(("-out.max", limit.to_string()));
        }

        let response = self
            .client
            .get(self.votable_url())
            .query(&params)
            .send()
            .await
            .context("Failed to reach VizieR")?;
        if !response.status().is_success() {
            bail!("VizieR returned HTTP {}", response.status());
        }
        let body = response
            .text()
            .await
            .context("Failed to read VizieR response body")?;
        parse_votable(&body)
    }
}

/// One table of a generic VizieR search, tagged with its catalog id.
#[derive(Debug, Clone)]
pub struct VizierTable {
    pub catalog: String,
    pub table: VoTable,
}

/// Generic "what does VizieR know around this position" search across all
/// catalogs, limited to a few rows per catalog.
pub struct FindVizier {
    client: VizierClient,
    cache: QueryCache<ConeSearchKey, Option<Vec<VizierTable>>>,
}

impl FindVizier {
    pub const ROW_LIMIT: usize = 10;

    const TABLE_RA: &'static str = "_RAJ2000";
    const TABLE_DEC: &'static str = "_DEJ2000";
    const TABLE_SEP: &'static str = "_r";

    pub fn new(config: &BackendConfig) -> Self {
        Self {
            client: VizierClient::new(config),
            cache: QueryCache::new(config.cache_ttl()),
        }
    }

    /// Memoized all-catalog search. `None` covers both "nothing around this
    /// position" and a VizieR outage.
    pub async fn find(&self, query: &ConeSearch) -> Option<Vec<VizierTable>> {
        self.cache
            .get_or_fetch(query.cache_key(), || async move {
                tracing::info!(
                    "Querying Vizier ra={}, dec={}, r={}",
                    query.coord.ra,
                    query.coord.dec,
                    query.radius_arcsec
                );
                match self
                    .client
                    .query_region(
                        query,
                        None,
                        &[Self::TABLE_RA, Self::TABLE_DEC, Self::TABLE_SEP],
                        Some(Self::ROW_LIMIT),
                    )
                    .await
                {
                    Ok(tables) if tables.is_empty() => None,
                    Ok(tables) => Some(
                        tables
                            .into_iter()
                            .map(|table| VizierTable {
                                catalog: table.name.clone().unwrap_or_default(),
                                table,
                            })
                            .collect(),
                    ),
                    Err(e) => {
                        tracing::warn!("Vizier search failed: {:#}", e);
                        None
                    }
                }
            })
            .await
    }

    /// Human-facing VizieR search page for the same cone.
    pub fn search_url(ra: f64, dec: f64, radius_arcsec: f64) -> String {
        format!(
            "//vizier.u-strasbg.fr/viz-bin/VizieR-4?&-to=2&-from=-1&-this=-1&-out.add=_r&-out.add=_RAJ%2C_DEJ&-sort=_r&-order=I&-oc.form=sexa&-meta.foot=1&-meta=1&-meta.ucd=2&-c={ra}%2C+{dec}&-c.r=++{radius_arcsec}&-c.geom=r&-meta.ucd=2&-usenav=1&-bmark=POST&-out.max=50&-out.form=HTML+Table&-c.eq=J2000&-c.u=arcsec&-4c=Go%21"
        )
    }

    /// Human-facing page for one catalog restricted to the cone.
    pub fn catalog_url(catalog: &str, ra: f64, dec: f64, radius_arcsec: f64) -> String {
        format!(
            "//vizier.u-strasbg.fr/viz-bin/VizieR-3?-source={catalog}&-c={ra},%20{dec}&-c.u=arcsec&-c.r={radius_arcsec}&-c.eq=J2000&-c.geom=r&-out.max=50&-out.form=HTML%20Table&-out.add=_r&-out.add=_RAJ,_DEJ&-sort=_r&-oc.form=sexa"
        )
    }
}

/// CDS MOCServer lookup for catalog descriptions.
pub struct CatalogDetails {
    client: reqwest::Client,
    base_url: String,
    cache: QueryCache<String, Option<String>>,
}

impl CatalogDetails {
    pub fn new(config: &BackendConfig) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(config.request_timeout())
                .build()
                .expect("Failed to build reqwest client"),
            base_url: config.cds_mocserver_url.clone(),
            cache: QueryCache::new(config.cache_ttl()),
        }
    }

    /// Description of a VizieR catalog, or `None` when the lookup fails or
    /// the payload is malformed.
    pub async fn description(&self, catalog_id: &str) -> Option<String> {
        self.cache
            .get_or_fetch(catalog_id.to_string(), || async move {
                match self.query_cds(catalog_id).await {
                    Ok(description) => description,
                    Err(e) => {
                        tracing::error!("CDS dataset lookup failed: {:#}", e);
                        None
                    }
                }
            })
            .await
    }

    async fn query_cds(&self, catalog_id: &str) -> Result<Option<String>> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("expr", format!("ID=*{catalog_id}*")),
                ("get", "record".to_string()),
                ("fmt", "json".to_string()),
            ])
            .send()
            .await
            .context("Failed to reach the CDS MOCServer")?;
        if !response.status().is_success() {
            bail!("CDS MOCServer returned HTTP {}", response.status());
        }
        let records: Vec<Value> = response
            .json()
            .await
            .context("Malformed CDS MOCServer payload")?;
        let Some(first) = records.first() else {
            return Ok(None);
        };
        Ok(first
            .get("obs_description")
            .and_then(Value::as_str)
            .map(str::to_string))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_url_embeds_cone() {
        let url = FindVizier::search_url(83.633, 22.014, 2.5);
        assert!(url.contains("-c=83.633%2C+22.014"));
        assert!(url.contains("-c.r=++2.5"));
        assert!(url.starts_with("//vizier.u-strasbg.fr/viz-bin/VizieR-4?"));
    }

    #[test]
    fn test_catalog_url_embeds_source() {
        let url = FindVizier::catalog_url("B/gcvs/gcvs_cat", 10.0, -5.0, 1.0);
        assert!(url.contains("-source=B/gcvs/gcvs_cat"));
        assert!(url.contains("-c=10,%20-5"));
    }

    #[tokio::test]
    async fn test_find_vizier_parses_tables() {
        let mut server = mockito::Server::new_async().await;
        let body = r#"<VOTABLE><RESOURCE>
            <TABLE name="I/239/hip_main">
              <FIELD name="_RAJ2000" datatype="double"/>
              <FIELD name="_DEJ2000" datatype="double"/>
              <FIELD name="_r" datatype="double"/>
              <DATA><TABLEDATA>
                <TR><TD>10.5</TD><TD>41.2</TD><TD>0.8</TD></TR>
              </TABLEDATA></DATA>
            </TABLE>
        </RESOURCE></VOTABLE>"#;
        let mock = server
            .mock("GET", "/viz-bin/votable")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body(body)
            .create_async()
            .await;

        let mut config = BackendConfig::default();
        config.vizier_base_url = server.url();
        let finder = FindVizier::new(&config);

        let query = ConeSearch::new(10.5, 41.2, 5.0).unwrap();
        let tables = finder.find(&query).await.unwrap();
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].catalog, "I/239/hip_main");
        assert_eq!(tables[0].table.rows.len(), 1);

        // memoized: a second identical call must not hit the server again
        let again = finder.find(&query).await.unwrap();
        assert_eq!(again.len(), 1);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_find_vizier_outage_is_none() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/viz-bin/votable")
            .match_query(mockito::Matcher::Any)
            .with_status(503)
            .create_async()
            .await;

        let mut config = BackendConfig::default();
        config.vizier_base_url = server.url();
        let finder = FindVizier::new(&config);

        let query = ConeSearch::new(1.0, 2.0, 3.0).unwrap();
        assert!(finder.find(&query).await.is_none());
    }

    #[tokio::test]
    async fn test_catalog_details_description() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", mockito::Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"[{"ID": "B/gcvs", "obs_description": "General Catalogue of Variable Stars"}]"#)
            .create_async()
            .await;

        let mut config = BackendConfig::default();
        config.cds_mocserver_url = format!("{}/query", server.url());
        let details = CatalogDetails::new(&config);

        assert_eq!(
            details.description("B/gcvs").await.as_deref(),
            Some("General Catalogue of Variable Stars")
        );
    }

    #[tokio::test]
    async fn test_catalog_details_malformed_payload_is_none() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", mockito::Matcher::Any)
            .with_status(200)
            .with_body("{not json")
            .create_async()
            .await;

        let mut config = BackendConfig::default();
        config.cds_mocserver_url = format!("{}/query", server.url());
        let details = CatalogDetails::new(&config);

        assert!(details.description("B/gcvs").await.is_none());
    }
}
