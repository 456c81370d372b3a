///! OGLE-III CVS cone search
///!
///! Cone searches go to the snad.space mirror API (TSV body); each returned
///! row is decorated with a light-curve thumbnail fetched from the OGLE image
///! archive, and the identifier link is a POST form against the canonical
///! OGLE query page rather than a plain anchor.

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;

use super::types::{CatalogDescriptor, ColumnSpec, RawRow, RecordId};
use super::ConeSearchCatalog;
use crate::config::BackendConfig;
use ztf_common::{AngleUnit, CellValue, ConeSearch};

const OGLE_POST_URL: &str =
    "http://ogledb.astrouw.edu.pl/~ogle/CVS/query.php?first=1&qtype=catalog";

/// Hidden fields of the OGLE catalog query form; `val_id` is appended per
/// object.
const POST_DATA: &[(&str, &str)] = &[
    ("db_target", "all"),
    ("sort", "id"),
    ("use_id", "on"),
    ("disp_field", "on"),
    ("disp_starid", "on"),
    ("disp_type", "1"),
    ("disp_subtype", "1"),
    ("disp_ra", "on"),
    ("disp_decl", "on"),
    ("disp_i", "on"),
    ("disp_v", "on"),
    ("disp_p1", "on"),
    ("disp_a1", "on"),
    ("disp_id_ogle_ii", "on"),
    ("disp_id_macho", "on"),
    ("disp_id_asas", "on"),
    ("disp_id_gcvs", "on"),
    ("disp_id_other", "on"),
    ("disp_remarks", "on"),
    ("sorting", "ASC"),
    ("hexout", "on"),
    ("pagelen", "50"),
];

static DESCRIPTOR: CatalogDescriptor = CatalogDescriptor {
    name: "OGLE",
    id_column: "ID",
    ra_column: "RA",
    dec_column: "Decl",
    ra_unit: AngleUnit::Hours,
    columns: &[
        ColumnSpec { raw: "link", label: "Designation" },
        ColumnSpec { raw: "separation", label: "Separation, arcsec" },
        ColumnSpec { raw: "light_curve", label: "Light curve" },
        ColumnSpec { raw: "Type", label: "Type" },
        ColumnSpec { raw: "Subtype", label: "Subtype" },
        ColumnSpec { raw: "P_1", label: "Period, days" },
        ColumnSpec { raw: "A_1", label: "I-band amplitude, mag" },
        ColumnSpec { raw: "I", label: "Mean I-magnitude" },
        ColumnSpec { raw: "V", label: "Mean V-magnitude" },
        ColumnSpec { raw: "Remarks", label: "Remarks" },
    ],
};

pub struct OgleQuery {
    api_client: reqwest::Client,
    light_curve_client: reqwest::Client,
    api_url: String,
    light_curve_base_url: String,
}

impl OgleQuery {
    pub fn new(config: &BackendConfig) -> Self {
        let build = || {
            reqwest::Client::builder()
                .timeout(config.request_timeout())
                .build()
                .expect("Failed to build reqwest client")
        };
        Self {
            api_client: build(),
            light_curve_client: build(),
            api_url: config.ogle_api_url.clone(),
            light_curve_base_url: config.ogle_light_curve_base_url.clone(),
        }
    }

    /// Fetch the thumbnail for one object, probing the two archive layouts in
    /// order and embedding the first that answers 200. Both failing is not an
    /// error: the row simply has no thumbnail.
    async fn download_light_curve(&self, id: &str) -> String {
        let split = id.len().saturating_sub(2);
        let suffix = id.get(split..).unwrap_or(id);
        let basepath = format!("{suffix}/{id}");
        for path in [format!("{basepath}.png"), format!("{basepath}_1.png")] {
            let url = format!("{}{}", self.light_curve_base_url, path);
            let response = match self.light_curve_client.get(&url).send().await {
                Ok(r) => r,
                Err(e) => {
                    tracing::debug!("OGLE thumbnail fetch failed for {}: {}", url, e);
                    continue;
                }
            };
            if response.status() != reqwest::StatusCode::OK {
                continue;
            }
            match response.bytes().await {
                Ok(bytes) => {
                    let data = BASE64.encode(&bytes);
                    return format!(
                        r#"<a href="{url}"><img src="data:image/png;base64,{data}" width=200px /></a>"#
                    );
                }
                Err(e) => {
                    tracing::debug!("OGLE thumbnail body read failed for {}: {}", url, e);
                }
            }
        }
        String::new()
    }

    fn parse_tsv(&self, body: &str) -> Result<Vec<RawRow>> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(true)
            .flexible(true)
            .from_reader(body.as_bytes());

        let headers = reader
            .headers()
            .context("OGLE response has no header row")?
            .clone();

        let mut rows = Vec::new();
        for result in reader.records() {
            let record = result.context("Malformed OGLE TSV row")?;
            let row: RawRow = headers
                .iter()
                .zip(record.iter())
                .map(|(name, raw)| (name.to_string(), CellValue::infer(raw)))
                .collect();
            rows.push(row);
        }
        Ok(rows)
    }
}

#[async_trait]
impl ConeSearchCatalog for OgleQuery {
    fn descriptor(&self) -> &CatalogDescriptor {
        &DESCRIPTOR
    }

    fn object_url(&self, _id: &RecordId) -> String {
        // per-object pages are only reachable by POST; the form target is the
        // closest thing to a URL
        OGLE_POST_URL.to_string()
    }

    fn object_link(&self, id: &RecordId, name: &str) -> String {
        let mut fields: Vec<(&str, String)> = POST_DATA
            .iter()
            .map(|(k, v)| (*k, (*v).to_string()))
            .collect();
        fields.push(("val_id", id.to_string()));
        form_markup(OGLE_POST_URL, &fields, name)
    }

    async fn query_region(&self, query: &ConeSearch) -> Result<Vec<RawRow>> {
        let response = self
            .api_client
            .get(&self.api_url)
            .query(&[
                ("ra", query.coord.ra.to_string()),
                ("dec", query.coord.dec.to_string()),
                ("radius_arcsec", query.radius_arcsec.to_string()),
                ("format", "tsv".to_string()),
            ])
            .send()
            .await
            .context("Failed to reach the OGLE circle API")?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            bail!("OGLE circle API returned HTTP {}: {}", status, body);
        }
        let body = response
            .text()
            .await
            .context("Failed to read OGLE response body")?;

        let mut rows = self.parse_tsv(&body)?;
        for row in &mut rows {
            let id = row
                .get(DESCRIPTOR.id_column)
                .map(CellValue::display)
                .unwrap_or_default();
            let markup = self.download_light_curve(&id).await;
            row.insert("light_curve".to_string(), CellValue::Text(markup));
        }
        Ok(rows)
    }
}

/// An HTML form posting the given hidden fields, styled as a link.
fn form_markup(action: &str, fields: &[(&str, String)], label: &str) -> String {
    let mut markup = format!(r#"<form method="post" action="{action}" target="_blank">"#);
    for (name, value) in fields {
        markup.push_str(&format!(
            r#"<input type="hidden" name="{name}" value="{value}">"#
        ));
    }
    markup.push_str(&format!(
        r#"<input type="submit" value="{label}" class="link-button"></form>"#
    ));
    markup
}

#[cfg(test)]
mod tests {
    use super::*;

    const TSV: &str = "ID\tField\tStarID\tType\tSubtype\tRA\tDecl\tI\tV\tP_1\tA_1\tRemarks\n\
OGLE-BLG-ECL-123456\tBLG617\t12345\tECL\tC\t17:34:10.50\t-27:12:43.2\t16.881\t18.2\t2.5204\t0.35\t\n";

    fn adapter(api: &mockito::Server, images: &mockito::Server) -> OgleQuery {
        let mut config = BackendConfig::default();
        config.ogle_api_url = format!("{}/api/v1/circle", api.url());
        config.ogle_light_curve_base_url = format!("{}/images/", images.url());
        OgleQuery::new(&config)
    }

    #[tokio::test]
    async fn test_thumbnail_second_candidate_wins() {
        let api = mockito::Server::new_async().await;
        let mut images = mockito::Server::new_async().await;

        images
            .mock("GET", "/images/56/OGLE-BLG-ECL-123456.png")
            .with_status(404)
            .create_async()
            .await;
        images
            .mock("GET", "/images/56/OGLE-BLG-ECL-123456_1.png")
            .with_status(200)
            .with_body(&b"\x89PNG fake"[..])
            .create_async()
            .await;

        let ogle = adapter(&api, &images);
        let markup = ogle.download_light_curve("OGLE-BLG-ECL-123456").await;
        assert!(markup.contains("OGLE-BLG-ECL-123456_1.png"));
        assert!(markup.contains("data:image/png;base64,"));
        assert!(markup.starts_with("<a href="));
    }

    #[tokio::test]
    async fn test_thumbnail_both_failing_yields_empty_string() {
        let images = mockito::Server::new_async().await;
        let api = mockito::Server::new_async().await;
        // no mocks registered: every probe 501s
        let ogle = adapter(&api, &images);
        assert_eq!(ogle.download_light_curve("OGLE-LMC-CEP-0001").await, "");
    }

    #[tokio::test]
    async fn test_find_parses_tsv_and_attaches_thumbnails() {
        let mut api = mockito::Server::new_async().await;
        let mut images = mockito::Server::new_async().await;

        api.mock("GET", "/api/v1/circle")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body(TSV)
            .create_async()
            .await;
        images
            .mock("GET", "/images/56/OGLE-BLG-ECL-123456.png")
            .with_status(200)
            .with_body(&b"png"[..])
            .create_async()
            .await;

        let ogle = adapter(&api, &images);
        // 17h34m10.5s = 263.54375 deg
        let query = ConeSearch::new(263.5437, -27.2120, 10.0).unwrap();
        let records = ogle.find(&query).await.unwrap();
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(
            record.id,
            RecordId::Text("OGLE-BLG-ECL-123456".to_string())
        );
        assert!((record.ra_deg - 263.54375).abs() < 1e-9);
        assert!((record.dec_deg - -27.212).abs() < 1e-3);
        assert_eq!(record.extra["Type"], serde_json::json!("ECL"));
        assert_eq!(record.extra["P_1"], serde_json::json!(2.5204));
        // thumbnail markup travels with the row
        let lc = record.extra["light_curve"].as_str().unwrap();
        assert!(lc.contains("base64"));
        // link is a POST form, not an anchor
        assert!(record.link.starts_with("<form method=\"post\""));
        assert!(record.link.contains(r#"name="val_id" value="OGLE-BLG-ECL-123456""#));
    }

    #[tokio::test]
    async fn test_api_error_is_no_match() {
        let mut api = mockito::Server::new_async().await;
        let images = mockito::Server::new_async().await;
        api.mock("GET", "/api/v1/circle")
            .match_query(mockito::Matcher::Any)
            .with_status(500)
            .with_body("killed")
            .create_async()
            .await;

        let ogle = adapter(&api, &images);
        let query = ConeSearch::new(1.0, 1.0, 1.0).unwrap();
        assert!(ogle.find(&query).await.is_none());
    }

    #[test]
    fn test_form_markup_shape() {
        let markup = form_markup(
            "http://example.com/query.php",
            &[("use_id", "on".to_string()), ("val_id", "X 1".to_string())],
            "X 1",
        );
        assert!(markup.starts_with(r#"<form method="post" action="http://example.com/query.php""#));
        assert!(markup.contains(r#"<input type="hidden" name="use_id" value="on">"#));
        assert!(markup.ends_with("</form>"));
    }
}
