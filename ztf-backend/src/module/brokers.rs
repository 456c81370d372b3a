///! Cone-search links into external alert brokers
///!
///! Deterministic URL builders (and ready-made anchor tags) pointing the same
///! sky position at ALeRCE, ANTARES, Fink and MARS.

use serde_json::json;

const ARCSEC_PER_DEG: f64 = 3600.0;

fn a_tag(text: &str, url: &str) -> String {
    format!(r#"<a href="{url}">{text}</a>"#)
}

/// Percent-encode with '+' for spaces, the form-style encoding the broker
/// query strings expect.
fn quote_plus(s: &str) -> String {
    urlencoding::encode(s).replace("%20", "+")
}

pub fn alerce_conesearch_url(ra: f64, dec: f64, radius_arcsec: f64) -> String {
    format!("https://alerce.online/?ra={ra}&dec={dec}&radius={radius_arcsec}&page=1")
}

pub fn alerce_tag(ra: f64, dec: f64, radius_arcsec: f64) -> String {
    a_tag("ALeRCE", &alerce_conesearch_url(ra, dec, radius_arcsec))
}

pub fn antares_conesearch_url(ra: f64, dec: f64, radius_arcsec: f64, oid: u64) -> String {
    let radius_deg = radius_arcsec / ARCSEC_PER_DEG;
    let query = json!({
        "filters": [
            {
                "type": "sky_distance",
                "field": {
                    "distance": format!("{radius_deg} degree"),
                    "htm16": {"center": format!("{ra} {dec}")},
                },
                "text": format!("Cone Search for ZTF DR {oid} {radius_arcsec}″"),
            },
        ],
    });
    let query_string = quote_plus(&query.to_string());
    format!("https://antares.noirlab.edu/loci?query={query_string}")
}

pub fn antares_tag(ra: f64, dec: f64, radius_arcsec: f64, oid: u64) -> String {
    a_tag("Antares", &antares_conesearch_url(ra, dec, radius_arcsec, oid))
}

pub fn fink_conesearch_url(ra: f64, dec: f64, radius_arcsec: f64) -> String {
    format!("https://fink-portal.org/?query_type=Conesearch&ra={ra}&dec={dec}&radius={radius_arcsec}")
}

pub fn fink_tag(ra: f64, dec: f64, radius_arcsec: f64) -> String {
    a_tag("Fink", &fink_conesearch_url(ra, dec, radius_arcsec))
}

pub fn mars_conesearch_url(ra: f64, dec: f64, radius_arcsec: f64) -> String {
    let radius_deg = radius_arcsec / ARCSEC_PER_DEG;
    let cone = quote_plus(&format!("{ra},{dec},{radius_deg}"));
    format!("https://mars.lco.global/?cone={cone}")
}

pub fn mars_tag(ra: f64, dec: f64, radius_arcsec: f64) -> String {
    a_tag("MARS", &mars_conesearch_url(ra, dec, radius_arcsec))
}
