///! ZTF image-product locations
///!
///! Science images are archived under `/sci/{year}/{monthday}/{fraction}/`
///! where `fraction` is the fractional day of the exposure to six digits.
///! [`DateWithFrac`] derives those path components from an MJD;
///! [`ProductsIndex`] scrapes the archive's directory listing to snap a
///! fraction to an exposure that actually exists.

use anyhow::{Context, Result, bail};
use chrono::{Datelike, Duration, NaiveDate};
use regex::Regex;

use crate::cache::QueryCache;
use crate::config::BackendConfig;

/// MJD 0 is 1858-11-17 00:00 UTC.
const MJD_EPOCH: (i32, u32, u32) = (1858, 11, 17);

/// Calendar date plus fractional day, the unit the image archive is laid
/// out in.
#[derive(Debug, Clone, PartialEq)]
pub struct DateWithFrac {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub fraction: f64,
}

impl DateWithFrac {
    pub fn from_mjd(mjd: f64) -> Option<Self> {
        if !mjd.is_finite() || mjd < 0.0 {
            return None;
        }
        let epoch = NaiveDate::from_ymd_opt(MJD_EPOCH.0, MJD_EPOCH.1, MJD_EPOCH.2)?;
        let date = epoch.checked_add_signed(Duration::days(mjd.floor() as i64))?;
        Some(Self {
            year: date.year(),
            month: date.month(),
            day: date.day(),
            fraction: mjd.fract(),
        })
    }

    pub fn monthday(&self) -> String {
        format!("{:02}{:02}", self.month, self.day)
    }

    /// Fraction rounded to `digits` decimal places, as an integer code.
    pub fn frac_digits(&self, digits: u32) -> u64 {
        (self.fraction * 10f64.powi(digits as i32)).round() as u64
    }

    pub fn products_root(&self) -> String {
        format!("/products/sci/{}/{}/", self.year, self.monthday())
    }

    pub fn products_path(&self) -> String {
        format!("{}{:06}/", self.products_root(), self.frac_digits(6))
    }

    /// Path of the science image containing a given readout channel.
    pub fn sciimg_path(&self, fieldid: u32, filter: &str, rcid: u32) -> String {
        let ccdid = rcid / 4 + 1;
        let qid = rcid % 4 + 1;
        format!(
            "{}ztf_{}{}{:06}_{:06}_{}_c{:02}_o_q{}_sciimg.fits",
            self.products_path(),
            self.year,
            self.monthday(),
            self.frac_digits(6),
            fieldid,
            filter,
            ccdid,
            qid,
        )
    }
}

/// Scraped directory listings of the image archive, one per night.
pub struct ProductsIndex {
    client: reqwest::Client,
    base_url: String,
    fraction_re: Regex,
    cache: QueryCache<String, Option<Vec<u64>>>,
}

impl ProductsIndex {
    pub fn new(config: &BackendConfig) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(config.request_timeout())
                .build()
                .expect("Failed to build reqwest client"),
            base_url: config.products_base_url.trim_end_matches('/').to_string(),
            fraction_re: Regex::new(r#"<a href="(\d{6})/">"#).expect("valid listing pattern"),
            cache: QueryCache::new(config.cache_ttl()),
        }
    }

    /// Fraction codes available for a night, sorted ascending. Memoized per
    /// listing; `None` when the archive cannot be reached.
    pub async fn fracs(&self, products_root: &str) -> Option<Vec<u64>> {
        self.cache
            .get_or_fetch(products_root.to_string(), || async move {
                match self.fetch_fracs(products_root).await {
                    Ok(fracs) => Some(fracs),
                    Err(e) => {
                        tracing::warn!("Products listing failed for {}: {:#}", products_root, e);
                        None
                    }
                }
            })
            .await
    }

    async fn fetch_fracs(&self, products_root: &str) -> Result<Vec<u64>> {
        let url = format!("{}{}", self.base_url, products_root);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("Failed to reach the products archive")?;
        if !response.status().is_success() {
            bail!("Products archive returned HTTP {}", response.status());
        }
        let body = response
            .text()
            .await
            .context("Failed to read products listing")?;

        let mut fracs: Vec<u64> = self
            .fraction_re
            .captures_iter(&body)
            .filter_map(|c| c.get(1)?.as_str().parse().ok())
            .collect();
        fracs.sort_unstable();
        Ok(fracs)
    }

    /// Snap `date`'s fraction to the exposure directory that precedes it in
    /// the night's listing. With no preceding entry the listing wraps to its
    /// last entry, mirroring the archive's own behavior for exposures right
    /// after midnight. `false` when the listing is unavailable or empty.
    pub async fn correct_date(&self, date: &mut DateWithFrac) -> bool {
        let Some(fracs) = self.fracs(&date.products_root()).await else {
            return false;
        };
        if fracs.is_empty() {
            return false;
        }
        let target = date.frac_digits(6);
        let i = fracs.partition_point(|f| *f < target);
        let index = if i == 0 { fracs.len() - 1 } else { i - 1 };
        date.fraction = fracs[index] as f64 / 1e6;
        true
    }
}
