///! Cross-catalog cone search
///!
///! One adapter per remote catalog, all sharing the same flow: build a
///! provider-specific request, fetch, normalize rows into [`CatalogRecord`]s
///! with a computed separation and a rendered identifier link. Remote
///! failures are collapsed to "nothing found" — one broken catalog must not
///! block the others — while an unknown catalog name or malformed query is a
///! hard error at the boundary.

mod gcvs;
mod ogle;
mod simbad;
mod types;
mod votable;
mod vizier;
mod vsx;
mod ztf_periodic;

pub use gcvs::GcvsQuery;
pub use ogle::OgleQuery;
pub use simbad::SimbadQuery;
pub use types::{CatalogDescriptor, CatalogRecord, ColumnSpec, RawRow, RecordId};
pub use votable::{VoField, VoTable, parse_votable};
pub use vizier::{CatalogDetails, FindVizier, VizierClient, VizierTable};
pub use vsx::VsxQuery;
pub use ztf_periodic::ZtfPeriodicQuery;

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::cache::QueryCache;
use crate::config::BackendConfig;
use ztf_common::{CellValue, ConeSearch, ConeSearchKey, CoordError, EqCoord, parse_angle};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CatalogError {
    #[error("unknown catalog {0:?}")]
    UnknownCatalog(String),
    #[error(transparent)]
    Coord(#[from] CoordError),
}

/// A remote catalog that answers cone searches.
///
/// `find` is the public entry point; implementations supply the transport in
/// [`query_region`](ConeSearchCatalog::query_region) and the identifier URL
/// rule, and inherit the shared normalization flow.
#[async_trait]
pub trait ConeSearchCatalog: Send + Sync {
    fn descriptor(&self) -> &CatalogDescriptor;

    /// Catalog page URL for an object, with the identifier percent-encoded.
    fn object_url(&self, id: &RecordId) -> String;

    /// Markup rendered into the result table for an identifier. Most
    /// catalogs link with a plain anchor; OGLE overrides this with a POST
    /// form.
    fn object_link(&self, id: &RecordId, name: &str) -> String {
        format!(r#"<a href="{}">{}</a>"#, self.object_url(id), name)
    }

    /// Issue the provider-specific request and return raw rows. An empty
    /// vector means the catalog had nothing in the cone; an error means the
    /// remote misbehaved (both surface as `None` from [`find`]).
    async fn query_region(&self, query: &ConeSearch) -> Result<Vec<RawRow>>;

    /// Cone search, normalized. Returns `None` for "nothing found" — which
    /// deliberately covers empty results, transport failures, and malformed
    /// payloads alike.
    async fn find(&self, query: &ConeSearch) -> Option<Vec<CatalogRecord>> {
        let name = self.descriptor().name;
        tracing::info!(
            "Querying {} ra={}, dec={}, r={}",
            name,
            query.coord.ra,
            query.coord.dec,
            query.radius_arcsec
        );

        let rows = match self.query_region(query).await {
            Ok(rows) => rows,
            Err(e) => {
                tracing::warn!("{} cone search failed: {:#}", name, e);
                return None;
            }
        };
        if rows.is_empty() {
            return None;
        }

        let mut records = Vec::with_capacity(rows.len());
        for row in &rows {
            match build_record(self, query, row) {
                Ok(record) => records.push(record),
                Err(e) => {
                    tracing::warn!("{} returned a malformed row: {:#}", name, e);
                    return None;
                }
            }
        }
        Some(records)
    }
}

fn build_record<C: ConeSearchCatalog + ?Sized>(
    catalog: &C,
    query: &ConeSearch,
    row: &RawRow,
) -> Result<CatalogRecord> {
    let d = catalog.descriptor();

    let id_cell = row
        .get(d.id_column)
        .with_context(|| format!("missing id column {:?}", d.id_column))?;
    let id = RecordId::from_cell(id_cell)
        .with_context(|| format!("empty identifier in column {:?}", d.id_column))?;

    let ra = angle_from_cell(row, d.ra_column, d.ra_unit)?;
    let dec = angle_from_cell(row, d.dec_column, ztf_common::AngleUnit::Degrees)?;
    let coord = EqCoord::new(ra, dec)?;

    let link = catalog.object_link(&id, &id.to_string());

    let mut extra = std::collections::BTreeMap::new();
    for column in d.columns {
        if column.raw == "link" || column.raw == "separation" {
            continue;
        }
        let value = row.get(column.raw).unwrap_or(&CellValue::Null);
        extra.insert(column.raw.to_string(), value.to_json());
    }

    Ok(CatalogRecord {
        id,
        ra_deg: coord.ra,
        dec_deg: coord.dec,
        separation_arcsec: query.coord.separation_arcsec(&coord),
        link,
        extra,
    })
}

fn angle_from_cell(row: &RawRow, column: &str, unit: ztf_common::AngleUnit) -> Result<f64> {
    let cell = row
        .get(column)
        .with_context(|| format!("missing coordinate column {:?}", column))?;
    match cell {
        CellValue::Float(v) => Ok(match unit {
            ztf_common::AngleUnit::Degrees => *v,
            ztf_common::AngleUnit::Hours => *v * 15.0,
        }),
        CellValue::Int(v) => Ok(match unit {
            ztf_common::AngleUnit::Degrees => *v as f64,
            ztf_common::AngleUnit::Hours => *v as f64 * 15.0,
        }),
        CellValue::Text(s) => Ok(parse_angle(s, unit)?),
        CellValue::Bytes(b) => {
            let s = std::str::from_utf8(b).context("coordinate cell is not UTF-8")?;
            Ok(parse_angle(s, unit)?)
        }
        other => anyhow::bail!("coordinate column {:?} holds {:?}", column, other),
    }
}

/// The closed set of catalogs reachable through the by-name dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Catalog {
    Simbad,
    Gcvs,
    Vsx,
    Ogle,
}

impl Catalog {
    pub const ALL: [Catalog; 4] = [Catalog::Simbad, Catalog::Gcvs, Catalog::Vsx, Catalog::Ogle];

    pub fn name(&self) -> &'static str {
        match self {
            Catalog::Simbad => "simbad",
            Catalog::Gcvs => "gcvs",
            Catalog::Vsx => "vsx",
            Catalog::Ogle => "ogle",
        }
    }
}

impl fmt::Display for Catalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Catalog {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "simbad" => Ok(Catalog::Simbad),
            "gcvs" => Ok(Catalog::Gcvs),
            "vsx" => Ok(Catalog::Vsx),
            "ogle" => Ok(Catalog::Ogle),
            _ => Err(CatalogError::UnknownCatalog(s.to_string())),
        }
    }
}

/// All catalog adapters, constructed once at startup and read-only after.
/// Remote-client construction is the expensive part (field lists, HTTP
/// clients), so consumers share one registry instead of building adapters
/// ad hoc. Cone-search results are memoized here, keyed by catalog and the
/// rounded query.
pub struct CatalogRegistry {
    simbad: SimbadQuery,
    gcvs: GcvsQuery,
    vsx: VsxQuery,
    ogle: OgleQuery,
    ztf_periodic: ZtfPeriodicQuery,
    cache: QueryCache<(Catalog, ConeSearchKey), Option<Vec<CatalogRecord>>>,
}

impl CatalogRegistry {
    pub fn new(config: &BackendConfig) -> Self {
        Self {
            simbad: SimbadQuery::new(config),
            gcvs: GcvsQuery::new(config),
            vsx: VsxQuery::new(config),
            ogle: OgleQuery::new(config),
            ztf_periodic: ZtfPeriodicQuery::new(config),
            cache: QueryCache::new(config.cache_ttl()),
        }
    }

    pub fn get(&self, catalog: Catalog) -> &dyn ConeSearchCatalog {
        match catalog {
            Catalog::Simbad => &self.simbad,
            Catalog::Gcvs => &self.gcvs,
            Catalog::Vsx => &self.vsx,
            Catalog::Ogle => &self.ogle,
        }
    }

    /// Resolve a catalog by user-supplied name. The one place an invalid
    /// input is a hard error rather than an empty result.
    pub fn by_name(&self, name: &str) -> Result<&dyn ConeSearchCatalog, CatalogError> {
        Ok(self.get(name.parse()?))
    }

    /// The ZTF periodic-variable catalog is queried alongside the named
    /// catalogs but is not part of the by-name dispatch set.
    pub fn ztf_periodic(&self) -> &ZtfPeriodicQuery {
        &self.ztf_periodic
    }

    /// Memoized cone search against one catalog.
    pub async fn find(&self, catalog: Catalog, query: &ConeSearch) -> Option<Vec<CatalogRecord>> {
        let key = (catalog, query.cache_key());
        self.cache
            .get_or_fetch(key, || async move { self.get(catalog).find(query).await })
            .await
    }
}
