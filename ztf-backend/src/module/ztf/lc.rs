///! Plottable light-curve series
///!
///! Assembles per-OID observation lists ready for the presentation layer:
///! every observation is stamped with its object's metadata, an MJD column
///! offset for readable axes, and a size/role marker distinguishing the
///! primary object from overlays. Phase folding adds a folded-time and phase
///! column for a given period.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use super::api_client::ZtfApi;
use crate::cache::QueryCache;
use crate::config::BackendConfig;

/// Offset subtracted from MJD for the plot axis.
pub const MJD_OFFSET: f64 = 58000.0;

/// One plottable observation.
#[derive(Debug, Clone, Serialize)]
pub struct PlotObs {
    pub oid: u64,
    pub cur_oid: u64,
    pub mjd: f64,
    pub mag: f64,
    pub magerr: f64,
    /// `mjd - 58000`, the axis the viewer labels "MJD − 58000".
    pub mjd_58000: f64,
    pub filter: Option<String>,
    pub fieldid: Option<u32>,
    pub rcid: Option<u32>,
    /// Primary object gets the larger marker.
    pub mark_size: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub folded_time: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct PlotKey {
    cur_oid: u64,
    other_oids: Vec<u64>,
    min_mjd_bits: Option<u64>,
    max_mjd_bits: Option<u64>,
    version: String,
}

/// Plot-data service over the ZTF API, memoized per query shape.
pub struct LightCurveData {
    api: std::sync::Arc<ZtfApi>,
    cache: QueryCache<PlotKey, Option<BTreeMap<u64, Vec<PlotObs>>>>,
}

impl LightCurveData {
    pub fn new(api: std::sync::Arc<ZtfApi>, config: &BackendConfig) -> Self {
        Self {
            api,
            cache: QueryCache::new(config.cache_ttl()),
        }
    }

    /// Observation series for the primary object and any overlays, keyed by
    /// OID. `None` when the primary object cannot be fetched; overlays that
    /// fail are dropped silently.
    pub async fn plot_data(
        &self,
        cur_oid: u64,
        other_oids: &BTreeSet<u64>,
        min_mjd: Option<f64>,
        max_mjd: Option<f64>,
        version: &str,
    ) -> Option<BTreeMap<u64, Vec<PlotObs>>> {
        let key = PlotKey {
            cur_oid,
            other_oids: other_oids.iter().copied().collect(),
            min_mjd_bits: min_mjd.map(f64::to_bits),
            max_mjd_bits: max_mjd.map(f64::to_bits),
            version: version.to_string(),
        };
        self.cache
            .get_or_fetch(key, || async move {
                self.assemble(cur_oid, other_oids, min_mjd, max_mjd, version)
                    .await
            })
            .await
    }

    async fn assemble(
        &self,
        cur_oid: u64,
        other_oids: &BTreeSet<u64>,
        min_mjd: Option<f64>,
        max_mjd: Option<f64>,
        version: &str,
    ) -> Option<BTreeMap<u64, Vec<PlotObs>>> {
        let mut series = BTreeMap::new();

        let mut oids = vec![cur_oid];
        oids.extend(other_oids.iter().copied().filter(|oid| *oid != cur_oid));

        for oid in oids {
            let Some(object) = self.api.find_oid(oid, version).await else {
                if oid == cur_oid {
                    return None;
                }
                tracing::warn!("Dropping overlay {}: not found", oid);
                continue;
            };
            let mark_size = if oid == cur_oid { 3 } else { 1 };
            let observations = object
                .lc
                .iter()
                .filter(|obs| min_mjd.is_none_or(|min| obs.mjd >= min))
                .filter(|obs| max_mjd.is_none_or(|max| obs.mjd <= max))
                .map(|obs| PlotObs {
                    oid,
                    cur_oid,
                    mjd: obs.mjd,
                    mag: obs.mag,
                    magerr: obs.magerr,
                    mjd_58000: obs.mjd - MJD_OFFSET,
                    filter: object.meta.filter.clone(),
                    fieldid: object.meta.fieldid,
                    rcid: object.meta.rcid,
                    mark_size,
                    folded_time: None,
                    phase: None,
                })
                .collect();
            series.insert(oid, observations);
        }
        Some(series)
    }

    /// Like [`plot_data`](Self::plot_data) with folding applied.
    pub async fn folded_plot_data(
        &self,
        cur_oid: u64,
        other_oids: &BTreeSet<u64>,
        period: f64,
        offset: Option<f64>,
        min_mjd: Option<f64>,
        max_mjd: Option<f64>,
        version: &str,
    ) -> Option<BTreeMap<u64, Vec<PlotObs>>> {
        let mut series = self
            .plot_data(cur_oid, other_oids, min_mjd, max_mjd, version)
            .await?;
        for observations in series.values_mut() {
            fold_observations(observations, period, offset);
        }
        Some(series)
    }
}

/// Fold observations over `period` days. The fold origin defaults to
/// MJD 58000 so that phases are stable across objects.
pub fn fold_observations(observations: &mut [PlotObs], period: f64, offset: Option<f64>) {
    let offset = offset.unwrap_or(MJD_OFFSET);
    for obs in observations {
        let folded = (obs.mjd - offset).rem_euclid(period);
        obs.folded_time = Some(folded);
        obs.phase = Some(folded / period);
    }
}
