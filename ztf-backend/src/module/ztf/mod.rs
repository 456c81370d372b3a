///! ZTF light-curve database client
///!
///! Per-object lookup and cone search against the ZTF metadata/light-curve
///! service, plus assembly of plottable (raw and phase-folded) observation
///! series on top of it.

mod api_client;
mod lc;
mod types;

pub use api_client::{CircleFilters, DEFAULT_API_VERSION, ZtfApi};
pub use lc::{LightCurveData, PlotObs, MJD_OFFSET, fold_observations};
pub use types::{ZtfCoord, ZtfMeta, ZtfObs, ZtfObject};
