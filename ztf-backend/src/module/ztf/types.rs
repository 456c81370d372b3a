use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Position block of an object's metadata.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ZtfCoord {
    pub ra: f64,
    pub dec: f64,
}

/// Object metadata as served by the `meta` section. Fields the backend acts
/// on are typed; everything else is carried through untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZtfMeta {
    pub coord: ZtfCoord,
    #[serde(default)]
    pub filter: Option<String>,
    #[serde(default)]
    pub fieldid: Option<u32>,
    #[serde(default)]
    pub rcid: Option<u32>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One photometric observation of the `lc` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZtfObs {
    pub mjd: f64,
    pub mag: f64,
    pub magerr: f64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A full object: metadata plus light curve, and — for cone-search results —
/// the separation from the query point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZtfObject {
    pub meta: ZtfMeta,
    #[serde(default)]
    pub lc: Vec<ZtfObs>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub separation: Option<f64>,
}
