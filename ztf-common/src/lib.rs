///! Shared types for the ZTF viewer backend
///!
///! Leaf crate holding the pieces every other member needs: equatorial
///! coordinates with angular-separation math, the cone-search query type,
///! and the JSON-friendly table value model used by the catalog layer.

pub mod coord;
pub mod value;

pub use coord::{
    AngleUnit, ConeSearch, ConeSearchKey, CoordError, EqCoord, SeparationFrom, parse_angle,
};
pub use value::CellValue;
