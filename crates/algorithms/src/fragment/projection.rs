//! Feature-set projection into and out of local tangent-plane frames
//!
//! Geographic feature sets are moved into a metric [`LocalProjection`]
//! before any distance-based work and brought back to WGS84 afterwards.

use collage_core::{Crs, Error, FeatureSet, LocalProjection, Result};
use geo::{Coord, Geometry, MapCoords, Point};
use tracing::debug;

use crate::maybe_rayon::*;

/// Local transverse Mercator frame centered at `center` (lon, lat).
///
/// Scale factor 1, false origin (0, 0), WGS84 ellipsoid.
pub fn derive_projection(center: Point<f64>) -> Result<LocalProjection> {
    LocalProjection::centered_at(center)
}

/// Map every coordinate of a geometry through `f`
pub fn reproject_geometry<F>(geometry: &Geometry<f64>, f: F) -> Geometry<f64>
where
    F: Fn(Coord<f64>) -> Coord<f64> + Copy,
{
    geometry.map_coords(f)
}

/// Map every feature of a set through `f`, tagging the result with `crs`.
///
/// Attributes, ids and order are preserved. Features are processed in
/// parallel.
pub(crate) fn map_feature_set<F>(set: &FeatureSet, crs: Crs, f: F) -> FeatureSet
where
    F: Fn(Coord<f64>) -> Coord<f64> + Copy + Send + Sync,
{
    let features = set
        .features
        .par_iter()
        .map(|feature| match &feature.geometry {
            Some(g) => feature.with_geometry(reproject_geometry(g, f)),
            None => feature.clone(),
        })
        .collect();
    FeatureSet::from_features(crs, features)
}

/// Return `set` in a metric frame.
///
/// Geographic input is projected into `target`, or into a frame derived
/// from the centroid of all its geometry when `target` is `None`.
/// Already projected input is returned unchanged.
///
/// # Errors
/// [`Error::Projection`] when no target is given and the set has no
/// geometry to derive a centroid from.
pub fn ensure_projected(set: &FeatureSet, target: Option<&LocalProjection>) -> Result<FeatureSet> {
    if set.crs.is_projected() {
        return Ok(set.clone());
    }

    let projection = match target {
        Some(p) => *p,
        None => {
            let center = set.centroid().ok_or_else(|| {
                Error::Projection("cannot derive a projection: no geometry to take a centroid of".into())
            })?;
            derive_projection(center)?
        }
    };

    debug!(
        "Projecting {} features into {}",
        set.len(),
        projection.proj_string()
    );
    Ok(map_feature_set(set, Crs::Local(projection), |c| projection.forward(c)))
}

/// Return `set` in WGS84 degrees.
///
/// Geographic input is returned unchanged; local and UTM frames are
/// inverted.
///
/// # Errors
/// [`Error::CrsMismatch`] for a projected frame the core cannot invert.
pub fn to_geographic(set: &FeatureSet) -> Result<FeatureSet> {
    if set.crs.is_geographic() {
        return Ok(set.clone());
    }
    let transform = set.crs.transform()?;
    debug!("Unprojecting {} features from {}", set.len(), set.crs);
    Ok(map_feature_set(set, Crs::Geographic, move |c| {
        transform.to_geographic(c)
    }))
}
