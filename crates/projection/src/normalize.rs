//! Missing-CRS policy applied to every loaded dataset.

use gis_common::{GisError, GisResult, MissingCrsPolicy};
use tracing::warn;
use vector_io::VectorDataset;

/// Give `dataset` a CRS according to `policy`.
///
/// `Assume` only labels the dataset; coordinates are not touched.
pub fn ensure_crs(mut dataset: VectorDataset, policy: &MissingCrsPolicy) -> GisResult<VectorDataset> {
    if dataset.crs.is_some() {
        return Ok(dataset);
    }

    match policy {
        MissingCrsPolicy::Assume(crs) => {
            warn!(
                assumed = %crs,
                features = dataset.len(),
                "Input has no CRS, assuming default"
            );
            dataset.crs = Some(crs.clone());
            Ok(dataset)
        }
        MissingCrsPolicy::Reject => Err(GisError::MissingCrs(
            "input does not declare a coordinate reference system".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::point;
    use gis_common::Crs;
    use vector_io::Feature;

    fn unlabeled() -> VectorDataset {
        VectorDataset::new(
            vec![Feature::from_geometry(point!(x: 5.0, y: 6.0).into())],
            None,
        )
    }

    #[test]
    fn test_assume_labels_without_moving() {
        let out = ensure_crs(unlabeled(), &MissingCrsPolicy::default()).unwrap();
        assert_eq!(out.crs, Some(Crs::wgs84()));
        assert_eq!(out.features[0].geometry, Some(point!(x: 5.0, y: 6.0).into()));
    }

    #[test]
    fn test_reject_policy() {
        let err = ensure_crs(unlabeled(), &MissingCrsPolicy::Reject).unwrap_err();
        assert_eq!(err.code(), "missing_crs");
        assert_eq!(err.http_status_code(), 400);
    }

    #[test]
    fn test_existing_crs_is_kept() {
        let mut dataset = unlabeled();
        dataset.crs = Some(Crs::web_mercator());
        let out = ensure_crs(dataset, &MissingCrsPolicy::Reject).unwrap();
        assert_eq!(out.crs, Some(Crs::web_mercator()));
    }
}
