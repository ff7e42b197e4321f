//! Fragment persistence and file helpers.
//!
//! A saved fragment is its buildings layer as a GeoJSON FeatureCollection at
//! the given path plus a `<stem>.meta.json` sidecar holding the metadata.
//! Streets, tessellation and blocks are not persisted.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{Error, Result};
use crate::fragment::{Fragment, FragmentMetadata};
use crate::vector::FeatureSet;

/// Sidecar metadata path for a saved fragment
pub fn metadata_path(path: &Path) -> PathBuf {
    path.with_extension("meta.json")
}

/// Save a fragment's buildings and metadata.
///
/// Parent directories are created as needed. Returns the buildings path.
pub fn save_fragment<P: AsRef<Path>>(fragment: &Fragment, path: P) -> Result<PathBuf> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    write_feature_set(&fragment.buildings, path)?;

    let meta_file = File::create(metadata_path(path))?;
    let mut writer = BufWriter::new(meta_file);
    serde_json::to_writer_pretty(&mut writer, &fragment.metadata)?;
    writer.flush()?;

    info!(
        "Saved fragment to {} ({} buildings)",
        path.display(),
        fragment.buildings.len()
    );
    Ok(path.to_path_buf())
}

/// Load a fragment saved with [`save_fragment`].
///
/// Fails with [`Error::NotFound`] when `path` does not exist. A missing
/// sidecar yields default metadata.
pub fn load_fragment<P: AsRef<Path>>(path: P) -> Result<Fragment> {
    let path = path.as_ref();
    let buildings = read_feature_set(path)?;

    let meta_path = metadata_path(path);
    let metadata: FragmentMetadata = if meta_path.exists() {
        serde_json::from_reader(BufReader::new(File::open(&meta_path)?))?
    } else {
        FragmentMetadata::default()
    };

    info!("Loaded fragment from {} ({} buildings)", path.display(), buildings.len());
    Ok(Fragment {
        metadata,
        buildings,
        ..Fragment::default()
    })
}

/// Read a GeoJSON file into a feature set
pub fn read_feature_set<P: AsRef<Path>>(path: P) -> Result<FeatureSet> {
    let text = read_existing(path.as_ref())?;
    FeatureSet::from_geojson_str(&text)
}

/// Write a feature set as a GeoJSON FeatureCollection
pub fn write_feature_set<P: AsRef<Path>>(set: &FeatureSet, path: P) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path.as_ref())?);
    writer.write_all(set.to_geojson_string().as_bytes())?;
    writer.flush()?;
    Ok(())
}

/// Read a FragmentPackage JSON document
pub fn read_fragment_json<P: AsRef<Path>>(path: P) -> Result<Fragment> {
    let text = read_existing(path.as_ref())?;
    Ok(serde_json::from_str(&text)?)
}

/// Write a FragmentPackage JSON document
pub fn write_fragment_json<P: AsRef<Path>>(fragment: &Fragment, path: P) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path.as_ref())?);
    serde_json::to_writer(&mut writer, fragment)?;
    writer.flush()?;
    Ok(())
}

fn read_existing(path: &Path) -> Result<String> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(text),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(Error::NotFound(path.to_path_buf()))
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::{BBox, Feature};
    use geo::polygon;

    fn sample_fragment() -> Fragment {
        let mut buildings = FeatureSet::geographic();
        buildings.push(
            Feature::new(polygon![
                (x: 2.160, y: 41.390), (x: 2.161, y: 41.390),
                (x: 2.161, y: 41.391), (x: 2.160, y: 41.391), (x: 2.160, y: 41.390)
            ])
            .with_property("height_m", 12.5),
        );
        let mut fragment = Fragment::from_buildings(buildings);
        fragment.metadata.id = "eixample-01".to_string();
        fragment.metadata.city = "Barcelona".to_string();
        fragment
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("fragment.geojson");
        let fragment = sample_fragment();

        let saved = save_fragment(&fragment, &path).unwrap();
        assert_eq!(saved, path);
        assert!(dir.path().join("nested").join("fragment.meta.json").exists());

        let loaded = load_fragment(&path).unwrap();
        assert_eq!(loaded.buildings, fragment.buildings);
        assert_eq!(loaded.metadata.id, "eixample-01");
        assert_eq!(loaded.metadata.bbox, BBox::new(2.160, 41.390, 2.161, 41.391));
        assert!(loaded.streets.is_empty());
    }

    #[test]
    fn test_load_missing_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_fragment(dir.path().join("absent.geojson")).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn test_load_without_sidecar_uses_default_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bare.geojson");
        write_feature_set(&sample_fragment().buildings, &path).unwrap();

        let loaded = load_fragment(&path).unwrap();
        assert_eq!(loaded.buildings.len(), 1);
        assert_eq!(loaded.metadata, FragmentMetadata::default());
    }

    #[test]
    fn test_fragment_json_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("package.json");
        let fragment = sample_fragment();

        write_fragment_json(&fragment, &path).unwrap();
        let back = read_fragment_json(&path).unwrap();
        assert_eq!(back, fragment);
    }
}
