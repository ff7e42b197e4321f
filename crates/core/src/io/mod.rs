//! I/O for feature sets and fragments

mod interchange;
mod store;

pub use interchange::{feature_set_from_geojson, feature_set_to_geojson};
pub use store::{
    load_fragment, metadata_path, read_feature_set, read_fragment_json, save_fragment,
    write_feature_set, write_fragment_json,
};
