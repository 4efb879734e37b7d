//! Reading, validating and writing boundary files.

pub mod geojson;
pub mod gpkg;
pub mod parquet;
pub mod path;
pub mod shapefile;
pub mod text;
pub mod vector;
pub mod wkb;
pub mod wkt;

pub use self::path::{
    require_exists, require_shapefile, scan_directory, validate_base_name, validate_shapefile,
    ShapefileReport, TextFormat, VectorFormat,
};
pub use self::text::{read_text, write_text, TextReadOptions};
pub use self::vector::{assign_default_crs, read_vector, reproject, write_vector, ReadOptions};
pub use self::wkt::{from_wkt, geometry_to_wkt_column, to_wkt, wkt_column_to_geometry};
