mod fingerprint;
mod tiled;

pub use fingerprint::fingerprint_source;
pub use tiled::{
    load_tiled_map, parse_tiled_map, parse_tiled_source, LoadedMap, MapErrorCode, MapLoadError,
    SourceLocation, TiledMap, TiledObject, TiledObjectLayer, TiledTileLayer,
};
