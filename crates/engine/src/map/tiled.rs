use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use roxmltree::{Document, Node};

use crate::app::{Tilemap, Vec2};

use super::fingerprint::fingerprint_source;

/// Tiled stores flip flags in the top bits of every gid.
const GID_FLIP_MASK: u32 = 0x1fff_ffff;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapErrorCode {
    ReadFile,
    XmlMalformed,
    InvalidRoot,
    MissingAttribute,
    InvalidValue,
    UnsupportedFeature,
    LayerSizeMismatch,
}

#[derive(Debug, Clone)]
pub struct MapLoadError {
    pub code: MapErrorCode,
    pub message: String,
    pub file_path: PathBuf,
    pub location: Option<SourceLocation>,
}

impl fmt::Display for MapLoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.location {
            Some(loc) => write!(
                f,
                "{:?}: {} (file={}, line={}, column={})",
                self.code,
                self.message,
                self.file_path.display(),
                loc.line,
                loc.column
            ),
            None => write!(
                f,
                "{:?}: {} (file={})",
                self.code,
                self.message,
                self.file_path.display()
            ),
        }
    }
}

impl std::error::Error for MapLoadError {}

#[derive(Debug, Clone, PartialEq)]
pub struct TiledObject {
    pub id: u32,
    pub gid: Option<u32>,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub properties: BTreeMap<String, String>,
}

impl TiledObject {
    /// Tile objects are anchored bottom-left, shapes top-left.
    pub fn center(&self) -> Vec2 {
        let half_h = self.height * 0.5;
        let y = if self.gid.is_some() {
            self.y - half_h
        } else {
            self.y + half_h
        };
        Vec2::new(self.x + self.width * 0.5, y)
    }

    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties.get(name).map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TiledObjectLayer {
    pub name: String,
    pub objects: Vec<TiledObject>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TiledTileLayer {
    pub name: String,
    pub tiles: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TiledMap {
    pub width: u32,
    pub height: u32,
    pub tile_width: u32,
    pub tile_height: u32,
    pub tile_layers: Vec<TiledTileLayer>,
    pub object_layers: Vec<TiledObjectLayer>,
    pub colliding_gids: BTreeSet<u32>,
}

impl TiledMap {
    pub fn width_in_pixels(&self) -> f32 {
        (self.width * self.tile_width) as f32
    }

    pub fn height_in_pixels(&self) -> f32 {
        (self.height * self.tile_height) as f32
    }

    pub fn object_layer(&self, name: &str) -> Option<&TiledObjectLayer> {
        self.object_layers.iter().find(|layer| layer.name == name)
    }

    /// Builds the runtime tilemap for a tile layer, carrying the collision set.
    pub fn tilemap(&self, layer_name: &str) -> Option<Tilemap> {
        let layer = self.tile_layers.iter().find(|layer| layer.name == layer_name)?;
        Tilemap::new(
            self.width,
            self.height,
            self.tile_width,
            self.tile_height,
            layer.tiles.clone(),
        )
        .ok()
        .map(|tilemap| tilemap.with_colliding_gids(self.colliding_gids.iter().copied()))
    }
}

#[derive(Debug, Clone)]
pub struct LoadedMap {
    pub map: TiledMap,
    pub fingerprint: String,
}

pub fn load_tiled_map(path: &Path) -> Result<LoadedMap, MapLoadError> {
    let raw = fs::read_to_string(path).map_err(|source| MapLoadError {
        code: MapErrorCode::ReadFile,
        message: format!("failed to read map file: {source}"),
        file_path: path.to_path_buf(),
        location: None,
    })?;
    parse_tiled_source(path, &raw)
}

pub fn parse_tiled_source(file_path: &Path, raw: &str) -> Result<LoadedMap, MapLoadError> {
    Ok(LoadedMap {
        map: parse_tiled_map(file_path, raw)?,
        fingerprint: fingerprint_source(raw.as_bytes()),
    })
}

pub fn parse_tiled_map(file_path: &Path, raw: &str) -> Result<TiledMap, MapLoadError> {
    let doc = Document::parse(raw).map_err(|error| MapLoadError {
        code: MapErrorCode::XmlMalformed,
        message: format!("malformed XML: {error}"),
        file_path: file_path.to_path_buf(),
        location: Some(SourceLocation {
            line: error.pos().row as usize,
            column: error.pos().col as usize,
        }),
    })?;
    let ctx = ParseContext {
        file_path,
        doc: &doc,
    };

    let root = doc.root_element();
    if root.tag_name().name() != "map" {
        return Err(ctx.error_at(
            MapErrorCode::InvalidRoot,
            "root element must be <map>".to_string(),
            root,
        ));
    }
    if let Some(orientation) = root.attribute("orientation") {
        if orientation != "orthogonal" {
            return Err(ctx.error_at(
                MapErrorCode::UnsupportedFeature,
                format!("orientation '{orientation}' is not supported; expected orthogonal"),
                root,
            ));
        }
    }

    let width = ctx.required_u32(root, "width")?;
    let height = ctx.required_u32(root, "height")?;
    let tile_width = ctx.required_u32(root, "tilewidth")?;
    let tile_height = ctx.required_u32(root, "tileheight")?;
    if tile_width == 0 || tile_height == 0 {
        return Err(ctx.error_at(
            MapErrorCode::InvalidValue,
            "tilewidth and tileheight must be non-zero".to_string(),
            root,
        ));
    }

    let mut map = TiledMap {
        width,
        height,
        tile_width,
        tile_height,
        tile_layers: Vec::new(),
        object_layers: Vec::new(),
        colliding_gids: BTreeSet::new(),
    };

    for child in root.children().filter(|node| node.is_element()) {
        match child.tag_name().name() {
            "tileset" => ctx.parse_tileset(child, &mut map.colliding_gids)?,
            "layer" => {
                let layer = ctx.parse_tile_layer(child, width, height)?;
                map.tile_layers.push(layer);
            }
            "objectgroup" => map.object_layers.push(ctx.parse_object_layer(child)?),
            // Editor-only or unused by the runtime.
            "properties" | "editorsettings" | "imagelayer" | "group" => {}
            other => {
                return Err(ctx.error_at(
                    MapErrorCode::UnsupportedFeature,
                    format!("unsupported map element <{other}>"),
                    child,
                ))
            }
        }
    }

    Ok(map)
}

struct ParseContext<'a, 'input> {
    file_path: &'a Path,
    doc: &'a Document<'input>,
}

impl ParseContext<'_, '_> {
    fn error_at(&self, code: MapErrorCode, message: String, node: Node<'_, '_>) -> MapLoadError {
        let pos = self.doc.text_pos_at(node.range().start);
        MapLoadError {
            code,
            message,
            file_path: self.file_path.to_path_buf(),
            location: Some(SourceLocation {
                line: pos.row as usize,
                column: pos.col as usize,
            }),
        }
    }

    fn required_attr<'n>(&self, node: Node<'n, '_>, name: &str) -> Result<&'n str, MapLoadError> {
        node.attribute(name).ok_or_else(|| {
            self.error_at(
                MapErrorCode::MissingAttribute,
                format!(
                    "missing required attribute '{name}' on <{}>",
                    node.tag_name().name()
                ),
                node,
            )
        })
    }

    fn required_u32(&self, node: Node<'_, '_>, name: &str) -> Result<u32, MapLoadError> {
        let raw = self.required_attr(node, name)?;
        raw.trim().parse::<u32>().map_err(|_| {
            self.error_at(
                MapErrorCode::InvalidValue,
                format!("attribute '{name}'='{raw}' is not a non-negative integer"),
                node,
            )
        })
    }

    fn optional_f32(&self, node: Node<'_, '_>, name: &str) -> Result<f32, MapLoadError> {
        let Some(raw) = node.attribute(name) else {
            return Ok(0.0);
        };
        match raw.trim().parse::<f32>() {
            Ok(value) if value.is_finite() => Ok(value),
            _ => Err(self.error_at(
                MapErrorCode::InvalidValue,
                format!("attribute '{name}'='{raw}' is not a finite number"),
                node,
            )),
        }
    }

    fn parse_tileset(
        &self,
        node: Node<'_, '_>,
        colliding_gids: &mut BTreeSet<u32>,
    ) -> Result<(), MapLoadError> {
        if node.attribute("source").is_some() {
            return Err(self.error_at(
                MapErrorCode::UnsupportedFeature,
                "external tilesets are not supported; embed the tileset in the map".to_string(),
                node,
            ));
        }
        let first_gid = self.required_u32(node, "firstgid")?;
        for tile in node.children().filter(|child| child.has_tag_name("tile")) {
            let local_id = self.required_u32(tile, "id")?;
            let properties = self.parse_properties(tile);
            if properties.get("collides").map(String::as_str) == Some("true") {
                colliding_gids.insert(first_gid.saturating_add(local_id));
            }
        }
        Ok(())
    }

    fn parse_tile_layer(
        &self,
        node: Node<'_, '_>,
        width: u32,
        height: u32,
    ) -> Result<TiledTileLayer, MapLoadError> {
        let name = self.required_attr(node, "name")?.to_string();
        let Some(data) = node.children().find(|child| child.has_tag_name("data")) else {
            return Err(self.error_at(
                MapErrorCode::MissingAttribute,
                format!("tile layer '{name}' has no <data>"),
                node,
            ));
        };
        if data.attribute("encoding") != Some("csv") {
            return Err(self.error_at(
                MapErrorCode::UnsupportedFeature,
                format!("tile layer '{name}' must use CSV encoding"),
                data,
            ));
        }

        let mut tiles = Vec::with_capacity(width as usize * height as usize);
        for raw in data.text().unwrap_or_default().split(',') {
            let raw = raw.trim();
            if raw.is_empty() {
                continue;
            }
            let gid = raw.parse::<u32>().map_err(|_| {
                self.error_at(
                    MapErrorCode::InvalidValue,
                    format!("tile layer '{name}' has invalid gid '{raw}'"),
                    data,
                )
            })?;
            tiles.push(gid & GID_FLIP_MASK);
        }

        let expected = width as usize * height as usize;
        if tiles.len() != expected {
            return Err(self.error_at(
                MapErrorCode::LayerSizeMismatch,
                format!(
                    "tile layer '{name}' has {} tiles; map size needs {expected}",
                    tiles.len()
                ),
                data,
            ));
        }
        Ok(TiledTileLayer { name, tiles })
    }

    fn parse_object_layer(&self, node: Node<'_, '_>) -> Result<TiledObjectLayer, MapLoadError> {
        let name = self.required_attr(node, "name")?.to_string();
        let mut objects = Vec::new();
        for object in node.children().filter(|child| child.has_tag_name("object")) {
            let gid = match object.attribute("gid") {
                Some(_) => Some(self.required_u32(object, "gid")? & GID_FLIP_MASK),
                None => None,
            };
            objects.push(TiledObject {
                id: self.required_u32(object, "id")?,
                gid,
                x: self.optional_f32(object, "x")?,
                y: self.optional_f32(object, "y")?,
                width: self.optional_f32(object, "width")?,
                height: self.optional_f32(object, "height")?,
                properties: self.parse_properties(object),
            });
        }
        Ok(TiledObjectLayer { name, objects })
    }

    fn parse_properties(&self, node: Node<'_, '_>) -> BTreeMap<String, String> {
        node.children()
            .filter(|child| child.has_tag_name("properties"))
            .flat_map(|properties| properties.children())
            .filter(|property| property.has_tag_name("property"))
            .filter_map(|property| {
                let name = property.attribute("name")?;
                let value = property
                    .attribute("value")
                    .or_else(|| property.text())
                    .unwrap_or_default();
                Some((name.to_string(), value.to_string()))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write as _;

    use tempfile::NamedTempFile;

    use super::*;

    const SMALL_MAP: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<map version="1.10" orientation="orthogonal" width="3" height="2" tilewidth="32" tileheight="32">
 <tileset firstgid="1" name="FloorAndGround" tilewidth="32" tileheight="32">
  <tile id="1"><properties><property name="collides" type="bool" value="true"/></properties></tile>
 </tileset>
 <layer id="1" name="Ground" width="3" height="2">
  <data encoding="csv">
1,2,1,
1,1,2147483650
</data>
 </layer>
 <objectgroup id="2" name="Chair">
  <object id="7" gid="40" x="32" y="64" width="32" height="64">
   <properties><property name="direction" value="down"/></properties>
  </object>
 </objectgroup>
 <objectgroup id="3" name="Zones">
  <object id="8" x="10" y="10" width="20" height="40"/>
 </objectgroup>
</map>"#;

    fn parse(raw: &str) -> Result<TiledMap, MapLoadError> {
        parse_tiled_map(Path::new("office.tmx"), raw)
    }

    #[test]
    fn parses_layers_collision_and_objects() {
        let map = parse(SMALL_MAP).expect("map");
        assert_eq!((map.width, map.height), (3, 2));
        assert_eq!(map.width_in_pixels(), 96.0);
        assert_eq!(map.colliding_gids, BTreeSet::from([2]));

        let tilemap = map.tilemap("Ground").expect("ground");
        assert_eq!(tilemap.tile_at(1, 0), Some(2));
        assert_eq!(tilemap.tile_at(2, 1), Some(2));
        assert!(tilemap.is_blocked_at_world(Vec2::new(40.0, 10.0)));
        assert!(!tilemap.is_blocked_at_world(Vec2::new(10.0, 10.0)));

        let chair = &map.object_layer("Chair").expect("chair layer").objects[0];
        assert_eq!(chair.property("direction"), Some("down"));
        assert_eq!(chair.center(), Vec2::new(48.0, 32.0));

        let zone = &map.object_layer("Zones").expect("zones").objects[0];
        assert_eq!(zone.center(), Vec2::new(20.0, 30.0));
    }

    #[test]
    fn malformed_xml_reports_location() {
        let err = parse("<map><layer></map>").expect_err("err");
        assert_eq!(err.code, MapErrorCode::XmlMalformed);
        assert!(err.location.is_some());
    }

    #[test]
    fn wrong_root_is_rejected() {
        let err = parse("<tileset/>").expect_err("err");
        assert_eq!(err.code, MapErrorCode::InvalidRoot);
    }

    #[test]
    fn short_layer_reports_size_mismatch_with_line() {
        let raw = r#"<map width="2" height="2" tilewidth="16" tileheight="16">
<layer name="Ground"><data encoding="csv">1,1,1</data></layer>
</map>"#;
        let err = parse(raw).expect_err("err");
        assert_eq!(err.code, MapErrorCode::LayerSizeMismatch);
        assert_eq!(err.location.map(|loc| loc.line), Some(2));
        assert!(err.to_string().contains("line=2"));
    }

    #[test]
    fn base64_layers_and_external_tilesets_are_unsupported() {
        let base64 = r#"<map width="1" height="1" tilewidth="16" tileheight="16">
<layer name="Ground"><data encoding="base64">AQAAAA==</data></layer></map>"#;
        assert_eq!(
            parse(base64).expect_err("err").code,
            MapErrorCode::UnsupportedFeature
        );

        let external = r#"<map width="1" height="1" tilewidth="16" tileheight="16">
<tileset firstgid="1" source="floor.tsx"/></map>"#;
        assert_eq!(
            parse(external).expect_err("err").code,
            MapErrorCode::UnsupportedFeature
        );
    }

    #[test]
    fn missing_size_attribute_is_reported() {
        let err = parse(r#"<map height="1" tilewidth="16" tileheight="16"/>"#).expect_err("err");
        assert_eq!(err.code, MapErrorCode::MissingAttribute);
        assert!(err.message.contains("'width'"));
    }

    #[test]
    fn load_from_disk_fingerprints_source() {
        let mut file = NamedTempFile::new().expect("temp");
        file.write_all(SMALL_MAP.as_bytes()).expect("write");

        let loaded = load_tiled_map(file.path()).expect("load");
        assert_eq!(loaded.fingerprint, fingerprint_source(SMALL_MAP.as_bytes()));
        assert_eq!(loaded.map.object_layers.len(), 2);
    }

    #[test]
    fn missing_file_is_read_error() {
        let err = load_tiled_map(Path::new("/definitely/missing/office.tmx")).expect_err("err");
        assert_eq!(err.code, MapErrorCode::ReadFile);
        assert!(err.location.is_none());
    }
}
