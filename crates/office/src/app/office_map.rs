use std::fmt::Write as _;
use std::path::Path;

use engine::{
    load_tiled_map, parse_tiled_source, LoadedMap, MapLoadError, Tilemap, TiledMap, TiledObject,
    Vec2,
};
use thiserror::Error;
use tracing::{info, warn};

const GROUND_LAYER: &str = "Ground";
const CHAIR_LAYER: &str = "Chair";
const COMPUTER_LAYER: &str = "Computer";
const WHITEBOARD_LAYER: &str = "Whiteboard";
const VENDING_MACHINE_LAYER: &str = "VendingMachine";
const CHAIR_DIRECTION_PROPERTY: &str = "direction";
const COMPUTER_DEPTH_FACTOR: f32 = 0.27;

/// Decoration layers and whether the player collides with them.
const PROP_LAYERS: [(&str, bool); 6] = [
    ("Wall", false),
    ("Objects", false),
    ("ObjectsOnCollide", true),
    ("GenericObjects", false),
    ("GenericObjectsOnCollide", true),
    ("Basement", true),
];

#[derive(Debug, Error)]
pub(crate) enum OfficeMapError {
    #[error(transparent)]
    Load(#[from] MapLoadError),
    #[error("map has no 'Ground' tile layer")]
    MissingGroundLayer,
    #[error("chair object {object_id} has invalid direction {value:?}; expected up, down, left or right")]
    InvalidChairDirection { object_id: u32, value: Option<String> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum Facing {
    Up,
    #[default]
    Down,
    Left,
    Right,
}

impl Facing {
    pub(crate) fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "up" => Some(Facing::Up),
            "down" => Some(Facing::Down),
            "left" => Some(Facing::Left),
            "right" => Some(Facing::Right),
            _ => None,
        }
    }

    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Facing::Up => "up",
            Facing::Down => "down",
            Facing::Left => "left",
            Facing::Right => "right",
        }
    }

    /// Unit step in world space (y grows downward).
    pub(crate) fn unit(self) -> Vec2 {
        match self {
            Facing::Up => Vec2::new(0.0, -1.0),
            Facing::Down => Vec2::new(0.0, 1.0),
            Facing::Left => Vec2::new(-1.0, 0.0),
            Facing::Right => Vec2::new(1.0, 0.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ItemKind {
    Chair { direction: Facing },
    Computer,
    Whiteboard,
    VendingMachine,
}

impl ItemKind {
    pub(crate) fn texture_key(self) -> &'static str {
        match self {
            ItemKind::Chair { .. } => "chair",
            ItemKind::Computer => "computer",
            ItemKind::Whiteboard => "whiteboard",
            ItemKind::VendingMachine => "vendingmachine",
        }
    }

    pub(crate) fn blocks_player(self) -> bool {
        matches!(self, ItemKind::VendingMachine)
    }
}

/// Axis-aligned box given by its center.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Bounds {
    pub center: Vec2,
    pub size: Vec2,
}

impl Bounds {
    pub(crate) fn new(center: Vec2, size: Vec2) -> Self {
        Self { center, size }
    }

    pub(crate) fn overlaps(&self, other: &Bounds) -> bool {
        (self.center.x - other.center.x).abs() * 2.0 < self.size.x + other.size.x
            && (self.center.y - other.center.y).abs() * 2.0 < self.size.y + other.size.y
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct MapItem {
    pub kind: ItemKind,
    /// Index within its own layer.
    pub index: usize,
    pub bounds: Bounds,
    pub depth: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PropPlacement {
    pub bounds: Bounds,
    pub collidable: bool,
}

#[derive(Debug, Clone)]
pub(crate) struct OfficeMap {
    pub ground: Tilemap,
    pub items: Vec<MapItem>,
    pub props: Vec<PropPlacement>,
    pub fingerprint: String,
}

impl OfficeMap {
    pub(crate) fn from_loaded(loaded: LoadedMap) -> Result<Self, OfficeMapError> {
        let LoadedMap { map, fingerprint } = loaded;
        let ground = map
            .tilemap(GROUND_LAYER)
            .ok_or(OfficeMapError::MissingGroundLayer)?;

        let mut items = Vec::new();
        for (index, object) in layer_objects(&map, CHAIR_LAYER).iter().enumerate() {
            let direction = object
                .property(CHAIR_DIRECTION_PROPERTY)
                .and_then(Facing::parse)
                .ok_or_else(|| OfficeMapError::InvalidChairDirection {
                    object_id: object.id,
                    value: object.property(CHAIR_DIRECTION_PROPERTY).map(str::to_string),
                })?;
            items.push(item_from_object(ItemKind::Chair { direction }, index, object));
        }
        for (layer, kind) in [
            (COMPUTER_LAYER, ItemKind::Computer),
            (WHITEBOARD_LAYER, ItemKind::Whiteboard),
            (VENDING_MACHINE_LAYER, ItemKind::VendingMachine),
        ] {
            for (index, object) in layer_objects(&map, layer).iter().enumerate() {
                items.push(item_from_object(kind, index, object));
            }
        }

        let props = PROP_LAYERS
            .iter()
            .flat_map(|&(layer, collidable)| {
                layer_objects(&map, layer)
                    .iter()
                    .map(move |object| PropPlacement {
                        bounds: object_bounds(object),
                        collidable,
                    })
            })
            .collect();

        Ok(Self {
            ground,
            items,
            props,
            fingerprint,
        })
    }

    pub(crate) fn width_px(&self) -> f32 {
        self.ground.width_in_pixels()
    }

    pub(crate) fn height_px(&self) -> f32 {
        self.ground.height_in_pixels()
    }

    /// Whether a body with `bounds` would run into a wall tile, a collidable
    /// prop or a blocking item, or leave the map.
    pub(crate) fn blocks(&self, bounds: &Bounds) -> bool {
        let half = Vec2::new(bounds.size.x * 0.5, bounds.size.y * 0.5);
        let corners = [
            Vec2::new(bounds.center.x - half.x, bounds.center.y - half.y),
            Vec2::new(bounds.center.x + half.x, bounds.center.y - half.y),
            Vec2::new(bounds.center.x - half.x, bounds.center.y + half.y),
            Vec2::new(bounds.center.x + half.x, bounds.center.y + half.y),
        ];
        if corners
            .iter()
            .any(|corner| self.ground.is_blocked_at_world(*corner))
        {
            return true;
        }
        self.props
            .iter()
            .filter(|prop| prop.collidable)
            .any(|prop| prop.bounds.overlaps(bounds))
            || self
                .items
                .iter()
                .filter(|item| item.kind.blocks_player())
                .any(|item| item.bounds.overlaps(bounds))
    }
}

/// Loads the map at `path`, or the built-in layout when no file exists there.
pub(crate) fn load_office_map(path: &Path) -> Result<OfficeMap, OfficeMapError> {
    let loaded = if path.is_file() {
        let loaded = load_tiled_map(path)?;
        info!(path = %path.display(), fingerprint = %loaded.fingerprint, "map_loaded");
        loaded
    } else {
        warn!(path = %path.display(), "map_file_missing_using_builtin");
        builtin_map()?
    };
    OfficeMap::from_loaded(loaded)
}

pub(crate) fn builtin_map() -> Result<LoadedMap, MapLoadError> {
    parse_tiled_source(Path::new("<builtin>"), &builtin_office_tmx())
}

fn layer_objects<'a>(map: &'a TiledMap, layer: &str) -> &'a [TiledObject] {
    map.object_layer(layer)
        .map(|layer| layer.objects.as_slice())
        .unwrap_or_default()
}

fn object_bounds(object: &TiledObject) -> Bounds {
    Bounds::new(object.center(), Vec2::new(object.width, object.height))
}

fn item_from_object(kind: ItemKind, index: usize, object: &TiledObject) -> MapItem {
    let bounds = object_bounds(object);
    let depth = match kind {
        ItemKind::Computer => bounds.center.y + object.height * COMPUTER_DEPTH_FACTOR,
        _ => bounds.center.y,
    };
    MapItem {
        kind,
        index,
        bounds,
        depth,
    }
}

const BUILTIN_WIDTH: u32 = 40;
const BUILTIN_HEIGHT: u32 = 30;
const BUILTIN_TILE: u32 = 32;
const FLOOR_GID: u32 = 1;
const WALL_GID: u32 = 2;

/// A 40x30 office: walled border, one desk row, a whiteboard and a vending machine.
fn builtin_office_tmx() -> String {
    let mut tmx = String::new();
    let _ = writeln!(tmx, r#"<?xml version="1.0" encoding="UTF-8"?>"#);
    let _ = writeln!(
        tmx,
        r#"<map version="1.10" orientation="orthogonal" width="{BUILTIN_WIDTH}" height="{BUILTIN_HEIGHT}" tilewidth="{BUILTIN_TILE}" tileheight="{BUILTIN_TILE}">"#
    );
    let _ = writeln!(
        tmx,
        r#" <tileset firstgid="1" name="FloorAndGround" tilewidth="{BUILTIN_TILE}" tileheight="{BUILTIN_TILE}">"#
    );
    let _ = writeln!(
        tmx,
        r#"  <tile id="{}"><properties><property name="collides" type="bool" value="true"/></properties></tile>"#,
        WALL_GID - 1
    );
    let _ = writeln!(tmx, " </tileset>");

    let _ = writeln!(
        tmx,
        r#" <layer id="1" name="{GROUND_LAYER}" width="{BUILTIN_WIDTH}" height="{BUILTIN_HEIGHT}"><data encoding="csv">"#
    );
    let rows: Vec<String> = (0..BUILTIN_HEIGHT)
        .map(|y| {
            (0..BUILTIN_WIDTH)
                .map(|x| {
                    let border =
                        x == 0 || y == 0 || x == BUILTIN_WIDTH - 1 || y == BUILTIN_HEIGHT - 1;
                    let gid = if border { WALL_GID } else { FLOOR_GID };
                    gid.to_string()
                })
                .collect::<Vec<_>>()
                .join(",")
        })
        .collect();
    let _ = writeln!(tmx, "{}", rows.join(",\n"));
    let _ = writeln!(tmx, "</data></layer>");

    let mut next_id = 1;
    let mut group = |tmx: &mut String, name: &str, objects: &[(f32, f32, f32, f32, Option<&str>)]| {
        let _ = writeln!(tmx, r#" <objectgroup name="{name}">"#);
        for &(x, y, w, h, direction) in objects {
            let _ = write!(
                tmx,
                r#"  <object id="{next_id}" gid="{}" x="{x}" y="{y}" width="{w}" height="{h}""#,
                FLOOR_GID
            );
            next_id += 1;
            match direction {
                Some(direction) => {
                    let _ = writeln!(
                        tmx,
                        r#"><properties><property name="{CHAIR_DIRECTION_PROPERTY}" value="{direction}"/></properties></object>"#
                    );
                }
                None => {
                    let _ = writeln!(tmx, "/>");
                }
            }
        }
        let _ = writeln!(tmx, " </objectgroup>");
    };

    let desk_xs = [224.0, 352.0, 480.0];
    let chairs: Vec<_> = desk_xs
        .iter()
        .map(|&x| (x, 288.0, 32.0, 64.0, Some("up")))
        .collect();
    let computers: Vec<_> = desk_xs
        .iter()
        .map(|&x| (x, 224.0, 32.0, 64.0, None))
        .collect();
    group(&mut tmx, CHAIR_LAYER, &chairs);
    group(&mut tmx, COMPUTER_LAYER, &computers);
    group(
        &mut tmx,
        WHITEBOARD_LAYER,
        &[(800.0, 128.0, 64.0, 64.0, None)],
    );
    group(
        &mut tmx,
        VENDING_MACHINE_LAYER,
        &[(1152.0, 192.0, 48.0, 72.0, None)],
    );
    group(
        &mut tmx,
        "ObjectsOnCollide",
        &[(192.0, 192.0, 352.0, 32.0, None)],
    );

    let _ = writeln!(tmx, "</map>");
    tmx
}
