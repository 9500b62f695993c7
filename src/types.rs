use serde::{Deserialize, Deserializer, Serialize};

/// A rectangular piece or stock panel.
///
/// Two tiles are the same *piece* when their ids match; they belong to the
/// same dimension class when [`TileDimensions::dimensions`] match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct TileDimensions {
    pub id: u32,
    pub width: u32,
    pub height: u32,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub rotated: bool,
}

impl TileDimensions {
    pub fn new(id: u32, width: u32, height: u32) -> Self {
        Self {
            id,
            width,
            height,
            rotated: false,
        }
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn max_dimension(&self) -> u32 {
        self.width.max(self.height)
    }

    pub fn is_square(&self) -> bool {
        self.width == self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn rotate90(&self) -> Self {
        Self {
            id: self.id,
            width: self.height,
            height: self.width,
            rotated: !self.rotated,
        }
    }

    pub fn fits_in(&self, width: u32, height: u32) -> bool {
        self.width <= width && self.height <= height
    }
}

impl std::fmt::Display for TileDimensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// A piece tagged with the ordering group it was assigned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupedTileDimensions {
    pub tile: TileDimensions,
    pub group: u8,
}

impl GroupedTileDimensions {
    pub fn new(tile: TileDimensions, group: u8) -> Self {
        Self { tile, group }
    }

    /// Key shared by every piece of the same dimension class and group.
    pub fn class_key(&self) -> (u32, u32, u8) {
        (self.tile.width, self.tile.height, self.group)
    }
}

/// A combination of stock panels considered together as the material
/// budget of one search attempt.
///
/// Equality ignores order and ids: two solutions are equal when they hold
/// the same multiset of panel dimensions.
#[derive(Debug, Clone, Default)]
pub struct StockSolution {
    tiles: Vec<TileDimensions>,
}

impl StockSolution {
    pub fn new(tiles: Vec<TileDimensions>) -> Self {
        Self { tiles }
    }

    pub fn tiles(&self) -> &[TileDimensions] {
        &self.tiles
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn area(&self) -> u64 {
        self.tiles.iter().map(TileDimensions::area).sum()
    }

    fn canonical(&self) -> Vec<(u32, u32)> {
        let mut dims: Vec<(u32, u32)> = self.tiles.iter().map(TileDimensions::dimensions).collect();
        dims.sort_unstable();
        dims
    }
}

impl PartialEq for StockSolution {
    fn eq(&self, other: &Self) -> bool {
        self.tiles.len() == other.tiles.len() && self.canonical() == other.canonical()
    }
}

impl Eq for StockSolution {}

impl std::hash::Hash for StockSolution {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.canonical().hash(state);
    }
}

impl std::fmt::Display for StockSolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[")?;
        for (i, tile) in self.tiles.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{tile}")?;
        }
        write!(f, "]")
    }
}

/// A line of a request: a piece or stock panel with its quantity.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PanelSpec {
    #[serde(default)]
    pub id: u32,
    #[serde(deserialize_with = "deserialize_u32_from_number")]
    pub width: u32,
    #[serde(deserialize_with = "deserialize_u32_from_number")]
    pub height: u32,
    #[serde(
        default = "default_quantity",
        alias = "count",
        deserialize_with = "deserialize_u32_from_number"
    )]
    pub quantity: u32,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_quantity() -> u32 {
    1
}

fn default_true() -> bool {
    true
}

impl PanelSpec {
    pub fn new(id: u32, width: u32, height: u32, quantity: u32) -> Self {
        Self {
            id,
            width,
            height,
            quantity,
            enabled: true,
        }
    }
}

/// Expands request lines into one tile per unit of quantity, dropping
/// disabled and zero-sized lines.
pub fn expand_specs(specs: &[PanelSpec]) -> Vec<TileDimensions> {
    specs
        .iter()
        .filter(|s| s.enabled && s.width > 0 && s.height > 0)
        .flat_map(|s| (0..s.quantity).map(move |_| TileDimensions::new(s.id, s.width, s.height)))
        .collect()
}

/// Accepts JSON numbers such as `600` or `600.0`, rejecting fractional or
/// negative values.
pub fn deserialize_u32_from_number<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    let value = f64::deserialize(deserializer)?;
    if value < 0.0 || value.fract() != 0.0 || value > u32::MAX as f64 {
        return Err(D::Error::custom(format!(
            "expected a non-negative whole number, got {value}"
        )));
    }
    Ok(value as u32)
}
