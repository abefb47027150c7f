//! Page domain model.
//!
//! # Responsibility
//! - Define one drawable surface: background, content images and ink data.
//! - Resolve the effective background layer for renderers.
//!
//! # Invariants
//! - `drawing_data` is opaque and round-trips byte-for-byte.
//! - `background_image` is only meaningful for `BackgroundType::CustomImage`,
//!   but is never validated against the type; readers must tolerate both
//!   mismatches (see [`Page::background_layer`]).
//! - `BackgroundType` is closed: unknown tags fail decoding.

use crate::model::geometry::{Point, Size};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type PageId = Uuid;
pub type PageImageId = Uuid;

/// Closed set of page background styles.
///
/// Declaration order is the UI enumeration order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BackgroundType {
    #[default]
    Blank,
    Lined,
    Grid,
    CustomImage,
}

impl BackgroundType {
    /// All variants in UI enumeration order.
    pub const ALL: [BackgroundType; 4] = [
        BackgroundType::Blank,
        BackgroundType::Lined,
        BackgroundType::Grid,
        BackgroundType::CustomImage,
    ];

    /// Stable tag used both on the wire and as the UI identifier.
    pub fn tag(self) -> &'static str {
        match self {
            Self::Blank => "blank",
            Self::Lined => "lined",
            Self::Grid => "grid",
            Self::CustomImage => "customImage",
        }
    }

    /// Human-readable label for pickers.
    pub fn label(self) -> &'static str {
        match self {
            Self::Blank => "Blank",
            Self::Lined => "Lined",
            Self::Grid => "Grid",
            Self::CustomImage => "Custom Image",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.tag() == tag)
    }
}

/// Effective background to draw, after tolerating model mismatches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackgroundLayer {
    Blank,
    Lined,
    Grid,
    /// Custom image resolved through the image file cache.
    Image(String),
}

/// Content image placed above the background and below ink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageImage {
    pub id: PageImageId,
    /// File name inside the content image directory.
    pub image_name: String,
    /// Center of the image in page coordinates.
    pub position: Point,
    pub size: Size,
}

impl PageImage {
    pub fn new(image_name: impl Into<String>, position: Point, size: Size) -> Self {
        Self {
            id: Uuid::new_v4(),
            image_name: image_name.into(),
            position,
            size,
        }
    }

    pub fn move_to(&mut self, position: Point) {
        self.position = position;
    }

    pub fn resize(&mut self, size: Size) {
        self.size = size;
    }
}

/// One drawable page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub id: PageId,
    #[serde(default)]
    pub background_type: BackgroundType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_image: Option<String>,
    #[serde(default)]
    pub images: Vec<PageImage>,
    /// Serialized ink strokes owned by the stylus collaborator.
    #[serde(default, with = "base64_blob", skip_serializing_if = "Option::is_none")]
    pub drawing_data: Option<Vec<u8>>,
}

impl Default for Page {
    fn default() -> Self {
        Self::new(BackgroundType::Blank)
    }
}

impl Page {
    pub fn new(background_type: BackgroundType) -> Self {
        Self {
            id: Uuid::new_v4(),
            background_type,
            background_image: None,
            images: Vec::new(),
            drawing_data: None,
        }
    }

    /// Resolves what should actually be drawn behind the content.
    ///
    /// `CustomImage` without a file name falls back to blank; a file name
    /// under any other type is ignored.
    pub fn background_layer(&self) -> BackgroundLayer {
        match self.background_type {
            BackgroundType::Blank => BackgroundLayer::Blank,
            BackgroundType::Lined => BackgroundLayer::Lined,
            BackgroundType::Grid => BackgroundLayer::Grid,
            BackgroundType::CustomImage => match self.background_image.as_deref() {
                Some(name) if !name.trim().is_empty() => BackgroundLayer::Image(name.to_string()),
                _ => BackgroundLayer::Blank,
            },
        }
    }

    pub fn image(&self, id: PageImageId) -> Option<&PageImage> {
        self.images.iter().find(|image| image.id == id)
    }

    pub fn image_mut(&mut self, id: PageImageId) -> Option<&mut PageImage> {
        self.images.iter_mut().find(|image| image.id == id)
    }

    /// Removes one content image by id and returns it.
    pub fn remove_image(&mut self, id: PageImageId) -> Option<PageImage> {
        let index = self.images.iter().position(|image| image.id == id)?;
        Some(self.images.remove(index))
    }

    /// File names this page depends on (background first, then content).
    pub fn referenced_image_names(&self) -> Vec<String> {
        let mut names = Vec::with_capacity(self.images.len() + 1);
        if let BackgroundLayer::Image(name) = self.background_layer() {
            names.push(name);
        }
        names.extend(self.images.iter().map(|image| image.image_name.clone()));
        names
    }
}

mod base64_blob {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(bytes) => serializer.serialize_some(&STANDARD.encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<String>::deserialize(deserializer)?
            .map(|encoded| {
                STANDARD
                    .decode(encoded.as_bytes())
                    .map_err(serde::de::Error::custom)
            })
            .transpose()
    }
}
