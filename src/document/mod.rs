//! Page and annotation model built once from host markup.
//!
//! Authored values (pixel geometry, font sizes, raw style text) are captured at
//! construction and never overwritten. Normalization and font sync only touch
//! the presentation side: proportional geometry, written font sizes.

pub mod markup;
pub mod state;

use serde::Serialize;

use crate::geometry::{PercentBox, PixelBox, ReferenceSize};
use crate::resolver::Locator;
use crate::style::{self, InlineStyle};

pub use markup::{pages_from_json, AnnotationMarkup, PageMarkup, TextRunMarkup};
pub use state::{
    ResolutionEvent, ResolutionMachine, ResolutionState, ResolutionTransition, StateError,
    StateResult,
};

const GEOMETRY_PROPERTIES: [&str; 4] = ["left", "top", "width", "height"];
const FONT_SIZE: &str = "font-size";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct PageId(String);

impl PageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The image element mounted into a resolved page's container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MountedImage {
    pub src: String,
    pub alt: String,
}

#[derive(Debug)]
pub struct Page {
    id: PageId,
    index: usize,
    reference: Option<ReferenceSize>,
    locator: Option<Locator>,
    fallback_extensions: Vec<String>,
    resolution: ResolutionMachine,
    image: Option<MountedImage>,
    background_cleared: bool,
    normalized: bool,
    annotations: Vec<Annotation>,
}

impl Page {
    /// Reads one page from host markup. `index` is the page's position in the document.
    pub fn from_markup(index: usize, markup: &PageMarkup, fallback_extensions: &[String]) -> Self {
        let id = if markup.id.is_empty() {
            PageId::new(format!("page{index}"))
        } else {
            PageId::new(markup.id.as_str())
        };
        let container = InlineStyle::parse(&markup.container_style);

        let reference =
            ReferenceSize::from_authored(container.px("width"), container.px("height"));
        if reference.is_none() {
            tracing::warn!(
                page = %id,
                width = container.get("width").unwrap_or_default(),
                height = container.get("height").unwrap_or_default(),
                "invalid reference dimensions; overlay alignment will be skipped"
            );
        }

        let locator = container
            .get("background-image")
            .and_then(style::background_image_url)
            .map(|raw| Locator::parse(&style::decode_locator(raw)));

        let annotations = markup.annotations.iter().map(Annotation::from_markup).collect();

        Self {
            id,
            index,
            reference,
            locator,
            fallback_extensions: fallback_extensions.to_vec(),
            resolution: ResolutionMachine::new(),
            image: None,
            background_cleared: false,
            normalized: false,
            annotations,
        }
    }

    pub fn id(&self) -> &PageId {
        &self.id
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// `None` when the authored width/height were missing, non-numeric or not positive.
    pub fn reference(&self) -> Option<ReferenceSize> {
        self.reference
    }

    pub fn locator(&self) -> Option<&Locator> {
        self.locator.as_ref()
    }

    pub fn fallback_extensions(&self) -> &[String] {
        &self.fallback_extensions
    }

    pub fn resolution(&self) -> ResolutionState {
        self.resolution.state()
    }

    pub fn is_resolved(&self) -> bool {
        self.resolution() == ResolutionState::Resolved
    }

    pub fn image(&self) -> Option<&MountedImage> {
        self.image.as_ref()
    }

    pub fn background_cleared(&self) -> bool {
        self.background_cleared
    }

    pub fn is_normalized(&self) -> bool {
        self.normalized
    }

    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    pub(crate) fn annotations_mut(&mut self) -> &mut [Annotation] {
        &mut self.annotations
    }

    pub(crate) fn mark_normalized(&mut self) {
        self.normalized = true;
    }

    /// Clears the container background and mounts `src` as the page image.
    pub fn mount_image(&mut self, src: &str) -> StateResult<ResolutionState> {
        let state = self
            .resolution
            .transition(self.id.as_str(), ResolutionEvent::ImageMounted)?;
        self.background_cleared = true;
        self.image = Some(MountedImage {
            src: src.to_string(),
            alt: format!("Page image {}", self.index + 1),
        });
        Ok(state)
    }

    pub fn mark_failed(&mut self) -> StateResult<ResolutionState> {
        self.resolution
            .transition(self.id.as_str(), ResolutionEvent::CandidatesExhausted)
    }

    pub fn snapshot(&self) -> PageSnapshot {
        PageSnapshot {
            id: self.id.clone(),
            resolution: self.resolution(),
            image: self.image.clone(),
            background_cleared: self.background_cleared,
            annotations: self.annotations.iter().map(Annotation::snapshot).collect(),
        }
    }
}

/// One positioned text region. Holds its authored pixel values alongside
/// whatever presentation the engine has written.
#[derive(Debug, Clone)]
pub struct Annotation {
    authored: InlineStyle,
    original_box: PixelBox,
    original_font_px: Option<f64>,
    reference_font_px: Option<f64>,
    proportional: Option<PercentBox>,
    font_px: Option<f64>,
    runs: Vec<TextRun>,
}

impl Annotation {
    pub fn from_markup(markup: &AnnotationMarkup) -> Self {
        let authored = InlineStyle::parse(&markup.style);
        let original_box = PixelBox {
            left: authored.px("left"),
            top: authored.px("top"),
            width: authored.px("width"),
            height: authored.px("height"),
        };
        let original_font_px = authored.px(FONT_SIZE);

        Self {
            authored,
            original_box,
            original_font_px,
            reference_font_px: None,
            proportional: None,
            font_px: None,
            runs: markup.runs.iter().map(TextRun::from_markup).collect(),
        }
    }

    pub fn original_box(&self) -> PixelBox {
        self.original_box
    }

    pub fn original_font_px(&self) -> Option<f64> {
        self.original_font_px
    }

    pub fn reference_font_px(&self) -> Option<f64> {
        self.reference_font_px
    }

    pub fn proportional(&self) -> Option<PercentBox> {
        self.proportional
    }

    pub fn font_px(&self) -> Option<f64> {
        self.font_px
    }

    pub fn runs(&self) -> &[TextRun] {
        &self.runs
    }

    pub(crate) fn runs_mut(&mut self) -> &mut [TextRun] {
        &mut self.runs
    }

    /// First write wins; later calls leave the stored proportions untouched.
    pub(crate) fn set_proportional(&mut self, proportional: PercentBox) -> bool {
        if self.proportional.is_some() {
            return false;
        }
        self.proportional = Some(proportional);
        true
    }

    /// Captures the reference font size on first use and returns it thereafter.
    pub(crate) fn capture_reference_font(&mut self) -> Option<f64> {
        if self.reference_font_px.is_none() {
            self.reference_font_px = self.original_font_px;
        }
        self.reference_font_px
    }

    pub(crate) fn write_font_px(&mut self, font_px: f64) {
        self.font_px = Some(font_px);
    }

    /// Current values for the properties the engine manages, in CSS syntax.
    ///
    /// Unconverted fields fall back to their authored text.
    pub fn css_declarations(&self) -> Vec<StyleDeclaration> {
        let percents = self.proportional.map(|proportional| {
            [
                proportional.left,
                proportional.top,
                proportional.width,
                proportional.height,
            ]
        });

        let mut declarations: Vec<StyleDeclaration> = GEOMETRY_PROPERTIES
            .into_iter()
            .enumerate()
            .filter_map(|(slot, property)| {
                let converted = percents.and_then(|values| values[slot]);
                match converted {
                    Some(percent) => Some(StyleDeclaration::new(property, format!("{percent}%"))),
                    None => self
                        .authored
                        .get(property)
                        .map(|raw| StyleDeclaration::new(property, raw)),
                }
            })
            .collect();

        if let Some(font) = font_declaration(self.font_px, &self.authored) {
            declarations.push(font);
        }
        declarations
    }

    fn snapshot(&self) -> AnnotationSnapshot {
        AnnotationSnapshot {
            declarations: self.css_declarations(),
            runs: self.runs.iter().map(TextRun::snapshot).collect(),
        }
    }
}

/// Nested text inside an annotation, optionally carrying its own font size.
#[derive(Debug, Clone)]
pub struct TextRun {
    text: String,
    authored: InlineStyle,
    original_font_px: Option<f64>,
    reference_font_px: Option<f64>,
    font_px: Option<f64>,
}

impl TextRun {
    pub fn from_markup(markup: &TextRunMarkup) -> Self {
        let authored = InlineStyle::parse(&markup.style);
        let original_font_px = authored.px(FONT_SIZE);
        Self {
            text: markup.text.clone(),
            authored,
            original_font_px,
            reference_font_px: None,
            font_px: None,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Whether the run authored its own font size; otherwise it inherits.
    pub fn has_own_font_size(&self) -> bool {
        self.authored.get(FONT_SIZE).is_some()
    }

    pub fn original_font_px(&self) -> Option<f64> {
        self.original_font_px
    }

    pub fn reference_font_px(&self) -> Option<f64> {
        self.reference_font_px
    }

    pub fn font_px(&self) -> Option<f64> {
        self.font_px
    }

    pub(crate) fn capture_reference_font(&mut self) -> Option<f64> {
        if self.reference_font_px.is_none() {
            self.reference_font_px = self.original_font_px;
        }
        self.reference_font_px
    }

    pub(crate) fn write_font_px(&mut self, font_px: f64) {
        self.font_px = Some(font_px);
    }

    /// `None` means no inline font size: the run inherits from its annotation.
    pub fn font_declaration(&self) -> Option<StyleDeclaration> {
        font_declaration(self.font_px, &self.authored)
    }

    fn snapshot(&self) -> TextRunSnapshot {
        TextRunSnapshot {
            text: self.text.clone(),
            font_size: self.font_declaration().map(|declaration| declaration.value),
        }
    }
}

fn font_declaration(font_px: Option<f64>, authored: &InlineStyle) -> Option<StyleDeclaration> {
    match font_px {
        Some(px) => Some(StyleDeclaration::new(FONT_SIZE, format_font_px(px))),
        None => authored
            .get(FONT_SIZE)
            .map(|raw| StyleDeclaration::new(FONT_SIZE, raw)),
    }
}

/// Font sizes are written with two decimals.
pub fn format_font_px(px: f64) -> String {
    format!("{px:.2}px")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StyleDeclaration {
    pub property: String,
    pub value: String,
}

impl StyleDeclaration {
    pub fn new(property: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            value: value.into(),
        }
    }
}

impl std::fmt::Display for StyleDeclaration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.property, self.value)
    }
}

/// Serializable view of a page's presentation for hosts.
#[derive(Debug, Clone, Serialize)]
pub struct PageSnapshot {
    pub id: PageId,
    pub resolution: ResolutionState,
    pub image: Option<MountedImage>,
    pub background_cleared: bool,
    pub annotations: Vec<AnnotationSnapshot>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnnotationSnapshot {
    pub declarations: Vec<StyleDeclaration>,
    pub runs: Vec<TextRunSnapshot>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TextRunSnapshot {
    pub text: String,
    pub font_size: Option<String>,
}
