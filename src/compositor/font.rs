//! Font resolution and glyph outlines
//!
//! [`FontLibrary`] looks families up through fontdb (system fonts plus any
//! configured font files) and reads metrics and outlines with ttf-parser.
//! Resolution falls back to Arial, then the generic sans-serif family, then
//! whatever face the database holds first, the way a browser resolves
//! `"Inter", Arial, sans-serif`.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, RwLock};

use fontdb::{Database, Family, Query, Stretch, Style, Weight};
use tiny_skia::PathBuilder;
use tracing::{debug, warn};
use ttf_parser::{GlyphId, OutlineBuilder};

use super::{CompositorError, Result};

/// Vertical font metrics in pixels (y-up, descent is negative)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VerticalMetrics {
    pub ascent: f32,
    pub descent: f32,
}

impl VerticalMetrics {
    /// Offset from a vertically centered position down to the baseline
    #[must_use]
    pub fn middle_to_baseline(&self) -> f32 {
        (self.ascent + self.descent) / 2.0
    }
}

/// Ink extent of a glyph relative to its baseline (both positive)
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct InkExtent {
    pub above: f32,
    pub below: f32,
}

/// A scalable font
pub trait FontFace: Send + Sync {
    /// Horizontal advance of a single character
    fn advance(&self, ch: char, px: f32) -> f32;

    /// Kerning adjustment between two characters
    fn kerning(&self, left: char, right: char, px: f32) -> f32 {
        let _ = (left, right, px);
        0.0
    }

    fn vertical_metrics(&self, px: f32) -> VerticalMetrics;

    /// Ink extent of a glyph without building its outline
    fn ink_extent(&self, ch: char, px: f32) -> InkExtent;

    /// Glyph outline with the pen at the origin and the baseline at y = 0 (y-down).
    ///
    /// `None` for glyphs without ink, such as spaces.
    fn outline(&self, ch: char, px: f32) -> Option<tiny_skia::Path>;
}

/// Resolves a family + weight to a face
pub trait FontProvider: Send + Sync {
    fn face(&self, family: &str, weight: u16) -> Result<Arc<dyn FontFace>>;
}

/// Collects ttf-parser outline segments into a y-down tiny-skia path
struct PathSink {
    builder: PathBuilder,
    scale: f32,
}

impl OutlineBuilder for PathSink {
    fn move_to(&mut self, x: f32, y: f32) {
        self.builder.move_to(x * self.scale, -y * self.scale);
    }

    fn line_to(&mut self, x: f32, y: f32) {
        self.builder.line_to(x * self.scale, -y * self.scale);
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        let s = self.scale;
        self.builder.quad_to(x1 * s, -y1 * s, x * s, -y * s);
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        let s = self.scale;
        self.builder.cubic_to(x1 * s, -y1 * s, x2 * s, -y2 * s, x * s, -y * s);
    }

    fn close(&mut self) {
        self.builder.close();
    }
}

/// TrueType/OpenType face read with ttf-parser.
///
/// Keeps the font bytes and re-parses the table directory per call, which is
/// a header walk and far cheaper than the outline work that follows.
pub struct TtfFace {
    data: Vec<u8>,
    index: u32,
    units_per_em: f32,
}

impl TtfFace {
    /// Parse a font from raw TTF/OTF data
    pub fn from_bytes(data: Vec<u8>, index: u32) -> Result<Self> {
        let units_per_em = ttf_parser::Face::parse(&data, index)
            .map_err(|e| CompositorError::FontLoad(e.to_string()))?
            .units_per_em();
        Ok(Self {
            data,
            index,
            units_per_em: f32::from(units_per_em.max(1)),
        })
    }

    /// Load a font file from disk
    pub fn from_file(path: &Path) -> Result<Self> {
        let data = std::fs::read(path)
            .map_err(|e| CompositorError::FontLoad(format!("failed to read {}: {e}", path.display())))?;
        Self::from_bytes(data, 0)
    }

    fn parse(&self) -> Option<ttf_parser::Face<'_>> {
        ttf_parser::Face::parse(&self.data, self.index).ok()
    }

    fn scale(&self, px: f32) -> f32 {
        px / self.units_per_em
    }
}

/// Missing characters render as `.notdef`
fn glyph_id(face: &ttf_parser::Face<'_>, ch: char) -> GlyphId {
    face.glyph_index(ch).unwrap_or(GlyphId(0))
}

impl FontFace for TtfFace {
    fn advance(&self, ch: char, px: f32) -> f32 {
        self.parse()
            .and_then(|face| face.glyph_hor_advance(glyph_id(&face, ch)))
            .map_or(0.0, |adv| f32::from(adv) * self.scale(px))
    }

    fn kerning(&self, left: char, right: char, px: f32) -> f32 {
        let Some(face) = self.parse() else {
            return 0.0;
        };
        let Some(kern) = face.tables().kern else {
            return 0.0;
        };
        let (l, r) = (glyph_id(&face, left), glyph_id(&face, right));
        kern.subtables
            .into_iter()
            .filter(|st| st.horizontal && !st.variable)
            .find_map(|st| st.glyphs_kerning(l, r))
            .map_or(0.0, |k| f32::from(k) * self.scale(px))
    }

    fn vertical_metrics(&self, px: f32) -> VerticalMetrics {
        self.parse().map_or(
            VerticalMetrics {
                ascent: px * 0.8,
                descent: -px * 0.2,
            },
            |face| VerticalMetrics {
                ascent: f32::from(face.ascender()) * self.scale(px),
                descent: f32::from(face.descender()) * self.scale(px),
            },
        )
    }

    fn ink_extent(&self, ch: char, px: f32) -> InkExtent {
        let Some(face) = self.parse() else {
            return InkExtent::default();
        };
        face.glyph_bounding_box(glyph_id(&face, ch))
            .map_or(InkExtent::default(), |bbox| InkExtent {
                above: f32::from(bbox.y_max) * self.scale(px),
                below: -f32::from(bbox.y_min) * self.scale(px),
            })
    }

    fn outline(&self, ch: char, px: f32) -> Option<tiny_skia::Path> {
        let face = self.parse()?;
        let mut sink = PathSink {
            builder: PathBuilder::new(),
            scale: self.scale(px),
        };
        face.outline_glyph(glyph_id(&face, ch), &mut sink)?;
        sink.builder.finish()
    }
}

/// Font database with a face cache
pub struct FontLibrary {
    db: RwLock<Database>,
    faces: RwLock<HashMap<(String, u16), Arc<TtfFace>>>,
}

impl FontLibrary {
    /// Library with system fonts loaded
    #[must_use]
    pub fn system() -> Self {
        let mut db = Database::new();
        db.load_system_fonts();
        debug!(faces = db.len(), "Loaded system fonts");
        Self::from_database(db)
    }

    /// Library without any fonts (add files or directories explicitly)
    #[must_use]
    pub fn empty() -> Self {
        Self::from_database(Database::new())
    }

    fn from_database(db: Database) -> Self {
        Self {
            db: RwLock::new(db),
            faces: RwLock::new(HashMap::new()),
        }
    }

    /// Register a single font file
    pub fn load_font_file(&self, path: &Path) -> Result<()> {
        let mut db = self
            .db
            .write()
            .map_err(|_| CompositorError::FontLoad("font database lock poisoned".to_string()))?;
        db.load_font_file(path)
            .map_err(|e| CompositorError::FontLoad(format!("failed to load {}: {e}", path.display())))?;
        self.clear_cache();
        Ok(())
    }

    /// Register every font in a directory (recursively)
    pub fn load_fonts_dir(&self, dir: &Path) -> Result<()> {
        let mut db = self
            .db
            .write()
            .map_err(|_| CompositorError::FontLoad("font database lock poisoned".to_string()))?;
        let before = db.len();
        db.load_fonts_dir(dir);
        debug!(dir = %dir.display(), added = db.len() - before, "Loaded font directory");
        drop(db);
        self.clear_cache();
        Ok(())
    }

    /// Number of faces known to the database
    #[must_use]
    pub fn len(&self) -> usize {
        self.db.read().map_or(0, |db| db.len())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn clear_cache(&self) {
        if let Ok(mut faces) = self.faces.write() {
            faces.clear();
        }
    }

    fn lookup(&self, families: &[Family<'_>], weight: u16) -> Option<Result<TtfFace>> {
        let db = self.db.read().ok()?;
        let id = if families.is_empty() {
            db.faces().next()?.id
        } else {
            let query = Query {
                families,
                weight: Weight(weight),
                stretch: Stretch::Normal,
                style: Style::Normal,
            };
            db.query(&query)?
        };
        db.with_face_data(id, |data, index| TtfFace::from_bytes(data.to_vec(), index))
    }
}

impl FontProvider for FontLibrary {
    fn face(&self, family: &str, weight: u16) -> Result<Arc<dyn FontFace>> {
        let key = (family.to_string(), weight);
        if let Some(face) = self.faces.read().ok().and_then(|faces| faces.get(&key).cloned()) {
            return Ok(face);
        }

        let chain = [
            vec![Family::Name(family)],
            vec![Family::Name("Arial")],
            vec![Family::SansSerif],
            // any face at all
            vec![],
        ];
        for (i, families) in chain.iter().enumerate() {
            match self.lookup(families, weight) {
                Some(Ok(face)) => {
                    if i > 0 {
                        warn!(family, "Font not found, using fallback");
                    }
                    let face = Arc::new(face);
                    if let Ok(mut faces) = self.faces.write() {
                        faces.insert(key, Arc::clone(&face));
                    }
                    return Ok(face);
                }
                Some(Err(e)) => warn!(family, error = %e, "Font failed to parse"),
                None => {}
            }
        }

        Err(CompositorError::FontNotFound {
            family: family.to_string(),
            weight,
        })
    }
}

/// Face that draws every non-space character as a solid block.
///
/// Deterministic metrics make layout and pixel assertions exact.
#[cfg(test)]
pub(crate) struct BlockFace;

#[cfg(test)]
impl BlockFace {
    pub(crate) const ADVANCE: f32 = 0.6;
    pub(crate) const INK: f32 = 0.7;
}

#[cfg(test)]
impl FontFace for BlockFace {
    fn advance(&self, _ch: char, px: f32) -> f32 {
        px * Self::ADVANCE
    }

    fn vertical_metrics(&self, px: f32) -> VerticalMetrics {
        VerticalMetrics {
            ascent: px * 0.8,
            descent: -px * 0.2,
        }
    }

    fn ink_extent(&self, ch: char, px: f32) -> InkExtent {
        if ch == ' ' {
            return InkExtent::default();
        }
        InkExtent {
            above: px * Self::INK,
            below: 0.0,
        }
    }

    fn outline(&self, ch: char, px: f32) -> Option<tiny_skia::Path> {
        if ch == ' ' {
            return None;
        }
        let rect = tiny_skia::Rect::from_xywh(0.0, -px * Self::INK, px * Self::ADVANCE, px * Self::INK)?;
        Some(PathBuilder::from_rect(rect))
    }
}

/// Provider that hands out [`BlockFace`] for every family
#[cfg(test)]
pub(crate) struct BlockFonts;

#[cfg(test)]
impl FontProvider for BlockFonts {
    fn face(&self, _family: &str, _weight: u16) -> Result<Arc<dyn FontFace>> {
        Ok(Arc::new(BlockFace))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_middle_to_baseline() {
        let metrics = VerticalMetrics {
            ascent: 80.0,
            descent: -20.0,
        };
        assert!((metrics.middle_to_baseline() - 30.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_empty_library_reports_missing_font() {
        let library = FontLibrary::empty();
        assert!(library.is_empty());
        let err = library.face("Definitely Not A Font", 700).err().unwrap();
        assert!(matches!(err, CompositorError::FontNotFound { .. }));
    }

    #[test]
    fn test_block_face_outline_sits_above_baseline() {
        let bounds = BlockFace.outline('A', 10.0).unwrap().bounds();
        assert!(bounds.left().abs() < 1e-6);
        assert!((bounds.top() + 7.0).abs() < 1e-6);
        assert!((bounds.right() - 6.0).abs() < 1e-6);
        assert!(bounds.bottom().abs() < 1e-6);
        assert!(BlockFace.outline(' ', 10.0).is_none());
    }

    #[test]
    fn test_path_sink_flips_to_y_down() {
        let mut sink = PathSink {
            builder: PathBuilder::new(),
            scale: 0.5,
        };
        sink.move_to(0.0, 0.0);
        sink.line_to(100.0, 0.0);
        sink.quad_to(100.0, 100.0, 0.0, 200.0);
        sink.close();
        let bounds = sink.builder.finish().unwrap().bounds();
        assert!((bounds.top() + 100.0).abs() < 1e-4);
        assert!(bounds.bottom().abs() < 1e-4);
        assert!((bounds.right() - 50.0).abs() < 1e-4);
    }

    #[test]
    fn test_unknown_family_falls_back_to_some_face() {
        let library = FontLibrary::system();
        if library.is_empty() {
            return;
        }
        let face = library.face("No Such Family Anywhere", 400).unwrap();
        assert!(face.advance('M', 20.0) > 0.0);
    }

    #[test]
    fn test_garbage_bytes_are_a_load_error() {
        let err = TtfFace::from_bytes(b"not a font".to_vec(), 0).err().unwrap();
        assert!(matches!(err, CompositorError::FontLoad(_)));
    }

    #[test]
    fn test_load_fonts_dir_on_missing_dir_is_ok_and_empty() {
        let library = FontLibrary::empty();
        library
            .load_fonts_dir(Path::new("/definitely/not/a/font/dir"))
            .unwrap();
        assert!(library.is_empty());
    }

    #[test]
    fn test_poisoned_database_surfaces_an_error() {
        let library = Arc::new(FontLibrary::empty());
        let poisoner = Arc::clone(&library);
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.db.write().unwrap();
            panic!("poison the font database");
        })
        .join();
        let err = library.load_fonts_dir(Path::new(".")).unwrap_err();
        assert!(matches!(err, CompositorError::FontLoad(_)));
    }
}
