//! Canvas wrapper and the 2D rendering context behind it.

use crate::coords::Coords;
use crate::environment::Environment;
use crate::media_object::{ElementWrapper, MediaObject, Source};
use base64::Engine;
use common::{Bitmap, MediafyError, MediafyResult, PixelRect, Rect, SharedBitmap, Size};
use dom::{DocumentRef, NodeId, WindowId};
use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageFormat, RgbaImage};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Cursor;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Rendering context type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContextType {
    #[serde(rename = "2d")]
    TwoD,
    #[serde(rename = "webgl")]
    WebGl,
    #[serde(rename = "webgl2")]
    WebGl2,
    #[serde(rename = "bitmaprenderer")]
    BitmapRenderer,
}

impl ContextType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContextType::TwoD => "2d",
            ContextType::WebGl => "webgl",
            ContextType::WebGl2 => "webgl2",
            ContextType::BitmapRenderer => "bitmaprenderer",
        }
    }
}

impl fmt::Display for ContextType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContextType {
    type Err = MediafyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "2d" => Ok(ContextType::TwoD),
            "webgl" | "experimental-webgl" => Ok(ContextType::WebGl),
            "webgl2" => Ok(ContextType::WebGl2),
            "bitmaprenderer" => Ok(ContextType::BitmapRenderer),
            other => Err(MediafyError::context(format!("unknown context type {:?}", other))),
        }
    }
}

/// Shared handle to a canvas's 2D context.
pub type Context2dRef = Arc<Mutex<Context2d>>;

/// Acquire a context of `kind` for a canvas element, as the host's
/// `getContext` would. A canvas has at most one 2D context.
pub(crate) fn acquire_context(env: &Environment, canvas: NodeId, kind: ContextType) -> MediafyResult<Context2dRef> {
    match kind {
        ContextType::TwoD => {
            let has_surface = env
                .document()
                .read()
                .tree
                .get_element(canvas)
                .ok_or(MediafyError::StaleElement)?
                .surface()
                .is_some();
            if !has_surface {
                return Err(MediafyError::context("element has no drawing surface"));
            }
            Ok(env.context_2d(canvas))
        }
        other => {
            warn!(kind = %other, "rendering context unavailable");
            Err(MediafyError::context(other.as_str()))
        }
    }
}

/// Something `draw_image` can read pixels from.
#[derive(Clone, Debug)]
pub enum ImageSource {
    /// An element with a pixel surface: a canvas, or a video with a frame.
    Element(NodeId),
    /// A detached bitmap.
    Bitmap(Bitmap),
}

impl From<NodeId> for ImageSource {
    fn from(node: NodeId) -> Self {
        ImageSource::Element(node)
    }
}

impl From<Bitmap> for ImageSource {
    fn from(bitmap: Bitmap) -> Self {
        ImageSource::Bitmap(bitmap)
    }
}

impl<W: ElementWrapper> From<&W> for ImageSource {
    fn from(wrapper: &W) -> Self {
        ImageSource::Element(wrapper.element())
    }
}

/// Image data.
#[derive(Clone, Debug, PartialEq)]
pub struct ImageData {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl ImageData {
    /// Create new, fully transparent image data.
    pub fn new(width: u32, height: u32) -> MediafyResult<Self> {
        let data = Bitmap::new(width, height)?.into_raw();
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// RGBA of the pixel at (x, y).
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = (y as usize * self.width as usize + x as usize) * 4;
        let px = self.data.get(idx..idx + 4)?;
        Some([px[0], px[1], px[2], px[3]])
    }
}

/// Saved context state.
#[derive(Clone, Debug)]
struct ContextState {
    fill_style: String,
    fill_color: [u8; 4],
    global_alpha: f64,
}

impl Default for ContextState {
    fn default() -> Self {
        Self {
            fill_style: "#000000".to_string(),
            fill_color: [0, 0, 0, 255],
            global_alpha: 1.0,
        }
    }
}

/// 2D canvas rendering context.
///
/// Drawing goes straight to the canvas element's surface; the context
/// itself only carries style state.
pub struct Context2d {
    document: DocumentRef,
    canvas: NodeId,
    state: ContextState,
    save_stack: Vec<ContextState>,
}

impl Context2d {
    pub(crate) fn new(document: DocumentRef, canvas: NodeId) -> Self {
        Self {
            document,
            canvas,
            state: ContextState::default(),
            save_stack: Vec::new(),
        }
    }

    /// The canvas element this context draws on.
    pub fn canvas(&self) -> NodeId {
        self.canvas
    }

    fn surface(&self) -> MediafyResult<SharedBitmap> {
        self.document
            .read()
            .tree
            .get_element(self.canvas)
            .ok_or(MediafyError::StaleElement)?
            .surface()
            .ok_or_else(|| MediafyError::context("canvas surface missing"))
    }

    /// Current surface size.
    pub fn canvas_size(&self) -> MediafyResult<Size> {
        Ok(self.surface()?.read().size())
    }

    // State methods

    /// Save the current state.
    pub fn save(&mut self) {
        self.save_stack.push(self.state.clone());
    }

    /// Restore the previous state.
    pub fn restore(&mut self) {
        if let Some(state) = self.save_stack.pop() {
            self.state = state;
        }
    }

    /// Set fill style. Unparseable colors are ignored.
    pub fn set_fill_style(&mut self, style: &str) {
        match parse_color(style) {
            Some(color) => {
                self.state.fill_style = style.to_string();
                self.state.fill_color = color;
            }
            None => trace!(style, "ignoring unparseable fill style"),
        }
    }

    pub fn fill_style(&self) -> &str {
        &self.state.fill_style
    }

    /// Set global alpha, clamped to [0, 1]. NaN is ignored.
    pub fn set_global_alpha(&mut self, alpha: f64) {
        if !alpha.is_nan() {
            self.state.global_alpha = alpha.clamp(0.0, 1.0);
        }
    }

    pub fn global_alpha(&self) -> f64 {
        self.state.global_alpha
    }

    // Drawing methods

    /// Fill a rectangle with the fill style.
    pub fn fill_rect(&mut self, x: f64, y: f64, width: f64, height: f64) -> MediafyResult<()> {
        let rect = Rect::new(x, y, width, height).normalized().to_pixel_rect();
        self.surface()?
            .write()
            .fill_region(rect, self.state.fill_color, self.state.global_alpha);
        Ok(())
    }

    /// Clear a rectangle to transparent black.
    pub fn clear_rect(&mut self, x: f64, y: f64, width: f64, height: f64) -> MediafyResult<()> {
        let rect = Rect::new(x, y, width, height).normalized().to_pixel_rect();
        trace!(?rect, "clear");
        self.surface()?.write().clear_region(rect);
        Ok(())
    }

    /// Copy out a region. Areas outside the canvas read as transparent.
    pub fn get_image_data(&self, x: f64, y: f64, width: f64, height: f64) -> MediafyResult<ImageData> {
        let rect = Rect::new(x, y, width, height).normalized();
        if rect.width.round() < 1.0 || rect.height.round() < 1.0 {
            return Err(MediafyError::invalid(format!(
                "image data source width and height must be non-zero, got {}x{}",
                width, height
            )));
        }
        let rect = PixelRect::new(
            rect.x.round() as i32,
            rect.y.round() as i32,
            rect.width.round() as u32,
            rect.height.round() as u32,
        );
        let data = self.surface()?.read().read_region(rect)?;
        Ok(ImageData {
            width: rect.width,
            height: rect.height,
            data,
        })
    }

    /// Write image data without blending.
    pub fn put_image_data(&mut self, image_data: &ImageData, x: i32, y: i32) -> MediafyResult<()> {
        self.surface()?
            .write()
            .write_region(x, y, image_data.width, image_data.height, &image_data.data);
        Ok(())
    }

    /// Draw `source` scaled into the destination rectangle.
    ///
    /// A source without pixels (a video that has no frame yet, an empty
    /// canvas) draws nothing.
    pub fn draw_image(&mut self, source: &ImageSource, dx: f64, dy: f64, dw: f64, dh: f64) -> MediafyResult<()> {
        let Some(bitmap) = self.snapshot(source)? else {
            trace!("image source has no pixels yet");
            return Ok(());
        };
        if bitmap.size().is_empty() {
            return Ok(());
        }

        let dest = Rect::new(dx, dy, dw, dh).normalized();
        let width = dest.width.round() as u32;
        let height = dest.height.round() as u32;
        if width == 0 || height == 0 {
            return Ok(());
        }
        if !Bitmap::fits(Size::new(width, height)) {
            return Err(MediafyError::invalid(format!(
                "destination {}x{} exceeds the maximum bitmap size",
                width, height
            )));
        }

        let scaled = if bitmap.size() == Size::new(width, height) {
            bitmap
        } else {
            scale_bitmap(bitmap, width, height)?
        };

        self.surface()?.write().composite(
            &scaled,
            dest.x.round() as i32,
            dest.y.round() as i32,
            self.state.global_alpha,
        );
        Ok(())
    }

    /// Copy of the source's current pixels, taken without holding the
    /// destination lock.
    fn snapshot(&self, source: &ImageSource) -> MediafyResult<Option<Bitmap>> {
        match source {
            ImageSource::Bitmap(bitmap) => Ok(Some(bitmap.clone())),
            ImageSource::Element(node) => {
                let surface = self
                    .document
                    .read()
                    .tree
                    .get_element(*node)
                    .ok_or(MediafyError::StaleElement)?
                    .surface();
                Ok(surface.map(|s| s.read().clone()))
            }
        }
    }

    /// Encode the canvas as a data URL. Unsupported types fall back to PNG;
    /// `quality` in [0, 1] applies to JPEG only.
    pub fn to_data_url(&self, mime_type: &str, quality: Option<f64>) -> MediafyResult<String> {
        let bitmap = self.surface()?.read().clone();
        if bitmap.size().is_empty() {
            return Ok("data:,".to_string());
        }

        let (mime, bytes) = match mime_type.to_ascii_lowercase().as_str() {
            "image/jpeg" | "image/jpg" => ("image/jpeg", encode_jpeg(bitmap, quality)?),
            "image/png" => ("image/png", encode_png(bitmap)?),
            other => {
                debug!(mime = other, "unsupported export type, using PNG");
                ("image/png", encode_png(bitmap)?)
            }
        };

        Ok(format!(
            "data:{};base64,{}",
            mime,
            base64::engine::general_purpose::STANDARD.encode(bytes)
        ))
    }
}

impl fmt::Debug for Context2d {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context2d")
            .field("canvas", &self.canvas)
            .field("fill_style", &self.state.fill_style)
            .field("global_alpha", &self.state.global_alpha)
            .field("saved", &self.save_stack.len())
            .finish()
    }
}

fn to_rgba_image(bitmap: Bitmap) -> MediafyResult<RgbaImage> {
    let (width, height) = (bitmap.width(), bitmap.height());
    RgbaImage::from_raw(width, height, bitmap.into_raw())
        .ok_or_else(|| MediafyError::invalid(format!("bitmap buffer does not match {}x{}", width, height)))
}

fn scale_bitmap(bitmap: Bitmap, width: u32, height: u32) -> MediafyResult<Bitmap> {
    let image = to_rgba_image(bitmap)?;
    let resized = imageops::resize(&image, width, height, FilterType::Triangle);
    Bitmap::from_rgba(width, height, resized.into_raw())
}

fn encode_png(bitmap: Bitmap) -> MediafyResult<Vec<u8>> {
    let image = DynamicImage::ImageRgba8(to_rgba_image(bitmap)?);
    let mut buf = Cursor::new(Vec::new());
    image
        .write_to(&mut buf, ImageFormat::Png)
        .map_err(|e| MediafyError::encode(e.to_string()))?;
    Ok(buf.into_inner())
}

fn encode_jpeg(bitmap: Bitmap, quality: Option<f64>) -> MediafyResult<Vec<u8>> {
    let rgb = DynamicImage::ImageRgba8(to_rgba_image(bitmap)?).to_rgb8();
    let quality = quality
        .filter(|q| (0.0..=1.0).contains(q))
        .map(|q| (q * 100.0).round() as u8)
        .unwrap_or(92)
        .max(1);
    let mut buf = Vec::new();
    image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, quality)
        .encode_image(&rgb)
        .map_err(|e| MediafyError::encode(e.to_string()))?;
    Ok(buf)
}

/// Parse a CSS color: `#rgb`, `#rrggbb`, `#rrggbbaa`, `rgb()`, `rgba()`
/// or a handful of named colors.
pub fn parse_color(color: &str) -> Option<[u8; 4]> {
    let color = color.trim();
    if let Some(hex) = color.strip_prefix('#') {
        if !hex.is_ascii() {
            return None;
        }
        let channel = |s: &str| u8::from_str_radix(s, 16).ok();
        return match hex.len() {
            3 => {
                let mut out = [255u8; 4];
                for (i, c) in hex.chars().enumerate() {
                    let v = c.to_digit(16)? as u8;
                    out[i] = v * 17;
                }
                Some(out)
            }
            6 => Some([channel(&hex[0..2])?, channel(&hex[2..4])?, channel(&hex[4..6])?, 255]),
            8 => Some([
                channel(&hex[0..2])?,
                channel(&hex[2..4])?,
                channel(&hex[4..6])?,
                channel(&hex[6..8])?,
            ]),
            _ => None,
        };
    }

    let lower = color.to_ascii_lowercase();
    if let Some(args) = lower
        .strip_prefix("rgba(")
        .or_else(|| lower.strip_prefix("rgb("))
        .and_then(|s| s.strip_suffix(')'))
    {
        let parts: Vec<&str> = args.split(',').map(str::trim).collect();
        if parts.len() != 3 && parts.len() != 4 {
            return None;
        }
        let mut out = [0u8, 0, 0, 255];
        for (i, part) in parts.iter().take(3).enumerate() {
            out[i] = part.parse::<f64>().ok()?.round().clamp(0.0, 255.0) as u8;
        }
        if let Some(alpha) = parts.get(3) {
            out[3] = (alpha.parse::<f64>().ok()?.clamp(0.0, 1.0) * 255.0).round() as u8;
        }
        return Some(out);
    }

    // Named colors
    match lower.as_str() {
        "black" => Some([0, 0, 0, 255]),
        "white" => Some([255, 255, 255, 255]),
        "red" => Some([255, 0, 0, 255]),
        "green" => Some([0, 128, 0, 255]),
        "lime" => Some([0, 255, 0, 255]),
        "blue" => Some([0, 0, 255, 255]),
        "yellow" => Some([255, 255, 0, 255]),
        "transparent" => Some([0, 0, 0, 0]),
        _ => None,
    }
}

/// Canvas element wrapper.
#[derive(Debug)]
pub struct Canvas {
    object: MediaObject,
    context: Mutex<Option<Context2dRef>>,
}

impl ElementWrapper for Canvas {
    const TAG: &'static str = "canvas";

    fn object(&self) -> &MediaObject {
        &self.object
    }
}

impl Canvas {
    /// Wrap an existing canvas (`"#id"`) or create one (`(width, height)`,
    /// `Source::Create(None)`).
    pub fn new<'a>(env: &Environment, source: impl Into<Source<'a>>) -> MediafyResult<Self> {
        Ok(Self {
            object: MediaObject::new(env, Self::TAG, source.into())?,
            context: Mutex::new(None),
        })
    }

    /// The cached rendering context. Passing a type always re-acquires; a
    /// failed acquisition clears the cache.
    pub fn get_context(&self, kind: Option<ContextType>) -> MediafyResult<Context2dRef> {
        let mut cached = self.context.lock();
        if let (Some(ctx), None) = (cached.as_ref(), kind) {
            return Ok(ctx.clone());
        }

        let kind = kind.unwrap_or(self.object.env().config().default_context);
        match acquire_context(self.object.env(), self.element(), kind) {
            Ok(ctx) => {
                debug!(kind = %kind, "acquired rendering context");
                *cached = Some(ctx.clone());
                Ok(ctx)
            }
            Err(e) => {
                *cached = None;
                Err(e)
            }
        }
    }

    /// Clear `coords`, or the whole canvas.
    pub fn clear(&self, coords: Option<Coords>) -> MediafyResult<&Self> {
        let c = self.resolve(coords)?;
        self.get_context(None)?.lock().clear_rect(c.x, c.y, c.width, c.height)?;
        Ok(self)
    }

    /// Pixels of `coords`, or of the whole canvas.
    pub fn get_image_data(&self, coords: Option<Coords>) -> MediafyResult<ImageData> {
        let c = self.resolve(coords)?;
        self.get_context(None)?.lock().get_image_data(c.x, c.y, c.width, c.height)
    }

    /// Draw an image, or the element behind a wrapper, scaled into `coords`
    /// or over the whole canvas.
    pub fn put_image(&self, image: impl Into<ImageSource>, coords: Option<Coords>) -> MediafyResult<&Self> {
        let c = self.resolve(coords)?;
        let source = image.into();
        self.get_context(None)?
            .lock()
            .draw_image(&source, c.x, c.y, c.width, c.height)?;
        Ok(self)
    }

    /// `toDataURL(mime)`.
    pub fn to_data_url(&self, mime_type: &str) -> MediafyResult<String> {
        self.get_context(None)?.lock().to_data_url(mime_type, None)
    }

    /// Open the canvas image in a new window and return that window's id.
    pub fn export_image(&self) -> MediafyResult<WindowId> {
        let env = self.object.env();
        let url = self.to_data_url(&env.config().export_mime)?;
        let opened = env
            .window()
            .write()
            .open(&url, "_blank")
            .ok_or_else(|| MediafyError::PermissionDenied("window.open blocked".to_string()))?;
        let id = opened.read().id();
        debug!(window = id.get(), bytes = url.len(), "exported canvas image");
        Ok(id)
    }

    fn resolve(&self, coords: Option<Coords>) -> MediafyResult<Coords> {
        match coords {
            Some(c) => Ok(c),
            None => Coords::of(self),
        }
    }
}
