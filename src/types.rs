use ndarray::{s, Array3, ArrayView3, ArrayViewMut3};
use num_traits::{Bounded, NumCast, ToPrimitive, Zero};
use serde::{Deserialize, Serialize};

/// Axis-aligned pixel rectangle (x = column, y = row)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rectangle {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
}

impl Rectangle {
    pub fn new(x: usize, y: usize, width: usize, height: usize) -> Self {
        Self { x, y, width, height }
    }

    /// Rectangle anchored at the origin covering a full image
    pub fn from_size(width: usize, height: usize) -> Self {
        Self::new(0, 0, width, height)
    }

    pub fn right(&self) -> usize {
        self.x + self.width
    }

    pub fn bottom(&self) -> usize {
        self.y + self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// True if `other` lies completely inside this rectangle
    pub fn contains_rect(&self, other: &Rectangle) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }

    /// Intersection of two rectangles; empty (zero-sized) if they are disjoint
    pub fn intersect(&self, other: &Rectangle) -> Rectangle {
        let x = self.x.max(other.x);
        let y = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());
        if right <= x || bottom <= y {
            return Rectangle::new(x, y, 0, 0);
        }
        Rectangle::new(x, y, right - x, bottom - y)
    }

    /// Grow by `margin` on all four sides, saturating at the origin
    pub fn expand(&self, margin: usize) -> Rectangle {
        let x = self.x.saturating_sub(margin);
        let y = self.y.saturating_sub(margin);
        Rectangle::new(
            x,
            y,
            self.right() + margin - x,
            self.bottom() + margin - y,
        )
    }
}

impl std::fmt::Display for Rectangle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{} at ({}, {})", self.width, self.height, self.x, self.y)
    }
}

/// Base numeric type of raster elements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementType {
    U8,
    I8,
    U16,
    I16,
    I32,
    F32,
    F64,
}

impl std::fmt::Display for ElementType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ElementType::U8 => write!(f, "u8"),
            ElementType::I8 => write!(f, "i8"),
            ElementType::U16 => write!(f, "u16"),
            ElementType::I16 => write!(f, "i16"),
            ElementType::I32 => write!(f, "i32"),
            ElementType::F32 => write!(f, "f32"),
            ElementType::F64 => write!(f, "f64"),
        }
    }
}

/// Numeric element stored in a raster.
///
/// The fusion kernel works in `f64` and converts back with saturation:
/// integer types round to nearest with ties to even (12.5 becomes 12) before
/// clamping, float types only clamp.
pub trait Element:
    Copy + PartialOrd + Zero + NumCast + Bounded + std::fmt::Debug + Send + Sync + 'static
{
    const ELEMENT_TYPE: ElementType;
    const IS_INTEGER: bool;

    fn as_f64(self) -> f64 {
        ToPrimitive::to_f64(&self).unwrap_or(0.0)
    }

    fn saturate_from_f64(value: f64) -> Self {
        if value.is_nan() {
            return Self::zero();
        }
        let value = if Self::IS_INTEGER { value.round_ties_even() } else { value };
        let min = Self::min_value().as_f64();
        let max = Self::max_value().as_f64();
        NumCast::from(value.clamp(min, max)).unwrap_or_else(Self::zero)
    }

    fn from_any(raster: &AnyRaster) -> Option<&Raster<Self>>;
    fn from_any_mut(raster: &mut AnyRaster) -> Option<&mut Raster<Self>>;
    fn into_any(raster: Raster<Self>) -> AnyRaster;
}

macro_rules! impl_element {
    ($t:ty, $variant:ident, $is_int:expr) => {
        impl Element for $t {
            const ELEMENT_TYPE: ElementType = ElementType::$variant;
            const IS_INTEGER: bool = $is_int;

            fn from_any(raster: &AnyRaster) -> Option<&Raster<Self>> {
                match raster {
                    AnyRaster::$variant(r) => Some(r),
                    _ => None,
                }
            }

            fn from_any_mut(raster: &mut AnyRaster) -> Option<&mut Raster<Self>> {
                match raster {
                    AnyRaster::$variant(r) => Some(r),
                    _ => None,
                }
            }

            fn into_any(raster: Raster<Self>) -> AnyRaster {
                AnyRaster::$variant(raster)
            }
        }
    };
}

impl_element!(u8, U8, true);
impl_element!(i8, I8, true);
impl_element!(u16, U16, true);
impl_element!(i16, I16, true);
impl_element!(i32, I32, true);
impl_element!(f32, F32, false);
impl_element!(f64, F64, false);

/// Owned multi-channel raster, stored as `(rows, cols, channels)`.
///
/// Cropped views borrow the buffer, so they can never outlive it and nested
/// crops simply compose their offsets.
#[derive(Debug, Clone, PartialEq)]
pub struct Raster<T> {
    data: Array3<T>,
}

/// Boolean mask raster: 8-bit, 0 = excluded, 255 = included, 1 or N channels
pub type Mask = Raster<u8>;

impl<T: Element> Raster<T> {
    /// Zero-filled raster
    pub fn new(width: usize, height: usize, channels: usize) -> Self {
        Self {
            data: Array3::zeros((height, width, channels)),
        }
    }

    pub fn from_elem(width: usize, height: usize, channels: usize, value: T) -> Self {
        Self {
            data: Array3::from_elem((height, width, channels), value),
        }
    }

    /// Build a raster from a function of `(x, y, channel)`
    pub fn from_fn<F>(width: usize, height: usize, channels: usize, f: F) -> Self
    where
        F: Fn(usize, usize, usize) -> T,
    {
        Self {
            data: Array3::from_shape_fn((height, width, channels), |(y, x, c)| f(x, y, c)),
        }
    }

    /// Wrap an existing `(rows, cols, channels)` array
    pub fn from_array(data: Array3<T>) -> Self {
        Self { data }
    }

    pub fn width(&self) -> usize {
        self.data.dim().1
    }

    pub fn height(&self) -> usize {
        self.data.dim().0
    }

    pub fn channels(&self) -> usize {
        self.data.dim().2
    }

    /// Full extent of the raster
    pub fn rect(&self) -> Rectangle {
        Rectangle::from_size(self.width(), self.height())
    }

    pub fn get(&self, x: usize, y: usize, channel: usize) -> T {
        self.data[[y, x, channel]]
    }

    pub fn array(&self) -> &Array3<T> {
        &self.data
    }

    pub fn into_array(self) -> Array3<T> {
        self.data
    }

    pub fn view(&self) -> ArrayView3<'_, T> {
        self.data.view()
    }

    /// Borrow the region `rect` without copying
    pub fn crop(&self, rect: &Rectangle) -> FusionResult<ArrayView3<'_, T>> {
        self.check_crop(rect)?;
        Ok(self
            .data
            .slice(s![rect.y..rect.bottom(), rect.x..rect.right(), ..]))
    }

    pub fn crop_mut(&mut self, rect: &Rectangle) -> FusionResult<ArrayViewMut3<'_, T>> {
        self.check_crop(rect)?;
        Ok(self
            .data
            .slice_mut(s![rect.y..rect.bottom(), rect.x..rect.right(), ..]))
    }

    fn check_crop(&self, rect: &Rectangle) -> FusionResult<()> {
        if !self.rect().contains_rect(rect) {
            return Err(FusionError::Size(format!(
                "Crop region {} exceeds raster bounds {}x{}",
                rect,
                self.width(),
                self.height()
            )));
        }
        Ok(())
    }
}

/// Evaluate a mask view at `(row, col)` for `channel`, broadcasting single-channel masks
pub fn mask_allows(mask: &ArrayView3<'_, u8>, row: usize, col: usize, channel: usize) -> bool {
    let mask_channel = if mask.dim().2 == 1 { 0 } else { channel };
    mask[[row, col, mask_channel]] != 0
}

/// Raster with its element type selected at runtime
#[derive(Debug, Clone, PartialEq)]
pub enum AnyRaster {
    U8(Raster<u8>),
    I8(Raster<i8>),
    U16(Raster<u16>),
    I16(Raster<i16>),
    I32(Raster<i32>),
    F32(Raster<f32>),
    F64(Raster<f64>),
}

macro_rules! with_raster {
    ($raster:expr, $r:ident => $body:expr) => {
        match $raster {
            AnyRaster::U8($r) => $body,
            AnyRaster::I8($r) => $body,
            AnyRaster::U16($r) => $body,
            AnyRaster::I16($r) => $body,
            AnyRaster::I32($r) => $body,
            AnyRaster::F32($r) => $body,
            AnyRaster::F64($r) => $body,
        }
    };
}

impl AnyRaster {
    /// Zero-filled raster of the given element type
    pub fn zeros(element_type: ElementType, width: usize, height: usize, channels: usize) -> Self {
        match element_type {
            ElementType::U8 => AnyRaster::U8(Raster::new(width, height, channels)),
            ElementType::I8 => AnyRaster::I8(Raster::new(width, height, channels)),
            ElementType::U16 => AnyRaster::U16(Raster::new(width, height, channels)),
            ElementType::I16 => AnyRaster::I16(Raster::new(width, height, channels)),
            ElementType::I32 => AnyRaster::I32(Raster::new(width, height, channels)),
            ElementType::F32 => AnyRaster::F32(Raster::new(width, height, channels)),
            ElementType::F64 => AnyRaster::F64(Raster::new(width, height, channels)),
        }
    }

    pub fn element_type(&self) -> ElementType {
        match self {
            AnyRaster::U8(_) => ElementType::U8,
            AnyRaster::I8(_) => ElementType::I8,
            AnyRaster::U16(_) => ElementType::U16,
            AnyRaster::I16(_) => ElementType::I16,
            AnyRaster::I32(_) => ElementType::I32,
            AnyRaster::F32(_) => ElementType::F32,
            AnyRaster::F64(_) => ElementType::F64,
        }
    }

    pub fn width(&self) -> usize {
        with_raster!(self, r => r.width())
    }

    pub fn height(&self) -> usize {
        with_raster!(self, r => r.height())
    }

    pub fn channels(&self) -> usize {
        with_raster!(self, r => r.channels())
    }

    pub fn rect(&self) -> Rectangle {
        Rectangle::from_size(self.width(), self.height())
    }

    /// Full type name including channel count, e.g. `u16x3`
    pub fn type_name(&self) -> String {
        format!("{}x{}", self.element_type(), self.channels())
    }

    /// Downcast to a typed raster
    pub fn as_raster<T: Element>(&self) -> Option<&Raster<T>> {
        T::from_any(self)
    }

    pub fn as_raster_mut<T: Element>(&mut self) -> Option<&mut Raster<T>> {
        T::from_any_mut(self)
    }

    /// Copy all of `src` into this raster with its top-left corner at `(x, y)`
    pub fn paste(&mut self, src: &AnyRaster, x: usize, y: usize) -> FusionResult<()> {
        if src.element_type() != self.element_type() || src.channels() != self.channels() {
            return Err(FusionError::ImageType(format!(
                "Cannot paste a {} raster into a {} raster",
                src.type_name(),
                self.type_name()
            )));
        }
        let target = Rectangle::new(x, y, src.width(), src.height());
        with_raster!(self, dst => paste_typed(dst, src, &target))
    }
}

fn paste_typed<T: Element>(dst: &mut Raster<T>, src: &AnyRaster, target: &Rectangle) -> FusionResult<()> {
    let src = T::from_any(src).ok_or_else(|| {
        FusionError::ImageType(format!("Expected a {} raster to paste", T::ELEMENT_TYPE))
    })?;
    dst.crop_mut(target)?.assign(&src.view());
    Ok(())
}

impl<T: Element> From<Raster<T>> for AnyRaster {
    fn from(raster: Raster<T>) -> Self {
        T::into_any(raster)
    }
}

/// Error types for image fusion
#[derive(Debug, thiserror::Error)]
pub enum FusionError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Image not found: {0}")]
    NotFound(String),

    #[error("Image type error: {0}")]
    ImageType(String),

    #[error("Size error: {0}")]
    Size(String),
}

/// Result type for fusion operations
pub type FusionResult<T> = Result<T, FusionError>;
