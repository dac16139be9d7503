//! Pixel serialization: color features, shaders and frames.

use core::fmt::Debug;
use core::ops::{Deref, DerefMut};

use heapless::Vec;
use smart_leds::{RGB8, RGBW, White};

/// Largest number of bytes one pixel or one settings block may serialize to.
pub const SEND_DATA_CAPACITY: usize = 16;

/// Scratch buffer a [`ColorFeature`] serializes into.
pub type SendData = Vec<u8, SEND_DATA_CAPACITY>;

/// How a chip family wants its pixels (and any per-frame settings) on the wire.
pub trait ColorFeature {
    /// In-memory pixel color.
    type Color: Copy + Debug + PartialEq;

    /// Per-frame settings sent before and/or after the pixels.
    type Settings;

    /// Bytes one pixel serializes to.
    const PIXEL_SIZE: usize;

    /// Bytes the front and back settings serialize to, together.
    const SETTINGS_SIZE: usize = 0;

    /// Color shown where there is no pixel data.
    const BLACK: Self::Color;

    /// Append the wire bytes of `color` to `out`.
    fn apply_pixel_color(out: &mut SendData, color: Self::Color);

    /// Append the settings sent before the first pixel. Nothing by default.
    fn apply_front_settings(_out: &mut SendData, _settings: &Self::Settings) {}

    /// Append the settings sent after the last pixel. Nothing by default.
    fn apply_back_settings(_out: &mut SendData, _settings: &Self::Settings) {}
}

/// Settings for chips that take none.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct NoSettings;

/// WS2812 byte order: green, red, blue.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Grb;

impl ColorFeature for Grb {
    type Color = RGB8;
    type Settings = NoSettings;
    const PIXEL_SIZE: usize = 3;
    const BLACK: RGB8 = RGB8::new(0, 0, 0);

    fn apply_pixel_color(out: &mut SendData, color: RGB8) {
        push_all(out, &[color.g, color.r, color.b]);
    }
}

/// Red, green, blue (WS2811 and some clones).
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Rgb;

impl ColorFeature for Rgb {
    type Color = RGB8;
    type Settings = NoSettings;
    const PIXEL_SIZE: usize = 3;
    const BLACK: RGB8 = RGB8::new(0, 0, 0);

    fn apply_pixel_color(out: &mut SendData, color: RGB8) {
        push_all(out, &[color.r, color.g, color.b]);
    }
}

/// SK6812 RGBW: green, red, blue, white.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Grbw;

impl ColorFeature for Grbw {
    type Color = RGBW<u8>;
    type Settings = NoSettings;
    const PIXEL_SIZE: usize = 4;
    const BLACK: RGBW<u8> = RGBW {
        r: 0,
        g: 0,
        b: 0,
        a: White(0),
    };

    fn apply_pixel_color(out: &mut SendData, color: RGBW<u8>) {
        push_all(out, &[color.g, color.r, color.b, color.a.0]);
    }
}

fn push_all(out: &mut SendData, bytes: &[u8]) {
    if out.extend_from_slice(bytes).is_err() {
        warn!("pixel data does not fit in {} bytes", SEND_DATA_CAPACITY);
    }
}

/// Per-pixel color transform applied just before serialization.
///
/// Any `Fn(C) -> C` is a shader.
pub trait Shader<C> {
    /// Transformed `color`.
    fn apply(&self, color: C) -> C;
}

/// Leaves colors as they are.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct NoShader;

impl<C> Shader<C> for NoShader {
    fn apply(&self, color: C) -> C {
        color
    }
}

impl<C, F: Fn(C) -> C> Shader<C> for F {
    fn apply(&self, color: C) -> C {
        self(color)
    }
}

/// Pixel `index` of a strip drawn from `pixels`, repeating them if the strip is longer.
///
/// An empty slice gives `black`.
#[must_use]
pub fn wrapped_pixel<C: Copy>(pixels: &[C], index: usize, black: C) -> C {
    index
        .checked_rem(pixels.len())
        .and_then(|index| pixels.get(index))
        .copied()
        .unwrap_or(black)
}

/// Pixel data for an `N`-pixel strip of color feature `F`.
///
/// Frames deref to `[F::Color; N]`, so pixels can be set by index before passing the frame to
/// [`MuxStrip::update`](super::MuxStrip::update).
#[derive(Clone, Copy, Debug)]
pub struct Frame1d<const N: usize, F: ColorFeature = Grb>(pub [F::Color; N]);

impl<const N: usize, F: ColorFeature> Frame1d<N, F> {
    /// Number of LEDs in this frame.
    pub const LEN: usize = N;

    /// Create a new blank (all black) frame.
    #[must_use]
    pub const fn new() -> Self {
        Self([F::BLACK; N])
    }

    /// Create a frame filled with a single color.
    #[must_use]
    pub const fn filled(color: F::Color) -> Self {
        Self([color; N])
    }

    /// Pixel at `index`, or black past the end of the frame.
    #[must_use]
    pub fn pixel(&self, index: usize) -> F::Color {
        self.0.get(index).copied().unwrap_or(F::BLACK)
    }
}

impl<const N: usize, F: ColorFeature> Deref for Frame1d<N, F> {
    type Target = [F::Color; N];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<const N: usize, F: ColorFeature> DerefMut for Frame1d<N, F> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl<const N: usize, F: ColorFeature> Default for Frame1d<N, F> {
    fn default() -> Self {
        Self::new()
    }
}
