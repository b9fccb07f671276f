//! Error-diffusion dithering onto the fixed four-entry display palette.
//!
//! Quantization happens in linear light: every sRGB channel is linearized,
//! matched against the palette by squared RGB distance, and the residual is
//! spread to not-yet-visited neighbours through the selected kernel scaled by
//! the configured strength.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use image::{Rgba, RgbaImage};
use palette::{LinSrgb, Srgb};
use serde::{Deserialize, Deserializer};
use tracing::debug;

use crate::error::Error;

/// The display palette, in sRGB. Order matters: ties resolve to the earliest entry.
pub const PALETTE: [Rgba<u8>; 4] = [
    Rgba([0, 0, 0, 255]),
    Rgba([255, 255, 255, 255]),
    Rgba([128, 128, 128, 255]),
    Rgba([0, 0, 0, 0]),
];

const TRANSPARENT_INDEX: usize = 3;

/// Source pixels with less alpha than this map straight to the transparent entry.
const ALPHA_CUTOFF: u8 = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DitherAlgorithm {
    FloydSteinberg,
    JarvisJudiceNinke,
    Stucki,
    Atkinson,
    Sierra,
    Sierra2,
    SierraLite,
    StevenPigeon,
    Burkes,
    FalseFloydSteinberg,
}

impl DitherAlgorithm {
    pub const ALL: &'static [Self] = &[
        Self::FloydSteinberg,
        Self::JarvisJudiceNinke,
        Self::Stucki,
        Self::Atkinson,
        Self::Sierra,
        Self::Sierra2,
        Self::SierraLite,
        Self::StevenPigeon,
        Self::Burkes,
        Self::FalseFloydSteinberg,
    ];

    /// Canonical spelling, also used as the artifact filename suffix.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::FloydSteinberg => "FloydSteinberg",
            Self::JarvisJudiceNinke => "JarvisJudiceNinke",
            Self::Stucki => "Stucki",
            Self::Atkinson => "Atkinson",
            Self::Sierra => "Sierra",
            Self::Sierra2 => "Sierra2",
            Self::SierraLite => "SierraLite",
            Self::StevenPigeon => "StevenPigeon",
            Self::Burkes => "Burkes",
            Self::FalseFloydSteinberg => "FalseFloydSteinberg",
        }
    }

    pub fn kernel(&self) -> &'static Kernel {
        match self {
            Self::FloydSteinberg => &FLOYD_STEINBERG,
            Self::JarvisJudiceNinke => &JARVIS_JUDICE_NINKE,
            Self::Stucki => &STUCKI,
            Self::Atkinson => &ATKINSON,
            Self::Sierra => &SIERRA,
            Self::Sierra2 => &SIERRA2,
            Self::SierraLite => &SIERRA_LITE,
            Self::StevenPigeon => &STEVEN_PIGEON,
            Self::Burkes => &BURKES,
            Self::FalseFloydSteinberg => &FALSE_FLOYD_STEINBERG,
        }
    }
}

impl fmt::Display for DitherAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DitherAlgorithm {
    type Err = Error;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let wanted = raw.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|alg| alg.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| Error::UnknownAlgorithm(raw.to_string()))
    }
}

impl<'de> Deserialize<'de> for DitherAlgorithm {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Error-diffusion matrix as `(dx, dy, numerator)` taps relative to the
/// current pixel, all sharing one divisor. `dy` is never negative and taps on
/// the current row only point forward.
#[derive(Debug)]
pub struct Kernel {
    pub divisor: f32,
    pub taps: &'static [(i32, i32, f32)],
}

impl Kernel {
    /// Fraction of the residual this kernel passes on at full strength.
    pub fn total_weight(&self) -> f32 {
        self.taps.iter().map(|&(_, _, n)| n).sum::<f32>() / self.divisor
    }
}

static FLOYD_STEINBERG: Kernel = Kernel {
    divisor: 16.0,
    taps: &[(1, 0, 7.0), (-1, 1, 3.0), (0, 1, 5.0), (1, 1, 1.0)],
};

static FALSE_FLOYD_STEINBERG: Kernel = Kernel {
    divisor: 8.0,
    taps: &[(1, 0, 3.0), (0, 1, 3.0), (1, 1, 2.0)],
};

static JARVIS_JUDICE_NINKE: Kernel = Kernel {
    divisor: 48.0,
    taps: &[
        (1, 0, 7.0),
        (2, 0, 5.0),
        (-2, 1, 3.0),
        (-1, 1, 5.0),
        (0, 1, 7.0),
        (1, 1, 5.0),
        (2, 1, 3.0),
        (-2, 2, 1.0),
        (-1, 2, 3.0),
        (0, 2, 5.0),
        (1, 2, 3.0),
        (2, 2, 1.0),
    ],
};

static STUCKI: Kernel = Kernel {
    divisor: 42.0,
    taps: &[
        (1, 0, 8.0),
        (2, 0, 4.0),
        (-2, 1, 2.0),
        (-1, 1, 4.0),
        (0, 1, 8.0),
        (1, 1, 4.0),
        (2, 1, 2.0),
        (-2, 2, 1.0),
        (-1, 2, 2.0),
        (0, 2, 4.0),
        (1, 2, 2.0),
        (2, 2, 1.0),
    ],
};

// Deliberately lossy: only 6/8 of the residual is propagated.
static ATKINSON: Kernel = Kernel {
    divisor: 8.0,
    taps: &[
        (1, 0, 1.0),
        (2, 0, 1.0),
        (-1, 1, 1.0),
        (0, 1, 1.0),
        (1, 1, 1.0),
        (0, 2, 1.0),
    ],
};

static BURKES: Kernel = Kernel {
    divisor: 32.0,
    taps: &[
        (1, 0, 8.0),
        (2, 0, 4.0),
        (-2, 1, 2.0),
        (-1, 1, 4.0),
        (0, 1, 8.0),
        (1, 1, 4.0),
        (2, 1, 2.0),
    ],
};

static SIERRA: Kernel = Kernel {
    divisor: 32.0,
    taps: &[
        (1, 0, 5.0),
        (2, 0, 3.0),
        (-2, 1, 2.0),
        (-1, 1, 4.0),
        (0, 1, 5.0),
        (1, 1, 4.0),
        (2, 1, 2.0),
        (-1, 2, 2.0),
        (0, 2, 3.0),
        (1, 2, 2.0),
    ],
};

static SIERRA2: Kernel = Kernel {
    divisor: 16.0,
    taps: &[
        (1, 0, 4.0),
        (2, 0, 3.0),
        (-2, 1, 1.0),
        (-1, 1, 2.0),
        (0, 1, 3.0),
        (1, 1, 2.0),
        (2, 1, 1.0),
    ],
};

static SIERRA_LITE: Kernel = Kernel {
    divisor: 4.0,
    taps: &[(1, 0, 2.0), (-1, 1, 1.0), (0, 1, 1.0)],
};

static STEVEN_PIGEON: Kernel = Kernel {
    divisor: 14.0,
    taps: &[
        (1, 0, 2.0),
        (2, 0, 1.0),
        (-1, 1, 2.0),
        (0, 1, 2.0),
        (1, 1, 2.0),
        (-2, 2, 1.0),
        (0, 2, 1.0),
        (2, 2, 1.0),
    ],
};

/// Quantizes images onto [`PALETTE`] with a fixed kernel, strength and scan order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Disperser {
    algorithm: DitherAlgorithm,
    strength: f32,
    serpentine: bool,
}

impl Disperser {
    /// `strength` is clamped to `[0, 1]`; `0` degrades to plain nearest-color mapping.
    pub fn new(algorithm: DitherAlgorithm, strength: f32, serpentine: bool) -> Self {
        let strength = if strength.is_finite() {
            strength.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self {
            algorithm,
            strength,
            serpentine,
        }
    }

    pub const fn algorithm(&self) -> DitherAlgorithm {
        self.algorithm
    }

    pub const fn strength(&self) -> f32 {
        self.strength
    }

    /// Returns a new image in which every pixel is one of the [`PALETTE`] entries.
    pub fn dither(&self, source: &RgbaImage) -> RgbaImage {
        let (width, height) = source.dimensions();
        debug!(
            algorithm = %self.algorithm,
            strength = self.strength,
            serpentine = self.serpentine,
            width,
            height,
            "dithering"
        );
        let mut out = RgbaImage::new(width, height);
        if width == 0 || height == 0 {
            return out;
        }

        let lut = linear_lut();
        let targets = palette_linear();
        let kernel = self.algorithm.kernel();
        let (w, h) = (width as i64, height as i64);

        let mut work: Vec<[f32; 3]> = source
            .pixels()
            .map(|p| [lut[p[0] as usize], lut[p[1] as usize], lut[p[2] as usize]])
            .collect();

        for y in 0..h {
            let reversed = self.serpentine && y % 2 == 1;
            for step in 0..w {
                let x = if reversed { w - 1 - step } else { step };
                let idx = (y * w + x) as usize;

                if source.as_raw()[idx * 4 + 3] < ALPHA_CUTOFF {
                    out.put_pixel(x as u32, y as u32, PALETTE[TRANSPARENT_INDEX]);
                    continue;
                }

                let current = work[idx];
                let chosen = nearest(&targets, current);
                out.put_pixel(x as u32, y as u32, PALETTE[chosen]);

                if self.strength <= 0.0 {
                    continue;
                }
                let target = targets[chosen];
                let residual = [
                    current[0] - target[0],
                    current[1] - target[1],
                    current[2] - target[2],
                ];

                for &(dx, dy, numerator) in kernel.taps {
                    let dx = if reversed { -dx } else { dx };
                    let (nx, ny) = (x + i64::from(dx), y + i64::from(dy));
                    if nx < 0 || nx >= w || ny >= h {
                        continue;
                    }
                    let weight = numerator / kernel.divisor * self.strength;
                    let cell = &mut work[(ny * w + nx) as usize];
                    for c in 0..3 {
                        cell[c] += residual[c] * weight;
                    }
                }
            }
        }

        out
    }
}

/// Index of the closest opaque palette entry. The transparent entry is only
/// reachable through the alpha cutoff.
fn nearest(targets: &[[f32; 3]; 4], color: [f32; 3]) -> usize {
    let mut best = 0;
    let mut best_dist = f32::INFINITY;
    for (i, t) in targets.iter().enumerate() {
        if i == TRANSPARENT_INDEX {
            continue;
        }
        let d = (color[0] - t[0]).powi(2) + (color[1] - t[1]).powi(2) + (color[2] - t[2]).powi(2);
        if d < best_dist {
            best = i;
            best_dist = d;
        }
    }
    best
}

fn linear_lut() -> &'static [f32; 256] {
    static LUT: OnceLock<[f32; 256]> = OnceLock::new();
    LUT.get_or_init(|| {
        let mut lut = [0.0f32; 256];
        for (v, slot) in lut.iter_mut().enumerate() {
            let srgb: Srgb<f32> = Srgb::new(v as u8, v as u8, v as u8).into_format();
            let lin: LinSrgb<f32> = srgb.into_linear();
            *slot = lin.red;
        }
        lut
    })
}

fn palette_linear() -> [[f32; 3]; 4] {
    let lut = linear_lut();
    PALETTE.map(|p| [lut[p[0] as usize], lut[p[1] as usize], lut[p[2] as usize]])
}
