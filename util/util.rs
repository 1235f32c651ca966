#![allow(dead_code)]

use std::sync::OnceLock;

use pngsqueeze::{ColorType, Raster, BIT_DEPTH};
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoroshiro128PlusPlus;

/// A smooth two dimensional gradient with a little noise, like a photograph of the sky.
fn gradient(width: u32, height: u32, seed: u64) -> Raster {
    let mut rng = Xoroshiro128PlusPlus::seed_from_u64(seed);
    let mut data = Vec::with_capacity(width as usize * height as usize * 3);
    for y in 0..height {
        for x in 0..width {
            let r = (x * 255 / width) as u8;
            let g = (y * 255 / height) as u8;
            let b = ((x + y) * 127 / (width + height)) as u8;
            let noise = rng.gen_range(0..8);
            data.extend([r.saturating_add(noise), g.saturating_add(noise), b]);
        }
    }
    Raster::from_vec(width, height, BIT_DEPTH, width as usize * 3, ColorType::Rgb, data)
        .expect("valid raster")
}

/// Flat rectangles with translucent edges, like a screenshot or an icon.
fn blocks(width: u32, height: u32, seed: u64) -> Raster {
    let mut rng = Xoroshiro128PlusPlus::seed_from_u64(seed);
    let colors = (0..24).map(|_| rng.gen::<[u8; 4]>()).collect::<Vec<_>>();
    let mut data = Vec::with_capacity(width as usize * height as usize * 4);
    for y in 0..height {
        for x in 0..width {
            let [r, g, b, a] = colors[((x / 37 + y / 23) % 24) as usize];
            let a = if x % 37 == 0 || y % 23 == 0 { a } else { 255 };
            data.extend([r, g, b, a]);
        }
    }
    Raster::from_vec(width, height, BIT_DEPTH, width as usize * 4, ColorType::Rgba, data)
        .expect("valid raster")
}

/// Uniformly random pixels, the worst case for both clustering and compression.
fn noise(width: u32, height: u32, seed: u64) -> Raster {
    let mut rng = Xoroshiro128PlusPlus::seed_from_u64(seed);
    let data = (0..width as usize * height as usize * 4)
        .map(|_| rng.gen())
        .collect();
    Raster::from_vec(width, height, BIT_DEPTH, width as usize * 4, ColorType::Rgba, data)
        .expect("valid raster")
}

static IMAGES: OnceLock<Vec<(String, Raster)>> = OnceLock::new();

pub fn synthetic_images() -> &'static [(String, Raster)] {
    IMAGES.get_or_init(|| {
        vec![
            ("gradient".to_owned(), gradient(640, 480, 0)),
            ("blocks".to_owned(), blocks(640, 480, 1)),
            ("noise".to_owned(), noise(256, 256, 2)),
        ]
    })
}
