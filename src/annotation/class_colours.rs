use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use image::Rgb;

const SATURATION: f32 = 0.8;
const VALUE: f32 = 1.0;

/// Lazily filled class name -> colour map. Owned by one annotator, so every
/// class keeps the colour it was first given for the rest of the run.
#[derive(Debug, Clone, Default)]
pub struct ClassColours {
    cache: HashMap<String, Rgb<u8>>,
}

impl ClassColours {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn get(&mut self, name: &str) -> Rgb<u8> {
        if let Some(colour) = self.cache.get(name) {
            return *colour;
        }
        let colour = colour_for_name(name);
        self.cache.insert(name.to_string(), colour);
        colour
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

/// Hue in degrees, `[0, 360)`, derived from the class name.
pub fn hue_for(name: &str) -> u32 {
    let mut hasher = DefaultHasher::new();
    name.hash(&mut hasher);
    (hasher.finish() % 360) as u32
}

pub fn colour_for_name(name: &str) -> Rgb<u8> {
    let [r, g, b] = hsv_to_rgb(hue_for(name) as f32 / 360.0, SATURATION, VALUE);
    Rgb([to_channel(r), to_channel(g), to_channel(b)])
}

/// HSV to RGB with every component in `[0, 1]`.
pub fn hsv_to_rgb(h: f32, s: f32, v: f32) -> [f32; 3] {
    if s == 0.0 {
        return [v, v, v];
    }
    let sector = (h * 6.0).floor();
    let f = h * 6.0 - sector;
    let p = v * (1.0 - s);
    let q = v * (1.0 - s * f);
    let t = v * (1.0 - s * (1.0 - f));
    match (sector as i64).rem_euclid(6) {
        0 => [v, t, p],
        1 => [q, v, p],
        2 => [p, v, t],
        3 => [p, q, v],
        4 => [t, p, v],
        _ => [v, p, q],
    }
}

// truncates like an integer cast of `c * 255`
fn to_channel(c: f32) -> u8 {
    (c.clamp(0.0, 1.0) * 255.0) as u8
}
