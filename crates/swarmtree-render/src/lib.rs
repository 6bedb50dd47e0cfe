//! Offscreen PNG snapshots of a swarm.
//!
//! Every parent/child edge is drawn as a line coloured by the child's leader
//! hue. Colours add up where lines overlap and are clamped when encoding.

use std::f32::consts::PI;
use std::io::Cursor;

use anyhow::{Result, ensure};
use image::{ImageBuffer, Rgb};
use swarmtree_core::{ParentLink, SwarmWorld, Vec3};
use tracing::trace;

/// Frame size and view extent used for per-iteration images.
pub const FRAME_WIDTH: u32 = 1920;
pub const FRAME_HEIGHT: u32 = 1080;
pub const FRAME_EXTENT: f32 = 80.0;

const LINE_STEPS: u32 = 100;
const TILT: f32 = -PI / 8.0;

/// Camera angle for `iteration`: one full turn every 720 frames.
#[must_use]
pub fn frame_angle(iteration: usize) -> f32 {
    2.0 * PI * iteration as f32 / 720.0
}

/// File name for the image of `iteration`.
#[must_use]
pub fn frame_file_name(iteration: usize) -> String {
    format!("iteration.{iteration:04}.png")
}

/// Converts HSV (all components in 0..=1) to linear RGB.
#[must_use]
pub fn hsv_to_rgb(hue: f32, saturation: f32, value: f32) -> [f32; 3] {
    if saturation <= 0.0 {
        return [value; 3];
    }
    let sector = (hue.rem_euclid(1.0)) * 6.0;
    let i = sector.floor();
    let f = sector - i;
    let p = value * (1.0 - saturation);
    let q = value * (1.0 - saturation * f);
    let t = value * (1.0 - saturation * (1.0 - f));
    match i as u32 {
        0 => [value, t, p],
        1 => [q, value, p],
        2 => [p, value, t],
        3 => [p, q, value],
        4 => [t, p, value],
        _ => [value, p, q],
    }
}

struct Projection {
    half_width: f32,
    half_height: f32,
    scale: f32,
    cos_angle: f32,
    sin_angle: f32,
    cos_tilt: f32,
    sin_tilt: f32,
}

impl Projection {
    fn new(width: u32, height: u32, angle: f32, extent: f32) -> Self {
        Self {
            half_width: width as f32 * 0.5,
            half_height: height as f32 * 0.5,
            scale: width as f32 * 0.5 / extent,
            cos_angle: angle.cos(),
            sin_angle: angle.sin(),
            cos_tilt: TILT.cos(),
            sin_tilt: TILT.sin(),
        }
    }

    /// Rotates about y by the camera angle, tilts about x, then scales to pixels.
    fn project(&self, point: Vec3) -> (f32, f32) {
        let x = point.x * self.cos_angle - point.z * self.sin_angle;
        let z = point.x * self.sin_angle + point.z * self.cos_angle;
        let y = point.y * self.cos_tilt - z * self.sin_tilt;
        (
            self.half_width + x * self.scale,
            self.half_height + y * self.scale,
        )
    }
}

struct Canvas {
    width: u32,
    height: u32,
    pixels: Vec<[f32; 3]>,
}

impl Canvas {
    fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![[0.0; 3]; width as usize * height as usize],
        }
    }

    fn plot(&mut self, x: f32, y: f32, color: [f32; 3]) {
        let (px, py) = ((x + 0.5).floor(), (y + 0.5).floor());
        if px < 0.0 || py < 0.0 || px >= self.width as f32 || py >= self.height as f32 {
            return;
        }
        let pixel = &mut self.pixels[py as usize * self.width as usize + px as usize];
        for (channel, add) in pixel.iter_mut().zip(color) {
            *channel += add;
        }
    }

    fn line(&mut self, projection: &Projection, from: Vec3, to: Vec3, color: [f32; 3]) {
        for step in 0..LINE_STEPS {
            let t = step as f32 / LINE_STEPS as f32;
            let (x, y) = projection.project(from + (to - from) * t);
            self.plot(x, y, color);
        }
    }

    fn encode_png(&self) -> Result<Vec<u8>> {
        let image = ImageBuffer::<Rgb<u8>, Vec<u8>>::from_fn(self.width, self.height, |x, y| {
            let pixel = self.pixels[y as usize * self.width as usize + x as usize];
            Rgb(pixel.map(|c| (c.clamp(0.0, 1.0) * 255.0) as u8))
        });
        let mut bytes = Vec::new();
        image.write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)?;
        Ok(bytes)
    }
}

/// Renders the tree of `world` seen from `angle` (radians about the y axis).
///
/// `extent` is the half-width of the visible region in world units.
pub fn render_png_offscreen(
    world: &SwarmWorld,
    width: u32,
    height: u32,
    angle: f32,
    extent: f32,
) -> Result<Vec<u8>> {
    ensure!(width > 0 && height > 0, "image must have a non-zero size");
    ensure!(extent > 0.0, "view extent must be positive");

    let projection = Projection::new(width, height, angle, extent);
    let mut canvas = Canvas::new(width, height);

    let axis = hsv_to_rgb(0.0, 0.0, 0.5);
    for direction in [
        Vec3::new(extent, 0.0, 0.0),
        Vec3::new(0.0, extent, 0.0),
        Vec3::new(0.0, 0.0, extent),
    ] {
        canvas.line(&projection, -direction, direction, axis);
    }

    let agents = world.agents();
    let positions = agents.positions();
    let mut edges = 0usize;
    for (idx, link) in agents.parents().iter().enumerate() {
        let ParentLink::Node(parent) = *link else {
            continue;
        };
        let hue = agents
            .leader(idx)
            .and_then(|leader| world.leaders().get(leader.id))
            .map_or(0.0, |leader| leader.hue);
        canvas.line(
            &projection,
            positions[idx],
            positions[parent],
            hsv_to_rgb(hue, 1.0, 0.2),
        );
        edges += 1;
    }
    trace!(edges, width, height, "rendered swarm frame");
    canvas.encode_png()
}
