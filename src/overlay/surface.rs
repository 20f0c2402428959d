//! CPU-side paint surface with the two compositing modes annotations need.
//!
//! Each annotation is rasterized into a coverage [`Mask`] first and then
//! composited onto the surface in one pass. Compositing per annotation
//! (rather than per stamped disc) keeps translucent strokes a uniform
//! alpha where stamps overlap, and gives destination-out a clean,
//! single-application cut.
//!
//! The surface is cleared and fully repainted on every redraw; previous
//! pixel content is never read back for positioning.

use bevy::prelude::*;
use image::{Rgba, RgbaImage};

use super::annotation::CompositeOp;

/// Per-annotation coverage bitmap (255 = covered)
pub struct Mask {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Mask {
    pub fn new(size: UVec2) -> Self {
        Self {
            width: size.x,
            height: size.y,
            data: vec![0; (size.x * size.y) as usize],
        }
    }

    fn set(&mut self, x: i32, y: i32) {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return;
        }
        self.data[(y as u32 * self.width + x as u32) as usize] = 255;
    }

    fn covered(&self, x: u32, y: u32) -> bool {
        self.data[(y * self.width + x) as usize] != 0
    }

    /// Adds a filled disc, sampling pixel centers.
    pub fn add_disc(&mut self, center: Vec2, radius: f32) {
        let radius = radius.max(0.5);
        let min_x = (center.x - radius).floor() as i32;
        let max_x = (center.x + radius).ceil() as i32;
        let min_y = (center.y - radius).floor() as i32;
        let max_y = (center.y + radius).ceil() as i32;
        let r_sq = radius * radius;
        for y in min_y..=max_y {
            for x in min_x..=max_x {
                let dx = x as f32 + 0.5 - center.x;
                let dy = y as f32 + 0.5 - center.y;
                if dx * dx + dy * dy <= r_sq {
                    self.set(x, y);
                }
            }
        }
    }

    /// Adds a stroked polyline as discs stamped along each segment.
    pub fn add_polyline(&mut self, points: &[Vec2], radius: f32) {
        let Some(first) = points.first() else {
            return;
        };
        self.add_disc(*first, radius);
        for window in points.windows(2) {
            let (a, b) = (window[0], window[1]);
            let length = a.distance(b);
            let step = (radius * 0.5).max(0.75);
            let count = (length / step).ceil() as u32;
            for i in 1..=count {
                let t = i as f32 / count as f32;
                self.add_disc(a.lerp(b, t), radius);
            }
        }
    }

    /// Adds a filled polygon, even-odd rule, scanline at pixel centers.
    pub fn add_polygon(&mut self, points: &[Vec2]) {
        if points.len() < 3 {
            return;
        }
        let mut crossings: Vec<f32> = Vec::new();
        for y in 0..self.height as i32 {
            let scan_y = y as f32 + 0.5;
            crossings.clear();
            for i in 0..points.len() {
                let a = points[i];
                let b = points[(i + 1) % points.len()];
                // Half-open interval so shared vertices count once
                if (a.y <= scan_y) != (b.y <= scan_y) {
                    let t = (scan_y - a.y) / (b.y - a.y);
                    crossings.push(a.x + t * (b.x - a.x));
                }
            }
            crossings.sort_unstable_by(|a, b| a.total_cmp(b));
            for pair in crossings.chunks_exact(2) {
                let start = (pair[0] - 0.5).ceil() as i32;
                let end = ((pair[1] - 0.5).floor()) as i32;
                for x in start..=end {
                    self.set(x, y);
                }
            }
        }
    }
}

/// One overlay drawing surface backed by an RGBA pixel buffer.
pub struct Surface {
    image: RgbaImage,
}

impl Surface {
    pub fn new(size: UVec2) -> Self {
        Self {
            image: RgbaImage::new(size.x.max(1), size.y.max(1)),
        }
    }

    pub fn size(&self) -> UVec2 {
        UVec2::new(self.image.width(), self.image.height())
    }

    /// Recreates the backing store. Destroys pixel content, which is why
    /// the scheduler defers it mid-stroke.
    pub fn resize(&mut self, size: UVec2) {
        self.image = RgbaImage::new(size.x.max(1), size.y.max(1));
    }

    pub fn clear(&mut self) {
        for pixel in self.image.pixels_mut() {
            *pixel = Rgba([0, 0, 0, 0]);
        }
    }

    pub fn data(&self) -> &[u8] {
        self.image.as_raw()
    }

    pub fn pixel(&self, x: u32, y: u32) -> Rgba<u8> {
        *self.image.get_pixel(x, y)
    }

    /// Composites a coverage mask in a single pass.
    pub fn composite(&mut self, mask: &Mask, color: Rgba<u8>, op: CompositeOp) {
        let size = self.size();
        if mask.width != size.x || mask.height != size.y {
            return;
        }
        for y in 0..size.y {
            for x in 0..size.x {
                if mask.covered(x, y) {
                    match op {
                        CompositeOp::SourceOver => self.blend_over(x, y, color),
                        CompositeOp::DestinationOut => self.cut(x, y, color.0[3]),
                    }
                }
            }
        }
    }

    fn blend_over(&mut self, x: u32, y: u32, color: Rgba<u8>) {
        let dst = self.image.get_pixel_mut(x, y);
        let sa = color.0[3] as f32 / 255.0;
        let da = dst.0[3] as f32 / 255.0;
        let out_a = sa + da * (1.0 - sa);
        if out_a <= 0.0 {
            *dst = Rgba([0, 0, 0, 0]);
            return;
        }
        for c in 0..3 {
            let sc = color.0[c] as f32;
            let dc = dst.0[c] as f32;
            dst.0[c] = ((sc * sa + dc * da * (1.0 - sa)) / out_a).round() as u8;
        }
        dst.0[3] = (out_a * 255.0).round() as u8;
    }

    fn cut(&mut self, x: u32, y: u32, strength: u8) {
        let dst = self.image.get_pixel_mut(x, y);
        let keep = 1.0 - strength as f32 / 255.0;
        dst.0[3] = (dst.0[3] as f32 * keep).round() as u8;
        if dst.0[3] == 0 {
            *dst = Rgba([0, 0, 0, 0]);
        }
    }

    /// 1-pixel line, used for open-path previews and cursor adornments.
    pub fn draw_line(&mut self, a: Vec2, b: Vec2, color: Rgba<u8>) {
        let steps = (b - a).abs().max_element().ceil().max(1.0) as u32;
        for i in 0..=steps {
            let p = a.lerp(b, i as f32 / steps as f32);
            self.plot(p.x.round() as i32, p.y.round() as i32, color);
        }
    }

    pub fn draw_path(&mut self, points: &[Vec2], color: Rgba<u8>) {
        for window in points.windows(2) {
            self.draw_line(window[0], window[1], color);
        }
    }

    /// Ring outline; `dashed` alternates drawn and skipped arc segments.
    pub fn draw_circle(&mut self, center: Vec2, radius: f32, color: Rgba<u8>, dashed: bool) {
        let radius = radius.max(1.0);
        // ~1.5 px arc per step, dashes of 4 steps
        let steps = ((std::f32::consts::TAU * radius) / 1.5).ceil().max(16.0) as u32;
        let dash = 4;
        for i in 0..steps {
            if dashed && (i / dash) % 2 == 1 {
                continue;
            }
            let angle = std::f32::consts::TAU * i as f32 / steps as f32;
            let p = center + Vec2::new(angle.cos(), angle.sin()) * radius;
            self.plot(p.x.round() as i32, p.y.round() as i32, color);
        }
    }

    pub fn draw_crosshair(&mut self, center: Vec2, arm: f32, color: Rgba<u8>) {
        self.draw_line(center - Vec2::new(arm, 0.0), center + Vec2::new(arm, 0.0), color);
        self.draw_line(center - Vec2::new(0.0, arm), center + Vec2::new(0.0, arm), color);
    }

    /// Small filled disc for vertex markers.
    pub fn fill_disc(&mut self, center: Vec2, radius: f32, color: Rgba<u8>) {
        let mut mask = Mask::new(self.size());
        mask.add_disc(center, radius);
        self.composite(&mask, color, CompositeOp::SourceOver);
    }

    fn plot(&mut self, x: i32, y: i32, color: Rgba<u8>) {
        let size = self.size();
        if x < 0 || y < 0 || x >= size.x as i32 || y >= size.y as i32 {
            return;
        }
        self.blend_over(x as u32, y as u32, color);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIZE: UVec2 = UVec2::new(64, 64);
    const RED: Rgba<u8> = Rgba([255, 0, 0, 128]);

    #[test]
    fn test_disc_mask_covers_center_not_corner() {
        let mut mask = Mask::new(SIZE);
        mask.add_disc(Vec2::new(32.0, 32.0), 10.0);
        assert!(mask.covered(32, 32));
        assert!(!mask.covered(0, 0));
        assert!(!mask.covered(32, 50));
    }

    #[test]
    fn test_polygon_mask_even_odd() {
        let mut mask = Mask::new(SIZE);
        mask.add_polygon(&[
            Vec2::new(10.0, 10.0),
            Vec2::new(50.0, 10.0),
            Vec2::new(50.0, 50.0),
            Vec2::new(10.0, 50.0),
        ]);
        assert!(mask.covered(30, 30));
        assert!(!mask.covered(5, 30));
        assert!(!mask.covered(55, 30));
    }

    #[test]
    fn test_source_over_paints_translucent_mask() {
        let mut surface = Surface::new(SIZE);
        let mut mask = Mask::new(SIZE);
        mask.add_disc(Vec2::new(32.0, 32.0), 8.0);
        surface.composite(&mask, RED, CompositeOp::SourceOver);

        let px = surface.pixel(32, 32);
        assert_eq!(px.0[0], 255);
        assert_eq!(px.0[3], 128);
        // Untouched pixels stay fully transparent
        assert_eq!(surface.pixel(0, 0).0[3], 0);
    }

    #[test]
    fn test_overlapping_stamps_stay_uniform() {
        // A polyline is one mask, so overlapping discs along it must not
        // double-blend
        let mut surface = Surface::new(SIZE);
        let mut mask = Mask::new(SIZE);
        mask.add_polyline(&[Vec2::new(10.0, 32.0), Vec2::new(54.0, 32.0)], 6.0);
        surface.composite(&mask, RED, CompositeOp::SourceOver);

        assert_eq!(surface.pixel(20, 32).0[3], 128);
        assert_eq!(surface.pixel(32, 32).0[3], 128);
        assert_eq!(surface.pixel(44, 32).0[3], 128);
    }

    #[test]
    fn test_destination_out_cuts_hole() {
        let mut surface = Surface::new(SIZE);
        let mut fill = Mask::new(SIZE);
        fill.add_polygon(&[
            Vec2::new(8.0, 8.0),
            Vec2::new(56.0, 8.0),
            Vec2::new(56.0, 56.0),
            Vec2::new(8.0, 56.0),
        ]);
        surface.composite(&fill, RED, CompositeOp::SourceOver);

        let mut hole = Mask::new(SIZE);
        hole.add_disc(Vec2::new(32.0, 32.0), 8.0);
        surface.composite(&hole, Rgba([0, 0, 0, 255]), CompositeOp::DestinationOut);

        assert_eq!(surface.pixel(32, 32).0[3], 0);
        // Outside the hole the fill survives
        assert_eq!(surface.pixel(12, 12).0[3], 128);
    }

    #[test]
    fn test_replay_order_matters() {
        // fill-then-erase leaves a hole; erase-then-fill does not
        let fill_points = [
            Vec2::new(8.0, 8.0),
            Vec2::new(56.0, 8.0),
            Vec2::new(56.0, 56.0),
            Vec2::new(8.0, 56.0),
        ];

        let mut fill_first = Surface::new(SIZE);
        let mut fill = Mask::new(SIZE);
        fill.add_polygon(&fill_points);
        let mut hole = Mask::new(SIZE);
        hole.add_disc(Vec2::new(32.0, 32.0), 8.0);

        fill_first.composite(&fill, RED, CompositeOp::SourceOver);
        fill_first.composite(&hole, Rgba([0, 0, 0, 255]), CompositeOp::DestinationOut);

        let mut erase_first = Surface::new(SIZE);
        erase_first.composite(&hole, Rgba([0, 0, 0, 255]), CompositeOp::DestinationOut);
        erase_first.composite(&fill, RED, CompositeOp::SourceOver);

        assert_eq!(fill_first.pixel(32, 32).0[3], 0);
        assert_eq!(erase_first.pixel(32, 32).0[3], 128);
    }

    #[test]
    fn test_partial_erase_strength() {
        let mut surface = Surface::new(SIZE);
        let mut fill = Mask::new(SIZE);
        fill.add_disc(Vec2::new(32.0, 32.0), 12.0);
        surface.composite(&fill, Rgba([255, 0, 0, 255]), CompositeOp::SourceOver);

        let mut half = Mask::new(SIZE);
        half.add_disc(Vec2::new(32.0, 32.0), 6.0);
        surface.composite(&half, Rgba([0, 0, 0, 128]), CompositeOp::DestinationOut);

        let px = surface.pixel(32, 32);
        assert!(px.0[3] > 120 && px.0[3] < 135);
    }

    #[test]
    fn test_resize_clears_content() {
        let mut surface = Surface::new(SIZE);
        let mut mask = Mask::new(SIZE);
        mask.add_disc(Vec2::new(32.0, 32.0), 8.0);
        surface.composite(&mask, RED, CompositeOp::SourceOver);

        surface.resize(UVec2::new(128, 128));
        assert_eq!(surface.size(), UVec2::new(128, 128));
        assert_eq!(surface.pixel(32, 32).0[3], 0);
    }

    #[test]
    fn test_out_of_bounds_drawing_is_clipped() {
        let mut surface = Surface::new(SIZE);
        surface.draw_line(Vec2::new(-20.0, 32.0), Vec2::new(90.0, 32.0), RED);
        surface.draw_circle(Vec2::new(0.0, 0.0), 30.0, RED, false);
        // No panic and in-bounds pixels were written
        assert!(surface.pixel(32, 32).0[3] > 0);
    }
}
