//! View projection.
//!
//! World space is fixed horizontally to `[-1, 1]`; the vertical extent follows
//! the drawable's aspect ratio, `[-h/w, h/w]`, so world units stay square and
//! the origin stays centered for any window shape.

use glam::{Mat4, Vec2, Vec4};

/// Orthographic projection for a `width` x `height` drawable.
///
/// Returns `None` for a zero-sized drawable.
pub fn viewport_projection(width: u32, height: u32) -> Option<Mat4> {
    if width == 0 || height == 0 {
        return None;
    }
    let inv_aspect = height as f32 / width as f32;
    Some(Mat4::orthographic_rh_gl(
        -1.0,
        1.0,
        -inv_aspect,
        inv_aspect,
        -1.0,
        1.0,
    ))
}

/// Maps a drawable pixel position (origin top-left, +Y down) to world space.
///
/// Inverts `projection`; returns `None` for a zero-sized drawable or a
/// non-invertible projection.
pub fn screen_to_world(projection: &Mat4, size: (u32, u32), x: f32, y: f32) -> Option<Vec2> {
    let (width, height) = size;
    if width == 0 || height == 0 || projection.determinant().abs() <= f32::EPSILON {
        return None;
    }

    let ndc_x = x / width as f32 * 2.0 - 1.0;
    let ndc_y = 1.0 - y / height as f32 * 2.0;
    let world = projection.inverse() * Vec4::new(ndc_x, ndc_y, 0.0, 1.0);
    Some(Vec2::new(world.x, world.y) / world.w)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ndc(projection: &Mat4, x: f32, y: f32) -> Vec2 {
        let clip = *projection * Vec4::new(x, y, 0.0, 1.0);
        Vec2::new(clip.x, clip.y) / clip.w
    }

    #[test]
    fn square_drawable_is_identity_in_xy() {
        let p = viewport_projection(64, 64).unwrap();
        assert!(ndc(&p, 0.3, -0.7).abs_diff_eq(Vec2::new(0.3, -0.7), 1e-6));
    }

    #[test]
    fn wide_drawable_halves_vertical_extent() {
        let p = viewport_projection(200, 100).unwrap();
        assert!(ndc(&p, 0.0, 0.5).abs_diff_eq(Vec2::new(0.0, 1.0), 1e-6));
        assert!(ndc(&p, 1.0, 0.0).abs_diff_eq(Vec2::new(1.0, 0.0), 1e-6));
    }

    #[test]
    fn zero_size_has_no_projection() {
        assert!(viewport_projection(0, 10).is_none());
        assert!(viewport_projection(10, 0).is_none());
    }

    #[test]
    fn screen_corners_map_to_world_extent() {
        let p = viewport_projection(200, 100).unwrap();
        let tl = screen_to_world(&p, (200, 100), 0.0, 0.0).unwrap();
        let br = screen_to_world(&p, (200, 100), 200.0, 100.0).unwrap();
        assert!(tl.abs_diff_eq(Vec2::new(-1.0, 0.5), 1e-5));
        assert!(br.abs_diff_eq(Vec2::new(1.0, -0.5), 1e-5));
    }

    #[test]
    fn screen_center_is_world_origin() {
        let p = viewport_projection(320, 240).unwrap();
        let c = screen_to_world(&p, (320, 240), 160.0, 120.0).unwrap();
        assert!(c.abs_diff_eq(Vec2::ZERO, 1e-5));
    }

    proptest! {
        #[test]
        fn horizontal_extent_is_always_unit(w in 1u32..8192, h in 1u32..8192) {
            let p = viewport_projection(w, h).unwrap();
            prop_assert!((ndc(&p, -1.0, 0.0).x + 1.0).abs() < 1e-5);
            prop_assert!((ndc(&p, 1.0, 0.0).x - 1.0).abs() < 1e-5);
        }

        #[test]
        fn vertical_extent_follows_inverse_aspect(w in 1u32..8192, h in 1u32..8192) {
            let p = viewport_projection(w, h).unwrap();
            let extent = h as f32 / w as f32;
            prop_assert!((ndc(&p, 0.0, extent).y - 1.0).abs() < 1e-4);
            prop_assert!((ndc(&p, 0.0, -extent).y + 1.0).abs() < 1e-4);
        }

        #[test]
        fn view_stays_centered(w in 1u32..8192, h in 1u32..8192) {
            let p = viewport_projection(w, h).unwrap();
            prop_assert!(ndc(&p, 0.0, 0.0).length() < 1e-6);
        }
    }
}
