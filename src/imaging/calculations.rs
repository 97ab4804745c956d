//! Pure calculation functions for image dimensions.
//!
//! All functions here are pure and testable without any I/O or images.

/// Bounds on the longer and shorter edge of an output image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeBounds {
    pub max_long: u32,
    pub max_short: u32,
}

/// Calculate the dimensions an image must be scaled to so that it fits
/// inside `bounds`, preserving orientation and aspect ratio.
///
/// Returns `None` when the image already fits and no resize is needed.
/// Scaled edges are truncated toward zero, never below 1px.
///
/// # Examples
/// ```
/// # use photo_slim::imaging::{SizeBounds, calculate_bounded_dimensions};
/// let bounds = SizeBounds { max_long: 1600, max_short: 1200 };
/// // Landscape, long edge over the limit
/// assert_eq!(calculate_bounded_dimensions((2000, 1000), bounds), Some((1600, 800)));
/// // Portrait keeps its orientation
/// assert_eq!(calculate_bounded_dimensions((1000, 2000), bounds), Some((800, 1600)));
/// // Already small enough
/// assert_eq!(calculate_bounded_dimensions((800, 600), bounds), None);
/// ```
pub fn calculate_bounded_dimensions(
    original: (u32, u32),
    bounds: SizeBounds,
) -> Option<(u32, u32)> {
    let (width, height) = original;
    let portrait = height > width;
    let (long, short) = if portrait {
        (height, width)
    } else {
        (width, height)
    };

    if long <= bounds.max_long && short <= bounds.max_short {
        return None;
    }

    // Scale by the tighter of max_long/long and max_short/short, kept as an
    // integer fraction so the limiting edge lands exactly on its bound.
    let short = short.max(1);
    let long_is_tighter =
        bounds.max_long as u64 * short as u64 <= bounds.max_short as u64 * long as u64;
    let (num, den) = if long_is_tighter {
        (bounds.max_long as u64, long as u64)
    } else {
        (bounds.max_short as u64, short as u64)
    };

    let long = ((long as u64 * num / den) as u32).max(1);
    let short = ((short as u64 * num / den) as u32).max(1);

    if portrait {
        Some((short, long))
    } else {
        Some((long, short))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bounds(max_long: u32, max_short: u32) -> SizeBounds {
        SizeBounds {
            max_long,
            max_short,
        }
    }

    #[test]
    fn landscape_limited_by_long_edge() {
        // 2000x1000, long limit 1600 → 1600x800
        assert_eq!(
            calculate_bounded_dimensions((2000, 1000), bounds(1600, 1200)),
            Some((1600, 800))
        );
    }

    #[test]
    fn portrait_limited_by_long_edge() {
        assert_eq!(
            calculate_bounded_dimensions((1000, 2000), bounds(1600, 1200)),
            Some((800, 1600))
        );
    }

    #[test]
    fn limited_by_short_edge() {
        // 4000x3000: long ratio 0.96, short ratio 0.72 → short wins
        assert_eq!(
            calculate_bounded_dimensions((4000, 3000), bounds(3840, 2160)),
            Some((2880, 2160))
        );
    }

    #[test]
    fn square_uses_the_tighter_bound() {
        assert_eq!(
            calculate_bounded_dimensions((3000, 3000), bounds(3840, 2160)),
            Some((2160, 2160))
        );
    }

    #[test]
    fn within_bounds_needs_no_resize() {
        assert_eq!(calculate_bounded_dimensions((1600, 800), bounds(1600, 1200)), None);
        assert_eq!(calculate_bounded_dimensions((10, 10), bounds(1600, 1200)), None);
    }

    #[test]
    fn scaled_edge_truncates() {
        // 3001x1000 → ratio 1600/3001 → 1000 * 0.5331... = 533.15 → 533
        assert_eq!(
            calculate_bounded_dimensions((3001, 1000), bounds(1600, 1200)),
            Some((1600, 533))
        );
    }

    #[test]
    fn extreme_panorama_keeps_at_least_one_pixel() {
        assert_eq!(
            calculate_bounded_dimensions((100_000, 10), bounds(1000, 1000)),
            Some((1000, 1))
        );
    }

    #[test]
    fn aspect_ratio_is_preserved() {
        let (w, h) = calculate_bounded_dimensions((6000, 4000), bounds(3000, 3000)).unwrap();
        assert_eq!((w, h), (3000, 2000));
    }
}
