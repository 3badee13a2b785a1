//! Dimension planning.
//!
//! Scales original dimensions down to a preset's maxima while preserving
//! the aspect ratio, then rounds both sides down to even integers. Even
//! dimensions are required by the stream video encoder and harmless for
//! stills. Pure and infallible; never upscales.

/// Target dimensions for one piece of media. Always even, always within
/// the maxima they were planned against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannedDimensions {
    pub width: u32,
    pub height: u32,
}

/// Plans target dimensions for media of the given original size.
///
/// Landscape-dominant media is constrained by width first, portrait by
/// height, with the other constraint re-checked afterwards so both hold
/// simultaneously.
pub fn plan(original_w: u32, original_h: u32, max_w: u32, max_h: u32) -> PlannedDimensions {
    if original_w == 0 || original_h == 0 {
        return PlannedDimensions {
            width: 0,
            height: 0,
        };
    }

    let aspect = original_w as f64 / original_h as f64;
    let mut width = original_w as f64;
    let mut height = original_h as f64;

    if original_w > max_w || original_h > max_h {
        if aspect >= 1.0 {
            width = width.min(max_w as f64);
            height = width / aspect;
            if height > max_h as f64 {
                height = max_h as f64;
                width = height * aspect;
            }
        } else {
            height = height.min(max_h as f64);
            width = height * aspect;
            if width > max_w as f64 {
                width = max_w as f64;
                height = width / aspect;
            }
        }
    }

    PlannedDimensions {
        width: even_floor(width),
        height: even_floor(height),
    }
}

fn even_floor(value: f64) -> u32 {
    (value as u32) / 2 * 2
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_landscape_scales_by_width() {
        let dims = plan(4000, 3000, 1080, 1080);
        assert_eq!(dims.width, 1080);
        assert_eq!(dims.height, 810);
    }

    #[test]
    fn test_portrait_scales_by_height_then_rechecks_width() {
        // Height-first gives 1440x1920, which violates the width cap and
        // settles at 1080x1440.
        let dims = plan(3000, 4000, 1080, 1920);
        assert_eq!(dims.width, 1080);
        assert_eq!(dims.height, 1440);
    }

    #[test]
    fn test_tall_story_portrait_fits_exactly() {
        let dims = plan(1080, 2400, 1080, 1920);
        assert_eq!(dims.height, 1920);
        assert_eq!(dims.width, 864);
    }

    #[test]
    fn test_never_upscales() {
        let dims = plan(800, 600, 1080, 1080);
        assert_eq!(dims.width, 800);
        assert_eq!(dims.height, 600);
    }

    #[test]
    fn test_rounds_down_to_even() {
        let dims = plan(1079, 1077, 1080, 1080);
        assert_eq!(dims.width, 1078);
        assert_eq!(dims.height, 1076);
    }

    #[test]
    fn test_extreme_panorama_holds_both_constraints() {
        let dims = plan(10000, 1000, 1080, 1080);
        assert!(dims.width <= 1080 && dims.height <= 1080);
        assert!(dims.width % 2 == 0 && dims.height % 2 == 0);
    }

    #[test]
    fn test_degenerate_inputs() {
        for (w, h) in [(1, 10000), (10000, 1), (1, 1), (0, 500)] {
            let dims = plan(w, h, 1080, 1920);
            assert!(dims.width % 2 == 0, "{w}x{h} gave odd width {}", dims.width);
            assert!(dims.height % 2 == 0, "{w}x{h} gave odd height {}", dims.height);
            assert!(dims.width <= 1080 && dims.height <= 1920);
        }
    }

    #[test]
    fn test_constraints_hold_across_shapes() {
        for w in (100..5000).step_by(467) {
            for h in (100..5000).step_by(467) {
                let dims = plan(w, h, 1080, 1920);
                assert!(dims.width <= 1080 && dims.height <= 1920, "{w}x{h}");
                assert!(dims.width % 2 == 0 && dims.height % 2 == 0, "{w}x{h}");
                assert!(dims.width <= w && dims.height <= h, "{w}x{h} upscaled");
            }
        }
    }
}
