/// Binary per-pixel mask of changed pixels, samples 0 or 255.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChangeMask {
    data: Vec<u8>,
    width: u32,
    height: u32,
}

const SET: u8 = 255;

impl ChangeMask {
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Self {
        debug_assert_eq!(data.len(), (width as usize) * (height as usize));
        debug_assert!(data.iter().all(|&v| v == 0 || v == SET));
        Self {
            data,
            width,
            height,
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn count_set(&self) -> usize {
        self.data.iter().filter(|&&v| v == SET).count()
    }

    /// Fraction of pixels set, 0.0 for an empty mask.
    pub fn set_ratio(&self) -> f64 {
        if self.data.is_empty() {
            return 0.0;
        }
        self.count_set() as f64 / self.data.len() as f64
    }
}

/// 3×3 morphological opening: erosion followed by dilation.
///
/// Removes isolated set pixels and thin speckle while leaving solid blobs
/// of at least 3×3 intact.
pub fn open3x3(mask: &ChangeMask) -> ChangeMask {
    dilate3x3(&erode3x3(mask))
}

/// A pixel survives erosion iff every in-bounds neighbor in its 3×3
/// window is set. Out-of-bounds neighbors are ignored (replicate
/// semantics), so blobs touching the frame edge are not eaten.
pub fn erode3x3(mask: &ChangeMask) -> ChangeMask {
    apply3x3(mask, |all, _any| all)
}

/// A pixel is set after dilation iff any in-bounds neighbor in its 3×3
/// window is set.
pub fn dilate3x3(mask: &ChangeMask) -> ChangeMask {
    apply3x3(mask, |_all, any| any)
}

fn apply3x3(mask: &ChangeMask, keep: impl Fn(bool, bool) -> bool) -> ChangeMask {
    let w = mask.width as isize;
    let h = mask.height as isize;
    let mut out = vec![0u8; mask.data.len()];

    for y in 0..h {
        for x in 0..w {
            let mut all = true;
            let mut any = false;
            for dy in -1..=1 {
                for dx in -1..=1 {
                    let ny = y + dy;
                    let nx = x + dx;
                    if ny < 0 || ny >= h || nx < 0 || nx >= w {
                        continue;
                    }
                    let set = mask.data[(ny * w + nx) as usize] == SET;
                    all &= set;
                    any |= set;
                }
            }
            if keep(all, any) {
                out[(y * w + x) as usize] = SET;
            }
        }
    }
    ChangeMask::new(out, mask.width, mask.height)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mask_from(rows: &[&[u8]]) -> ChangeMask {
        let height = rows.len() as u32;
        let width = rows[0].len() as u32;
        let data = rows
            .iter()
            .flat_map(|r| r.iter().map(|&v| if v != 0 { SET } else { 0 }))
            .collect();
        ChangeMask::new(data, width, height)
    }

    #[test]
    fn test_opening_removes_isolated_pixel() {
        let mask = mask_from(&[
            &[0, 0, 0, 0, 0],
            &[0, 0, 0, 0, 0],
            &[0, 0, 1, 0, 0],
            &[0, 0, 0, 0, 0],
            &[0, 0, 0, 0, 0],
        ]);
        assert_eq!(open3x3(&mask).count_set(), 0);
    }

    #[test]
    fn test_opening_preserves_solid_block() {
        let mask = mask_from(&[
            &[0, 0, 0, 0, 0],
            &[0, 1, 1, 1, 0],
            &[0, 1, 1, 1, 0],
            &[0, 1, 1, 1, 0],
            &[0, 0, 0, 0, 0],
        ]);
        assert_eq!(open3x3(&mask), mask);
    }

    #[test]
    fn test_opening_preserves_block_touching_edge() {
        let mask = mask_from(&[
            &[1, 1, 1, 0, 0],
            &[1, 1, 1, 0, 0],
            &[1, 1, 1, 0, 0],
            &[0, 0, 0, 0, 0],
            &[0, 0, 0, 0, 0],
        ]);
        assert_eq!(open3x3(&mask), mask);
    }

    #[test]
    fn test_opening_removes_thin_line() {
        let mask = mask_from(&[
            &[0, 0, 0, 0, 0],
            &[0, 0, 0, 0, 0],
            &[1, 1, 1, 1, 1],
            &[0, 0, 0, 0, 0],
            &[0, 0, 0, 0, 0],
        ]);
        assert_eq!(open3x3(&mask).count_set(), 0);
    }

    #[test]
    fn test_erode_shrinks_block_border() {
        let mask = mask_from(&[
            &[0, 0, 0, 0, 0],
            &[0, 1, 1, 1, 0],
            &[0, 1, 1, 1, 0],
            &[0, 1, 1, 1, 0],
            &[0, 0, 0, 0, 0],
        ]);
        let eroded = erode3x3(&mask);
        assert_eq!(eroded.count_set(), 1);
        assert_eq!(eroded.data()[2 * 5 + 2], SET);
    }

    #[test]
    fn test_dilate_grows_single_pixel() {
        let mask = mask_from(&[
            &[0, 0, 0],
            &[0, 1, 0],
            &[0, 0, 0],
        ]);
        assert_eq!(dilate3x3(&mask).count_set(), 9);
    }

    #[test]
    fn test_full_mask_survives_opening() {
        let mask = ChangeMask::new(vec![SET; 16], 4, 4);
        assert_eq!(open3x3(&mask), mask);
    }

    #[test]
    fn test_set_ratio() {
        let mask = mask_from(&[&[1, 1, 0, 0]]);
        assert!((mask.set_ratio() - 0.5).abs() < f64::EPSILON);
        let empty = ChangeMask::new(Vec::new(), 0, 0);
        assert_eq!(empty.set_ratio(), 0.0);
    }
}
