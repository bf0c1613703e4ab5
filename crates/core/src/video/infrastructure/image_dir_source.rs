use std::path::{Path, PathBuf};

use crate::shared::constants::PROFILE_EXTENSIONS;
use crate::shared::frame::Frame;
use crate::video::domain::frame_source::FrameSource;

/// Frame source backed by a directory of still images.
///
/// Files are decoded with the `image` crate and yielded in lexicographic
/// filename order, so a numbered capture sequence plays back in order.
pub struct ImageDirSource {
    files: Vec<PathBuf>,
    next: usize,
}

impl ImageDirSource {
    pub fn open(dir: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let mut files = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_file() && has_image_extension(&path) {
                files.push(path);
            }
        }
        files.sort();
        Ok(Self { files, next: 0 })
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl FrameSource for ImageDirSource {
    fn next_frame(&mut self) -> Result<Option<Frame>, Box<dyn std::error::Error>> {
        let Some(path) = self.files.get(self.next) else {
            return Ok(None);
        };
        let index = self.next;
        self.next += 1;

        let img = image::open(path)
            .map_err(|e| format!("failed to decode {}: {e}", path.display()))?
            .to_rgb8();
        Ok(Some(Frame::from_rgb_image(img, index)))
    }
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            let e = e.to_ascii_lowercase();
            PROFILE_EXTENSIONS.iter().any(|known| *known == e)
        })
        .unwrap_or(false)
}
