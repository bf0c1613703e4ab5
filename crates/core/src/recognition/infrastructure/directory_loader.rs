use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::recognition::domain::face_encoder::FaceEncoder;
use crate::recognition::domain::gallery::{ProfileEntry, ProfileGallery};
use crate::shared::constants::PROFILE_EXTENSIONS;
use crate::shared::frame::Frame;

/// How the profile store directory is organized. An explicit, validated
/// choice rather than filesystem-shape sniffing, so gallery loading is
/// deterministic and testable.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileLayout {
    /// Flat image files named `<label>.<ext>`.
    #[default]
    Flat,
    /// One subdirectory per label, each holding one or more images.
    PerLabel,
}

/// Rebuilds a [`ProfileGallery`] from a directory of labeled face images.
///
/// A rebuild constructs a fresh gallery off to the side and returns it;
/// per-image failures (unreadable file, undecodable image, no detectable
/// face) are logged and skipped, never aborting the pass. Publishing the
/// result is the caller's job via `SharedGallery::replace`.
pub struct DirectoryGalleryLoader {
    root: PathBuf,
    layout: ProfileLayout,
}

impl DirectoryGalleryLoader {
    pub fn new(root: impl Into<PathBuf>, layout: ProfileLayout) -> Self {
        Self {
            root: root.into(),
            layout,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn rebuild(&self, encoder: &dyn FaceEncoder) -> ProfileGallery {
        if !self.root.is_dir() {
            log::warn!(
                "profile directory not found at {}, gallery will be empty",
                self.root.display()
            );
            return ProfileGallery::new();
        }

        let mut entries = Vec::new();
        for (label, path) in self.candidates() {
            if let Some(entry) = load_entry(&label, &path, encoder) {
                entries.push(entry);
            }
        }

        let gallery = ProfileGallery::from_entries(entries);
        log::info!(
            "loaded {} profile entries: {:?}",
            gallery.len(),
            gallery.labels()
        );
        gallery
    }

    /// Candidate (label, image path) pairs in sorted path order, so two
    /// rebuilds of an unchanged source yield identical galleries.
    fn candidates(&self) -> Vec<(String, PathBuf)> {
        match self.layout {
            ProfileLayout::Flat => {
                let mut files = list_images(&self.root);
                files.sort();
                files
                    .into_iter()
                    .filter_map(|path| {
                        let label = path.file_stem()?.to_str()?.to_string();
                        Some((label, path))
                    })
                    .collect()
            }
            ProfileLayout::PerLabel => {
                let mut dirs: Vec<PathBuf> = read_dir_or_empty(&self.root)
                    .into_iter()
                    .filter(|p| p.is_dir())
                    .collect();
                dirs.sort();

                let mut out = Vec::new();
                for dir in dirs {
                    let Some(label) = dir.file_name().and_then(|n| n.to_str()) else {
                        continue;
                    };
                    let mut images = Vec::new();
                    collect_images_recursive(&dir, &mut images);
                    images.sort();
                    out.extend(images.into_iter().map(|p| (label.to_string(), p)));
                }
                out
            }
        }
    }
}

fn load_entry(label: &str, path: &Path, encoder: &dyn FaceEncoder) -> Option<ProfileEntry> {
    let image = match image::open(path) {
        Ok(img) => img,
        Err(e) => {
            log::warn!("skipping profile image {}: {e}", path.display());
            return None;
        }
    };
    let frame = Frame::from_rgb_image(image.to_rgb8(), 0);

    let faces = match encoder.encode(&frame) {
        Ok(faces) => faces,
        Err(e) => {
            log::warn!("skipping profile image {}: encoder failed: {e}", path.display());
            return None;
        }
    };
    let Some(face) = faces.first() else {
        log::warn!("skipping profile image {} (no face)", path.display());
        return None;
    };
    if faces.len() > 1 {
        log::debug!(
            "{} faces in profile image {}, using the first",
            faces.len(),
            path.display()
        );
    }

    log::info!("loaded profile {label}: {}", path.display());
    Some(ProfileEntry::new(label, face.embedding.clone()))
}

fn has_profile_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| PROFILE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

fn read_dir_or_empty(dir: &Path) -> Vec<PathBuf> {
    match fs::read_dir(dir) {
        Ok(entries) => entries.flatten().map(|e| e.path()).collect(),
        Err(e) => {
            log::warn!("cannot read {}: {e}", dir.display());
            Vec::new()
        }
    }
}

fn list_images(dir: &Path) -> Vec<PathBuf> {
    read_dir_or_empty(dir)
        .into_iter()
        .filter(|p| p.is_file() && has_profile_extension(p))
        .collect()
}

fn collect_images_recursive(dir: &Path, out: &mut Vec<PathBuf>) {
    for path in read_dir_or_empty(dir) {
        if path.is_dir() {
            collect_images_recursive(&path, out);
        } else if has_profile_extension(&path) {
            out.push(path);
        }
    }
}
