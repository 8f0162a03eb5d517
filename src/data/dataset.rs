//! Paired source/target glyph images keyed by file name

use super::transform::{image_to_array, load_gray};
use crate::{Error, Result};
use ndarray::Array3;
use std::fmt;
use std::path::{Path, PathBuf};

/// One normalized training example: `(key, source [1, H, W], target [1, H, W])`
pub type Sample = (String, Array3<f32>, Array3<f32>);

#[derive(Debug, Clone)]
struct Pair {
    key: String,
    source: PathBuf,
    target: PathBuf,
}

/// Why a source image was left out of the dataset
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// No same-named file in the target directory
    MissingTarget(PathBuf),
    /// Both files exist but their sizes differ
    DimensionMismatch {
        source: (u32, u32),
        target: (u32, u32),
    },
}

/// A source image excluded at construction time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedPair {
    pub source: PathBuf,
    pub reason: SkipReason,
}

impl fmt::Display for SkippedPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reason {
            SkipReason::MissingTarget(target) => write!(
                f,
                "Warning: Target image {} not found for source {}. Skipping.",
                target.display(),
                self.source.display()
            ),
            SkipReason::DimensionMismatch { source, target } => write!(
                f,
                "Warning: {} is {}x{} but its target is {}x{}. Skipping.",
                self.source.display(),
                source.0,
                source.1,
                target.0,
                target.1
            ),
        }
    }
}

/// Index of matched `*.png` files in a source and a target directory
///
/// Built once before training and immutable afterwards. Pairs are ordered by
/// file name; the key of a pair is its file stem (`"65"` for `65.png`).
#[derive(Debug, Clone)]
pub struct PairedDataset {
    source_dir: PathBuf,
    target_dir: PathBuf,
    pairs: Vec<Pair>,
    skipped: Vec<SkippedPair>,
}

fn is_png(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("png"))
}

impl PairedDataset {
    /// Scan `source_dir` and keep every image with a same-sized partner in `target_dir`
    ///
    /// Excluded sources are reported on stderr and kept in [`Self::skipped`].
    pub fn new(source_dir: impl AsRef<Path>, target_dir: impl AsRef<Path>) -> Result<Self> {
        let source_dir = source_dir.as_ref().to_path_buf();
        let target_dir = target_dir.as_ref().to_path_buf();

        let mut sources = Vec::new();
        for entry in std::fs::read_dir(&source_dir)? {
            let path = entry?.path();
            if is_png(&path) {
                sources.push(path);
            }
        }
        sources.sort();

        let mut pairs = Vec::with_capacity(sources.len());
        let mut skipped = Vec::new();

        for source in sources {
            let Some(file_name) = source.file_name() else {
                continue;
            };
            let target = target_dir.join(file_name);

            let reason = if !target.exists() {
                Some(SkipReason::MissingTarget(target.clone()))
            } else {
                let src_dim = image::image_dimensions(&source)?;
                let tgt_dim = image::image_dimensions(&target)?;
                (src_dim != tgt_dim).then_some(SkipReason::DimensionMismatch {
                    source: src_dim,
                    target: tgt_dim,
                })
            };

            match reason {
                Some(reason) => {
                    let skip = SkippedPair { source, reason };
                    eprintln!("{skip}");
                    skipped.push(skip);
                }
                None => {
                    let key = source
                        .file_stem()
                        .map(|s| s.to_string_lossy().into_owned())
                        .unwrap_or_default();
                    pairs.push(Pair { key, source, target });
                }
            }
        }

        Ok(Self { source_dir, target_dir, pairs, skipped })
    }

    /// Number of valid pairs
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Fail with [`Error::EmptyDataset`] when no pair survived filtering
    pub fn ensure_non_empty(&self) -> Result<()> {
        if self.is_empty() {
            return Err(Error::EmptyDataset {
                source_dir: self.source_dir.clone(),
                target_dir: self.target_dir.clone(),
            });
        }
        Ok(())
    }

    /// Key of pair `index`
    pub fn key(&self, index: usize) -> Option<&str> {
        self.pairs.get(index).map(|p| p.key.as_str())
    }

    /// Decode and normalize pair `index`
    pub fn get(&self, index: usize) -> Result<Sample> {
        let pair = self.pairs.get(index).ok_or_else(|| {
            Error::Shape(format!("pair index {index} out of range for {} pairs", self.len()))
        })?;
        let source = image_to_array(&load_gray(&pair.source)?);
        let target = image_to_array(&load_gray(&pair.target)?);
        Ok((pair.key.clone(), source, target))
    }

    /// Sources excluded at construction, in file-name order
    pub fn skipped(&self) -> &[SkippedPair] {
        &self.skipped
    }

    pub fn source_dir(&self) -> &Path {
        &self.source_dir
    }

    pub fn target_dir(&self) -> &Path {
        &self.target_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    fn write(dir: &Path, name: &str, size: u32, value: u8) {
        GrayImage::from_pixel(size, size, Luma([value]))
            .save(dir.join(name))
            .unwrap();
    }

    fn dirs() -> (tempfile::TempDir, PathBuf, PathBuf) {
        let root = tempfile::tempdir().unwrap();
        let src = root.path().join("source");
        let tgt = root.path().join("target");
        std::fs::create_dir_all(&src).unwrap();
        std::fs::create_dir_all(&tgt).unwrap();
        (root, src, tgt)
    }

    #[test]
    fn test_pairs_sorted_by_name() {
        let (_root, src, tgt) = dirs();
        for (name, v) in [("67.png", 255), ("65.png", 0), ("66.png", 128)] {
            write(&src, name, 4, v);
            write(&tgt, name, 4, 255 - v);
        }
        std::fs::write(src.join("notes.txt"), "ignored").unwrap();

        let ds = PairedDataset::new(&src, &tgt).unwrap();
        assert_eq!(ds.len(), 3);
        let keys: Vec<_> = (0..3).map(|i| ds.key(i).unwrap()).collect();
        assert_eq!(keys, vec!["65", "66", "67"]);

        let (key, source, target) = ds.get(0).unwrap();
        assert_eq!(key, "65");
        assert_eq!(source.dim(), (1, 4, 4));
        assert!(source.iter().all(|&v| v == -1.0));
        assert!(target.iter().all(|&v| v == 1.0));
    }

    #[test]
    fn test_missing_target_is_skipped_and_named() {
        let (_root, src, tgt) = dirs();
        write(&src, "65.png", 4, 0);
        write(&tgt, "65.png", 4, 0);
        write(&src, "66.png", 4, 0);

        let ds = PairedDataset::new(&src, &tgt).unwrap();
        assert_eq!(ds.len(), 1);
        assert_eq!(ds.skipped().len(), 1);
        assert!(ds.skipped()[0].to_string().contains("66.png"));
        assert!(matches!(ds.skipped()[0].reason, SkipReason::MissingTarget(_)));
    }

    #[test]
    fn test_dimension_mismatch_is_skipped() {
        let (_root, src, tgt) = dirs();
        write(&src, "65.png", 4, 0);
        write(&tgt, "65.png", 8, 0);

        let ds = PairedDataset::new(&src, &tgt).unwrap();
        assert!(ds.is_empty());
        assert_eq!(
            ds.skipped()[0].reason,
            SkipReason::DimensionMismatch { source: (4, 4), target: (8, 8) }
        );
    }

    #[test]
    fn test_empty_dataset_is_detectable() {
        let (_root, src, tgt) = dirs();
        let ds = PairedDataset::new(&src, &tgt).unwrap();
        assert!(ds.is_empty());
        assert!(matches!(ds.ensure_non_empty(), Err(Error::EmptyDataset { .. })));
    }

    #[test]
    fn test_missing_source_dir_is_io_error() {
        let (_root, src, tgt) = dirs();
        let err = PairedDataset::new(src.join("absent"), &tgt).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_source_dir_that_is_a_file_is_io_error() {
        let (_root, src, tgt) = dirs();
        let file = src.join("65.png");
        write(&src, "65.png", 4, 0);
        let err = PairedDataset::new(&file, &tgt).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_png_subdirectory_is_not_a_source() {
        let (_root, src, tgt) = dirs();
        std::fs::create_dir_all(src.join("nested.png")).unwrap();
        write(&src, "65.png", 4, 0);
        write(&tgt, "65.png", 4, 0);
        let ds = PairedDataset::new(&src, &tgt).unwrap();
        assert_eq!(ds.len(), 1);
        assert!(ds.skipped().is_empty());
    }

    #[test]
    fn test_get_out_of_range() {
        let (_root, src, tgt) = dirs();
        let ds = PairedDataset::new(&src, &tgt).unwrap();
        assert!(ds.get(0).is_err());
    }
}
