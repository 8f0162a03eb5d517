//! Network checkpoints in SafeTensors format

use crate::nn::Module;
use crate::{Error, Result, Tensor};
use safetensors::tensor::{Dtype, TensorView};
use safetensors::SafeTensors;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Which network a checkpoint belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkKind {
    Generator,
    Discriminator,
}

impl NetworkKind {
    /// File name prefix (`G` / `D`)
    pub fn prefix(self) -> &'static str {
        match self {
            NetworkKind::Generator => "G",
            NetworkKind::Discriminator => "D",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "G" => Some(NetworkKind::Generator),
            "D" => Some(NetworkKind::Discriminator),
            _ => None,
        }
    }
}

impl fmt::Display for NetworkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// `{dir}/G_epoch010.safetensors` style checkpoint path
pub fn checkpoint_path(dir: &Path, kind: NetworkKind, epoch: usize) -> PathBuf {
    dir.join(format!("{}_epoch{epoch:03}.safetensors", kind.prefix()))
}

/// Header metadata stored alongside the tensors
#[derive(Debug, Clone, PartialEq)]
pub struct CheckpointMetadata {
    pub network: NetworkKind,
    pub epoch: usize,
    /// Architecture hyperparameters as JSON
    pub architecture: String,
}

impl CheckpointMetadata {
    pub fn new(network: NetworkKind, epoch: usize, architecture: &impl Serialize) -> Result<Self> {
        let architecture = serde_json::to_string(architecture)
            .map_err(|e| Error::Serialization(format!("architecture metadata: {e}")))?;
        Ok(Self { network, epoch, architecture })
    }

    fn to_map(&self) -> HashMap<String, String> {
        HashMap::from([
            ("network".to_string(), self.network.prefix().to_string()),
            ("epoch".to_string(), self.epoch.to_string()),
            ("architecture".to_string(), self.architecture.clone()),
        ])
    }

    fn from_map(map: &HashMap<String, String>) -> Option<Self> {
        Some(Self {
            network: NetworkKind::parse(map.get("network")?)?,
            epoch: map.get("epoch")?.parse().ok()?,
            architecture: map.get("architecture")?.clone(),
        })
    }
}

fn state_of<M: Module + ?Sized>(module: &M) -> Vec<(String, Tensor)> {
    let mut state = module.named_parameters();
    state.extend(module.named_buffers());
    state
}

/// Write every named parameter and buffer of `module` to `path`
pub fn save_checkpoint<M: Module + ?Sized>(
    module: &M,
    path: &Path,
    metadata: &CheckpointMetadata,
) -> Result<()> {
    let tensor_data: Vec<(String, Vec<u8>, Vec<usize>)> = state_of(module)
        .into_iter()
        .map(|(name, tensor)| {
            let bytes: Vec<u8> = bytemuck::cast_slice(&tensor.to_vec()).to_vec();
            (name, bytes, tensor.shape())
        })
        .collect();

    let views = tensor_data
        .iter()
        .map(|(name, bytes, shape)| {
            TensorView::new(Dtype::F32, shape.clone(), bytes)
                .map(|view| (name.as_str(), view))
                .map_err(|e| Error::Serialization(format!("tensor {name}: {e}")))
        })
        .collect::<Result<Vec<_>>>()?;

    let bytes = safetensors::serialize(views, Some(metadata.to_map()))
        .map_err(|e| Error::Serialization(format!("SafeTensors serialization failed: {e}")))?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, bytes)?;
    Ok(())
}

/// Restore `module` in place from `path`
///
/// Every named parameter and buffer must be present with the same shape.
/// Returns the stored metadata when the file carries it.
pub fn load_checkpoint<M: Module + ?Sized>(
    module: &M,
    path: &Path,
) -> Result<Option<CheckpointMetadata>> {
    if !path.exists() {
        return Err(Error::CheckpointNotFound(path.to_path_buf()));
    }
    let incompatible = |reason: String| Error::Checkpoint {
        path: path.to_path_buf(),
        reason,
    };

    let data = std::fs::read(path)?;
    let (_, header) = SafeTensors::read_metadata(&data)
        .map_err(|e| incompatible(format!("SafeTensors parsing failed: {e}")))?;
    let metadata = header.metadata().as_ref().and_then(CheckpointMetadata::from_map);

    let tensors = SafeTensors::deserialize(&data)
        .map_err(|e| incompatible(format!("SafeTensors parsing failed: {e}")))?;

    // Validate every tensor before writing any
    let state = state_of(module);
    let mut values = Vec::with_capacity(state.len());
    for (name, tensor) in &state {
        let view = tensors
            .tensor(name)
            .map_err(|_| incompatible(format!("missing tensor {name}")))?;
        if view.dtype() != Dtype::F32 {
            return Err(incompatible(format!("tensor {name} is {:?}, expected F32", view.dtype())));
        }
        let expected = tensor.shape();
        if view.shape() != expected.as_slice() {
            return Err(incompatible(format!(
                "tensor {name} has shape {:?}, expected {expected:?}",
                view.shape()
            )));
        }
        values.push(bytemuck::pod_collect_to_vec::<u8, f32>(view.data()));
    }

    for ((_, tensor), data) in state.iter().zip(values) {
        let mut dst = tensor.data_mut();
        for (d, v) in dst.iter_mut().zip(data) {
            *d = v;
        }
    }

    Ok(metadata)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::autograd::Context;
    use crate::nn::{DiscriminatorConfig, GeneratorConfig, PatchDiscriminator, UNetGenerator};

    fn generator(seed: u64) -> UNetGenerator {
        UNetGenerator::new(
            GeneratorConfig { in_channels: 1, out_channels: 1, ngf: 4, depth: 3 },
            &mut Context::with_seed(seed),
        )
        .unwrap()
    }

    fn snapshot<M: Module>(m: &M) -> Vec<Vec<f32>> {
        state_of(m).iter().map(|(_, t)| t.to_vec()).collect()
    }

    #[test]
    fn test_checkpoint_path_format() {
        let dir = Path::new("ckpt");
        assert_eq!(
            checkpoint_path(dir, NetworkKind::Generator, 10),
            PathBuf::from("ckpt/G_epoch010.safetensors")
        );
        assert_eq!(
            checkpoint_path(dir, NetworkKind::Discriminator, 200),
            PathBuf::from("ckpt/D_epoch200.safetensors")
        );
    }

    #[test]
    fn test_round_trip_restores_parameters_and_buffers() {
        let dir = tempfile::tempdir().unwrap();
        let path = checkpoint_path(dir.path(), NetworkKind::Generator, 3);
        let saved = generator(1);
        saved.named_buffers()[0].1.data_mut().fill(0.25);
        let meta = CheckpointMetadata::new(NetworkKind::Generator, 3, saved.config()).unwrap();
        save_checkpoint(&saved, &path, &meta).unwrap();

        let restored = generator(2);
        assert_ne!(snapshot(&restored), snapshot(&saved));
        let loaded = load_checkpoint(&restored, &path).unwrap();

        assert_eq!(snapshot(&restored), snapshot(&saved));
        assert_eq!(loaded, Some(meta));
    }

    #[test]
    fn test_missing_file_names_path() {
        let err = load_checkpoint(&generator(0), Path::new("nowhere/G_epoch001.safetensors"))
            .unwrap_err();
        assert!(matches!(&err, Error::CheckpointNotFound(p) if p.ends_with("G_epoch001.safetensors")));
    }

    #[test]
    fn test_wrong_network_is_incompatible() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("D.safetensors");
        let d = PatchDiscriminator::new(DiscriminatorConfig::default(), &mut Context::with_seed(0))
            .unwrap();
        let meta = CheckpointMetadata::new(NetworkKind::Discriminator, 1, d.config()).unwrap();
        save_checkpoint(&d, &path, &meta).unwrap();

        let err = load_checkpoint(&generator(0), &path).unwrap_err();
        assert!(matches!(err, Error::Checkpoint { .. }));
    }

    #[test]
    fn test_incomplete_file_leaves_module_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.safetensors");

        // every tensor but the last, filled with a recognisable value
        let mut state = state_of(&generator(1));
        state.pop();
        let data: Vec<(String, Vec<u8>, Vec<usize>)> = state
            .iter()
            .map(|(name, t)| {
                let values = vec![7.0f32; t.len()];
                (name.clone(), bytemuck::cast_slice(&values).to_vec(), t.shape())
            })
            .collect();
        let views: Vec<_> = data
            .iter()
            .map(|(name, bytes, shape)| {
                (name.as_str(), TensorView::new(Dtype::F32, shape.clone(), bytes).unwrap())
            })
            .collect();
        std::fs::write(&path, safetensors::serialize(views, None).unwrap()).unwrap();

        let target = generator(2);
        let before = snapshot(&target);
        let err = load_checkpoint(&target, &path).unwrap_err();
        assert!(matches!(&err, Error::Checkpoint { reason, .. } if reason.contains("missing tensor")));
        assert_eq!(snapshot(&target), before);
    }

    #[test]
    fn test_garbage_file_is_incompatible() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.safetensors");
        std::fs::write(&path, b"not valid safetensors binary data").unwrap();
        assert!(matches!(
            load_checkpoint(&generator(0), &path),
            Err(Error::Checkpoint { .. })
        ));
    }
}
