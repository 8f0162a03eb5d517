//! Checkpoint persistence
//!
//! Generator and discriminator snapshots are written as SafeTensors files
//! named by network and epoch.

mod checkpoint;

pub use checkpoint::{
    checkpoint_path, load_checkpoint, save_checkpoint, CheckpointMetadata, NetworkKind,
};
