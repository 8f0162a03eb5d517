//! Network layers and the pix2pix generator / discriminator pair
//!
//! Layers implement two capabilities: [`Initialize`] (explicit weight
//! initialization, visited once by a network-level traversal) and [`Module`]
//! (forward pass plus named parameters and buffers for checkpointing).

mod layer;
mod patch;
mod unet;

pub use layer::{Activation, BatchNorm2d, Conv2d, ConvTranspose2d, Initialize, Module, INIT_STD};
pub use patch::{DiscriminatorConfig, PatchDiscriminator};
pub use unet::{stage_plan, GeneratorConfig, StageKind, StageSpec, UNetGenerator};
