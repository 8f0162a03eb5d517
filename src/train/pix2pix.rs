//! Adversarial pix2pix trainer
//!
//! Every batch runs a discriminator step and then a generator step, in that
//! order, with no skipping. Each network is mutated only by its own optimizer.

use crate::autograd::{add, backward, no_grad, scale, Context};
use crate::cli::{log, LogLevel};
use crate::data::DataLoader;
use crate::io::{checkpoint_path, save_checkpoint, CheckpointMetadata, NetworkKind};
use crate::nn::{Module, PatchDiscriminator, UNetGenerator};
use crate::optim::{Adam, Optimizer};
use crate::train::{BCEWithLogitsLoss, Batch, L1Loss, LossFn};
use crate::{Error, Result, Tensor};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Instant;

/// Hyperparameters of an adversarial training run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainConfig {
    pub epochs: usize,
    pub lr: f32,
    pub beta1: f32,
    pub beta2: f32,
    /// Weight of the L1 reconstruction term
    pub l1_lambda: f32,
    /// Checkpoint every this many epochs (and at the final epoch)
    pub save_interval: usize,
    /// Log every this many batches
    pub log_interval: usize,
    pub checkpoint_dir: PathBuf,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            epochs: 200,
            lr: 2e-4,
            beta1: 0.5,
            beta2: 0.999,
            l1_lambda: 100.0,
            save_interval: 10,
            log_interval: 50,
            checkpoint_dir: PathBuf::from("checkpoints"),
        }
    }
}

impl TrainConfig {
    /// Whether `epoch` (1-based) ends with a checkpoint
    pub fn is_checkpoint_epoch(&self, epoch: usize) -> bool {
        epoch == self.epochs || (self.save_interval > 0 && epoch % self.save_interval == 0)
    }
}

/// Generator loss components of one step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeneratorLosses {
    /// BCE of the discriminator's verdict on generated images against "real"
    pub adversarial: f32,
    /// L1 distance to the target, already multiplied by `l1_lambda`
    pub reconstruction: f32,
    pub total: f32,
}

/// Losses of one full (discriminator, generator) step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepLosses {
    pub discriminator: f32,
    pub generator: GeneratorLosses,
}

/// Per-epoch means and step counts
#[derive(Debug, Clone, PartialEq)]
pub struct EpochSummary {
    pub epoch: usize,
    pub batches: usize,
    pub discriminator_steps: usize,
    pub generator_steps: usize,
    pub mean_discriminator_loss: f32,
    pub mean_generator_loss: f32,
    pub mean_adversarial_loss: f32,
    pub mean_reconstruction_loss: f32,
    /// Checkpoint files written at the end of this epoch
    pub checkpoints: Vec<PathBuf>,
}

/// Result of a training run
#[derive(Debug, Clone)]
pub struct TrainingReport {
    pub epochs: Vec<EpochSummary>,
    pub discriminator_steps: usize,
    pub generator_steps: usize,
    /// Total training time in seconds
    pub elapsed_secs: f64,
}

impl TrainingReport {
    /// Every checkpoint written during the run, in order
    pub fn checkpoints(&self) -> impl Iterator<Item = &PathBuf> {
        self.epochs.iter().flat_map(|e| e.checkpoints.iter())
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Cursor {
    epoch: usize,
    batch: usize,
}

/// Orchestrates adversarial updates of a U-Net generator and a PatchGAN discriminator
pub struct Pix2PixTrainer {
    generator: UNetGenerator,
    discriminator: PatchDiscriminator,
    opt_g: Adam,
    opt_d: Adam,
    adversarial: BCEWithLogitsLoss,
    reconstruction: L1Loss,
    config: TrainConfig,
    ctx: Context,
    log_level: LogLevel,
    cursor: Cursor,
    discriminator_steps: usize,
    generator_steps: usize,
}

impl Pix2PixTrainer {
    /// Create a trainer; both networks are switched to training mode
    pub fn new(
        mut generator: UNetGenerator,
        mut discriminator: PatchDiscriminator,
        config: TrainConfig,
        mut ctx: Context,
    ) -> Self {
        ctx.train();
        generator.set_training(true);
        discriminator.set_training(true);
        let adam = || Adam::new(config.lr, config.beta1, config.beta2, 1e-8);
        Self {
            generator,
            discriminator,
            opt_g: adam(),
            opt_d: adam(),
            adversarial: BCEWithLogitsLoss,
            reconstruction: L1Loss,
            config,
            ctx,
            log_level: LogLevel::Normal,
            cursor: Cursor::default(),
            discriminator_steps: 0,
            generator_steps: 0,
        }
    }

    /// Set console verbosity
    pub fn with_log_level(mut self, level: LogLevel) -> Self {
        self.log_level = level;
        self
    }

    pub fn generator(&self) -> &UNetGenerator {
        &self.generator
    }

    pub fn discriminator(&self) -> &PatchDiscriminator {
        &self.discriminator
    }

    pub fn config(&self) -> &TrainConfig {
        &self.config
    }

    /// Consume the trainer, keeping the trained generator
    pub fn into_generator(self) -> UNetGenerator {
        self.generator
    }

    /// (discriminator, generator) optimizer steps taken so far
    pub fn step_counts(&self) -> (usize, usize) {
        (self.discriminator_steps, self.generator_steps)
    }

    fn check_finite(&self, value: f32, what: &'static str) -> Result<f32> {
        if value.is_finite() {
            Ok(value)
        } else {
            Err(Error::NonFinite {
                epoch: self.cursor.epoch,
                batch: self.cursor.batch,
                what,
            })
        }
    }

    fn labels(logits: &Tensor, value: f32) -> Tensor {
        Tensor::full(&logits.shape(), value, false)
    }

    /// One discriminator update on `batch`; returns the discriminator loss
    ///
    /// loss_D = 0.5 * (BCE(D(src, real), 1) + BCE(D(src, G(src)), 0)), where the
    /// generated image is observational only and passes no gradient to G.
    pub fn discriminator_step(&mut self, batch: &Batch) -> Result<f32> {
        let params = self.discriminator.parameters();
        self.opt_d.zero_grad(&params);

        let fake = no_grad(|| self.generator.forward(&batch.source));

        let real_logits = self.discriminator.score(&batch.source, &batch.target);
        let loss_real = self
            .adversarial
            .forward(&real_logits, &Self::labels(&real_logits, 1.0));
        let fake_logits = self.discriminator.score(&batch.source, &fake);
        let loss_fake = self
            .adversarial
            .forward(&fake_logits, &Self::labels(&fake_logits, 0.0));

        let loss = scale(&add(&loss_real, &loss_fake), 0.5);
        let value = self.check_finite(loss.item(), "discriminator loss")?;

        backward(&loss, None);
        self.opt_d.step(&params);
        self.discriminator_steps += 1;
        Ok(value)
    }

    /// One generator update on `batch` with a fresh forward pass
    ///
    /// loss_G = BCE(D(src, G(src)), 1) + l1_lambda * L1(G(src), real)
    pub fn generator_step(&mut self, batch: &Batch) -> Result<GeneratorLosses> {
        let params = self.generator.parameters();
        self.opt_g.zero_grad(&params);

        let fake = self.generator.forward(&batch.source);
        let logits = self.discriminator.score(&batch.source, &fake);
        let adversarial = self.adversarial.forward(&logits, &Self::labels(&logits, 1.0));
        let reconstruction = scale(
            &self.reconstruction.forward(&fake, &batch.target),
            self.config.l1_lambda,
        );
        let total = add(&adversarial, &reconstruction);

        let losses = GeneratorLosses {
            adversarial: adversarial.item(),
            reconstruction: reconstruction.item(),
            total: self.check_finite(total.item(), "generator loss")?,
        };

        backward(&total, None);
        self.opt_g.step(&params);
        self.generator_steps += 1;
        Ok(losses)
    }

    /// Discriminator step then generator step on the same batch
    pub fn train_step(&mut self, batch: &Batch) -> Result<StepLosses> {
        let discriminator = self.discriminator_step(batch)?;
        let generator = self.generator_step(batch)?;
        Ok(StepLosses { discriminator, generator })
    }

    /// Train over one shuffled pass of `loader`, checkpointing if `epoch` calls for it
    pub fn train_epoch(&mut self, loader: &DataLoader, epoch: usize) -> Result<EpochSummary> {
        let (d_before, g_before) = self.step_counts();
        let num_batches = loader.num_batches();
        let (mut sum_d, mut sum_g, mut sum_adv, mut sum_rec) = (0.0f32, 0.0f32, 0.0f32, 0.0f32);
        let mut batches = 0;

        for (i, batch) in loader.epoch(self.ctx.rng())?.enumerate() {
            let batch = batch?;
            self.cursor = Cursor { epoch, batch: i };
            let losses = self.train_step(&batch)?;

            sum_d += losses.discriminator;
            sum_g += losses.generator.total;
            sum_adv += losses.generator.adversarial;
            sum_rec += losses.generator.reconstruction;
            batches += 1;

            if i % self.config.log_interval.max(1) == 0 {
                log(
                    self.log_level,
                    LogLevel::Normal,
                    &format!(
                        "Epoch [{epoch:03}/{}] Batch [{i}/{num_batches}] loss_D:{:.4} loss_G:{:.4} (GAN:{:.4} L1:{:.4})",
                        self.config.epochs,
                        losses.discriminator,
                        losses.generator.total,
                        losses.generator.adversarial,
                        losses.generator.reconstruction,
                    ),
                );
            }
        }

        let mean = |sum: f32| if batches > 0 { sum / batches as f32 } else { 0.0 };
        let checkpoints = if self.config.is_checkpoint_epoch(epoch) {
            self.save_checkpoints(epoch)?
        } else {
            Vec::new()
        };

        let (d_after, g_after) = self.step_counts();
        Ok(EpochSummary {
            epoch,
            batches,
            discriminator_steps: d_after - d_before,
            generator_steps: g_after - g_before,
            mean_discriminator_loss: mean(sum_d),
            mean_generator_loss: mean(sum_g),
            mean_adversarial_loss: mean(sum_adv),
            mean_reconstruction_loss: mean(sum_rec),
            checkpoints,
        })
    }

    /// Run every configured epoch (1-based, sequential)
    pub fn train(&mut self, loader: &DataLoader) -> Result<TrainingReport> {
        loader.dataset().ensure_non_empty()?;
        std::fs::create_dir_all(&self.config.checkpoint_dir)?;

        let start = Instant::now();
        let (d_before, g_before) = self.step_counts();
        let mut epochs = Vec::with_capacity(self.config.epochs);

        for epoch in 1..=self.config.epochs {
            let summary = self.train_epoch(loader, epoch)?;
            log(
                self.log_level,
                LogLevel::Verbose,
                &format!(
                    "Epoch {epoch} done: mean loss_D:{:.4} loss_G:{:.4}",
                    summary.mean_discriminator_loss, summary.mean_generator_loss
                ),
            );
            epochs.push(summary);
        }

        let (d_after, g_after) = self.step_counts();
        Ok(TrainingReport {
            epochs,
            discriminator_steps: d_after - d_before,
            generator_steps: g_after - g_before,
            elapsed_secs: start.elapsed().as_secs_f64(),
        })
    }

    fn save_checkpoints(&self, epoch: usize) -> Result<Vec<PathBuf>> {
        let dir = &self.config.checkpoint_dir;
        std::fs::create_dir_all(dir)?;

        let g_path = checkpoint_path(dir, NetworkKind::Generator, epoch);
        let g_meta = CheckpointMetadata::new(NetworkKind::Generator, epoch, self.generator.config())?;
        save_checkpoint(&self.generator, &g_path, &g_meta)?;

        let d_path = checkpoint_path(dir, NetworkKind::Discriminator, epoch);
        let d_meta =
            CheckpointMetadata::new(NetworkKind::Discriminator, epoch, self.discriminator.config())?;
        save_checkpoint(&self.discriminator, &d_path, &d_meta)?;

        log(
            self.log_level,
            LogLevel::Verbose,
            &format!("Saved {} and {}", g_path.display(), d_path.display()),
        );
        Ok(vec![g_path, d_path])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nn::{DiscriminatorConfig, GeneratorConfig};

    fn trainer(dir: &std::path::Path) -> Pix2PixTrainer {
        let mut ctx = Context::with_seed(42);
        let g = UNetGenerator::new(
            GeneratorConfig { in_channels: 1, out_channels: 1, ngf: 4, depth: 3 },
            &mut ctx,
        )
        .unwrap();
        let d = PatchDiscriminator::new(
            DiscriminatorConfig { in_channels: 2, ndf: 4, n_layers: 1 },
            &mut ctx,
        )
        .unwrap();
        let config = TrainConfig {
            epochs: 1,
            checkpoint_dir: dir.to_path_buf(),
            ..TrainConfig::default()
        };
        Pix2PixTrainer::new(g, d, config, ctx).with_log_level(LogLevel::Quiet)
    }

    fn batch(n: usize) -> Batch {
        let source = Tensor::from_shape_vec(
            &[n, 1, 16, 16],
            (0..n * 256).map(|i| ((i % 17) as f32 / 8.0) - 1.0).collect(),
            false,
        )
        .unwrap();
        let target = Tensor::full(&[n, 1, 16, 16], -0.5, false);
        Batch::new(source, target, (0..n).map(|i| i.to_string()).collect())
    }

    fn snapshot(params: &[(String, Tensor)]) -> Vec<Vec<f32>> {
        params.iter().map(|(_, t)| t.to_vec()).collect()
    }

    #[test]
    fn test_discriminator_step_leaves_generator_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let mut t = trainer(dir.path());
        let b = batch(2);

        let g_before = snapshot(&t.generator().named_parameters());
        let d_before = snapshot(&t.discriminator().named_parameters());
        let loss = t.discriminator_step(&b).unwrap();

        assert!(loss.is_finite() && loss > 0.0);
        assert_eq!(snapshot(&t.generator().named_parameters()), g_before);
        assert_ne!(snapshot(&t.discriminator().named_parameters()), d_before);
        assert!(t.generator().parameters().iter().all(|p| p.grad().is_none()));
    }

    #[test]
    fn test_generator_step_leaves_discriminator_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let mut t = trainer(dir.path());
        let b = batch(2);

        let d_before = snapshot(&t.discriminator().named_parameters());
        let g_before = snapshot(&t.generator().named_parameters());
        let losses = t.generator_step(&b).unwrap();

        assert_eq!(snapshot(&t.discriminator().named_parameters()), d_before);
        assert_ne!(snapshot(&t.generator().named_parameters()), g_before);
        assert!((losses.total - (losses.adversarial + losses.reconstruction)).abs() < 1e-3);
    }

    #[test]
    fn test_reconstruction_is_weighted() {
        let dir = tempfile::tempdir().unwrap();
        let mut t = trainer(dir.path());
        let b = batch(1);
        let fake = no_grad(|| t.generator().forward(&b.source));
        let raw_l1 = L1Loss.forward(&fake, &b.target).item();

        let losses = t.generator_step(&b).unwrap();
        assert!((losses.reconstruction - 100.0 * raw_l1).abs() < 1e-2 * (1.0 + raw_l1 * 100.0));
    }

    #[test]
    fn test_train_step_counts_both_updates() {
        let dir = tempfile::tempdir().unwrap();
        let mut t = trainer(dir.path());
        t.train_step(&batch(1)).unwrap();
        t.train_step(&batch(1)).unwrap();
        assert_eq!(t.step_counts(), (2, 2));
    }

    #[test]
    fn test_checkpoint_schedule() {
        let config = TrainConfig { epochs: 25, save_interval: 10, ..TrainConfig::default() };
        let saved: Vec<_> = (1..=25).filter(|&e| config.is_checkpoint_epoch(e)).collect();
        assert_eq!(saved, vec![10, 20, 25]);
    }

    #[test]
    fn test_non_finite_loss_halts() {
        let dir = tempfile::tempdir().unwrap();
        let mut t = trainer(dir.path());
        let mut b = batch(1);
        b.target = Tensor::full(&[1, 1, 16, 16], f32::NAN, false);
        let err = t.train_step(&b).unwrap_err();
        assert!(matches!(err, Error::NonFinite { .. }));
    }
}
