//! Reference training and test loop.
//!
//! The trainer only talks to data through [`DataModule`] and to the model
//! through its encoder and centers. Metrics are computed with the same
//! evaluation entry points callers use directly.

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::checkpoint::Checkpointable;
use crate::config::{CellHashConfig, OptimizerKind};
use crate::data::{Batch, DataModule, Split};
use crate::error::{HashError, HashResult};
use crate::evaluation::{compute_metrics, compute_metrics_with_retrieval, Evaluation};
use crate::export::{write_code_tables, write_retrieval_results};
use crate::hashing::class_balance_weights;
use crate::logging::{log_epoch, log_evaluation};
use crate::model::HashModel;
use crate::neural::{
    hash_loss, hash_loss_with_gradients, AdamOptimizer, HashEncoder, Optimizer, SgdOptimizer,
    StepLr,
};

/// Summary of one validated epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochMetrics {
    pub epoch: usize,
    pub train_loss: f64,
    pub val_loss: f64,
    pub val_accuracy: f64,
    pub val_f1_median: f64,
    pub val_f1_weighted: f64,
    pub train_f1_median: f64,
    pub learning_rate: f32,
}

/// Outcome of [`Trainer::fit`].
#[derive(Clone)]
pub struct TrainingResult {
    /// One entry per validated epoch
    pub history: Vec<EpochMetrics>,
    pub best_epoch: usize,
    pub best_f1_median: f64,
    /// Snapshot taken at `best_epoch`
    pub best_model: HashModel,
    pub epochs_completed: usize,
}

/// Drives optimisation, validation, checkpointing and testing.
pub struct Trainer {
    config: CellHashConfig,
    optimizer: Optimizer,
    schedule: StepLr,
}

impl Trainer {
    pub fn new(config: CellHashConfig) -> Self {
        let opt = &config.optimizer;
        let optimizer = match opt.kind {
            OptimizerKind::Adam => {
                Optimizer::Adam(AdamOptimizer::new(opt.learning_rate, opt.weight_decay))
            }
            OptimizerKind::Sgd => Optimizer::Sgd(SgdOptimizer::new(
                opt.learning_rate,
                opt.momentum,
                opt.weight_decay,
            )),
        };
        let schedule = StepLr::new(opt.learning_rate, opt.decay_every, opt.lr_decay);

        Self {
            config,
            optimizer,
            schedule,
        }
    }

    pub fn config(&self) -> &CellHashConfig {
        &self.config
    }

    /// Trains `model` in place and returns the history plus the best snapshot.
    ///
    /// The last epoch is always validated, so the result always has a best
    /// model even when `max_epochs` is not a multiple of the validation period.
    pub fn fit<D: DataModule>(
        &mut self,
        model: &mut HashModel,
        data: &D,
    ) -> HashResult<TrainingResult> {
        check_compatible(model, data)?;

        let weights = class_balance_weights(
            data.samples_in_each_class(),
            data.n_class(),
            self.config.loss.beta,
        )?;
        let lambda = self.config.loss.lambda;
        let training = self.config.training.clone();
        let seed = model.config().seed;
        let mut dropout_rng = StdRng::seed_from_u64(seed.wrapping_add(1));

        let validation_batches = data.batches(Split::Validation, None);
        if validation_batches.is_empty() {
            return Err(HashError::empty_collection("validation split"));
        }

        tracing::info!(
            epochs = training.max_epochs,
            n_class = data.n_class(),
            parameters = model.encoder().num_parameters(),
            "starting training"
        );

        let mut history = Vec::new();
        let mut best: Option<(usize, f64, HashModel)> = None;
        let mut validations_without_improvement = 0;
        let mut epochs_completed = 0;

        for epoch in 0..training.max_epochs {
            self.optimizer
                .set_learning_rate(self.schedule.learning_rate(epoch));

            let batches = data.batches(Split::Train, Some(seed.wrapping_add(epoch as u64)));
            let mut loss_sum = 0.0f64;
            for batch in &batches {
                let raw = model
                    .encoder_mut()
                    .forward_train(batch.features.view(), &mut dropout_rng)?;
                let (loss, grad) = hash_loss_with_gradients(
                    raw.view(),
                    &batch.labels,
                    model.centers(),
                    weights.view(),
                    lambda,
                )?;
                let gradients = model.encoder().backward(&grad)?;
                model
                    .encoder_mut()
                    .apply_gradients(&gradients, &mut self.optimizer)?;
                loss_sum += f64::from(loss.total);
            }
            model.encoder_mut().clear_cache();
            epochs_completed = epoch + 1;

            let is_last = epoch + 1 == training.max_epochs;
            if (epoch + 1) % training.check_val_every_n_epoch != 0 && !is_last {
                continue;
            }

            let train_loss = loss_sum / batches.len().max(1) as f64;
            let val_loss = mean_loss(model, &validation_batches, &weights, lambda)?;
            let execution = self.config.evaluation.execution;
            let validation =
                compute_metrics(model, &validation_batches, data.class_names(), execution)?;
            let train_eval = compute_metrics(
                model,
                &data.batches(Split::Train, None),
                data.class_names(),
                execution,
            )?;

            let metrics = EpochMetrics {
                epoch,
                train_loss,
                val_loss,
                val_accuracy: validation.report.accuracy,
                val_f1_median: validation.report.f1_median,
                val_f1_weighted: validation.report.f1_weighted,
                train_f1_median: train_eval.report.f1_median,
                learning_rate: self.optimizer.learning_rate(),
            };
            tracing::info!(
                epoch,
                train_loss,
                val_loss,
                val_accuracy = metrics.val_accuracy,
                val_f1_median = metrics.val_f1_median,
                train_f1_median = metrics.train_f1_median,
                "validated epoch"
            );
            if let Err(err) = log_epoch(&training.log_dir, &metrics) {
                tracing::warn!(error = %err, "failed to append epoch log");
            }

            let improved = match &best {
                Some((_, best_f1, _)) => metrics.val_f1_median > *best_f1,
                None => true,
            };
            if improved {
                tracing::info!(epoch, val_f1_median = metrics.val_f1_median, "new best model");
                self.save_best(model, epoch, metrics.val_f1_median);
                best = Some((epoch, metrics.val_f1_median, model.clone()));
                validations_without_improvement = 0;
            } else {
                validations_without_improvement += 1;
            }
            history.push(metrics);

            if let Some(patience) = training.early_stopping_patience {
                if validations_without_improvement >= patience {
                    tracing::info!(epoch, patience, "early stopping");
                    break;
                }
            }
        }

        let (best_epoch, best_f1_median, best_model) =
            best.ok_or_else(|| HashError::empty_collection("validated epochs"))?;
        tracing::info!(best_epoch, best_f1_median, epochs_completed, "training complete");

        Ok(TrainingResult {
            history,
            best_epoch,
            best_f1_median,
            best_model,
            epochs_completed,
        })
    }

    /// Annotates the test split and, in retrieval mode, ranks it against
    /// the training and validation cells.
    pub fn test<D: DataModule>(&self, model: &HashModel, data: &D) -> HashResult<Evaluation> {
        check_compatible(model, data)?;
        let evaluation_config = &self.config.evaluation;
        let query = data.batches(Split::Test, None);

        let evaluation = if evaluation_config.measure_retrieval {
            let mut database = data.batches(Split::Train, None);
            database.extend(data.batches(Split::Validation, None));
            let evaluation = compute_metrics_with_retrieval(
                model,
                &query,
                &database,
                data.class_names(),
                evaluation_config.execution,
                evaluation_config.top_k,
            )?;

            if let Some(dir) = &evaluation_config.output_dir {
                if let Some(ranked) = evaluation.ranked_database_labels(evaluation_config.top_k)? {
                    if let Err(err) =
                        write_retrieval_results(dir, &ranked, &evaluation.query.labels)
                    {
                        tracing::warn!(error = %err, "failed to write retrieval artifacts");
                    }
                }
                if let Some(database) = &evaluation.database {
                    if let Err(err) = write_code_tables(dir, database, &evaluation.query) {
                        tracing::warn!(error = %err, "failed to write code tables");
                    }
                }
            }
            evaluation
        } else {
            compute_metrics(model, &query, data.class_names(), evaluation_config.execution)?
        };

        tracing::info!(
            accuracy = evaluation.report.accuracy,
            f1_median = evaluation.report.f1_median,
            ari = evaluation.report.ari,
            map = evaluation.report.map.map(|score| score.map),
            "test evaluation"
        );
        tracing::info!("\n{}", evaluation.report.class_report);
        if let Err(err) = log_evaluation(&self.config.training.log_dir, "test", &evaluation) {
            tracing::warn!(error = %err, "failed to append evaluation log");
        }

        Ok(evaluation)
    }

    fn save_best(&self, model: &HashModel, epoch: usize, f1_median: f64) {
        let Some(dir) = &self.config.training.checkpoint_dir else {
            return;
        };
        let path = dir.join(checkpoint_file_name(epoch, f1_median));
        match model.save_checkpoint(&path) {
            Ok(()) => tracing::info!(path = %path.display(), "saved checkpoint"),
            Err(err) => tracing::warn!(error = %err, "failed to save checkpoint"),
        }
    }
}

/// File name of the checkpoint written for a new best epoch.
pub fn checkpoint_file_name(epoch: usize, f1_median: f64) -> String {
    format!("cellhash-epoch={:02}-median_f1={:.3}.bin", epoch, f1_median)
}

fn check_compatible<D: DataModule>(model: &HashModel, data: &D) -> HashResult<()> {
    if data.n_class() != model.n_class() {
        return Err(HashError::shape_mismatch(
            model.n_class(),
            data.n_class(),
            "data module class count",
        ));
    }
    if data.n_features() != model.encoder().n_features() {
        return Err(HashError::shape_mismatch(
            model.encoder().n_features(),
            data.n_features(),
            "data module feature count",
        ));
    }
    Ok(())
}

/// Mean batch loss without dropout.
fn mean_loss(
    model: &HashModel,
    batches: &[Batch],
    weights: &ndarray::Array1<f32>,
    lambda: f32,
) -> HashResult<f64> {
    let mut sum = 0.0f64;
    for batch in batches {
        let raw = model.encoder().forward_batch(batch.features.view())?;
        let loss = hash_loss(raw.view(), &batch.labels, model.centers(), weights.view(), lambda)?;
        sum += f64::from(loss.total);
    }
    Ok(sum / batches.len().max(1) as f64)
}
