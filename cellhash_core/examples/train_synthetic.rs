//! Trains a hash encoder on synthetic marker-gene data and annotates the
//! held-out cells.
//!
//! Run with: cargo run --example train_synthetic [config.toml]

use anyhow::Context;
use cellhash_core::{
    gene_gradients, rank_genes, CellHashConfig, DataModule, HashModel, Split, SyntheticConfig,
    SyntheticExpression, Trainer,
};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let mut config = match std::env::args().nth(1) {
        Some(path) => CellHashConfig::load_from_file(&path)
            .with_context(|| format!("loading configuration from {path}"))?,
        None => {
            let mut config = CellHashConfig::default();
            // small enough to finish in seconds
            config.model.bit = 32;
            config.model.n_layers = 3;
            config.model.width_scale = 0.05;
            config.optimizer.learning_rate = 1e-3;
            config.training.max_epochs = 40;
            config.training.check_val_every_n_epoch = 5;
            config
        }
    };
    config.evaluation.measure_retrieval = true;
    config.evaluation.top_k.get_or_insert(50);

    let data = SyntheticExpression::generate(&SyntheticConfig::default())?
        .into_data_module(config.training.batch_size)?;
    println!(
        "{} classes, {} features, train counts {:?}",
        data.n_class(),
        data.n_features(),
        data.samples_in_each_class()
    );

    let mut model = HashModel::new(data.n_class(), data.n_features(), &config.model)?;
    let mut trainer = Trainer::new(config);
    let result = trainer.fit(&mut model, &data)?;
    println!(
        "best epoch {} with validation median F1 {:.3}",
        result.best_epoch, result.best_f1_median
    );

    let evaluation = trainer.test(&result.best_model, &data)?;
    let report = &evaluation.report;
    println!("{}", report.class_report);
    println!(
        "accuracy {:.3}  f1 median {:.3}  ari {:.3}",
        report.accuracy, report.f1_median, report.ari
    );
    if let Some(map) = report.map {
        println!(
            "MAP@{:?} {:.3} ({} of {} queries skipped)",
            trainer.config().evaluation.top_k,
            map.map,
            map.skipped_queries,
            map.total_queries
        );
    }
    println!(
        "{} queries in {:.3}s ({:.0} cells/s)",
        evaluation.timing.queries, evaluation.timing.elapsed_secs, evaluation.timing.queries_per_sec
    );

    let gradients = gene_gradients(&result.best_model, &data.batches(Split::Test, None))?;
    for (class, name) in data.class_names().iter().enumerate() {
        let top: Vec<usize> = rank_genes(gradients.row(class)).into_iter().take(5).collect();
        println!("{name}: top genes {top:?}");
    }

    Ok(())
}
