use anyhow::Result;
use clap::Parser;
use davsync::cli::Cli;
use davsync::config::{default_config_dir, default_config_file, AppConfig};
use davsync::core::{ProgressObserver, SyncEngine};
use davsync::logging::{get_log_dir, init_logging};
use davsync::render::{print_plan, print_summary, BarRenderer};
use davsync::storage::create_storage;
use std::process::ExitCode;
use std::sync::Arc;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            tracing::error!("{:#}", e);
            eprintln!("错误: {:#}", e);
            ExitCode::from(2)
        }
    }
}

/// 返回同步是否全部成功
async fn run(cli: Cli) -> Result<bool> {
    let config_path = cli.config.clone().unwrap_or_else(default_config_file);
    let mut config = AppConfig::load_file(&config_path);
    cli.apply_overrides(&mut config.sync);

    // guard 持有到进程结束
    let _guard = init_logging(&get_log_dir(&default_config_dir()), &config.log, cli.verbose);
    for problem in &config.problems {
        tracing::warn!("{}", problem);
    }
    tracing::debug!("同步配置: {:?}", config.sync);

    if cli.save_config {
        config.save_file(&config_path)?;
        tracing::info!("配置已保存到 {}", config_path.display());
    }

    let (source_config, dest_config) = cli.storage_configs()?;
    let origin = create_storage(&source_config, &config.sync).await?;
    let target = create_storage(&dest_config, &config.sync).await?;

    let engine = SyncEngine::with_config(config.sync.clone());
    let plan = engine.plan(origin.as_ref(), target.as_ref()).await?;

    if cli.dry_run {
        print_plan(&plan);
        return Ok(true);
    }

    let renderer = Arc::new(if cli.no_progress || cli.json {
        BarRenderer::hidden()
    } else {
        BarRenderer::new(plan.nr_jobs_total)
    });
    let observer: Arc<dyn ProgressObserver> = renderer.clone();

    let report = engine.execute(plan, origin, target, observer).await;
    renderer.finish();

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_summary(&report);
    }

    Ok(report.is_success())
}
