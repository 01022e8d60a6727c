use std::path::Path;

use tanden_media::{BlazePoseModel, PoseModel};
use tanden_worker::WorkerConfig;

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = WorkerConfig::from_env();

    println!(
        "worker-selfcheck: starting with downloads_root={}",
        config.pipeline.downloads_root.display()
    );
    ensure_downloads_root(&config.pipeline.downloads_root)?;
    ensure_model(&config)?;

    println!("worker-selfcheck: ok");
    Ok(())
}

fn ensure_downloads_root(path: &Path) -> anyhow::Result<()> {
    std::fs::create_dir_all(path)
        .map_err(|e| anyhow::anyhow!("downloads root {} not writable: {}", path.display(), e))?;
    Ok(())
}

fn ensure_model(config: &WorkerConfig) -> anyhow::Result<()> {
    let mut model = BlazePoseModel::new(&config.model)
        .map_err(|e| anyhow::anyhow!("pose model unavailable: {}", e))?;
    model.close();
    Ok(())
}
