//! Runs the try-on pipeline on the headless collaborators.
//!
//! Usage: `tryon [frames]`. Without a frame count, runs until interrupted.

use tryon::{
    config::Config,
    headless::{HeadlessConfig, HeadlessPlatform},
    session::Session,
};

fn main() -> anyhow::Result<()> {
    tryon::init_logger!();

    let max_frames = match std::env::args().nth(1) {
        Some(arg) => match arg.parse::<u64>() {
            Ok(frames) => Some(frames),
            Err(_) => {
                eprintln!("usage: tryon [frames]");
                std::process::exit(1);
            }
        },
        None => None,
    };

    let config = Config::from_env();
    let mut platform = HeadlessPlatform::new(HeadlessConfig {
        snapshot_dir: config.snapshot_dir.clone(),
        ..HeadlessConfig::default()
    });

    pollster::block_on(async {
        let mut session = Session::start(&mut platform, config).await?;
        session.run(max_frames).await
    })
}
