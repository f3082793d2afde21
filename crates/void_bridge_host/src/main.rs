//! Void Engine script host
//!
//! Run with: cargo run -p void_bridge_host -- [--scene scene.toml] [--module path] [--static] [--frames N]

use std::path::PathBuf;
use void_bridge_host::host::{interrupt_flag, scripted_ids};
use void_bridge_host::{Host, HostError, Result, Scene};

/// Command line overrides
#[derive(Debug, Default)]
struct Args {
    scene: Option<PathBuf>,
    module: Option<PathBuf>,
    static_scripts: bool,
    frames: Option<u64>,
}

impl Args {
    fn parse() -> Result<Self> {
        let mut args = Args::default();
        let mut iter = std::env::args().skip(1);

        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--scene" => args.scene = Some(PathBuf::from(value(&mut iter, &arg)?)),
                "--module" => args.module = Some(PathBuf::from(value(&mut iter, &arg)?)),
                "--static" => args.static_scripts = true,
                "--frames" => {
                    let raw = value(&mut iter, &arg)?;
                    let frames = raw
                        .parse()
                        .map_err(|_| HostError::Args(format!("--frames expects a number, got '{}'", raw)))?;
                    args.frames = Some(frames);
                }
                other => return Err(HostError::Args(format!("unknown argument '{}'", other))),
            }
        }

        Ok(args)
    }

    fn apply(self) -> Result<Scene> {
        let mut scene = match &self.scene {
            Some(path) => Scene::load_from_file(path)?,
            None => {
                log::info!("No scene given, using the demo scene");
                Scene::demo()
            }
        };

        if let Some(module) = self.module {
            scene.host.module = module;
            scene.host.static_scripts = false;
        }
        if self.static_scripts {
            scene.host.static_scripts = true;
        }
        if let Some(frames) = self.frames {
            scene.host.frames = frames;
        }
        Ok(scene)
    }
}

fn value(iter: &mut impl Iterator<Item = String>, flag: &str) -> Result<String> {
    iter.next()
        .ok_or_else(|| HostError::Args(format!("{} expects a value", flag)))
}

fn run() -> Result<()> {
    let scene = Args::parse()?.apply()?;
    log::info!(
        "Scene: {} entities, {} scripted, module {}",
        scene.entities.len(),
        scripted_ids(&scene).len(),
        if scene.host.static_scripts {
            "<linked>".to_string()
        } else {
            scene.host.module.display().to_string()
        }
    );

    let running = interrupt_flag();
    let mut host = Host::new(scene)?;
    host.boot()?;
    host.run(&running);
    host.shutdown();
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run() {
        log::error!("{}", e);
        std::process::exit(1);
    }
}
