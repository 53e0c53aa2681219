mod cli;
mod error_fmt;
mod hw;
mod logging;
mod rt;
mod weld;

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use eyre::WrapErr;

use crate::cli::{Cli, Commands, JSON_MODE};
use crate::error_fmt::{exit_code_for_error, format_error_json, humanize};

fn load_config(path: &Path) -> eyre::Result<welder_config::Config> {
    let text = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("read config {}", path.display()))?;
    let cfg = welder_config::load_toml(&text)
        .wrap_err_with(|| format!("invalid configuration in {}", path.display()))?;
    cfg.validate().wrap_err("invalid configuration")?;
    Ok(cfg)
}

fn run(cli: Cli) -> eyre::Result<()> {
    let cfg = load_config(&cli.config)?;
    logging::init(cli.json, &cli.log_level, &cfg.logging)?;
    tracing::debug!(config = %cli.config.display(), "config loaded");

    match cli.cmd {
        Commands::Run { rt } => {
            let shutdown = Arc::new(AtomicBool::new(false));
            let flag = Arc::clone(&shutdown);
            ctrlc::set_handler(move || flag.store(true, Ordering::Release))
                .wrap_err("install Ctrl-C handler")?;
            weld::run_serve(&cfg, &rt, shutdown)
        }
        Commands::Fire { weld: overrides, rt } => {
            weld::run_fire(&cfg, &overrides, &rt).map(|_| ())
        }
        Commands::SelfCheck => {
            let summary = weld::self_check(&cfg)?;
            if cli.json {
                println!("{}", serde_json::json!({ "self_check": "ok", "detail": summary }));
            } else {
                println!("{summary}");
            }
            Ok(())
        }
        Commands::Health => {
            let backend = if cfg!(all(feature = "hardware", target_os = "linux")) {
                "hardware"
            } else {
                "sim"
            };
            if cli.json {
                println!(
                    "{}",
                    serde_json::json!({
                        "status": "ok",
                        "version": env!("CARGO_PKG_VERSION"),
                        "backend": backend,
                    })
                );
            } else {
                println!("ok: welder {} ({backend})", env!("CARGO_PKG_VERSION"));
            }
            Ok(())
        }
    }
}

fn main() {
    let _ = color_eyre::install();
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);

    if let Err(err) = run(cli) {
        let code = exit_code_for_error(&err);
        tracing::error!(error = %err, code, "welder failed");
        if JSON_MODE.get().copied().unwrap_or(false) {
            println!("{}", format_error_json(&err));
        } else {
            eprintln!("{}", humanize(&err));
        }
        std::process::exit(code);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn load_config_parses_and_validates() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cfg.toml");
        fs::write(&path, "[pins]\nssr = 17\ntrigger = 27\n[weld]\ntarget_energy_ws = 220.0\n").unwrap();
        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.pins.ssr, 17);
        assert_eq!(cfg.weld.target_energy_ws, 220.0);
    }

    #[test]
    fn load_config_names_the_file_on_parse_errors() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        fs::write(&path, "[pins\nssr = ").unwrap();
        let err = load_config(&path).unwrap_err();
        let text = format!("{err:#}");
        assert!(text.contains("invalid configuration in"), "{text}");
        assert!(text.contains("broken.toml"), "{text}");
    }
}
