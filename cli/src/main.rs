use std::process::ExitCode;

use anyhow::Context;
use ninjagen::runtime::Runtime;
use ninjagen::{Configuration, Target};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod cli;
mod manifest;
mod runtime;

use manifest::Manifest;
use runtime::Host;

const MANIFEST: &str = "ninjagen.toml";

fn main() -> ExitCode {
    let args = cli::parse();
    init_logging(args.verbose);

    match run(&args, &Host) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            let code = err
                .downcast_ref::<ninjagen::Error>()
                .map_or(1, ninjagen::Error::exit_code);
            ExitCode::from(u8::try_from(code).unwrap_or(1))
        }
    }
}

fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_env("NINJAGEN_LOG")
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "info" }));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(args: &cli::Args, runtime: &dyn Runtime) -> anyhow::Result<()> {
    let config = configure(args, runtime)?;
    config.write(runtime)?;

    let manifest = Manifest::load(runtime, &config.source_root.join(MANIFEST))?;
    manifest.script()?.generate(&config, runtime)?;
    Ok(())
}

/// Builds the configuration from the command line, or reloads a saved one.
fn configure(args: &cli::Args, runtime: &dyn Runtime) -> anyhow::Result<Configuration> {
    let cwd = runtime.current_dir()?;
    let absolute = |path: &std::path::Path| cwd.join(path.to_string_lossy());

    if let Some(saved) = &args.reconfigure {
        let path = match saved {
            Some(path) => absolute(path.as_path()),
            None => absolute(args.source_dir.as_path()).join("Build/.ninjagen.toml"),
        };
        info!(%path, "reconfiguring");
        return Ok(Configuration::read(runtime, &path)?);
    }

    let triple = match &args.target {
        Some(triple) => triple.clone(),
        None => Target::default_triple(runtime)?
            .context("Unable to guess a target triple for this host, pass --target")?,
    };

    let mut config = Configuration::new(Target::new(triple), absolute(args.source_dir.as_path()));
    if let Some(dir) = &args.build_dir {
        config.set_build_directory(absolute(dir.as_path()));
    }
    config.build_mode = args.buildtype.into();
    config.verbose = args.verbose;
    config.prefix = args.prefix.clone();
    config.system_root = args.sysroot.as_deref().map(absolute);
    config.toolchain = args.toolchain.as_deref().map(absolute);
    config.bootstrap_directory = args.bootstrap.as_deref().map(absolute);
    config.generator = runtime.current_exe()?.to_string();
    for define in &args.define {
        config
            .variables
            .insert(define.key.clone(), define.value.clone());
    }
    config.locate_tools(runtime);

    Ok(config)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use clap::Parser;
    use tempfile::tempdir;

    use super::*;

    const MANIFEST_TEXT: &str = r#"
[[product]]
name = "Foo"
kind = "static-and-dynamic-library"

[[product.phase]]
kind = "compile-sources"
sources = ["a.c"]
"#;

    #[test]
    fn test_generate_and_reconfigure() {
        let dir = tempdir().unwrap();
        let root = dir.path().to_string_lossy().into_owned();
        fs::write(dir.path().join(MANIFEST), MANIFEST_TEXT).unwrap();

        let args = cli::Args::try_parse_from([
            "ninjagen",
            "--target=x86_64-unknown-linux-gnu",
            "--buildtype=release",
            "-DCUSTOM=1",
            root.as_str(),
        ])
        .unwrap();
        run(&args, &Host).unwrap();

        let script = fs::read_to_string(dir.path().join("build.ninja")).unwrap();
        assert!(script.contains("CUSTOM = 1\n"));
        assert!(script.contains("build Build/Foo/a.c.o: CompileC a.c\n"));
        assert!(script.contains("build Build/Foo/libFoo.a: Archive Build/Foo/a.c.o\n"));
        assert!(script.contains(" --reconfigure Build/.ninjagen.toml\n"));

        let saved = dir.path().join("Build").join(".ninjagen.toml");
        assert!(saved.is_file());

        fs::remove_file(dir.path().join("build.ninja")).unwrap();
        let saved = saved.to_string_lossy().into_owned();
        let args =
            cli::Args::try_parse_from(["ninjagen", "--reconfigure", saved.as_str()]).unwrap();
        run(&args, &Host).unwrap();

        let regenerated = fs::read_to_string(dir.path().join("build.ninja")).unwrap();
        assert_eq!(regenerated, script);
    }

    #[test]
    fn test_missing_manifest() {
        let dir = tempdir().unwrap();
        let root = dir.path().to_string_lossy().into_owned();
        let args = cli::Args::try_parse_from([
            "ninjagen",
            "--target=x86_64-unknown-linux-gnu",
            root.as_str(),
        ])
        .unwrap();

        assert!(run(&args, &Host).is_err());
        assert!(!dir.path().join("build.ninja").exists());
    }
}
