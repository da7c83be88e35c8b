use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use ninjagen::BuildMode;

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum BuildType {
    /// Unoptimized, with debug info
    Debug,

    /// Optimized
    Release,
}

impl Display for BuildType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BuildType::Debug => "debug",
            BuildType::Release => "release",
        };
        write!(f, "{s}")
    }
}

impl From<BuildType> for BuildMode {
    fn from(build_type: BuildType) -> Self {
        match build_type {
            BuildType::Debug => BuildMode::Debug,
            BuildType::Release => BuildMode::Release,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "ninjagen")]
#[command(about = "Generates ninja build scripts from a project manifest")]
#[command(version)]
pub struct Args {
    /// Target triple (defaults to the host)
    #[arg(long, value_name = "triple")]
    pub target: Option<String>,

    /// System root the target is built against
    #[arg(long, value_name = "dir")]
    pub sysroot: Option<PathBuf>,

    /// Toolchain whose `bin` directory holds the compilers
    #[arg(long, value_name = "dir")]
    pub toolchain: Option<PathBuf>,

    /// Bootstrap directory holding previously built dependencies
    #[arg(long, value_name = "dir")]
    pub bootstrap: Option<PathBuf>,

    /// Installation prefix
    #[arg(long, value_name = "dir", default_value = "/usr")]
    pub prefix: String,

    /// Build type to use
    #[arg(long, value_name = "build type", default_value_t = BuildType::Debug)]
    pub buildtype: BuildType,

    /// Build directory (defaults to `Build` in the source directory)
    #[arg(long, value_name = "dir")]
    pub build_dir: Option<PathBuf>,

    /// Set script variables (can be used multiple times)
    #[arg(short = 'D', value_name = "name=value")]
    pub define: Vec<Define>,

    /// Regenerate from a saved configuration instead of the other flags
    #[arg(long, value_name = "config", num_args = 0..=1)]
    pub reconfigure: Option<Option<PathBuf>>,

    /// Pass verbose flags to the tools and log more
    #[arg(short, long)]
    pub verbose: bool,

    /// Source directory (defaults to current directory if not specified)
    #[arg(default_value = ".")]
    pub source_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Define {
    pub key: String,
    pub value: String,
}

impl FromStr for Define {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (key, value) = s.split_once("=").context("No value specified for variable")?;
        Ok(Define {
            key: key.to_string(),
            value: value.to_string(),
        })
    }
}

pub fn parse() -> Args {
    Args::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["ninjagen"]).unwrap();
        assert_eq!(args.buildtype, BuildType::Debug);
        assert_eq!(args.prefix, "/usr");
        assert_eq!(args.source_dir, PathBuf::from("."));
        assert!(args.reconfigure.is_none());
    }

    #[test]
    fn test_sub_project_arguments() {
        let args = Args::try_parse_from([
            "ninjagen",
            "--target=armv7-unknown-linux-gnueabihf",
            "--sysroot=/sysroot",
            "--buildtype",
            "release",
            "-D",
            "XCTEST_BUILD_DIR=/xctest",
        ])
        .unwrap();
        assert_eq!(args.target.as_deref(), Some("armv7-unknown-linux-gnueabihf"));
        assert_eq!(args.sysroot, Some(PathBuf::from("/sysroot")));
        assert_eq!(BuildMode::from(args.buildtype), BuildMode::Release);
        assert_eq!(
            args.define,
            [Define {
                key: "XCTEST_BUILD_DIR".into(),
                value: "/xctest".into(),
            }]
        );
    }

    #[test]
    fn test_reconfigure() {
        let args = Args::try_parse_from(["ninjagen", "--reconfigure"]).unwrap();
        assert_eq!(args.reconfigure, Some(None));

        let args =
            Args::try_parse_from(["ninjagen", "--reconfigure", "Build/.ninjagen.toml"]).unwrap();
        assert_eq!(
            args.reconfigure,
            Some(Some(PathBuf::from("Build/.ninjagen.toml")))
        );
    }

    #[test]
    fn test_define_needs_value() {
        assert!("NAME".parse::<Define>().is_err());
        assert_eq!(
            "A=b=c".parse::<Define>().unwrap(),
            Define {
                key: "A".into(),
                value: "b=c".into(),
            }
        );
    }
}
