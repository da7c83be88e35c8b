//! The generator's view of one configure run: target, directories, tools and flags.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::path::Path;
use crate::runtime::Runtime;
use crate::target::Target;

pub const CONFIG_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildMode {
    #[default]
    Debug,
    Release,
}

/// Everything emission needs to know about the environment, passed explicitly to every
/// generation step.
///
/// Created once per invocation and optionally persisted so sub-invocations and
/// `--reconfigure` can reuse it. Paths are stored as absolute strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    pub version: u32,
    pub target: Target,
    pub build_mode: BuildMode,
    pub verbose: bool,

    /// Base that paths in the generated script are made relative to.
    pub working_directory: Path,
    pub source_root: Path,
    pub build_directory: Path,
    pub intermediate_directory: Path,
    pub module_cache_directory: Path,
    pub install_directory: Path,
    pub build_script_path: Path,
    pub config_path: Path,
    pub prefix: String,
    pub system_root: Option<Path>,
    pub toolchain: Option<Path>,
    pub bootstrap_directory: Option<Path>,

    /// Command that regenerates the script, used by the `reconfigure` edge.
    pub generator: String,
    pub clang: String,
    pub clangxx: String,
    pub swift: String,
    pub swiftc: String,
    pub ar: String,
    pub swift_sdk: String,

    pub extra_c_flags: String,
    pub extra_swift_flags: String,
    pub extra_ld_flags: String,

    pub variables: BTreeMap<String, String>,
}

impl Configuration {
    /// Defaults for a tree rooted at `source_root`, building into `<source_root>/Build`.
    pub fn new(target: Target, source_root: impl Into<Path>) -> Self {
        let source_root = source_root.into();
        let build_directory = source_root.join("Build");
        Self {
            version: CONFIG_VERSION,
            target,
            build_mode: BuildMode::default(),
            verbose: false,
            working_directory: source_root.clone(),
            intermediate_directory: build_directory.join("Intermediates"),
            module_cache_directory: build_directory.join("ModuleCache"),
            install_directory: Path::from("/"),
            build_script_path: source_root.join("build.ninja"),
            config_path: build_directory.join(".ninjagen.toml"),
            build_directory,
            source_root,
            prefix: "/usr".into(),
            system_root: None,
            toolchain: None,
            bootstrap_directory: None,
            generator: "ninjagen".into(),
            clang: "clang".into(),
            clangxx: "clang++".into(),
            swift: "swift".into(),
            swiftc: "swiftc".into(),
            ar: "ar".into(),
            swift_sdk: "/usr".into(),
            extra_c_flags: String::new(),
            extra_swift_flags: String::new(),
            extra_ld_flags: String::new(),
            variables: BTreeMap::new(),
        }
    }

    /// Moves the build directory along with everything kept below it.
    pub fn set_build_directory(&mut self, build_directory: impl Into<Path>) {
        let build_directory = build_directory.into();
        self.intermediate_directory = build_directory.join("Intermediates");
        self.module_cache_directory = build_directory.join("ModuleCache");
        self.config_path = build_directory.join(".ninjagen.toml");
        self.build_directory = build_directory;
    }

    /// `path` as it should appear in the generated script.
    pub fn relative(&self, path: &Path) -> String {
        path.relative(&self.working_directory).to_string()
    }

    /// Replaces bare tool names with their location on `PATH` when one is found, preferring
    /// the configured toolchain's `bin` directory.
    pub fn locate_tools(&mut self, runtime: &dyn Runtime) {
        let toolchain_bin = self.toolchain.as_ref().map(|t| t.join("bin"));
        for tool in [
            &mut self.clang,
            &mut self.clangxx,
            &mut self.swift,
            &mut self.swiftc,
            &mut self.ar,
        ] {
            if tool.contains('/') {
                continue;
            }
            let candidate = match &toolchain_bin {
                Some(bin) => runtime.find_program(bin.join(tool.as_str()).as_ref()),
                None => runtime.find_program(tool),
            }
            .or_else(|_| runtime.find_program(tool));
            match candidate {
                Ok(found) => {
                    debug!(tool = %tool, path = %found, "located tool");
                    *tool = found.to_string();
                }
                Err(_) => debug!(tool = %tool, "tool not found, keeping bare name"),
            }
        }
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Configuration = toml::from_str(content)?;
        if config.version != CONFIG_VERSION {
            return Err(Error::ConfigVersion {
                found: config.version,
                expected: CONFIG_VERSION,
            });
        }
        Ok(config)
    }

    /// Persists the configuration to its `config_path`.
    pub fn write(&self, runtime: &dyn Runtime) -> Result<()> {
        let content = self.to_toml()?;
        runtime.write_file(&self.config_path, content.as_bytes())?;
        info!(path = %self.config_path, "wrote configuration");
        Ok(())
    }

    pub fn read(runtime: &dyn Runtime, path: &Path) -> Result<Self> {
        let data = runtime.read_file(path)?;
        let content = String::from_utf8(data).map_err(Error::ConfigEncoding)?;
        Self::from_toml(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::testing::Recorder;

    fn config() -> Configuration {
        let mut config = Configuration::new(Target::new("x86_64-unknown-linux-gnu"), "/src/foundation");
        config.build_mode = BuildMode::Release;
        config.bootstrap_directory = Some(Path::from("/src/foundation/bootstrap"));
        config
            .variables
            .insert("XCTEST_BUILD_DIR".into(), "/src/xctest/build".into());
        config
    }

    #[test]
    fn test_defaults() {
        let config = config();
        assert_eq!(config.build_directory.as_ref(), "/src/foundation/Build");
        assert_eq!(config.relative(&config.build_directory), "Build");
        assert_eq!(config.build_script_path.as_ref(), "/src/foundation/build.ninja");
    }

    #[test]
    fn test_moved_build_directory() {
        let mut config = config();
        config.set_build_directory("/out");
        assert_eq!(config.relative(&config.build_directory), "../../out");
        assert_eq!(config.module_cache_directory.as_ref(), "/out/ModuleCache");
        assert_eq!(config.config_path.as_ref(), "/out/.ninjagen.toml");
    }

    #[test]
    fn test_persist_and_reload() {
        let runtime = Recorder::default();
        let config = config();
        config.write(&runtime).unwrap();

        let stored = runtime.file("/src/foundation/Build/.ninjagen.toml").unwrap();
        assert!(stored.contains("version = 1"));
        assert!(stored.contains("target = \"x86_64-unknown-linux-gnu\""));
        assert!(stored.contains("build_mode = \"release\""));

        let reloaded = Configuration::read(&runtime, &config.config_path).unwrap();
        assert_eq!(reloaded, config);
    }

    #[test]
    fn test_version_mismatch_is_fatal() {
        let content = config().to_toml().unwrap().replace("version = 1", "version = 2");
        let err = Configuration::from_toml(&content).unwrap_err();
        assert!(matches!(err, Error::ConfigVersion { found: 2, expected: 1 }));
    }

    #[test]
    fn test_corrupt_encoding_is_reported() {
        let runtime = Recorder::default();
        let path = Path::from("/src/foundation/Build/.ninjagen.toml");
        runtime
            .write_file(&path, b"version = 1\nprefix = \"/usr\xff\"\n")
            .unwrap();

        let err = Configuration::read(&runtime, &path).unwrap_err();
        assert!(matches!(err, Error::ConfigEncoding(_)));
    }

    #[test]
    fn test_garbage_is_rejected() {
        let err = Configuration::from_toml("target = 3").unwrap_err();
        assert!(matches!(err, Error::ConfigParse(_)));
    }
}
