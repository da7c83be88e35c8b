//! The generator's only window onto the host: files, processes and machine facts.

use crate::path::Path;

pub type Result<T> = anyhow::Result<T>;

pub struct MachineInfo {
    pub system: String,
    pub cpu: String,
}

pub struct RunCommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub returncode: i64,
}

pub trait Runtime {
    fn host_machine(&self) -> Result<MachineInfo>;

    fn current_dir(&self) -> Result<Path>;

    /// The generator executable, re-invoked to configure sub-projects.
    fn current_exe(&self) -> Result<Path>;

    // fs
    fn read_file(&self, path: &Path) -> Result<Vec<u8>>;
    fn write_file(&self, path: &Path, data: &[u8]) -> Result<()>;

    // process
    fn find_program(&self, name: &str) -> Result<Path>;
    fn run_command(&self, cmd: &Path, args: &[&str], cwd: &Path) -> Result<RunCommandOutput>;
}

#[cfg(test)]
pub(crate) mod testing {
    use std::cell::RefCell;
    use std::collections::BTreeMap;

    use anyhow::{Context, bail};

    use super::*;

    /// In-memory runtime that records writes and commands.
    #[derive(Default)]
    pub struct Recorder {
        pub system: String,
        pub cpu: String,
        pub files: RefCell<BTreeMap<Path, Vec<u8>>>,
        pub commands: RefCell<Vec<(Path, Vec<String>, Path)>>,
        /// Exit codes keyed by the working directory a command runs in.
        pub exit_codes: BTreeMap<Path, i64>,
        /// Canned stderr keyed the same way.
        pub stderr: BTreeMap<Path, String>,
    }

    impl Recorder {
        pub fn with_host(system: &str, cpu: &str) -> Self {
            Self {
                system: system.into(),
                cpu: cpu.into(),
                ..Default::default()
            }
        }

        pub fn file(&self, path: &str) -> Option<String> {
            self.files
                .borrow()
                .get(&Path::from(path))
                .map(|data| String::from_utf8_lossy(data).into_owned())
        }
    }

    impl Runtime for Recorder {
        fn host_machine(&self) -> Result<MachineInfo> {
            Ok(MachineInfo {
                system: self.system.clone(),
                cpu: self.cpu.clone(),
            })
        }

        fn current_dir(&self) -> Result<Path> {
            Ok(Path::from("/work"))
        }

        fn current_exe(&self) -> Result<Path> {
            Ok(Path::from("/usr/bin/ninjagen"))
        }

        fn read_file(&self, path: &Path) -> Result<Vec<u8>> {
            self.files
                .borrow()
                .get(path)
                .cloned()
                .with_context(|| format!("no such file: {path}"))
        }

        fn write_file(&self, path: &Path, data: &[u8]) -> Result<()> {
            self.files.borrow_mut().insert(path.clone(), data.to_vec());
            Ok(())
        }

        fn find_program(&self, name: &str) -> Result<Path> {
            bail!("Not found: {name}");
        }

        fn run_command(&self, cmd: &Path, args: &[&str], cwd: &Path) -> Result<RunCommandOutput> {
            let args = args.iter().map(|a| a.to_string()).collect();
            self.commands
                .borrow_mut()
                .push((cmd.clone(), args, cwd.clone()));
            Ok(RunCommandOutput {
                stdout: String::new(),
                stderr: self.stderr.get(cwd).cloned().unwrap_or_default(),
                returncode: self.exit_codes.get(cwd).copied().unwrap_or(0),
            })
        }
    }
}
