use std::env::consts::{ARCH, OS};
use std::process::Command;
use std::{env, fs};

use anyhow::Context;
use ninjagen::path::Path;
use ninjagen::runtime::{self, MachineInfo, RunCommandOutput};

/// The real host: local filesystem, `PATH` lookups and child processes.
pub struct Host;

fn os_path(path: &Path) -> &std::path::Path {
    std::path::Path::new(path.as_ref())
}

fn from_os_path(path: &std::path::Path) -> Path {
    Path::from(path.to_string_lossy())
}

impl runtime::Runtime for Host {
    fn host_machine(&self) -> runtime::Result<MachineInfo> {
        Ok(MachineInfo {
            system: OS.into(),
            cpu: ARCH.into(),
        })
    }

    fn current_dir(&self) -> runtime::Result<Path> {
        Ok(from_os_path(&env::current_dir()?))
    }

    fn current_exe(&self) -> runtime::Result<Path> {
        Ok(from_os_path(&env::current_exe()?))
    }

    fn read_file(&self, path: &Path) -> runtime::Result<Vec<u8>> {
        fs::read(os_path(path)).with_context(|| format!("Unable to read {path}"))
    }

    fn write_file(&self, path: &Path, data: &[u8]) -> runtime::Result<()> {
        if let Some(parent) = os_path(path).parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Unable to create {}", parent.display()))?;
        }
        fs::write(os_path(path), data).with_context(|| format!("Unable to write {path}"))
    }

    fn find_program(&self, name: &str) -> runtime::Result<Path> {
        let found = which::which(name).with_context(|| format!("Not found: {name}"))?;
        Ok(from_os_path(&found))
    }

    fn run_command(
        &self,
        cmd: &Path,
        args: &[&str],
        cwd: &Path,
    ) -> runtime::Result<RunCommandOutput> {
        let output = Command::new(os_path(cmd))
            .args(args)
            .current_dir(os_path(cwd))
            .output()
            .with_context(|| format!("Unable to run {cmd}"))?;

        Ok(RunCommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            returncode: output.status.code().unwrap_or(-1) as i64,
        })
    }
}
