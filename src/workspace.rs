use tracing::info;

use crate::config::Configuration;
use crate::error::{Error, Result};
use crate::ninja::{Edge, Writer};
use crate::runtime::Runtime;

/// Sub-projects configured by re-running the generator in each of their directories.
#[derive(Debug, Clone, PartialEq)]
pub struct Workspace {
    name: String,
    projects: Vec<String>,
}

impl Workspace {
    pub fn new<I, S>(name: impl Into<String>, projects: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            projects: projects.into_iter().map(Into::into).collect(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn projects(&self) -> &[String] {
        &self.projects
    }

    /// Flags that carry the target environment into a sub-invocation.
    pub fn arguments(config: &Configuration) -> Vec<String> {
        let mut args = vec![format!("--target={}", config.target.triple())];
        if let Some(sysroot) = &config.system_root {
            args.push(format!("--sysroot={sysroot}"));
        }
        if let Some(toolchain) = &config.toolchain {
            args.push(format!("--toolchain={toolchain}"));
        }
        if let Some(bootstrap) = &config.bootstrap_directory {
            args.push(format!("--bootstrap={bootstrap}"));
        }
        args
    }

    /// Configures each sub-project in listed order, stopping at the first failure.
    pub fn configure(&self, config: &Configuration, runtime: &dyn Runtime) -> Result<()> {
        let exe = runtime.current_exe()?;
        let args = Self::arguments(config);
        let args = args.iter().map(String::as_str).collect::<Vec<_>>();

        for project in &self.projects {
            let dir = config.source_root.join(project);
            info!(workspace = %self.name, %project, "configuring sub-project");
            let output = runtime.run_command(&exe, &args, &dir)?;
            if output.returncode != 0 {
                return Err(Error::SubprojectFailed {
                    project: project.clone(),
                    code: output.returncode,
                    stderr: output.stderr,
                });
            }
        }
        Ok(())
    }

    /// One `BuildProject` edge per sub-project, then an aggregate that depends on them in
    /// reverse listed order.
    pub fn render(&self, out: &mut Writer) {
        let stamp = |project: &str| format!("{project}.build");

        for project in &self.projects {
            out.build(&Edge::new(stamp(project), "BuildProject").bind("project", project.as_str()));
        }
        out.newline();

        let dependencies = self.projects.iter().rev().map(|p| stamp(p));
        out.build(&Edge::phony(self.name.clone()).order_only(dependencies));
        out.newline();
        out.default_target(&self.name);
        out.newline();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::Path;
    use crate::runtime::testing::Recorder;
    use crate::target::Target;

    fn config() -> Configuration {
        let mut config = Configuration::new(Target::new("x86_64-unknown-linux-gnu"), "/src");
        config.system_root = Some(Path::from("/sysroot"));
        config
    }

    #[test]
    fn test_aggregate_depends_in_reverse() {
        let workspace = Workspace::new("all", ["p1", "p2", "p3"]);
        let mut out = Writer::new();
        workspace.render(&mut out);
        let text = out.finish();

        let p1 = text.find("build p1.build: BuildProject").unwrap();
        let p2 = text.find("build p2.build: BuildProject").unwrap();
        let p3 = text.find("build p3.build: BuildProject").unwrap();
        assert!(p1 < p2 && p2 < p3);
        assert!(text.contains("    project = p1\n"));
        assert!(text.contains("build all: phony | p3.build p2.build p1.build\n"));
        assert!(text.contains("default all\n"));
    }

    #[test]
    fn test_configure_in_order() {
        let runtime = Recorder::default();
        Workspace::new("all", ["a", "b"])
            .configure(&config(), &runtime)
            .unwrap();

        let commands = runtime.commands.borrow();
        assert_eq!(commands.len(), 2);
        assert_eq!(commands[0].0, Path::from("/usr/bin/ninjagen"));
        assert_eq!(commands[0].2, Path::from("/src/a"));
        assert_eq!(commands[1].2, Path::from("/src/b"));
        assert_eq!(
            commands[0].1,
            vec![
                "--target=x86_64-unknown-linux-gnu".to_string(),
                "--sysroot=/sysroot".to_string(),
            ]
        );
    }

    #[test]
    fn test_configure_fails_fast() {
        let mut runtime = Recorder::default();
        runtime.exit_codes.insert(Path::from("/src/b"), 3);
        runtime.stderr.insert(
            Path::from("/src/b"),
            "ERROR Unable to read /src/b/ninjagen.toml\n".into(),
        );

        let err = Workspace::new("all", ["a", "b", "c"])
            .configure(&config(), &runtime)
            .unwrap_err();

        assert!(matches!(
            &err,
            Error::SubprojectFailed { project, code: 3, .. } if project == "b"
        ));
        assert_eq!(
            err.to_string(),
            "Configuring sub-project b failed with status 3:\nERROR Unable to read /src/b/ninjagen.toml"
        );
        assert_eq!(err.exit_code(), 3);
        assert_eq!(runtime.commands.borrow().len(), 2);
    }

    #[test]
    fn test_silent_failure() {
        let mut runtime = Recorder::default();
        runtime.exit_codes.insert(Path::from("/src/a"), 1);

        let err = Workspace::new("all", ["a"])
            .configure(&config(), &runtime)
            .unwrap_err();
        assert_eq!(err.to_string(), "Configuring sub-project a failed with status 1");
    }
}
