//! Ordered groups of actions belonging to a product.

use tracing::debug;

use crate::action::{ActionKind, BuildAction, CompileInput, CompileRegistry, Requirements};
use crate::conditional::TargetConditional;
use crate::error::{Error, Result};
use crate::ninja::{Edge, Writer};
use crate::path::Path;
use crate::product::ProductScope;

/// A source, header or resource that may only exist on some targets.
pub type Source = TargetConditional<Path>;

/// Name of a phase already attached to a product, usable as a dependency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseHandle {
    name: String,
}

impl PhaseHandle {
    pub fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PhaseKind {
    CopyHeaders {
        public: Vec<Source>,
        private: Vec<Source>,
        project: Vec<Source>,
        module_map: Option<Source>,
    },
    CopyResources {
        directory: String,
        resources: Vec<Source>,
    },
    CompileSources {
        sources: Vec<Source>,
    },
    CompileSwiftSources {
        sources: Vec<Source>,
    },
    /// A whole executable from one `swiftc` invocation, linked against the owning product.
    SwiftExecutable {
        executable: String,
        sources: Vec<Source>,
    },
}

impl PhaseKind {
    pub fn label(&self) -> &'static str {
        match self {
            PhaseKind::CopyHeaders { .. } => "CopyHeaders",
            PhaseKind::CopyResources { .. } => "CopyResources",
            PhaseKind::CompileSources { .. } => "CompileSources",
            PhaseKind::CompileSwiftSources { .. } => "CompileSwiftSources",
            PhaseKind::SwiftExecutable { .. } => "SwiftExecutable",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Phase {
    kind: PhaseKind,
    name: String,
    previous: Option<String>,
    dependencies: Vec<String>,
}

fn sources<I, S>(items: I) -> Vec<Source>
where
    I: IntoIterator<Item = S>,
    S: Into<Source>,
{
    items.into_iter().map(Into::into).collect()
}

impl Phase {
    fn new(kind: PhaseKind) -> Self {
        Self {
            name: kind.label().to_string(),
            kind,
            previous: None,
            dependencies: vec![],
        }
    }

    pub fn copy_headers() -> Self {
        Self::new(PhaseKind::CopyHeaders {
            public: vec![],
            private: vec![],
            project: vec![],
            module_map: None,
        })
    }

    pub fn copy_resources<I, S>(directory: impl Into<String>, resources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Source>,
    {
        Self::new(PhaseKind::CopyResources {
            directory: directory.into(),
            resources: sources(resources),
        })
    }

    pub fn compile_sources<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Source>,
    {
        Self::new(PhaseKind::CompileSources {
            sources: sources(items),
        })
    }

    pub fn compile_swift_sources<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Source>,
    {
        Self::new(PhaseKind::CompileSwiftSources {
            sources: sources(items),
        })
    }

    pub fn swift_executable<I, S>(executable: impl Into<String>, items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Source>,
    {
        Self::new(PhaseKind::SwiftExecutable {
            executable: executable.into(),
            sources: sources(items),
        })
    }

    pub fn public_headers<I, S>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Source>,
    {
        if let PhaseKind::CopyHeaders { public, .. } = &mut self.kind {
            public.extend(sources(headers));
        }
        self
    }

    pub fn private_headers<I, S>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Source>,
    {
        if let PhaseKind::CopyHeaders { private, .. } = &mut self.kind {
            private.extend(sources(headers));
        }
        self
    }

    pub fn project_headers<I, S>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Source>,
    {
        if let PhaseKind::CopyHeaders { project, .. } = &mut self.kind {
            project.extend(sources(headers));
        }
        self
    }

    pub fn module_map(mut self, map: impl Into<Source>) -> Self {
        if let PhaseKind::CopyHeaders { module_map, .. } = &mut self.kind {
            *module_map = Some(map.into());
        }
        self
    }

    /// Makes every action of this phase wait for `phase`.
    pub fn depends_on(&mut self, phase: &PhaseHandle) -> &mut Self {
        self.dependencies.push(phase.name.clone());
        self
    }

    pub fn kind(&self) -> &PhaseKind {
        &self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn previous(&self) -> Option<&str> {
        self.previous.as_deref()
    }

    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    pub(crate) fn attach(&mut self, name: String, previous: Option<String>) -> PhaseHandle {
        self.name = name;
        self.previous = previous;
        PhaseHandle {
            name: self.name.clone(),
        }
    }

    /// Resolves sources for the active target and builds this phase's actions.
    pub(crate) fn plan(
        &self,
        product: &ProductScope<'_>,
        registry: &CompileRegistry,
    ) -> Result<PhasePlan> {
        let target = &product.config.target;
        let resolve = |items: &[Source]| -> Result<Vec<Path>> {
            items
                .iter()
                .filter_map(|item| item.resolve(target))
                .map(|path| {
                    if path.as_ref().contains('\n') {
                        return Err(Error::InvalidPath(path.clone()));
                    }
                    Ok(path.clone())
                })
                .collect()
        };

        let mut plan = PhasePlan::default();
        match &self.kind {
            PhaseKind::CopyHeaders {
                public,
                private,
                project,
                module_map,
            } => {
                if let Some(map) = module_map.as_ref().and_then(|m| m.resolve(target)) {
                    let destination = product.public_module.join("module.modulemap");
                    plan.actions.push(BuildAction::copy(map.clone(), destination));
                }
                for (headers, dir) in [
                    (public, &product.public_headers),
                    (private, &product.private_headers),
                    (project, &product.project_headers),
                ] {
                    for header in resolve(headers)? {
                        let destination = dir.join(header.basename());
                        plan.actions.push(BuildAction::copy(header, destination));
                    }
                }
            }
            PhaseKind::CopyResources {
                directory,
                resources,
            } => {
                let dir = product.config.build_directory.join(directory);
                for resource in resolve(resources)? {
                    let destination = dir.join(resource.basename());
                    plan.actions.push(BuildAction::copy(resource, destination));
                }
            }
            PhaseKind::CompileSources { sources } | PhaseKind::CompileSwiftSources { sources } => {
                let module = resolve(sources)?;
                for source in &module {
                    let input = CompileInput {
                        source,
                        product,
                        module: &module,
                    };
                    let action = registry.compile(&input)?;
                    plan.requirements |= action.requirements();
                    plan.objects.push(action.output().clone());
                    plan.actions.push(action);
                }
                if matches!(self.kind, PhaseKind::CompileSwiftSources { .. }) {
                    plan.merged_module = Some(product.swift_module());
                }
            }
            PhaseKind::SwiftExecutable {
                executable,
                sources,
            } => {
                let output = product
                    .config
                    .build_directory
                    .join(executable)
                    .join(format!("{executable}{}", target.executable_suffix()));
                plan.executable = Some(ExecutablePlan {
                    name: executable.clone(),
                    output,
                    sources: resolve(sources)?,
                });
            }
        }

        for action in &mut plan.actions {
            for dependency in &self.dependencies {
                action.add_dependency(dependency.clone());
            }
        }

        debug!(
            phase = %self.name,
            actions = plan.actions.len(),
            objects = plan.objects.len(),
            "planned phase"
        );
        Ok(plan)
    }

    pub(crate) fn render(&self, plan: &PhasePlan, product: &ProductScope<'_>, out: &mut Writer) {
        let config = product.config;

        for action in &plan.actions {
            out.build(&action.edge(config));
            out.newline();
        }

        let mut outputs = plan
            .actions
            .iter()
            .map(|action| config.relative(action.output()))
            .collect::<Vec<_>>();

        if let Some(executable) = &plan.executable {
            let app = config.relative(&executable.output);
            let mut deps = self.dependencies.clone();
            deps.push(product.product_name.clone());

            let mut flags = format!(
                "-I{} -I{} -L{}",
                config.relative(&product.root_headers),
                config.relative(&product.build_dir),
                config.relative(&product.build_dir),
            );
            if let Some(swiftcflags) = product.swiftcflags {
                flags.push(' ');
                flags.push_str(swiftcflags);
            }

            out.build(
                &Edge::new(app.clone(), "SwiftExecutable")
                    .inputs(executable.sources.iter().map(|s| config.relative(s)))
                    .order_only(deps)
                    .bind("flags", flags),
            );
            out.build(&Edge::phony(executable.name.clone()).order_only([app.clone()]));
            out.newline();
            outputs.push(app);
        }

        let mut completion = Edge::phony(self.name.clone());
        if let Some(previous) = &self.previous {
            completion = completion.order_only([previous.clone()]);
        }
        out.build(&completion.order_only(outputs));
        out.newline();

        if let Some(module) = &plan.merged_module {
            let objects = plan
                .actions
                .iter()
                .filter(|a| matches!(a.kind(), ActionKind::CompileSwift { .. }))
                .map(|a| config.relative(a.output()))
                .collect::<Vec<_>>();
            let partials = objects
                .iter()
                .map(|o| format!("{o}.~partial.swiftmodule"))
                .collect::<Vec<_>>();
            let doc = module
                .parent()
                .unwrap_or_default()
                .join(format!("{}.swiftdoc", product.name));

            let mut flags = format!("-I{}", config.relative(&product.public_module));
            if let Some(swiftcflags) = product.swiftcflags {
                flags.push(' ');
                flags.push_str(swiftcflags);
            }
            flags.push_str(&format!(" -emit-module-doc-path {}", config.relative(&doc)));

            out.build(
                &Edge::new(config.relative(module), "MergeSwiftModule")
                    .inputs(objects)
                    .bind("partials", partials.join(" "))
                    .bind("module_name", product.name)
                    .bind("flags", flags),
            );
            out.newline();
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ExecutablePlan {
    pub name: String,
    pub output: Path,
    pub sources: Vec<Path>,
}

/// A phase's actions for one target, plus what the owning product needs from them.
#[derive(Debug, Default, Clone, PartialEq)]
pub(crate) struct PhasePlan {
    pub actions: Vec<BuildAction>,
    /// Objects the product links, in action order.
    pub objects: Vec<Path>,
    pub requirements: Requirements,
    /// The merged module, when this phase produces one.
    pub merged_module: Option<Path>,
    pub executable: Option<ExecutablePlan>,
}
