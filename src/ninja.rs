//! Text emission for `build.ninja` files.

use std::borrow::Cow;
use std::fmt::Write as _;

const INDENT: &str = "    ";

/// A `rule` block.
#[derive(Debug, Clone)]
pub struct Rule {
    pub name: &'static str,
    pub command: String,
    pub description: Option<String>,
    pub depfile: Option<&'static str>,
    pub generator: bool,
}

impl Rule {
    pub fn new(name: &'static str, command: impl Into<String>) -> Self {
        Self {
            name,
            command: command.into(),
            description: None,
            depfile: None,
            generator: false,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn depfile(mut self, depfile: &'static str) -> Self {
        self.depfile = Some(depfile);
        self
    }

    pub fn generator(mut self) -> Self {
        self.generator = true;
        self
    }
}

/// A single `build` statement.
///
/// Order-only dependencies keep the order they were added in.
#[derive(Debug, Clone, Default)]
pub struct Edge {
    pub outputs: Vec<String>,
    pub rule: String,
    pub inputs: Vec<String>,
    pub order_only: Vec<String>,
    pub bindings: Vec<(String, String)>,
}

impl Edge {
    pub fn new(output: impl Into<String>, rule: impl Into<String>) -> Self {
        Self {
            outputs: vec![output.into()],
            rule: rule.into(),
            ..Default::default()
        }
    }

    pub fn phony(output: impl Into<String>) -> Self {
        Self::new(output, "phony")
    }

    pub fn input(mut self, input: impl Into<String>) -> Self {
        self.inputs.push(input.into());
        self
    }

    pub fn inputs<I: IntoIterator<Item = S>, S: Into<String>>(mut self, inputs: I) -> Self {
        self.inputs.extend(inputs.into_iter().map(Into::into));
        self
    }

    pub fn order_only<I: IntoIterator<Item = S>, S: Into<String>>(mut self, deps: I) -> Self {
        self.order_only.extend(deps.into_iter().map(Into::into));
        self
    }

    pub fn bind(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.bindings.push((name.into(), value.into()));
        self
    }
}

/// Escapes `path` for an output, input or `default` position.
///
/// Spaces, colons and `$` are escaped. A `${NAME}` reference is kept so paths may be rooted
/// at a script variable.
pub fn escape_path(path: &str) -> Cow<'_, str> {
    if !path.contains([' ', ':', '$']) {
        return Cow::Borrowed(path);
    }
    let mut escaped = String::with_capacity(path.len() + 4);
    let mut chars = path.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '$' if chars.peek() == Some(&'{') => escaped.push('$'),
            '$' | ' ' | ':' => {
                escaped.push('$');
                escaped.push(c);
            }
            _ => escaped.push(c),
        }
    }
    Cow::Owned(escaped)
}

fn paths(items: &[String]) -> String {
    items
        .iter()
        .map(|item| escape_path(item))
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Debug, Default)]
pub struct Writer {
    out: String,
}

impl Writer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn newline(&mut self) {
        self.out.push('\n');
    }

    pub fn comment(&mut self, text: &str) {
        for line in text.lines() {
            let _ = writeln!(self.out, "# {line}");
        }
    }

    pub fn variable(&mut self, name: &str, value: impl AsRef<str>) {
        let value = value.as_ref().trim();
        if value.is_empty() {
            let _ = writeln!(self.out, "{name} =");
        } else {
            let _ = writeln!(self.out, "{name} = {value}");
        }
    }

    pub fn rule(&mut self, rule: &Rule) {
        let _ = writeln!(self.out, "rule {}", rule.name);
        let _ = writeln!(self.out, "{INDENT}command = {}", rule.command);
        if let Some(description) = &rule.description {
            let _ = writeln!(self.out, "{INDENT}description = {description}");
        }
        if let Some(depfile) = rule.depfile {
            let _ = writeln!(self.out, "{INDENT}depfile = {depfile}");
        }
        if rule.generator {
            let _ = writeln!(self.out, "{INDENT}generator = 1");
        }
        self.newline();
    }

    pub fn build(&mut self, edge: &Edge) {
        let _ = write!(self.out, "build {}: {}", paths(&edge.outputs), edge.rule);
        for input in &edge.inputs {
            let _ = write!(self.out, " {}", escape_path(input));
        }
        if !edge.order_only.is_empty() {
            let _ = write!(self.out, " | {}", paths(&edge.order_only));
        }
        self.newline();
        for (name, value) in &edge.bindings {
            let value = value.trim();
            if value.is_empty() {
                let _ = writeln!(self.out, "{INDENT}{name} =");
            } else {
                let _ = writeln!(self.out, "{INDENT}{name} = {value}");
            }
        }
    }

    pub fn default_target(&mut self, target: &str) {
        let _ = writeln!(self.out, "default {}", escape_path(target));
    }

    /// Appends `text` untouched.
    pub fn verbatim(&mut self, text: &str) {
        self.out.push_str(text);
    }

    pub fn finish(self) -> String {
        self.out
    }
}
