use std::fmt;

use serde::{Deserialize, Serialize};

/// A filesystem path kept as a `/`-separated string.
///
/// Absolute strings are kept as given (after lexical cleanup). Relative strings are stored
/// unresolved and are understood relative to the working directory the generated script is
/// run from.
#[derive(Clone, PartialEq, Eq, Hash, Default, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Path(String);

const SEP: &str = "/";

impl AsRef<str> for Path {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Path({})", self.0)
    }
}

impl From<String> for Path {
    fn from(path: String) -> Self {
        Path::from(path.as_str())
    }
}

impl From<&str> for Path {
    fn from(path: &str) -> Self {
        Path::from(path)
    }
}

impl From<Path> for String {
    fn from(path: Path) -> Self {
        path.0
    }
}

impl Path {
    pub fn from(path: impl AsRef<str>) -> Self {
        Self(normalize(&path.as_ref().replace('\\', SEP)))
    }

    pub fn is_absolute(&self) -> bool {
        self.0.starts_with(SEP)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The stored path, untouched.
    pub fn absolute(&self) -> &str {
        &self.0
    }

    /// This path expressed relative to `base`.
    ///
    /// Relative paths are already relative to the working directory and are returned as-is,
    /// as is any path when `base` itself is relative.
    pub fn relative(&self, base: &Path) -> Path {
        if !self.is_absolute() || !base.is_absolute() {
            return self.clone();
        }

        let ours = self.components().collect::<Vec<_>>();
        let theirs = base.components().collect::<Vec<_>>();
        let common = ours
            .iter()
            .zip(theirs.iter())
            .take_while(|(a, b)| a == b)
            .count();

        let mut parts = vec![".."; theirs.len() - common];
        parts.extend(&ours[common..]);
        if parts.is_empty() {
            return Self(".".into());
        }
        Self(parts.join(SEP))
    }

    pub fn join(&self, path: impl AsRef<str>) -> Self {
        let path = path.as_ref();
        if path.starts_with(SEP) || self.0.is_empty() || self.0 == "." {
            return Path::from(path);
        }

        let mut new_path = String::from(self.0.trim_end_matches(SEP));
        new_path.push_str(SEP);
        new_path.push_str(path);
        Path::from(new_path)
    }

    /// Appends `suffix` to the final component, keeping any existing extension.
    pub fn append_suffix(&self, suffix: &str) -> Self {
        Self(format!("{}{suffix}", self.0))
    }

    pub fn basename(&self) -> &str {
        match self.0.rfind(SEP) {
            Some(idx) if self.0.len() > 1 => &self.0[idx + 1..],
            _ => &self.0,
        }
    }

    /// The extension of the final component, without the dot.
    ///
    /// Dot-files such as `.gitignore` have no extension.
    pub fn extension(&self) -> Option<&str> {
        let name = self.basename();
        match name.rfind('.') {
            Some(0) | None => None,
            Some(idx) => Some(&name[idx + 1..]),
        }
    }

    pub fn parent(&self) -> Option<Path> {
        match self.0.rfind(SEP) {
            Some(0) if self.0.len() > 1 => Some(Self(SEP.into())),
            Some(0) => None,
            Some(idx) => Some(Self(self.0[..idx].into())),
            None if self.0.is_empty() || self.0 == "." => None,
            None => Some(Self(".".into())),
        }
    }

    pub fn components(&self) -> impl Iterator<Item = &str> {
        self.0.split(SEP).filter(|c| !c.is_empty() && *c != ".")
    }
}

fn normalize(path: &str) -> String {
    let absolute = path.starts_with(SEP);
    let mut parts: Vec<&str> = Vec::new();
    for component in path.split(SEP) {
        match component {
            "" | "." => {}
            ".." => match parts.last() {
                Some(&last) if last != ".." => {
                    parts.pop();
                }
                _ if absolute => {}
                _ => parts.push(".."),
            },
            c => parts.push(c),
        }
    }

    let joined = parts.join(SEP);
    match (absolute, joined.is_empty()) {
        (true, _) => format!("{SEP}{joined}"),
        (false, true) if path.is_empty() => String::new(),
        (false, true) => ".".into(),
        (false, false) => joined,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(Path::from("a/./b//c/").as_ref(), "a/b/c");
        assert_eq!(Path::from("/usr/../lib").as_ref(), "/lib");
        assert_eq!(Path::from("../x/../y").as_ref(), "../y");
        assert_eq!(Path::from("a\\b").as_ref(), "a/b");
        assert_eq!(Path::from("").as_ref(), "");
        assert_eq!(Path::from("./").as_ref(), ".");
    }

    #[test]
    fn test_relative() {
        let base = Path::from("/src/project");
        assert_eq!(
            Path::from("/src/project/build/Foo").relative(&base).as_ref(),
            "build/Foo"
        );
        assert_eq!(
            Path::from("/src/other/x.c").relative(&base).as_ref(),
            "../other/x.c"
        );
        assert_eq!(Path::from("/src/project").relative(&base).as_ref(), ".");
        assert_eq!(Path::from("lib/a.c").relative(&base).as_ref(), "lib/a.c");
    }

    #[test]
    fn test_join() {
        let build = Path::from("/tmp/build");
        assert_eq!(build.join("Foo").as_ref(), "/tmp/build/Foo");
        assert_eq!(build.join("/abs").as_ref(), "/abs");
        assert_eq!(Path::from(".").join("x").as_ref(), "x");
        assert_eq!(
            build.join("Foo").join("${PREFIX}/lib/swift").as_ref(),
            "/tmp/build/Foo/${PREFIX}/lib/swift"
        );
    }

    #[test]
    fn test_derivations() {
        let path = Path::from("CoreFoundation/Base.subproj/CFBase.c");
        assert_eq!(path.basename(), "CFBase.c");
        assert_eq!(path.extension(), Some("c"));
        assert_eq!(
            path.parent(),
            Some(Path::from("CoreFoundation/Base.subproj"))
        );
        assert_eq!(Path::from("Makefile").extension(), None);
        assert_eq!(Path::from("dir/.hidden").extension(), None);
        assert_eq!(Path::from("/x").parent(), Some(Path::from("/")));
        assert_eq!(Path::from("x").parent(), Some(Path::from(".")));
        assert_eq!(Path::from("/").parent(), None);
        assert_eq!(
            path.append_suffix(".o").as_ref(),
            "CoreFoundation/Base.subproj/CFBase.c.o"
        );
    }
}
