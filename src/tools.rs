//! External tool lookup on the session's search path.
//!
//! Optional tools are probed, never required: callers walk a preference list
//! and take the first program that resolves.

use std::ffi::{OsStr, OsString};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Resolves program names against a fixed `PATH`-style search path.
#[derive(Debug, Clone)]
pub struct Toolbox {
    search_path: OsString,
}

impl Toolbox {
    pub fn new(search_path: impl Into<OsString>) -> Self {
        Self {
            search_path: search_path.into(),
        }
    }

    /// Use the current process `PATH`.
    pub fn from_env() -> Self {
        Self::new(std::env::var_os("PATH").unwrap_or_default())
    }

    pub fn search_path(&self) -> &OsStr {
        &self.search_path
    }

    /// Absolute path of `program`, if it is installed.
    ///
    /// Names containing a slash are checked as paths directly.
    pub fn find(&self, program: &str) -> Option<PathBuf> {
        if program.contains('/') {
            let path = PathBuf::from(program);
            return is_executable(&path).then_some(path);
        }
        std::env::split_paths(&self.search_path)
            .map(|dir| dir.join(program))
            .find(|candidate| is_executable(candidate))
    }

    pub fn has(&self, program: &str) -> bool {
        self.find(program).is_some()
    }

    /// First installed program out of `candidates`.
    pub fn first<'a>(&self, candidates: &[&'a str]) -> Option<(&'a str, PathBuf)> {
        candidates
            .iter()
            .find_map(|name| self.find(name).map(|path| (*name, path)))
    }

    /// A `Command` for an installed program, with the session search path
    /// exported to it.
    pub fn command(&self, program: &str) -> Option<Command> {
        let path = self.find(program)?;
        let mut cmd = Command::new(path);
        cmd.env("PATH", &self.search_path);
        Some(cmd)
    }
}

fn is_executable(path: &Path) -> bool {
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

/// Split a user-supplied command line into program and arguments on
/// whitespace. No quoting or shell expansion is applied.
pub fn split_command(line: &str) -> Option<(String, Vec<String>)> {
    let mut parts = line.split_whitespace().map(str::to_string);
    let program = parts.next()?;
    Some((program, parts.collect()))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    /// Install an executable shell script named `name` into `dir`. Scripts
    /// run with the session search path, so system directories are appended
    /// for the utilities they call.
    pub(crate) fn install_script(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, format!("#!/bin/sh\nPATH=\"$PATH:/usr/bin:/bin\"\n{}\n", body)).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[test]
    fn test_find_only_executables() {
        let dir = TempDir::new().unwrap();
        install_script(dir.path(), "glow", "exit 0");
        fs::write(dir.path().join("notes"), "plain").unwrap();

        let tools = Toolbox::new(dir.path().as_os_str());
        assert_eq!(tools.find("glow"), Some(dir.path().join("glow")));
        assert!(tools.find("notes").is_none());
        assert!(!tools.has("lowdown"));
    }

    #[test]
    fn test_first_respects_preference_order() {
        let dir = TempDir::new().unwrap();
        install_script(dir.path(), "lynx", "exit 0");
        install_script(dir.path(), "elinks", "exit 0");

        let tools = Toolbox::new(dir.path().as_os_str());
        let (name, _) = tools.first(&["w3m", "lynx", "elinks"]).unwrap();
        assert_eq!(name, "lynx");
        assert!(tools.first(&["w3m"]).is_none());
    }

    #[test]
    fn test_find_with_slash_checks_path_directly() {
        let dir = TempDir::new().unwrap();
        let script = install_script(dir.path(), "viewer", "exit 0");
        let tools = Toolbox::new("");
        assert_eq!(tools.find(script.to_str().unwrap()), Some(script));
    }

    #[test]
    fn test_split_command() {
        assert_eq!(
            split_command("less -R  --quiet"),
            Some(("less".to_string(), vec!["-R".to_string(), "--quiet".to_string()]))
        );
        assert_eq!(split_command("   "), None);
    }
}
