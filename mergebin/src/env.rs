use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use crate::config::{BoardConfig, DEFAULT_BUILD_DIR, DEFAULT_PROGNAME, ProjectConfig};

/// Variable values are expanded again when inserted; this bounds that.
const MAX_EXPAND_DEPTH: usize = 8;

const DEFAULT_PYTHONEXE: &str = "python3";

/// Everything a post action may read: the project configuration, the
/// resolved board and the variable table used for `$VAR` expansion.
#[derive(Debug, Clone, Default)]
pub struct BuildEnv {
    pub workdir: PathBuf,
    pub config: ProjectConfig,
    pub board: BoardConfig,
    vars: BTreeMap<String, String>,
}

impl BuildEnv {
    pub fn new(workdir: PathBuf, config: ProjectConfig) -> anyhow::Result<Self> {
        let mut vars = config.vars.clone();

        vars.insert("PROJECT_DIR".to_string(), workdir.display().to_string());

        match &config.build_dir {
            Some(dir) => {
                vars.insert("BUILD_DIR".to_string(), dir.clone());
            }
            None => {
                vars.entry("BUILD_DIR".to_string())
                    .or_insert_with(|| DEFAULT_BUILD_DIR.to_string());
            }
        }

        match &config.progname {
            Some(name) => {
                vars.insert("PROGNAME".to_string(), name.clone());
            }
            None => {
                vars.entry("PROGNAME".to_string())
                    .or_insert_with(|| DEFAULT_PROGNAME.to_string());
            }
        }

        match &config.python_exe {
            Some(exe) => {
                vars.insert("PYTHONEXE".to_string(), exe.clone());
            }
            None => {
                vars.entry("PYTHONEXE".to_string()).or_insert_with(|| {
                    std::env::var("PYTHONEXE").unwrap_or_else(|_| DEFAULT_PYTHONEXE.to_string())
                });
            }
        }

        let mut env = Self {
            workdir,
            config,
            board: BoardConfig::default(),
            vars,
        };

        let inline = env.config.board.clone();
        env.board = match env.config.board_file.clone() {
            Some(file) => {
                let path = env.abspath(&env.path(&file));
                debug!("reading board manifest {}", path.display());
                BoardConfig::from_json_file(&path)?.overlay(inline)
            }
            None => inline,
        };

        Ok(env)
    }

    pub fn var(&self, name: &str) -> Option<String> {
        self.vars
            .get(name)
            .cloned()
            .or_else(|| std::env::var(name).ok())
    }

    /// Expands `$NAME` and `${NAME}`. `$$` is a literal `$`; undefined
    /// variables expand to nothing.
    pub fn subst(&self, input: &str) -> String {
        self.expand(input, 0)
    }

    /// Expands `input` and interprets it as a path.
    pub fn path(&self, input: &str) -> PathBuf {
        PathBuf::from(self.subst(input))
    }

    /// Expands each part and joins them into one path.
    pub fn join<I, S>(&self, parts: I) -> PathBuf
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut out = PathBuf::new();
        for part in parts {
            out.push(self.subst(part.as_ref()));
        }
        out
    }

    /// Resolves a relative path against the project directory.
    pub fn abspath(&self, path: &Path) -> PathBuf {
        let joined = self.workdir.join(path);
        std::path::absolute(&joined).unwrap_or(joined)
    }

    fn expand(&self, input: &str, depth: usize) -> String {
        let mut out = String::with_capacity(input.len());
        let mut rest = input;

        while let Some(pos) = rest.find('$') {
            out.push_str(&rest[..pos]);
            let after = &rest[pos + 1..];

            if let Some(tail) = after.strip_prefix('$') {
                out.push('$');
                rest = tail;
                continue;
            }

            if let Some(braced) = after.strip_prefix('{') {
                match braced.find('}') {
                    Some(end) => {
                        out.push_str(&self.lookup(&braced[..end], depth));
                        rest = &braced[end + 1..];
                    }
                    None => {
                        out.push('$');
                        rest = after;
                    }
                }
                continue;
            }

            let len = after
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                .unwrap_or(after.len());
            if len == 0 || after.starts_with(|c: char| c.is_ascii_digit()) {
                out.push('$');
                rest = after;
                continue;
            }

            out.push_str(&self.lookup(&after[..len], depth));
            rest = &after[len..];
        }

        out.push_str(rest);
        out
    }

    fn lookup(&self, name: &str, depth: usize) -> String {
        let Some(value) = self.var(name) else {
            warn!("undefined variable `{name}`, expanding to empty string");
            return String::new();
        };

        if depth + 1 >= MAX_EXPAND_DEPTH {
            warn!("variable `{name}` nests too deep, leaving it unexpanded");
            return value;
        }

        self.expand(&value, depth + 1)
    }
}
