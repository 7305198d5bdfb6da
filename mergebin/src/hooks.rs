use std::path::{Path, PathBuf};

use crate::env::BuildEnv;

/// A callback run after a build artifact has been produced.
pub trait PostAction {
    fn name(&self) -> &str;

    /// Runs the action for `target`. The returned value is an exit status;
    /// anything but `0` fails the build step.
    fn run(&mut self, target: &Path, env: &BuildEnv) -> anyhow::Result<i32>;
}

/// Post actions keyed by the artifact path they follow.
#[derive(Default)]
pub struct PostActions {
    actions: Vec<(PathBuf, Box<dyn PostAction>)>,
}

impl PostActions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches `action` to the artifact at `path`. The path is expanded
    /// through `env` and resolved against the project directory.
    pub fn register(&mut self, env: &BuildEnv, path: &str, action: Box<dyn PostAction>) {
        let key = env.abspath(&env.path(path));
        debug!("post action `{}` registered on {}", action.name(), key.display());
        self.actions.push((key, action));
    }

    /// Runs every action registered on `target`, in registration order.
    /// Stops at the first nonzero status and returns it.
    pub fn fire(&mut self, target: &Path, env: &BuildEnv) -> anyhow::Result<i32> {
        let key = env.abspath(target);
        if !key.exists() {
            bail!("build artifact not found: {}", key.display());
        }

        let mut ran = 0;
        for (path, action) in self.actions.iter_mut() {
            if *path != key {
                continue;
            }
            ran += 1;
            info!("running post action `{}`", action.name());
            let status = action.run(&key, env)?;
            if status != 0 {
                warn!("post action `{}` failed with status {status}", action.name());
                return Ok(status);
            }
        }

        if ran == 0 {
            debug!("no post actions registered on {}", key.display());
        }
        Ok(0)
    }
}
