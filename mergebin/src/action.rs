use std::path::{Path, PathBuf};

use byte_unit::Byte;
use colored::Colorize;

use crate::{
    command::MergeCommand,
    env::BuildEnv,
    hooks::PostAction,
    image::{FlashImage, ImageList},
};

/// Artifact the merge step is attached to.
pub const PROGRAM_BIN: &str = "$BUILD_DIR/${PROGNAME}.bin";

/// Where the merged image is written.
pub const MERGED_BIN: [&str; 2] = ["$BUILD_DIR", "${PROGNAME}-merged.bin"];

/// Merges the bootloader, partition table, extra images and the application
/// into one flashable binary with `esptool merge_bin`.
#[derive(Debug, Default)]
pub struct MergeAction;

impl MergeAction {
    pub fn new() -> Self {
        Self
    }

    pub fn new_boxed() -> Box<dyn PostAction> {
        Box::new(Self)
    }

    pub fn merged_bin_path(env: &BuildEnv) -> PathBuf {
        env.join(MERGED_BIN)
    }

    /// Flash images in merge order: the registered extra images first, the
    /// application at the configured offset last.
    pub fn images(&self, target: &Path, env: &BuildEnv) -> ImageList {
        let mut images = ImageList::from_items(&env.config.flash_extra_images);
        let target = env.abspath(target);
        images.push(FlashImage::new(
            env.config.app_offset(),
            target.display().to_string(),
        ));

        if !images.is_paired() {
            warn!(
                "flash images do not form offset/path pairs ({} arguments)",
                images.args().len()
            );
        }
        images
    }

    pub fn command(&self, target: &Path, env: &BuildEnv) -> anyhow::Result<MergeCommand> {
        let board = &env.board;
        let tool = env.subst(env.config.objcopy());
        let invoker = env.subst("$PYTHONEXE");

        let mut cmd = if invoker.trim().is_empty() {
            MergeCommand::new(tool)
        } else {
            let mut cmd = MergeCommand::new(invoker);
            cmd.arg(tool);
            cmd
        };

        cmd.args(["--chip", board.mcu(), "merge_bin"])
            .arg("-o")
            .arg(Self::merged_bin_path(env).display().to_string())
            .args(["--flash_mode", board.flash_mode()])
            .arg("--flash_freq")
            .arg(board.flash_freq()?)
            .args(["--flash_size", board.flash_size()]);

        let images = self.images(target, env);
        for image in images.images() {
            debug!("image {} at {}", image.path, image.offset);
        }
        cmd.args(images.args().iter().map(|arg| env.subst(arg)));

        Ok(cmd)
    }
}

impl PostAction for MergeAction {
    fn name(&self) -> &str {
        "merge_bin"
    }

    fn run(&mut self, target: &Path, env: &BuildEnv) -> anyhow::Result<i32> {
        let cmd = self.command(target, env)?;

        println!("{}", "Merging firmware images...".bold().cyan());
        let status = cmd.exec(&env.workdir)?;

        if status == 0 {
            let merged = Self::merged_bin_path(env);
            println!("Merged binary created: {}", merged.display());
            match std::fs::metadata(&merged) {
                Ok(meta) => println!("merged image size: {:#}", Byte::from_u64(meta.len())),
                Err(e) => warn!("can not stat {}: {e}", merged.display()),
            }
        } else {
            debug!("merge tool exited with status {status}");
        }

        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::ProjectConfig, image::ImageItem};

    fn env(config: ProjectConfig) -> BuildEnv {
        BuildEnv::new(PathBuf::from("/build"), config).unwrap()
    }

    fn base_config() -> ProjectConfig {
        ProjectConfig {
            python_exe: Some("python3".to_string()),
            build_dir: Some("/build".to_string()),
            ..Default::default()
        }
    }

    fn image_args(cmd: &MergeCommand) -> Vec<String> {
        let args = cmd.get_args();
        let pos = args.iter().position(|a| a == "--flash_size").unwrap();
        args[pos + 2..].to_vec()
    }

    #[test]
    fn end_to_end_layout() {
        let mut config = base_config();
        config.objcopy = Some("esptool.py".to_string());
        config.flash_extra_images = vec![
            ImageItem::from("0x1000"),
            ImageItem::from("bootloader.bin"),
            ImageItem::from("0x8000"),
            ImageItem::from("partitions.bin"),
        ];
        config.app_offset = Some("0x10000".into());
        let env = env(config);

        let cmd = MergeAction::new()
            .command(Path::new("/build/firmware.bin"), &env)
            .unwrap();

        assert_eq!(cmd.program(), "python3");
        assert_eq!(
            cmd.get_args(),
            [
                "esptool.py",
                "--chip",
                "esp32",
                "merge_bin",
                "-o",
                "/build/firmware-merged.bin",
                "--flash_mode",
                "dio",
                "--flash_freq",
                "40m",
                "--flash_size",
                "4MB",
                "0x1000",
                "bootloader.bin",
                "0x8000",
                "partitions.bin",
                "0x10000",
                "/build/firmware.bin",
            ]
        );
    }

    #[test]
    fn only_app_image_when_no_extras() {
        let env = env(base_config());
        let cmd = MergeAction::new()
            .command(Path::new("/build/firmware.bin"), &env)
            .unwrap();
        assert_eq!(image_args(&cmd), ["0x10000", "/build/firmware.bin"]);
    }

    #[test]
    fn odd_image_count_still_passed_through() {
        let mut config = base_config();
        config.flash_extra_images = vec![ImageItem::from("0x1000")];
        let env = env(config);
        let target = Path::new("/build/firmware.bin");

        assert!(!MergeAction::new().images(target, &env).is_paired());
        let cmd = MergeAction::new().command(target, &env).unwrap();
        assert_eq!(image_args(&cmd), ["0x1000", "0x10000", "/build/firmware.bin"]);
    }

    #[test]
    fn board_values_and_tool_path() {
        let mut config = base_config();
        config.objcopy = Some("$PROJECT_DIR/tools/esptool.py".to_string());
        config.board.build.mcu = Some("esp32s3".to_string());
        config.board.build.flash_mode = Some("qio".to_string());
        config.board.build.f_flash = Some("80000000L".into());
        config.board.upload.flash_size = Some("16MB".to_string());
        let env = env(config);

        let cmd = MergeAction::new()
            .command(Path::new("/build/firmware.bin"), &env)
            .unwrap();
        let args = cmd.get_args();
        assert_eq!(args[0], "/build/tools/esptool.py");
        assert_eq!(args[1..4], ["--chip", "esp32s3", "merge_bin"]);
        assert_eq!(
            args[6..12],
            ["--flash_mode", "qio", "--flash_freq", "80m", "--flash_size", "16MB"]
        );
    }

    #[test]
    fn image_args_are_expanded() {
        let mut config = base_config();
        config.progname = Some("meshcore".to_string());
        config.flash_extra_images = vec![ImageItem::List(vec![
            ImageItem::from("0x0"),
            ImageItem::from("$BUILD_DIR/bootloader.bin"),
        ])];
        let env = env(config);

        let cmd = MergeAction::new()
            .command(Path::new("/build/meshcore.bin"), &env)
            .unwrap();
        assert_eq!(
            image_args(&cmd),
            ["0x0", "/build/bootloader.bin", "0x10000", "/build/meshcore.bin"]
        );
        assert!(cmd.display_string().contains("-o /build/meshcore-merged.bin"));
    }

    #[test]
    fn relative_target_made_absolute() {
        let env = env(base_config());
        let cmd = MergeAction::new()
            .command(Path::new("out/app.bin"), &env)
            .unwrap();
        assert_eq!(image_args(&cmd), ["0x10000", "/build/out/app.bin"]);
    }

    #[test]
    fn empty_invoker_runs_tool_directly() {
        let mut config = base_config();
        config.python_exe = Some(String::new());
        config.objcopy = Some("esptool".to_string());
        let env = env(config);

        let cmd = MergeAction::new()
            .command(Path::new("/build/firmware.bin"), &env)
            .unwrap();
        assert_eq!(cmd.program(), "esptool");
        assert_eq!(cmd.get_args()[0], "--chip");
    }

    #[test]
    fn bad_flash_freq_fails_command() {
        let mut config = base_config();
        config.board.build.f_flash = Some("eighty".into());
        let env = env(config);
        assert!(
            MergeAction::new()
                .command(Path::new("/build/firmware.bin"), &env)
                .is_err()
        );
    }

    #[cfg(unix)]
    #[test]
    fn run_returns_tool_status() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("firmware.bin");
        std::fs::write(&target, b"app").unwrap();

        for (script, expected) in [("exit 0", 0), ("exit 4", 4)] {
            let tool = dir.path().join("tool.sh");
            std::fs::write(&tool, script).unwrap();

            let config = ProjectConfig {
                python_exe: Some("sh".to_string()),
                objcopy: Some(tool.display().to_string()),
                build_dir: Some("$PROJECT_DIR".to_string()),
                ..Default::default()
            };
            let env = BuildEnv::new(dir.path().to_path_buf(), config).unwrap();

            let status = MergeAction::new().run(&target, &env).unwrap();
            assert_eq!(status, expected);
        }
    }
}
