use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use eyre::eyre;
use tracing::warn;

use crate::error::FrameResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DemoKind {
    /// Clear-only pass driven by the number keys.
    Clear,
    Cube,
    Pyramid,
    /// Mesh read from `--mesh`.
    Mesh,
}

impl FromStr for DemoKind {
    type Err = eyre::Report;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "clear" => Ok(DemoKind::Clear),
            "cube" => Ok(DemoKind::Cube),
            "pyramid" => Ok(DemoKind::Pyramid),
            "mesh" => Ok(DemoKind::Mesh),
            other => Err(eyre!(
                "unknown demo `{other}`, expected clear, cube, pyramid or mesh"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub use_warp_device: bool,
    pub demo: DemoKind,
    pub mesh_path: PathBuf,
    pub width: u32,
    pub height: u32,
    /// `None` waits on the fence forever.
    pub fence_timeout: Option<Duration>,
    pub depth_buffer: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            use_warp_device: false,
            demo: DemoKind::Cube,
            mesh_path: PathBuf::from("assets/octahedron.obj"),
            width: 1280,
            height: 720,
            fence_timeout: Some(Duration::from_millis(10_000)),
            depth_buffer: true,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> FrameResult<Self> {
        Self::from_args(std::env::args().skip(1))
    }

    /// Parses arguments, excluding the program name.
    pub fn from_args<I, S>(args: I) -> FrameResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut config = Self::default();
        let mut args = args.into_iter().map(Into::into);
        while let Some(arg) = args.next() {
            if arg.eq_ignore_ascii_case("-warp") || arg.eq_ignore_ascii_case("/warp") {
                config.use_warp_device = true;
                continue;
            }
            match arg.as_str() {
                "--demo" => config.demo = value_for(&arg, args.next())?.parse()?,
                "--mesh" => config.mesh_path = PathBuf::from(value_for(&arg, args.next())?),
                "--size" => {
                    let value = value_for(&arg, args.next())?;
                    (config.width, config.height) = parse_size(&value)?;
                }
                "--fence-timeout-ms" => {
                    let value = value_for(&arg, args.next())?;
                    let millis: u64 = value
                        .parse()
                        .map_err(|_| eyre!("--fence-timeout-ms expects milliseconds, got `{value}`"))?;
                    config.fence_timeout = (millis != 0).then(|| Duration::from_millis(millis));
                }
                "--no-depth" => config.depth_buffer = false,
                _ => warn!(argument = %arg, "ignoring unknown argument"),
            }
        }
        Ok(config)
    }
}

fn value_for(flag: &str, value: Option<String>) -> FrameResult<String> {
    value.ok_or_else(|| eyre!("{flag} expects a value").into())
}

fn parse_size(value: &str) -> FrameResult<(u32, u32)> {
    let parsed = value
        .split_once(['x', 'X'])
        .and_then(|(w, h)| Some((w.parse::<u32>().ok()?, h.parse::<u32>().ok()?)));
    match parsed {
        Some((width, height)) if width > 0 && height > 0 => Ok((width, height)),
        _ => Err(eyre!("--size expects <width>x<height>, got `{value}`").into()),
    }
}
