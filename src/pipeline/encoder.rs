//! Encoder - ffmpeg wrapper turning raw PCM into a normalized MP3
use crate::audio::{PcmFormat, INPUT_FORMAT};
use crate::error::{Error, Result};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info, warn};

use super::filters::FilterChain;

pub const DEFAULT_BITRATE_K: u32 = 96;
pub const OUTPUT_SAMPLE_RATE: u32 = 44_100;

/// Lines of ffmpeg stderr kept in error messages
const STDERR_TAIL_LINES: usize = 12;

/// Where the raw PCM comes from
#[derive(Debug, Clone)]
pub enum PcmInput {
    File(PathBuf),
    /// Piped to the encoder's stdin
    Memory(Vec<u8>),
}

#[derive(Debug, Clone)]
pub struct EncodeRequest {
    pub input: PcmInput,
    pub output: PathBuf,
    pub chain: FilterChain,
    pub bitrate_k: u32,
    pub mono: bool,
}

impl EncodeRequest {
    pub fn output_channels(&self) -> u16 {
        if self.mono {
            1
        } else {
            2
        }
    }
}

#[derive(Debug, Clone)]
pub struct Encoder {
    ffmpeg_path: PathBuf,
    input_format: PcmFormat,
}

impl Encoder {
    pub fn new(ffmpeg_path: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            input_format: INPUT_FORMAT,
        }
    }

    pub fn ffmpeg_path(&self) -> &Path {
        &self.ffmpeg_path
    }

    /// Full ffmpeg argument list for `req`
    pub fn command_args(&self, req: &EncodeRequest) -> Vec<OsString> {
        let input: OsString = match &req.input {
            PcmInput::File(path) => path.clone().into_os_string(),
            PcmInput::Memory(_) => "pipe:0".into(),
        };

        let mut args: Vec<OsString> = vec![
            "-hide_banner".into(),
            "-nostats".into(),
            "-y".into(), // Overwrite output file
            "-f".into(),
            self.input_format.ffmpeg_format().into(),
            "-ac".into(),
            self.input_format.channels.to_string().into(),
            "-ar".into(),
            self.input_format.sample_rate.to_string().into(),
            "-i".into(),
            input,
        ];

        args.extend([
            "-af".into(),
            req.chain.to_ffmpeg_expr().into(),
            "-c:a".into(),
            "libmp3lame".into(),
            "-b:a".into(),
            format!("{}k", req.bitrate_k).into(),
            "-ar".into(),
            OUTPUT_SAMPLE_RATE.to_string().into(),
            "-ac".into(),
            req.output_channels().to_string().into(),
            "-f".into(),
            "mp3".into(),
            req.output.clone().into_os_string(),
        ]);

        args
    }

    /// Run the encoder to completion
    ///
    /// Any failure removes whatever the process left at the output path.
    pub async fn encode(&self, req: &EncodeRequest) -> Result<()> {
        info!(
            "Encoding {} ({} kbps, {} ch)",
            req.output.display(),
            req.bitrate_k,
            req.output_channels()
        );
        debug!("Filter chain: {}", req.chain.to_ffmpeg_expr());

        let result = self.run(req).await;
        if result.is_err() {
            discard_output(&req.output).await;
        }
        result
    }

    async fn run(&self, req: &EncodeRequest) -> Result<()> {
        let stdin = match req.input {
            PcmInput::File(_) => Stdio::null(),
            PcmInput::Memory(_) => Stdio::piped(),
        };

        let mut child = Command::new(&self.ffmpeg_path)
            .args(self.command_args(req))
            .stdin(stdin)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                Error::Encode(format!(
                    "failed to start {}: {}",
                    self.ffmpeg_path.display(),
                    e
                ))
            })?;

        let feeder = match (&req.input, child.stdin.take()) {
            (PcmInput::Memory(bytes), Some(mut pipe)) => {
                let bytes = bytes.clone();
                Some(tokio::spawn(async move {
                    let written = pipe.write_all(&bytes).await;
                    drop(pipe);
                    written
                }))
            }
            _ => None,
        };

        let output = child.wait_with_output().await?;

        if let Some(feeder) = feeder {
            match feeder.await {
                Ok(Ok(())) => {}
                // A broken pipe here means ffmpeg bailed out; its status says why
                Ok(Err(e)) if output.status.success() => {
                    return Err(Error::Encode(format!("failed to feed PCM: {}", e)))
                }
                Ok(Err(e)) => debug!("PCM feed interrupted: {}", e),
                Err(e) => return Err(Error::Encode(format!("PCM feeder panicked: {}", e))),
            }
        }

        if !output.status.success() {
            return Err(Error::Encode(format!(
                "ffmpeg exited with {}: {}",
                output.status,
                stderr_tail(&output.stderr)
            )));
        }

        if !tokio::fs::try_exists(&req.output).await.unwrap_or(false) {
            return Err(Error::Encode(format!(
                "ffmpeg reported success but wrote no file at {}",
                req.output.display()
            )));
        }

        Ok(())
    }
}

/// Remove a failed encode's leftovers
pub(crate) async fn discard_output(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => info!("Removed incomplete output {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove {}: {}", path.display(), e),
    }
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join("\n")
}
