/// Looped music playback on a dedicated audio thread.
///
/// `rodio`'s output stream is not `Send`, so a single OS thread owns it together
/// with the current [`Sink`]. The cloneable [`AudioPlayer`] handle forwards
/// commands to that thread; play requests report back over a oneshot channel
/// so callers learn about missing or undecodable files.
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::mpsc as std_mpsc;

use anyhow::{anyhow, Context, Result};
use rodio::decoder::LoopedDecoder;
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink};
use tokio::sync::oneshot;

use crate::config::MAX_VOLUME;

enum Command {
    Play {
        path: PathBuf,
        reply: oneshot::Sender<Result<()>>,
    },
    Stop,
    SetVolume(u8),
}

/// Handle to the audio thread.
#[derive(Clone)]
pub struct AudioPlayer {
    tx: std_mpsc::Sender<Command>,
}

impl AudioPlayer {
    /// Spawns the audio thread with the given starting volume (0–100).
    pub fn spawn(initial_volume: u8) -> Result<Self> {
        let (tx, rx) = std_mpsc::channel();
        std::thread::Builder::new()
            .name("audio-output".into())
            .spawn(move || run(rx, initial_volume))
            .context("Failed to spawn audio thread")?;
        Ok(Self { tx })
    }

    /// Stops whatever is playing and loops the track at `path`.
    /// On error nothing plays.
    pub async fn play(&self, path: &Path) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Play {
                path: path.to_path_buf(),
                reply,
            })
            .map_err(|_| anyhow!("Audio thread has exited"))?;
        rx.await.context("Audio thread dropped the play request")?
    }

    pub fn stop(&self) {
        let _ = self.tx.send(Command::Stop);
    }

    /// Applies `volume` (0–100) to the current and all later tracks.
    pub fn set_volume(&self, volume: u8) {
        let _ = self.tx.send(Command::SetVolume(volume));
    }
}

/// Maps a 0–100 percentage linearly onto rodio's 0.0–1.0 gain.
pub fn volume_scale(volume: u8) -> f32 {
    f32::from(volume.min(MAX_VOLUME)) / f32::from(MAX_VOLUME)
}

/// Opens and decodes `path`, returning a decoder that restarts at the end of the track.
pub fn open_track(path: &Path) -> Result<LoopedDecoder<BufReader<File>>> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open music file: {}", path.display()))?;
    Decoder::new_looped(BufReader::new(file))
        .with_context(|| format!("Failed to decode music file: {}", path.display()))
}

struct Output {
    // Dropping the stream silences every sink created from its handle.
    _stream: OutputStream,
    handle: OutputStreamHandle,
}

fn run(rx: std_mpsc::Receiver<Command>, initial_volume: u8) {
    let output = match OutputStream::try_default() {
        Ok((stream, handle)) => Some(Output {
            _stream: stream,
            handle,
        }),
        Err(e) => {
            tracing::error!("No audio output device: {e}");
            None
        }
    };

    let mut volume = volume_scale(initial_volume);
    let mut sink: Option<Sink> = None;

    while let Ok(command) = rx.recv() {
        match command {
            Command::Play { path, reply } => {
                if let Some(old) = sink.take() {
                    old.stop();
                }
                let result = start(output.as_ref(), &path, volume).map(|new_sink| {
                    sink = Some(new_sink);
                });
                match &result {
                    Ok(()) => tracing::debug!("Playing {}", path.display()),
                    Err(e) => tracing::debug!("Play failed: {e:#}"),
                }
                let _ = reply.send(result);
            }
            Command::Stop => {
                if let Some(old) = sink.take() {
                    old.stop();
                    tracing::debug!("Stopped");
                }
            }
            Command::SetVolume(v) => {
                volume = volume_scale(v);
                if let Some(s) = &sink {
                    s.set_volume(volume);
                }
            }
        }
    }

    tracing::debug!("Audio thread exited");
}

/// Builds a sink already playing `path`.
fn start(output: Option<&Output>, path: &Path, volume: f32) -> Result<Sink> {
    let source = open_track(path)?;
    let output = output.ok_or_else(|| anyhow!("No audio output device available"))?;
    let sink = Sink::try_new(&output.handle).context("Failed to create audio sink")?;
    sink.set_volume(volume);
    sink.append(source);
    Ok(sink)
}
