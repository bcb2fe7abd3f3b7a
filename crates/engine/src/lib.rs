//! Reference audio output: plays recorded guitar samples through the default
//! cpal device. The UI thread renders voices, the audio thread only mixes.

mod bank;

use std::path::Path;

use basedrop::Collector;
use cpal::{
    FromSample, SizedSample,
    traits::{DeviceTrait, HostTrait, StreamTrait},
};
use fretseq_core::{AudioService, STRING_COUNT};

pub use bank::{SampleBank, VoiceSamples, resample};

/// Upper bound on simultaneously sounding notes.
pub const MAX_VOICES: usize = 64;

/// Extra ring-out after the fade reaches zero, matching the recorded tails.
pub const RELEASE_TAIL_SECS: f64 = 0.1;

/// A note handed to the audio thread.
pub struct Voice {
    pub samples: VoiceSamples,
    /// Frames over which the gain falls linearly from 1 to 0.
    pub fade_frames: usize,
    /// Frame at which the voice is dropped.
    pub stop_frames: usize,
}

impl Voice {
    pub fn new(samples: VoiceSamples, duration_secs: f64, sample_rate: u32) -> Self {
        let rate = f64::from(sample_rate);
        Self {
            samples,
            fade_frames: (duration_secs * rate).max(1.0) as usize,
            stop_frames: ((duration_secs + RELEASE_TAIL_SECS) * rate) as usize,
        }
    }
}

pub enum Command {
    Play(Voice),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// A voice arrived while every slot was busy.
    VoiceDropped,
}

struct PlayingVoice {
    voice: Voice,
    position: usize,
}

/// Voices currently sounding. Capacity is reserved up front so the audio
/// callback never allocates.
pub struct Mixer {
    voices: Vec<PlayingVoice>,
}

impl Mixer {
    pub fn new() -> Self {
        Self {
            voices: Vec::with_capacity(MAX_VOICES),
        }
    }

    pub fn active(&self) -> usize {
        self.voices.len()
    }

    /// Returns `false` when the pool is full.
    pub fn start(&mut self, voice: Voice) -> bool {
        if self.voices.len() >= MAX_VOICES {
            return false;
        }
        self.voices.push(PlayingVoice { voice, position: 0 });
        true
    }

    /// Next mono output sample; finished voices are released.
    pub fn next_sample(&mut self) -> f32 {
        let mut mixed = 0.0f32;
        let mut i = 0;
        while i < self.voices.len() {
            let playing = &mut self.voices[i];
            let voice = &playing.voice;
            if playing.position >= voice.stop_frames || playing.position >= voice.samples.len() {
                self.voices.swap_remove(i);
                continue;
            }
            let gain = 1.0 - playing.position as f32 / voice.fade_frames as f32;
            mixed += voice.samples[playing.position] * gain.max(0.0);
            playing.position += 1;
            i += 1;
        }
        mixed
    }
}

impl Default for Mixer {
    fn default() -> Self {
        Self::new()
    }
}

/// [`AudioService`] backed by a cpal output stream.
pub struct EngineAudio {
    // dropped first so the callback releases its voices before the collector goes
    _stream: cpal::Stream,
    commands: rtrb::Producer<Command>,
    status: rtrb::Consumer<Status>,
    bank: SampleBank,
    collector: Collector,
    sample_rate: u32,
}

impl EngineAudio {
    /// Load the recordings under `sample_dir` and open the default device.
    pub fn start(sample_dir: &Path) -> anyhow::Result<Self> {
        let collector = Collector::new();
        let handle = collector.handle();

        let (command_tx, command_rx) = rtrb::RingBuffer::<Command>::new(MAX_VOICES);
        let (status_tx, status_rx) = rtrb::RingBuffer::<Status>::new(16);

        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| anyhow::anyhow!("no output device found"))?;

        let config = device.default_output_config()?;
        let sample_rate = config.sample_rate().0;

        let stream = match config.sample_format() {
            cpal::SampleFormat::F32 => build_stream::<f32>(&device, &config.into(), command_rx, status_tx)?,
            cpal::SampleFormat::I16 => build_stream::<i16>(&device, &config.into(), command_rx, status_tx)?,
            sample_format => anyhow::bail!("unsupported sample format '{sample_format}'"),
        };
        stream.play()?;

        let samples = fretseq_decode::load_guitar_samples(sample_dir);
        if samples.is_empty() {
            log::warn!("no guitar samples in {}, playback will be silent", sample_dir.display());
        }
        let bank = SampleBank::new(samples, sample_rate, handle);
        log::info!("audio output at {sample_rate} Hz, {} recording(s)", bank.len());

        Ok(Self {
            _stream: stream,
            commands: command_tx,
            status: status_rx,
            bank,
            collector,
            sample_rate,
        })
    }

    fn drain_status(&mut self) {
        while let Ok(status) = self.status.pop() {
            match status {
                Status::VoiceDropped => log::warn!("voice pool full, note dropped"),
            }
        }
    }
}

impl AudioService for EngineAudio {
    fn play(&mut self, string_index: u8, fret: u8, duration_secs: f64) {
        self.collector.collect();
        self.drain_status();

        if string_index >= STRING_COUNT {
            log::warn!("no string at row {string_index}");
            return;
        }
        // sample files count from the low E
        let string_num = STRING_COUNT - string_index;

        let samples = match self.bank.voice(string_num, fret) {
            Ok(Some(samples)) => samples,
            Ok(None) => {
                log::warn!("missing sample for string {string_num} fret {fret}");
                return;
            }
            Err(e) => {
                log::warn!("could not render string {string_num} fret {fret}: {e}");
                return;
            }
        };

        let voice = Voice::new(samples, duration_secs, self.sample_rate);
        if self.commands.push(Command::Play(voice)).is_err() {
            log::warn!("audio command queue full, note dropped");
        }
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut command_rx: rtrb::Consumer<Command>,
    mut status_tx: rtrb::Producer<Status>,
) -> anyhow::Result<cpal::Stream>
where
    T: SizedSample + FromSample<f32>,
{
    let output_channels = config.channels as usize;
    let mut mixer = Mixer::new();

    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            while let Ok(cmd) = command_rx.pop() {
                match cmd {
                    Command::Play(voice) => {
                        if !mixer.start(voice) {
                            let _ = status_tx.push(Status::VoiceDropped);
                        }
                    }
                }
            }

            for frame in data.chunks_mut(output_channels) {
                let value = T::from_sample(mixer.next_sample());
                for sample in frame.iter_mut() {
                    *sample = value;
                }
            }
        },
        |err| log::error!("stream error: {err}"),
        None,
    )?;

    Ok(stream)
}

#[cfg(test)]
mod tests {
    use basedrop::Shared;

    use super::*;

    fn voice(collector: &Collector, frames: usize, fade: usize, stop: usize) -> Voice {
        Voice {
            samples: Shared::new(&collector.handle(), vec![1.0; frames]),
            fade_frames: fade,
            stop_frames: stop,
        }
    }

    #[test]
    fn test_voice_frames_from_duration() {
        let collector = Collector::new();
        let v = Voice::new(Shared::new(&collector.handle(), vec![0.0; 10]), 2.0, 1000);
        assert_eq!((v.fade_frames, v.stop_frames), (2000, 2100));
    }

    #[test]
    fn test_gain_falls_linearly() {
        let collector = Collector::new();
        let mut mixer = Mixer::new();
        mixer.start(voice(&collector, 100, 4, 100));

        let out: Vec<f32> = (0..6).map(|_| mixer.next_sample()).collect();

        assert_eq!(out, vec![1.0, 0.75, 0.5, 0.25, 0.0, 0.0]);
    }

    #[test]
    fn test_voice_stops_at_tail_or_sample_end() {
        let collector = Collector::new();
        let mut mixer = Mixer::new();
        mixer.start(voice(&collector, 100, 100, 3));
        mixer.start(voice(&collector, 2, 100, 100));

        for _ in 0..3 {
            mixer.next_sample();
        }
        assert_eq!(mixer.active(), 1);
        mixer.next_sample();
        assert_eq!(mixer.active(), 0);
    }

    #[test]
    fn test_voices_sum_and_pool_is_bounded() {
        let collector = Collector::new();
        let mut mixer = Mixer::new();
        for _ in 0..MAX_VOICES {
            assert!(mixer.start(voice(&collector, 10, 100, 10)));
        }
        assert!(!mixer.start(voice(&collector, 10, 100, 10)));

        assert_eq!(mixer.next_sample(), MAX_VOICES as f32);
    }
}
