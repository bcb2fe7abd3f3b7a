use std::fs::File;
use std::path::{Path, PathBuf};

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// Frets that have a recording for every string. Other frets are pitched from
/// the nearest of these.
pub const RECORDED_FRETS: [u8; 6] = [0, 3, 5, 7, 9, 12];

/// Strings as numbered by the sample files: 1 is low E, 6 is high e.
pub const SAMPLE_STRINGS: std::ops::RangeInclusive<u8> = 1..=6;

/// Interleaved decoded audio.
#[derive(Debug, Clone)]
pub struct AudioBuffer {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl AudioBuffer {
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            return 0;
        }
        self.samples.len() / self.channels as usize
    }

    pub fn duration_secs(&self) -> f64 {
        self.frames() as f64 / f64::from(self.sample_rate.max(1))
    }

    /// Average all channels into one.
    pub fn to_mono(&self) -> Vec<f32> {
        let channels = self.channels.max(1) as usize;
        self.samples
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect()
    }
}

/// Location of one recording, e.g. `samples/guitar/1_5.wav`.
pub fn sample_path(dir: &Path, string_num: u8, fret: u8) -> PathBuf {
    dir.join(format!("{string_num}_{fret}.wav"))
}

/// Closest recorded fret; ties go to the lower one.
pub fn nearest_recorded_fret(fret: u8) -> u8 {
    RECORDED_FRETS
        .iter()
        .copied()
        .reduce(|best, candidate| {
            if candidate.abs_diff(fret) < best.abs_diff(fret) {
                candidate
            } else {
                best
            }
        })
        .unwrap_or(0)
}

/// Playback rate that moves a recording at `recorded` up or down to `fret`.
pub fn pitch_ratio(recorded: u8, fret: u8) -> f64 {
    2f64.powf((f64::from(fret) - f64::from(recorded)) / 12.0)
}

/// One decoded recording and where it sits on the neck.
#[derive(Debug, Clone)]
pub struct GuitarSample {
    pub string_num: u8,
    pub fret: u8,
    pub audio: AudioBuffer,
}

/// Decode every recording found under `dir`. Missing or unreadable files are
/// logged and skipped; the caller decides what to do about the gaps.
pub fn load_guitar_samples(dir: &Path) -> Vec<GuitarSample> {
    let mut loaded = Vec::new();
    for string_num in SAMPLE_STRINGS {
        for fret in RECORDED_FRETS {
            let path = sample_path(dir, string_num, fret);
            match decode_file(&path) {
                Ok(audio) => loaded.push(GuitarSample {
                    string_num,
                    fret,
                    audio,
                }),
                Err(e) => log::warn!("skipping {}: {e}", path.display()),
            }
        }
    }
    log::info!(
        "loaded {} of {} guitar samples from {}",
        loaded.len(),
        SAMPLE_STRINGS.count() * RECORDED_FRETS.len(),
        dir.display()
    );
    loaded
}

pub fn decode_file(path: &Path) -> anyhow::Result<AudioBuffer> {
    let file = File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe().format(
        &hint,
        mss,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;

    let mut format = probed.format;

    let track = format
        .default_track()
        .ok_or_else(|| anyhow::anyhow!("no default track"))?;

    let sample_rate = track.codec_params.sample_rate.unwrap_or(44100);
    let channels = track.codec_params.channels.map(|c| c.count()).unwrap_or(1) as u16;
    let track_id = track.id;

    let mut decoder =
        symphonia::default::get_codecs().make(&track.codec_params, &DecoderOptions::default())?;

    let mut samples = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(symphonia::core::errors::Error::IoError(e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => return Err(e.into()),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = decoder.decode(&packet)?;
        let spec = *decoded.spec();
        let duration = decoded.capacity() as u64;

        let mut sample_buf = SampleBuffer::<f32>::new(duration, spec);
        sample_buf.copy_interleaved_ref(decoded);
        samples.extend_from_slice(sample_buf.samples());
    }

    Ok(AudioBuffer {
        samples,
        sample_rate,
        channels,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write_wav(path: &Path, sample_rate: u32, channels: u16, frames: usize) {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).expect("create wav");
        for i in 0..frames {
            for _ in 0..channels {
                writer.write_sample((i % 100) as i16 * 100).expect("write sample");
            }
        }
        writer.finalize().expect("finalize wav");
    }

    #[test]
    fn test_nearest_recorded_fret() {
        assert_eq!(nearest_recorded_fret(0), 0);
        assert_eq!(nearest_recorded_fret(2), 3);
        // 4 is as close to 3 as to 5
        assert_eq!(nearest_recorded_fret(4), 3);
        assert_eq!(nearest_recorded_fret(11), 12);
        assert_eq!(nearest_recorded_fret(24), 12);
    }

    #[test]
    fn test_pitch_ratio_is_equal_tempered() {
        assert_eq!(pitch_ratio(12, 24), 2.0);
        assert_eq!(pitch_ratio(5, 5), 1.0);
        assert!((pitch_ratio(3, 2) - 2f64.powf(-1.0 / 12.0)).abs() < 1e-12);
    }

    #[test]
    fn test_sample_path_layout() {
        let path = sample_path(Path::new("samples/guitar"), 1, 5);
        assert_eq!(path, PathBuf::from("samples/guitar/1_5.wav"));
    }

    #[test]
    fn test_decode_wav() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("tone.wav");
        write_wav(&path, 22050, 2, 1000);

        let audio = decode_file(&path).expect("decode");

        assert_eq!(audio.sample_rate, 22050);
        assert_eq!(audio.channels, 2);
        assert_eq!(audio.frames(), 1000);
        assert_eq!(audio.to_mono().len(), 1000);
    }

    #[test]
    fn test_decode_missing_file() {
        assert!(decode_file(Path::new("/nonexistent/1_0.wav")).is_err());
    }

    #[test]
    fn test_load_guitar_samples_skips_missing() {
        let dir = tempdir().expect("tempdir");
        write_wav(&sample_path(dir.path(), 1, 0), 44100, 1, 64);
        write_wav(&sample_path(dir.path(), 6, 12), 44100, 1, 64);
        std::fs::write(sample_path(dir.path(), 3, 5), b"not a wav").expect("write");

        let samples = load_guitar_samples(dir.path());

        let found: Vec<(u8, u8)> = samples.iter().map(|s| (s.string_num, s.fret)).collect();
        assert_eq!(found, vec![(1, 0), (6, 12)]);
    }
}
