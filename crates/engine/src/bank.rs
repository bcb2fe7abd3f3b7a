use std::collections::HashMap;

use basedrop::{Handle, Shared};
use fretseq_decode::{GuitarSample, nearest_recorded_fret, pitch_ratio};
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

/// Mono recording ready to be mixed at the device rate.
pub type VoiceSamples = Shared<Vec<f32>>;

struct Recording {
    samples: Vec<f32>,
    sample_rate: u32,
}

/// Recorded guitar notes keyed by `(string_num, fret)`, with every pitched
/// and rate-converted variant cached after first use.
pub struct SampleBank {
    recordings: HashMap<(u8, u8), Recording>,
    rendered: HashMap<(u8, u8), VoiceSamples>,
    output_rate: u32,
    handle: Handle,
}

impl SampleBank {
    pub fn new(samples: Vec<GuitarSample>, output_rate: u32, handle: Handle) -> Self {
        let recordings = samples
            .into_iter()
            .map(|s| {
                let recording = Recording {
                    samples: s.audio.to_mono(),
                    sample_rate: s.audio.sample_rate,
                };
                ((s.string_num, s.fret), recording)
            })
            .collect();
        Self {
            recordings,
            rendered: HashMap::new(),
            output_rate,
            handle,
        }
    }

    pub fn len(&self) -> usize {
        self.recordings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recordings.is_empty()
    }

    pub fn output_rate(&self) -> u32 {
        self.output_rate
    }

    /// Samples for `fret` on `string_num` (1 = low E), pitched from the nearest
    /// recording. `Ok(None)` when that recording is missing.
    pub fn voice(&mut self, string_num: u8, fret: u8) -> anyhow::Result<Option<VoiceSamples>> {
        if let Some(cached) = self.rendered.get(&(string_num, fret)) {
            return Ok(Some(cached.clone()));
        }

        let nearest = nearest_recorded_fret(fret);
        let Some(recording) = self.recordings.get(&(string_num, nearest)) else {
            return Ok(None);
        };

        // playing faster raises the pitch, so stretch the rate conversion by
        // the inverse of the playback rate
        let ratio = f64::from(self.output_rate)
            / f64::from(recording.sample_rate)
            / pitch_ratio(nearest, fret);
        let samples = resample(&recording.samples, ratio)?;
        log::debug!(
            "rendered string {string_num} fret {fret} from fret {nearest} ({} frames)",
            samples.len()
        );

        let shared = Shared::new(&self.handle, samples);
        self.rendered.insert((string_num, fret), shared.clone());
        Ok(Some(shared))
    }
}

/// Mono sinc resampling by `ratio` (output rate / input rate).
pub fn resample(input: &[f32], ratio: f64) -> anyhow::Result<Vec<f32>> {
    if input.is_empty() || (ratio - 1.0).abs() < f64::EPSILON {
        return Ok(input.to_vec());
    }

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let mut resampler = SincFixedIn::<f32>::new(ratio, 2.0, params, input.len(), 1)?;
    let channels = vec![input.to_vec()];
    let mut output = resampler.process(&channels, None)?;
    Ok(output.pop().unwrap_or_default())
}
