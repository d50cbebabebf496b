//! PC audio synthesis backend.
//!
//! Chords are rendered as additively summed unit sine waves, peak-normalized
//! so multiple frequencies never clip, scaled by volume into 16-bit signed
//! PCM, and streamed mono to the default output device through cpal.

use std::f32::consts::TAU;
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, SampleFormat, SizedSample};

use crate::error::Error;
use crate::output::{Dynamics, OutputBackend, Voice};

/// Nominal sample rate of the audio contract.
pub const SAMPLE_RATE: u32 = 44_100;

/// Render a chord as mono 16-bit signed PCM.
///
/// Unit-amplitude sine waves at the given frequencies are summed, the sum is
/// normalized by its peak absolute amplitude, then scaled by `volume`. A
/// single note is the same operation with a one-element list.
pub fn render_chord(
    frequencies: &[f32],
    duration: Duration,
    volume: f32,
    sample_rate: u32,
) -> Vec<i16> {
    let sample_count = (duration.as_secs_f32() * sample_rate as f32) as usize;
    let mut sum = vec![0.0f32; sample_count];
    for &frequency in frequencies {
        let step = TAU * frequency / sample_rate as f32;
        for (i, sample) in sum.iter_mut().enumerate() {
            *sample += (step * i as f32).sin();
        }
    }
    let peak = sum.iter().fold(0.0f32, |max, s| max.max(s.abs()));
    let scale = if peak > 0.0 {
        volume.clamp(0.0, 1.0) * i16::MAX as f32 / peak
    } else {
        0.0
    };
    sum.iter().map(|s| (s * scale) as i16).collect()
}

/// Additive sine synthesizer on the default cpal output device.
pub struct PcSynth {
    device: cpal::Device,
}

impl PcSynth {
    pub fn new() -> Result<Self, Error> {
        let device = cpal::default_host()
            .default_output_device()
            .ok_or(Error::NoAudioDevice)?;
        log::debug!(
            "using audio output device '{}'",
            device.name().unwrap_or_else(|_| "<unknown>".to_string())
        );
        Ok(PcSynth { device })
    }

    fn stream_samples<T>(
        &self,
        config: &cpal::StreamConfig,
        samples: Vec<i16>,
        duration: Duration,
    ) -> Result<(), Error>
    where
        T: SizedSample + FromSample<i16>,
    {
        let channels = config.channels as usize;
        let done = Arc::new((Mutex::new(false), Condvar::new()));
        let done_writer = Arc::clone(&done);
        let mut pos = 0usize;

        let stream = self
            .device
            .build_output_stream(
                config,
                move |out: &mut [T], _: &cpal::OutputCallbackInfo| {
                    for frame in out.chunks_mut(channels) {
                        let sample = if pos < samples.len() { samples[pos] } else { 0 };
                        pos += 1;
                        let value = T::from_sample(sample);
                        for channel in frame {
                            *channel = value;
                        }
                    }
                    if pos >= samples.len() {
                        let (finished, cvar) = &*done_writer;
                        *finished.lock().unwrap() = true;
                        cvar.notify_all();
                    }
                },
                |err| log::warn!("audio output stream error: {err}"),
                None,
            )
            .map_err(|e| Error::AudioStream(e.to_string()))?;
        stream.play().map_err(|e| Error::AudioStream(e.to_string()))?;

        // Block until the buffer has been consumed, with a guard against a
        // stalled stream.
        let (finished, cvar) = &*done;
        let guard = finished.lock().unwrap();
        let _unused = cvar
            .wait_timeout_while(guard, duration + Duration::from_millis(500), |f| !*f)
            .unwrap();
        Ok(())
    }
}

impl OutputBackend for PcSynth {
    fn play(
        &mut self,
        voices: &[Voice],
        duration: Duration,
        dynamics: Dynamics,
    ) -> Result<(), Error> {
        let config = self
            .device
            .default_output_config()
            .map_err(|e| Error::AudioStream(e.to_string()))?;
        let sample_rate = config.sample_rate().0;
        let frequencies: Vec<f32> = voices.iter().map(|v| v.frequency).collect();
        let samples = render_chord(&frequencies, duration, dynamics.volume, sample_rate);

        match config.sample_format() {
            SampleFormat::F32 => self.stream_samples::<f32>(&config.into(), samples, duration),
            SampleFormat::I16 => self.stream_samples::<i16>(&config.into(), samples, duration),
            SampleFormat::U16 => self.stream_samples::<u16>(&config.into(), samples, duration),
            other => Err(Error::AudioStream(format!(
                "unsupported sample format {other}"
            ))),
        }
    }

    fn name(&self) -> &'static str {
        "PC Audio"
    }
}
