//! Audio capture: input device enumeration and a fixed-duration
//! recording primitive, backed by `cpal`.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

/// One enumerated audio input device: its index, name, and input
/// channel count.
pub struct DeviceInfo {
    pub index: usize,
    pub name: String,
    pub channels: u16,
}

/// Lists available audio input devices in enumeration order.
pub fn list_input_devices() -> Result<Vec<DeviceInfo>> {
    let host = cpal::default_host();
    let mut out = Vec::new();
    for (index, device) in host.input_devices().context("enumerating input devices")?.enumerate() {
        let name = device.name().unwrap_or_else(|_| "unknown".to_string());
        let channels = device
            .default_input_config()
            .map(|c| c.channels())
            .unwrap_or(0);
        out.push(DeviceInfo { index, name, channels });
    }
    Ok(out)
}

fn nth_input_device(index: usize) -> Result<cpal::Device> {
    let host = cpal::default_host();
    host.input_devices()
        .context("enumerating input devices")?
        .nth(index)
        .ok_or_else(|| anyhow!("no audio input device at index {}", index))
}

/// An opened, not-yet-started capture interface: a stream handle plus
/// the buffer its callback accumulates samples into.
pub struct Capture {
    stream: cpal::Stream,
    buffer: Arc<Mutex<Vec<f32>>>,
}

impl Capture {
    /// Opens `index` for stereo capture at `sample_rate`.
    pub fn open(index: usize, sample_rate: u32) -> Result<Self> {
        let device = nth_input_device(index)?;
        let config = cpal::StreamConfig {
            channels: 2,
            sample_rate: cpal::SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let buffer_cb = Arc::clone(&buffer);
        let err_fn = |err| log::warn!("audio input stream error: {}", err);

        let stream = device
            .build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    buffer_cb.lock().unwrap().extend_from_slice(data);
                },
                err_fn,
                None,
            )
            .context("opening audio input stream")?;

        Ok(Self { stream, buffer })
    }

    /// Starts the stream, sleeps for `duration`, stops it, and returns
    /// the interleaved stereo samples captured in that window.
    pub fn record(self, duration: Duration) -> Result<Vec<f32>> {
        self.stream.play().context("starting audio capture")?;
        std::thread::sleep(duration);
        self.stream.pause().context("stopping audio capture")?;
        Ok(Arc::try_unwrap(self.buffer)
            .map(|m| m.into_inner().unwrap())
            .unwrap_or_else(|shared| shared.lock().unwrap().clone()))
    }
}
