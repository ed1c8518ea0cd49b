//! cpal input connection feeding the analysis node.
//!
//! The audio callback downmixes to mono and keeps only the newest window of
//! samples. Reading a frame copies that window out and runs the analyser, so
//! the callback never waits on analysis.

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{FromSample, Sample, SizedSample};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use super::devices::{find_input_device, CpalDirectory};
use super::stderr::with_stderr_silenced;
use super::{
    Analyser, AnalysisFrame, AudioBackend, CaptureSettings, DeviceDirectory, InputConnection,
    InputDevice,
};
use crate::error::{classify_backend_error, ErrorKind, MeterError, Result};

/// Opens cpal input streams on the default host.
#[derive(Debug, Default, Clone, Copy)]
pub struct CpalBackend {
    directory: CpalDirectory,
}

impl CpalBackend {
    pub fn new() -> Self {
        Self {
            directory: CpalDirectory::new(),
        }
    }
}

impl DeviceDirectory for CpalBackend {
    fn list_input_devices(&self) -> Result<Vec<InputDevice>> {
        self.directory.list_input_devices()
    }

    async fn request_access(&self, device_id: &str) -> Result<()> {
        self.directory.request_access(device_id).await
    }
}

impl AudioBackend for CpalBackend {
    type Connection = CpalConnection;

    fn open(&self, device_id: &str, settings: &CaptureSettings) -> Result<CpalConnection> {
        // cpal hands over the raw device signal; there is no processing to switch off.
        if settings.constraints.any_enabled() {
            return Err(MeterError::AcquisitionFailed(
                "input processing (echo cancellation, noise suppression, gain control) is not available"
                    .to_string(),
            ));
        }

        let (device, supported) = with_stderr_silenced(|| -> Result<_> {
            let host = cpal::default_host();
            let device = find_input_device(&host, device_id)?;
            let supported = device.default_input_config().map_err(|e| match e {
                cpal::DefaultStreamConfigError::DeviceNotAvailable => {
                    MeterError::DeviceNotFound(device_id.to_string())
                }
                other => classify_backend_error(&other.to_string(), ErrorKind::Acquisition, device_id),
            })?;
            Ok((device, supported))
        })?;

        let device_name = device.name().unwrap_or_else(|_| device_id.to_string());
        let sample_format = supported.sample_format();
        let config: cpal::StreamConfig = supported.into();

        tracing::info!(
            "Opening input device '{}': {}Hz, {} channels, {:?}",
            device_name,
            config.sample_rate.0,
            config.channels,
            sample_format
        );

        let ring = Arc::new(Mutex::new(SampleRing::new(settings.window_size)));
        let fault = Arc::new(Mutex::new(None));

        let stream = match sample_format {
            cpal::SampleFormat::F32 => build_stream::<f32>(&device, &config, &ring, &fault),
            cpal::SampleFormat::I16 => build_stream::<i16>(&device, &config, &ring, &fault),
            cpal::SampleFormat::U16 => build_stream::<u16>(&device, &config, &ring, &fault),
            cpal::SampleFormat::I32 => build_stream::<i32>(&device, &config, &ring, &fault),
            other => {
                return Err(MeterError::AcquisitionFailed(format!(
                    "unsupported sample format {other:?}"
                )))
            }
        }
        .map_err(|e| match e {
            cpal::BuildStreamError::DeviceNotAvailable => {
                MeterError::DeviceNotFound(device_id.to_string())
            }
            other => classify_backend_error(&other.to_string(), ErrorKind::Acquisition, device_id),
        })?;

        stream.play().map_err(|e| match e {
            cpal::PlayStreamError::DeviceNotAvailable => {
                MeterError::DeviceNotFound(device_id.to_string())
            }
            other => classify_backend_error(&other.to_string(), ErrorKind::Acquisition, device_id),
        })?;

        tracing::debug!("Input stream started");

        Ok(CpalConnection {
            stream: Some(stream),
            ring,
            fault,
            analyser: Analyser::new(settings.window_size, settings.smoothing),
            device_name,
        })
    }
}

/// A playing cpal input stream plus its analysis node.
pub struct CpalConnection {
    stream: Option<cpal::Stream>,
    ring: Arc<Mutex<SampleRing>>,
    fault: Arc<Mutex<Option<String>>>,
    analyser: Analyser,
    device_name: String,
}

impl CpalConnection {
    pub fn device_name(&self) -> &str {
        &self.device_name
    }
}

impl InputConnection for CpalConnection {
    fn read_frame(&mut self) -> Result<AnalysisFrame> {
        if self.stream.is_none() {
            return Err(MeterError::DeviceLost("input stream is closed".to_string()));
        }
        if let Some(reason) = lock(&self.fault).clone() {
            return Err(MeterError::DeviceLost(reason));
        }

        let samples = lock(&self.ring).snapshot();
        let frequency = self.analyser.process(&samples);
        Ok(AnalysisFrame { samples, frequency })
    }

    fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.pause() {
                tracing::debug!("Pausing input stream failed: {}", e);
            }
            drop(stream);
            self.analyser.reset();
            tracing::info!("Input device '{}' released", self.device_name);
        }
    }
}

impl Drop for CpalConnection {
    fn drop(&mut self) {
        self.close();
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    ring: &Arc<Mutex<SampleRing>>,
    fault: &Arc<Mutex<Option<String>>>,
) -> std::result::Result<cpal::Stream, cpal::BuildStreamError>
where
    T: SizedSample,
    f32: FromSample<T>,
{
    let channels = usize::from(config.channels.max(1));
    let ring = Arc::clone(ring);
    let fault = Arc::clone(fault);

    device.build_input_stream(
        config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            let mut ring = lock(&ring);
            for frame in data.chunks_exact(channels) {
                let sum: f32 = frame.iter().map(|&s| f32::from_sample(s)).sum();
                ring.push(sum / channels as f32);
            }
        },
        move |err| {
            tracing::error!("Audio stream error: {}", err);
            lock(&fault).get_or_insert_with(|| err.to_string());
        },
        None,
    )
}

/// Poisoning only means a callback panicked mid-push; the samples stay usable.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// The newest `capacity` mono samples.
#[derive(Debug)]
struct SampleRing {
    samples: VecDeque<f32>,
    capacity: usize,
}

impl SampleRing {
    fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::from(vec![0.0; capacity]),
            capacity,
        }
    }

    fn push(&mut self, sample: f32) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        let sample = if sample.is_finite() { sample.clamp(-1.0, 1.0) } else { 0.0 };
        self.samples.push_back(sample);
    }

    fn snapshot(&self) -> Vec<f32> {
        self.samples.iter().copied().collect()
    }
}
