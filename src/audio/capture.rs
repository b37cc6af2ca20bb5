//! Real microphone capture using CPAL (Cross-Platform Audio Library).

use crate::audio::recorder::AudioSource;
use crate::defaults;
use crate::error::{Result, TalkbackError};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::{Arc, Mutex};

/// Run a closure with stderr temporarily redirected to /dev/null.
///
/// Suppresses noisy ALSA/JACK/PipeWire messages that CPAL triggers when
/// probing audio backends. The messages are harmless but confusing to users.
///
/// # Safety
/// Uses `libc::dup`/`libc::dup2` to save and restore file descriptor 2.
/// Safe as long as no other thread is concurrently manipulating fd 2.
fn with_suppressed_stderr<F, R>(f: F) -> R
where
    F: FnOnce() -> R,
{
    unsafe {
        let saved_fd = libc::dup(2);
        let devnull = libc::open(c"/dev/null".as_ptr(), libc::O_WRONLY);
        if saved_fd >= 0 && devnull >= 0 {
            libc::dup2(devnull, 2);
            libc::close(devnull);
        }

        let result = f();

        if saved_fd >= 0 {
            libc::dup2(saved_fd, 2);
            libc::close(saved_fd);
        }

        result
    }
}

/// List all available audio input device names.
pub fn list_devices() -> Result<Vec<String>> {
    let devices = with_suppressed_stderr(|| cpal::default_host().input_devices()).map_err(|e| {
        TalkbackError::AudioCapture {
            message: format!("Failed to enumerate input devices: {}", e),
        }
    })?;

    Ok(devices.filter_map(|d| d.name().ok()).collect())
}

/// Wrapper for cpal::Stream to make it Send.
///
/// SAFETY: the stream is only touched by the capture worker thread that owns
/// this source; access is serialized through the surrounding Mutex.
struct SendableStream(cpal::Stream);

unsafe impl Send for SendableStream {}

/// Microphone capture at 16kHz mono i16.
///
/// Tries the preferred format (i16/16kHz/mono) first, then f32 with sample
/// conversion, then the device's native config with channel mixing and
/// linear resampling in software. The device callback only appends to an
/// in-memory buffer; it never blocks on downstream work.
pub struct CpalAudioSource {
    device: cpal::Device,
    stream: Option<SendableStream>,
    buffer: Arc<Mutex<Vec<i16>>>,
    sample_rate: u32,
}

impl CpalAudioSource {
    /// Create a new CPAL audio source.
    ///
    /// # Arguments
    /// * `device_name` - Optional device name. If None, uses the default
    ///   input device.
    pub fn new(device_name: Option<&str>) -> Result<Self> {
        let device = with_suppressed_stderr(|| {
            let host = cpal::default_host();

            if let Some(name) = device_name {
                let mut devices =
                    host.input_devices()
                        .map_err(|e| TalkbackError::AudioCapture {
                            message: format!("Failed to enumerate devices: {}", e),
                        })?;

                devices
                    .find(|dev| dev.name().is_ok_and(|n| n == name))
                    .ok_or_else(|| TalkbackError::AudioDeviceNotFound {
                        device: name.to_string(),
                    })
            } else {
                host.default_input_device()
                    .ok_or_else(|| TalkbackError::AudioDeviceNotFound {
                        device: "default".to_string(),
                    })
            }
        })?;

        Ok(Self {
            device,
            stream: None,
            buffer: Arc::new(Mutex::new(Vec::new())),
            sample_rate: defaults::SAMPLE_RATE,
        })
    }

    fn build_stream(&self) -> Result<cpal::Stream> {
        let preferred_config = cpal::StreamConfig {
            channels: 1,
            sample_rate: cpal::SampleRate(self.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let err_callback = |err| {
            eprintln!("talkback: audio stream error: {}", err);
        };

        // i16/16kHz/mono — PipeWire/PulseAudio convert transparently
        let buffer = Arc::clone(&self.buffer);
        if let Ok(stream) = self.device.build_input_stream(
            &preferred_config,
            move |data: &[i16], _: &cpal::InputCallbackInfo| {
                if let Ok(mut buf) = buffer.lock() {
                    buf.extend_from_slice(data);
                }
            },
            err_callback,
            None,
        ) {
            return Ok(stream);
        }

        // f32/16kHz/mono — for devices that only expose float formats
        let buffer = Arc::clone(&self.buffer);
        if let Ok(stream) = self.device.build_input_stream(
            &preferred_config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                if let Ok(mut buf) = buffer.lock() {
                    buf.extend(
                        data.iter()
                            .map(|&s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16),
                    );
                }
            },
            err_callback,
            None,
        ) {
            return Ok(stream);
        }

        self.build_stream_native()
    }

    /// Capture at the device's native config, converting in software.
    /// Some PipeWire-ALSA setups accept non-native configs but never
    /// deliver data.
    fn build_stream_native(&self) -> Result<cpal::Stream> {
        use cpal::SampleFormat;

        let default_config =
            self.device
                .default_input_config()
                .map_err(|e| TalkbackError::AudioCapture {
                    message: format!("Failed to query default input config: {}", e),
                })?;

        let native_rate = default_config.sample_rate().0;
        let native_channels = default_config.channels() as usize;
        let target_rate = self.sample_rate;
        let stream_config: cpal::StreamConfig = default_config.clone().into();

        eprintln!(
            "talkback: using native audio format ({}ch/{}Hz/{:?}), converting in software",
            native_channels,
            native_rate,
            default_config.sample_format(),
        );

        let err_callback = |err| {
            eprintln!("talkback: audio stream error: {}", err);
        };

        let buffer = Arc::clone(&self.buffer);
        match default_config.sample_format() {
            SampleFormat::I16 => self
                .device
                .build_input_stream(
                    &stream_config,
                    move |data: &[i16], _: &cpal::InputCallbackInfo| {
                        let converted =
                            downmix_and_resample(data, native_channels, native_rate, target_rate);
                        if let Ok(mut buf) = buffer.lock() {
                            buf.extend_from_slice(&converted);
                        }
                    },
                    err_callback,
                    None,
                )
                .map_err(|e| TalkbackError::AudioCapture {
                    message: format!("Failed to build native i16 stream: {}", e),
                }),
            SampleFormat::F32 => self
                .device
                .build_input_stream(
                    &stream_config,
                    move |data: &[f32], _: &cpal::InputCallbackInfo| {
                        let i16_data: Vec<i16> = data
                            .iter()
                            .map(|&s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
                            .collect();
                        let converted = downmix_and_resample(
                            &i16_data,
                            native_channels,
                            native_rate,
                            target_rate,
                        );
                        if let Ok(mut buf) = buffer.lock() {
                            buf.extend_from_slice(&converted);
                        }
                    },
                    err_callback,
                    None,
                )
                .map_err(|e| TalkbackError::AudioCapture {
                    message: format!("Failed to build native f32 stream: {}", e),
                }),
            fmt => Err(TalkbackError::AudioCapture {
                message: format!("Unsupported native sample format: {:?}", fmt),
            }),
        }
    }
}

impl AudioSource for CpalAudioSource {
    fn start(&mut self) -> Result<()> {
        let stream = self.build_stream()?;
        stream.play().map_err(|e| TalkbackError::AudioCapture {
            message: format!("Failed to start audio stream: {}", e),
        })?;
        self.stream = Some(SendableStream(stream));
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        // Dropping the stream stops capture
        self.stream = None;
        Ok(())
    }

    fn read_samples(&mut self) -> Result<Vec<i16>> {
        let mut buf = self
            .buffer
            .lock()
            .map_err(|_| TalkbackError::AudioCapture {
                message: "audio buffer lock poisoned".to_string(),
            })?;
        Ok(std::mem::take(&mut *buf))
    }
}

/// Mix interleaved channels to mono and linearly resample to `to_rate`.
fn downmix_and_resample(
    data: &[i16],
    channels: usize,
    from_rate: u32,
    to_rate: u32,
) -> Vec<i16> {
    let mono: Vec<i16> = if channels > 1 {
        data.chunks_exact(channels)
            .map(|frame| (frame.iter().map(|&s| s as i32).sum::<i32>() / channels as i32) as i16)
            .collect()
    } else {
        data.to_vec()
    };

    if from_rate == to_rate || mono.is_empty() {
        return mono;
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let output_len = (mono.len() as f64 / ratio).floor() as usize;
    (0..output_len)
        .map(|i| {
            let pos = i as f64 * ratio;
            let idx = pos.floor() as usize;
            let frac = pos - idx as f64;
            if idx + 1 >= mono.len() {
                mono[idx]
            } else {
                let left = mono[idx] as f64;
                let right = mono[idx + 1] as f64;
                (left + (right - left) * frac) as i16
            }
        })
        .collect()
}
