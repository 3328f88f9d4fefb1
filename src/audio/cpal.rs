// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::{collections::VecDeque, error::Error, fmt, sync::Arc, thread};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use tracing::{debug, error, info, span, warn, Level};

use crate::audio::{
    thread_priority, Channel as AudioChannel, ChannelClosed, Device as AudioDevice, OutputFormat,
};
use crate::wav::Clip;

/// Clips a callback can have waiting behind the current one. The queue never
/// grows past this, so the callback doesn't allocate.
const QUEUE_CAPACITY: usize = 16;

/// Messages from a channel handle to its stream callback.
enum Command {
    Play(Clip),
    Cancel,
}

/// Read position inside one clip's PCM payload.
struct Cursor {
    clip: Clip,
    pos: usize,
}

impl Cursor {
    fn new(clip: Clip) -> Cursor {
        Cursor { clip, pos: 0 }
    }

    /// Next little-endian i16. A trailing odd byte is never played.
    #[inline]
    fn next_sample(&mut self) -> Option<i16> {
        let data = self.clip.data();
        if self.pos + 2 > data.len() {
            return None;
        }
        let sample = i16::from_le_bytes([data[self.pos], data[self.pos + 1]]);
        self.pos += 2;
        Some(sample)
    }
}

/// Render state owned by a stream callback.
struct Playback {
    current: Option<Cursor>,
    queue: VecDeque<Clip>,
}

impl Playback {
    fn new() -> Playback {
        Playback {
            current: None,
            queue: VecDeque::with_capacity(QUEUE_CAPACITY),
        }
    }

    fn apply(&mut self, command: Command) {
        match command {
            Command::Play(clip) => {
                if self.current.is_none() {
                    self.current = Some(Cursor::new(clip));
                    return;
                }
                if self.queue.len() == QUEUE_CAPACITY {
                    if let Some(dropped) = self.queue.pop_front() {
                        warn!(
                            clip = dropped.name(),
                            "Playback queue full, dropping oldest clip"
                        );
                    }
                }
                self.queue.push_back(clip);
            }
            Command::Cancel => {
                self.current = None;
                self.queue.clear();
            }
        }
    }

    #[inline]
    fn next_sample(&mut self) -> Option<i16> {
        loop {
            let cursor = self.current.as_mut()?;
            if let Some(sample) = cursor.next_sample() {
                return Some(sample);
            }
            self.current = self.queue.pop_front().map(Cursor::new);
        }
    }

    /// Applies pending commands in order, then fills the buffer. Shortfall is silence.
    fn render<T>(&mut self, commands: &Receiver<Command>, data: &mut [T])
    where
        T: cpal::Sample + cpal::FromSample<i16>,
    {
        while let Ok(command) = commands.try_recv() {
            self.apply(command);
        }
        for dst in data.iter_mut() {
            *dst = match self.next_sample() {
                Some(sample) => T::from_sample(sample),
                None => T::EQUILIBRIUM,
            };
        }
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    commands: Receiver<Command>,
) -> Result<cpal::Stream, cpal::BuildStreamError>
where
    T: cpal::SizedSample + cpal::FromSample<i16>,
{
    let mut playback = Playback::new();
    let priority = thread_priority::thread_priority(thread_priority::DEFAULT_CALLBACK_PRIORITY);
    let rt = thread_priority::rt_enabled();
    let mut priority_set = false;

    device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            if !priority_set {
                thread_priority::raise_current_thread("audio callback", priority, rt);
                priority_set = true;
            }
            playback.render(&commands, data);
        },
        |err| error!("CPAL output stream error: {}", err),
        None,
    )
}

/// Builds a stream matching the device's native sample type. Samples are converted from i16.
fn open_stream(
    device: &cpal::Device,
    format: &OutputFormat,
    commands: Receiver<Command>,
) -> Result<cpal::Stream, Box<dyn Error>> {
    let sample_format = device.default_output_config()?.sample_format();
    let config = cpal::StreamConfig {
        channels: format.channels,
        sample_rate: cpal::SampleRate(format.sample_rate),
        buffer_size: cpal::BufferSize::Default,
    };

    let stream = match sample_format {
        cpal::SampleFormat::F32 => build_stream::<f32>(device, &config, commands)?,
        cpal::SampleFormat::I16 => build_stream::<i16>(device, &config, commands)?,
        cpal::SampleFormat::U16 => build_stream::<u16>(device, &config, commands)?,
        cpal::SampleFormat::I32 => build_stream::<i32>(device, &config, commands)?,
        other => return Err(format!("unsupported device sample format {:?}", other).into()),
    };
    stream.play()?;
    Ok(stream)
}

/// A small wrapper around a cpal::Device.
pub struct Device {
    /// The name of the device.
    name: String,
    /// The maximum number of channels the device supports.
    max_channels: u16,
    /// The host ID of the device.
    host_id: cpal::HostId,
    /// The underlying cpal device.
    device: cpal::Device,
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (Channels={}) ({})",
            self.name,
            self.max_channels,
            self.host_id.name()
        )
    }
}

impl Device {
    /// Lists cpal devices and produces the Device trait.
    pub fn list() -> Result<Vec<Box<dyn AudioDevice>>, Box<dyn Error>> {
        Ok(Device::list_cpal_devices()?
            .into_iter()
            .map(|device| {
                let device: Box<dyn AudioDevice> = Box::new(device);
                device
            })
            .collect())
    }

    /// Lists cpal devices with at least one output channel.
    fn list_cpal_devices() -> Result<Vec<Device>, Box<dyn Error>> {
        // Suppress noisy output here.
        let _shh_stdout = shh::stdout()?;
        let _shh_stderr = shh::stderr()?;

        let mut devices: Vec<Device> = Vec::new();
        for host_id in cpal::available_hosts() {
            let host_devices = match cpal::host_from_id(host_id)?.devices() {
                Ok(host_devices) => host_devices,
                Err(e) => {
                    error!(
                        err = e.to_string(),
                        host = host_id.name(),
                        "Unable to list devices for host"
                    );
                    continue;
                }
            };

            for device in host_devices {
                if let Some(device) = Device::from_cpal(host_id, device) {
                    devices.push(device);
                }
            }
        }

        devices.sort_by_key(|device| device.name.to_string());
        Ok(devices)
    }

    /// Wraps a cpal device, skipping devices without output channels.
    fn from_cpal(host_id: cpal::HostId, device: cpal::Device) -> Option<Device> {
        let max_channels = device
            .supported_output_configs()
            .ok()?
            .map(|config| config.channels())
            .max()
            .unwrap_or(0);
        if max_channels == 0 {
            return None;
        }

        Some(Device {
            name: device.name().ok()?,
            max_channels,
            host_id,
            device,
        })
    }

    /// Gets the cpal device with the given name. "default" picks the default host's
    /// default output device.
    pub fn get(name: &str) -> Result<Device, Box<dyn Error>> {
        if name == "default" {
            let host = cpal::default_host();
            let device = host
                .default_output_device()
                .ok_or("no default output device")?;
            return Device::from_cpal(host.id(), device)
                .ok_or_else(|| "default output device has no output channels".into());
        }

        match Device::list_cpal_devices()?
            .into_iter()
            .find(|device| device.name.trim() == name)
        {
            Some(device) => Ok(device),
            None => Err(format!("no device found with name {}", name).into()),
        }
    }
}

impl AudioDevice for Device {
    fn open_channel(
        &self,
        label: &str,
        format: &OutputFormat,
    ) -> Result<Arc<dyn AudioChannel>, Box<dyn Error>> {
        if self.max_channels < format.channels {
            return Err(format!(
                "{} channels requested, audio device {} only has {}",
                format.channels, self.name, self.max_channels
            )
            .into());
        }

        let (command_tx, command_rx) = crossbeam_channel::unbounded::<Command>();
        let (ready_tx, ready_rx) = crossbeam_channel::bounded::<Result<(), String>>(1);
        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded::<()>(0);

        // cpal streams aren't Send, so each one lives on the thread that built it.
        let device = self.device.clone();
        let format = *format;
        let thread_label = label.to_string();
        let handle = thread::Builder::new()
            .name(format!("output-{}", label))
            .spawn(move || {
                let span = span!(Level::INFO, "output channel", channel = %thread_label);
                let _enter = span.enter();

                let stream = match open_stream(&device, &format, command_rx) {
                    Ok(stream) => stream,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e.to_string()));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(()));

                // Returns once the handle drops its end.
                let _ = shutdown_rx.recv();
                drop(stream);
                debug!("Output stream stopped");
            })?;

        match ready_rx.recv() {
            Ok(Ok(())) => {
                debug!(
                    device = self.name,
                    channel = label,
                    format = %format,
                    "Output stream started"
                );
                Ok(Arc::new(Channel {
                    label: label.to_string(),
                    commands: command_tx,
                    shutdown: Mutex::new(Some(shutdown_tx)),
                    thread: Mutex::new(Some(handle)),
                }))
            }
            Ok(Err(reason)) => {
                let _ = handle.join();
                Err(reason.into())
            }
            Err(_) => {
                let _ = handle.join();
                Err("output thread exited before the stream started".into())
            }
        }
    }

    #[cfg(test)]
    fn to_mock(&self) -> Result<Arc<super::mock::Device>, Box<dyn Error>> {
        Err("not a mock".into())
    }
}

/// A channel backed by one cpal output stream.
pub struct Channel {
    label: String,
    commands: Sender<Command>,
    shutdown: Mutex<Option<Sender<()>>>,
    thread: Mutex<Option<thread::JoinHandle<()>>>,
}

impl AudioChannel for Channel {
    fn submit(&self, clip: &Clip) -> Result<(), ChannelClosed> {
        self.commands
            .send(Command::Play(clip.clone()))
            .map_err(|_| ChannelClosed)
    }

    fn cancel(&self) -> Result<(), ChannelClosed> {
        self.commands
            .send(Command::Cancel)
            .map_err(|_| ChannelClosed)
    }

    fn close(&self) {
        drop(self.shutdown.lock().take());
        if let Some(handle) = self.thread.lock().take() {
            if handle.join().is_err() {
                error!(channel = self.label, "Output thread panicked");
            } else {
                info!(channel = self.label, "Output channel closed");
            }
        }
    }
}

impl Drop for Channel {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::testutil::test_clip;

    fn pcm_clip(name: &str, samples: &[i16]) -> Clip {
        let data: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        let fmt = crate::testutil::fmt_chunk(2, 44100, 16);
        let bytes: Arc<[u8]> =
            crate::testutil::riff(b"WAVE", &[(b"fmt ", &fmt), (b"data", &data)]).into();
        Clip::from_bytes(name, bytes).unwrap()
    }

    #[test]
    fn test_render_plays_then_silence() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let mut playback = Playback::new();
        tx.send(Command::Play(pcm_clip("a", &[1, -2, 3]))).unwrap();

        let mut out = [99i16; 5];
        playback.render(&rx, &mut out);
        assert_eq!(out, [1, -2, 3, 0, 0]);
        assert!(playback.current.is_none());
    }

    #[test]
    fn test_render_queues_in_order() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let mut playback = Playback::new();
        tx.send(Command::Play(pcm_clip("a", &[1, 2]))).unwrap();
        tx.send(Command::Play(pcm_clip("b", &[3]))).unwrap();

        let mut out = [0i16; 2];
        playback.render(&rx, &mut out);
        assert_eq!(out, [1, 2]);

        let mut out = [0i16; 2];
        playback.render(&rx, &mut out);
        assert_eq!(out, [3, 0]);
    }

    #[test]
    fn test_full_queue_drops_oldest() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let mut playback = Playback::new();
        let capacity = playback.queue.capacity();
        tx.send(Command::Play(pcm_clip("current", &[1]))).unwrap();
        for i in 0..=QUEUE_CAPACITY {
            let clip = pcm_clip("queued", &[i as i16 + 10]);
            tx.send(Command::Play(clip)).unwrap();
        }

        let mut out = [0i16; 1];
        playback.render(&rx, &mut out);
        assert_eq!(out, [1]);
        assert_eq!(playback.queue.len(), QUEUE_CAPACITY);
        assert_eq!(playback.queue.capacity(), capacity);

        // The first queued clip (10) was dropped to make room for the last.
        let mut out = [0i16; QUEUE_CAPACITY + 1];
        playback.render(&rx, &mut out);
        assert_eq!(out[0], 11);
        assert_eq!(out[QUEUE_CAPACITY - 1], 10 + QUEUE_CAPACITY as i16);
        assert_eq!(out[QUEUE_CAPACITY], 0);
    }

    #[test]
    fn test_cancel_then_play_cuts() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let mut playback = Playback::new();
        let long = pcm_clip("a", &[1, 1, 1, 1]);
        tx.send(Command::Play(long)).unwrap();

        let mut out = [0i16; 2];
        playback.render(&rx, &mut out);
        assert_eq!(out, [1, 1]);

        tx.send(Command::Play(pcm_clip("queued", &[7]))).unwrap();
        tx.send(Command::Cancel).unwrap();
        tx.send(Command::Play(pcm_clip("b", &[2, 2]))).unwrap();

        let mut out = [0i16; 4];
        playback.render(&rx, &mut out);
        assert_eq!(out, [2, 2, 0, 0]);
    }

    #[test]
    fn test_render_converts_sample_type() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let mut playback = Playback::new();
        let clip = pcm_clip("a", &[i16::MIN, 0]);
        tx.send(Command::Play(clip)).unwrap();

        let mut out = [1.0f32; 3];
        playback.render(&rx, &mut out);
        assert_eq!(out, [-1.0, 0.0, 0.0]);

        let mut out = [0u16; 1];
        playback.render(&rx, &mut out);
        assert_eq!(out, [32768u16]);
    }

    #[test]
    fn test_odd_trailing_byte_is_skipped() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let mut playback = Playback::new();
        tx.send(Command::Play(test_clip("odd", 3))).unwrap();

        let mut out = [9i16; 2];
        playback.render(&rx, &mut out);
        assert_eq!(out, [i16::from_le_bytes([0, 1]), 0]);
    }
}
