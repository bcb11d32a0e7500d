//! Speaker service contract.

/// Output format negotiated with the audio device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpeakerFormat {
    pub sample_rate: u32,
    pub channels: u32,
}

impl Default for SpeakerFormat {
    fn default() -> Self {
        Self {
            sample_rate: 48_000,
            channels: 2,
        }
    }
}

/// Anything that can fill an interleaved f32 frame buffer.
///
/// The sound pipeline's master bus implements this; the speaker pulls from
/// it inside [`Speaker::process`].
pub trait SpeakerSource {
    /// Fills `buffer` completely. `buffer.len()` is a multiple of the
    /// channel count.
    fn render(&mut self, buffer: &mut [f32]);
}

/// What the engine needs from an audio output device.
pub trait Speaker: Send {
    fn format(&self) -> SpeakerFormat;
    fn start(&mut self);
    fn stop(&mut self);
    /// Advances the device to `time_us`, pulling however many frames the
    /// device buffer needs from `source`.
    fn process(&mut self, time_us: u64, source: &mut dyn SpeakerSource);
}

/// Speaker double: pulls a fixed quantum per process call and retains the
/// last rendered buffer for inspection.
pub struct NullSpeaker {
    format: SpeakerFormat,
    /// Frames pulled per `process` call.
    pub quantum: usize,
    pub started: bool,
    pub last_buffer: Vec<f32>,
}

impl NullSpeaker {
    #[must_use]
    pub fn new(format: SpeakerFormat) -> Self {
        Self {
            format,
            quantum: 1024,
            started: false,
            last_buffer: Vec::new(),
        }
    }
}

impl Default for NullSpeaker {
    fn default() -> Self {
        Self::new(SpeakerFormat::default())
    }
}

impl Speaker for NullSpeaker {
    fn format(&self) -> SpeakerFormat {
        self.format
    }

    fn start(&mut self) {
        self.started = true;
    }

    fn stop(&mut self) {
        self.started = false;
    }

    fn process(&mut self, _time_us: u64, source: &mut dyn SpeakerSource) {
        let mut buffer = vec![0.0; self.quantum * self.format.channels as usize];
        source.render(&mut buffer);
        self.last_buffer = buffer;
    }
}
