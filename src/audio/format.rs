/// Raw PCM layout accepted from the stream source.
///
/// The format is fixed, not detected: interleaved signed 16-bit little-endian
/// stereo at 44.1 kHz. Feeding anything else produces garbled output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcmFormat {
    pub sample_rate: u32,
    pub channels: u16,
    pub bytes_per_sample: u16,
}

/// The only input format the encoder is invoked with
pub const INPUT_FORMAT: PcmFormat = PcmFormat {
    sample_rate: 44_100,
    channels: 2,
    bytes_per_sample: 2,
};

impl PcmFormat {
    /// ffmpeg demuxer name for this layout
    pub fn ffmpeg_format(&self) -> &'static str {
        "s16le"
    }

    pub fn bytes_per_frame(&self) -> usize {
        self.channels as usize * self.bytes_per_sample as usize
    }

    pub fn bytes_per_second(&self) -> u64 {
        self.sample_rate as u64 * self.bytes_per_frame() as u64
    }

    /// Duration in seconds of `bytes` of audio in this format
    pub fn duration_secs(&self, bytes: u64) -> f64 {
        bytes as f64 / self.bytes_per_second() as f64
    }

    /// Byte length of `secs` seconds of audio, always a whole number of frames
    pub fn bytes_for_secs(&self, secs: u64) -> u64 {
        secs * self.bytes_per_second()
    }
}

impl Default for PcmFormat {
    fn default() -> Self {
        INPUT_FORMAT
    }
}
