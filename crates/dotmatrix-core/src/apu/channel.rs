use super::SAMPLE_RATE;

/// Seconds per sample at the output rate.
const PER_SAMPLE: f64 = 1.0 / SAMPLE_RATE as f64;

// Duty table for pulse channels (CH1, CH2). Each entry is an 8-step
// waveform. Index (0..3) corresponds to duty selector in NRx1.
const DUTY_TABLE: [[u8; 8]; 4] = [
    [0, 0, 0, 0, 0, 0, 0, 1], // 12.5%
    [1, 0, 0, 0, 0, 0, 0, 1], // 25%
    [1, 0, 0, 0, 0, 1, 1, 1], // 50%
    [0, 1, 1, 1, 1, 1, 1, 0], // 75%
];

/// Sweep period lengths in seconds for NR10 period values 1-7.
const SWEEP_TIMES: [f64; 8] = [0.0, 0.0078, 0.0156, 0.0234, 0.0313, 0.0391, 0.0469, 0.0547];

/// Upper bound on noise LFSR clocks per output sample.
const MAX_NOISE_CLOCKS: u32 = 64;

/// How long a triggered channel keeps sounding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Playback {
    #[default]
    Off,
    /// Samples left before the length counter silences the channel.
    Timed(u32),
    Indefinite,
}

/// Waveform source for a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Generator {
    #[default]
    Silent,
    Square { duty: u8 },
    /// Reads the 32-entry waveform RAM.
    Wave,
    Noise { lfsr: u16, width7: bool },
}

impl Generator {
    pub fn noise(width7: bool) -> Self {
        Generator::Noise { lfsr: 0, width7 }
    }

    /// Level (0-15) at `phase`, a position in [0, 1) within one period.
    fn level(&self, phase: f64, wave: &[u8; 32]) -> u8 {
        match *self {
            Generator::Silent => 0,
            Generator::Square { duty } => {
                let step = ((phase * 8.0) as usize) & 7;
                DUTY_TABLE[usize::from(duty & 3)][step] * 15
            }
            Generator::Wave => wave[((phase * 32.0) as usize) & 0x1F],
            Generator::Noise { lfsr, .. } => {
                if lfsr & 1 == 0 {
                    15
                } else {
                    0
                }
            }
        }
    }

    fn clock_lfsr(&mut self) {
        if let Generator::Noise { lfsr, width7 } = self {
            let bit = !(*lfsr ^ (*lfsr >> 1)) & 1;
            *lfsr = (*lfsr >> 1) | (bit << 14);
            if *width7 {
                *lfsr = (*lfsr & !0x40) | (bit << 6);
            }
        }
    }
}

/// Volume envelope: a 4-bit level stepped up or down every `period`/64 s.
#[derive(Debug, Clone, Copy, Default)]
pub struct Envelope {
    pub initial: u8,
    pub increasing: bool,
    pub period: u8,
    volume: u8,
    samples_per_step: u32,
    elapsed: u32,
}

impl Envelope {
    /// Decodes an NRx2 value.
    pub fn from_register(val: u8) -> Self {
        let period = val & 0x07;
        Self {
            initial: val >> 4,
            increasing: val & 0x08 != 0,
            period,
            volume: val >> 4,
            samples_per_step: u32::from(period) * SAMPLE_RATE / 64,
            elapsed: 0,
        }
    }

    pub fn volume(&self) -> u8 {
        self.volume
    }

    fn restart(&mut self) {
        self.volume = self.initial;
        self.elapsed = 0;
    }

    fn tick(&mut self) {
        if self.samples_per_step == 0 {
            return;
        }
        self.elapsed += 1;
        if self.elapsed < self.samples_per_step {
            return;
        }
        self.elapsed -= self.samples_per_step;
        if self.increasing && self.volume < 15 {
            self.volume += 1;
        } else if !self.increasing && self.volume > 0 {
            self.volume -= 1;
        }
    }
}

/// Channel 1 frequency sweep.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sweep {
    pub period: u8,
    pub steps: u8,
    pub increase: bool,
    step: u8,
    time: f64,
}

impl Sweep {
    /// Decodes an NR10 value.
    pub fn from_register(val: u8) -> Self {
        Self {
            period: (val >> 4) & 0x07,
            steps: val & 0x07,
            increase: val & 0x08 == 0,
            step: 0,
            time: 0.0,
        }
    }

    fn restart(&mut self) {
        self.step = 0;
        self.time = 0.0;
    }

    /// Advances one sample and returns the new frequency when a sweep step
    /// lands.
    fn tick(&mut self, frequency: f64) -> Option<f64> {
        if self.period == 0 || self.step >= self.steps {
            return None;
        }
        let period = SWEEP_TIMES[usize::from(self.period)];
        self.time += PER_SAMPLE;
        if self.time <= period {
            return None;
        }
        self.time -= period;
        self.step += 1;
        let delta = frequency / f64::from(1u32 << self.step);
        Some(if self.increase { frequency + delta } else { frequency - delta })
    }
}

/// One of the four sound channels, sampled at the output rate.
#[derive(Debug, Clone, Default)]
pub struct Channel {
    frequency: f64,
    generator: Generator,
    phase: f64,
    /// Output scale applied on top of the envelope (channel 3 volume code).
    pub amplitude: f64,
    playback: Playback,
    /// Length load value from NRx1.
    pub length: u16,
    pub envelope: Envelope,
    pub sweep: Sweep,
    /// NRx2 upper five bits non-zero, or NR30 bit 7 for the wave channel.
    pub dac_enabled: bool,
    pub left: bool,
    pub right: bool,
    /// Debug mute.
    pub muted: bool,
}

impl Channel {
    pub fn new() -> Self {
        Self {
            amplitude: 1.0,
            ..Self::default()
        }
    }

    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    pub fn set_frequency(&mut self, frequency: f64) {
        self.frequency = frequency;
    }

    pub fn generator(&self) -> Generator {
        self.generator
    }

    pub fn set_generator(&mut self, generator: Generator) {
        self.generator = generator;
    }

    pub fn playback(&self) -> Playback {
        self.playback
    }

    /// (Re)starts the channel for `duration`.
    pub fn trigger(&mut self, duration: Playback) {
        self.playback = duration;
        self.phase = 0.0;
        self.envelope.restart();
        self.sweep.restart();
    }

    pub fn stop(&mut self) {
        self.playback = Playback::Off;
    }

    pub fn is_playing(&self) -> bool {
        self.playback != Playback::Off
            && self.dac_enabled
            && self.generator != Generator::Silent
    }

    /// Produces one sample in [-1, 1] and advances the channel's timers by
    /// one sample period.
    pub fn sample(&mut self, wave: &[u8; 32]) -> f32 {
        let step = self.frequency / f64::from(SAMPLE_RATE);
        self.phase += step;
        if self.phase >= 1.0 {
            let wraps = self.phase.floor();
            self.phase -= wraps;
            for _ in 0..(wraps as u32).min(MAX_NOISE_CLOCKS) {
                self.generator.clock_lfsr();
            }
        }

        let mut output = 0.0;
        if self.is_playing() {
            if !self.muted {
                let level = f64::from(self.generator.level(self.phase, wave)) / 15.0;
                let volume = match self.generator {
                    Generator::Wave => 1.0,
                    _ => f64::from(self.envelope.volume) / 15.0,
                };
                output = ((level * 2.0 - 1.0) * volume * self.amplitude) as f32;
            }
            if let Playback::Timed(remaining) = &mut self.playback {
                *remaining = remaining.saturating_sub(1);
                if *remaining == 0 {
                    self.playback = Playback::Off;
                }
            }
        }

        self.envelope.tick();
        if let Some(frequency) = self.sweep.tick(self.frequency) {
            self.frequency = frequency;
        }
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NO_WAVE: [u8; 32] = [0; 32];

    fn square(duty: u8, frequency: f64) -> Channel {
        let mut ch = Channel::new();
        ch.set_generator(Generator::Square { duty });
        ch.set_frequency(frequency);
        ch.envelope = Envelope::from_register(0xF0);
        ch.dac_enabled = true;
        ch
    }

    #[test]
    fn timed_playback_runs_out() {
        let mut ch = square(2, 440.0);
        ch.trigger(Playback::Timed(3));
        for _ in 0..3 {
            assert!(ch.is_playing());
            ch.sample(&NO_WAVE);
        }
        assert!(!ch.is_playing());
        assert_eq!(ch.sample(&NO_WAVE), 0.0);
    }

    #[test]
    fn square_duty_shapes_output() {
        // 75% duty at 1/8 of the sample rate: one duty step per sample
        let mut ch = square(3, f64::from(SAMPLE_RATE) / 8.0);
        ch.trigger(Playback::Indefinite);
        let highs = (0..8).filter(|_| ch.sample(&NO_WAVE) > 0.0).count();
        assert_eq!(highs, 6);
    }

    #[test]
    fn decreasing_envelope_reaches_silence() {
        let mut ch = square(2, 440.0);
        ch.envelope = Envelope::from_register(0x21);
        ch.trigger(Playback::Indefinite);
        let step = SAMPLE_RATE / 64;
        for _ in 0..step * 2 {
            ch.sample(&NO_WAVE);
        }
        assert_eq!(ch.envelope.volume(), 0);
        for _ in 0..step {
            ch.sample(&NO_WAVE);
        }
        assert_eq!(ch.envelope.volume(), 0);
    }

    #[test]
    fn sweep_raises_frequency() {
        let mut ch = square(2, 1000.0);
        ch.sweep = Sweep::from_register(0x11);
        ch.trigger(Playback::Indefinite);
        for _ in 0..(SAMPLE_RATE / 100) {
            ch.sample(&NO_WAVE);
        }
        assert_eq!(ch.frequency(), 1500.0);
    }

    #[test]
    fn zero_sweep_steps_leave_frequency() {
        let mut ch = square(2, 1000.0);
        ch.sweep = Sweep::from_register(0x70);
        ch.trigger(Playback::Indefinite);
        for _ in 0..SAMPLE_RATE {
            ch.sample(&NO_WAVE);
        }
        assert_eq!(ch.frequency(), 1000.0);
    }

    #[test]
    fn noise_lfsr_changes_state() {
        let mut generator = Generator::noise(false);
        let start = generator;
        generator.clock_lfsr();
        generator.clock_lfsr();
        assert_ne!(generator, start);
    }

    #[test]
    fn muted_channel_is_silent_but_keeps_time() {
        let mut ch = square(2, 440.0);
        ch.muted = true;
        ch.trigger(Playback::Timed(2));
        assert_eq!(ch.sample(&NO_WAVE), 0.0);
        ch.sample(&NO_WAVE);
        assert!(!ch.is_playing());
    }
}
