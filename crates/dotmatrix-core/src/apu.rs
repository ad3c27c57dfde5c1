use std::collections::VecDeque;

use crossbeam_channel::Sender;
use log::debug;

pub mod channel;

pub use channel::{Channel, Envelope, Generator, Playback, Sweep};

const CPU_CLOCK_HZ: u32 = 4_194_304;
pub const SAMPLE_RATE: u32 = 44_100;
const CPU_TICKS_PER_SAMPLE: f64 = CPU_CLOCK_HZ as f64 / SAMPLE_RATE as f64;
/// Stereo frames kept before the oldest are dropped.
pub const MAX_QUEUED_FRAMES: usize = 5000;
const VOLUME_SCALE: f32 = 16_000.0;

const REG_BASE: u16 = 0xFF10;
const REG_COUNT: usize = 0x17;

/// Register values left behind by the boot ROM, NR10 to NR52. NR52 is
/// listed first so the APU is powered before the rest are written.
const BOOT_REGS: [(u16, u8); 18] = [
    (0xFF26, 0xF1),
    (0xFF10, 0x80),
    (0xFF11, 0xBF),
    (0xFF12, 0xF3),
    (0xFF14, 0xBF),
    (0xFF16, 0x3F),
    (0xFF17, 0x00),
    (0xFF19, 0xBF),
    (0xFF1A, 0x7F),
    (0xFF1B, 0xFF),
    (0xFF1C, 0x9F),
    (0xFF1E, 0xBF),
    (0xFF20, 0xFF),
    (0xFF21, 0x00),
    (0xFF22, 0x00),
    (0xFF23, 0xBF),
    (0xFF24, 0x77),
    (0xFF25, 0xF3),
];

const CHANNEL3_VOLUME: [f64; 4] = [0.0, 1.0, 0.5, 0.25];

pub struct Apu {
    sound_enabled: bool,
    regs: [u8; REG_COUNT],
    /// Raw waveform RAM as the CPU sees it.
    wave_ram: [u8; 0x10],
    /// Waveform RAM unpacked into one 4-bit sample per entry.
    wave_samples: [u8; 0x20],
    channels: [Channel; 4],
    tick_counter: f64,
    left_volume: f32,
    right_volume: f32,
    samples: VecDeque<[i16; 2]>,
    sink: Option<Sender<[i16; 2]>>,
}

impl Apu {
    /// With `sound_enabled` false the registers still work but no samples
    /// are produced.
    pub fn new(sound_enabled: bool) -> Self {
        Self {
            sound_enabled,
            regs: [0; REG_COUNT],
            wave_ram: [0; 0x10],
            wave_samples: [0; 0x20],
            channels: [Channel::new(), Channel::new(), Channel::new(), Channel::new()],
            tick_counter: 0.0,
            left_volume: 0.0,
            right_volume: 0.0,
            samples: VecDeque::with_capacity(MAX_QUEUED_FRAMES),
            sink: None,
        }
    }

    pub fn apply_boot_state(&mut self) {
        for (addr, val) in BOOT_REGS {
            // Restore the registers without retriggering the boot chime.
            let trigger_reg = matches!(addr, 0xFF14 | 0xFF19 | 0xFF1E | 0xFF23);
            self.write(addr, if trigger_reg { val & !0x80 } else { val });
            self.regs[usize::from(addr - REG_BASE)] = val;
        }
        for i in 0..0x10u16 {
            self.write(0xFF30 + i, if i & 1 == 0 { 0x00 } else { 0xFF });
        }
    }

    pub fn sound_enabled(&self) -> bool {
        self.sound_enabled
    }

    /// Attaches a sink receiving every generated frame. Frames are dropped
    /// when the sink is full.
    pub fn attach_sink(&mut self, sink: Sender<[i16; 2]>) {
        self.sink = Some(sink);
    }

    /// Channel `n` (1-4).
    pub fn channel(&self, n: usize) -> Option<&Channel> {
        n.checked_sub(1).and_then(|i| self.channels.get(i))
    }

    /// Flips the debug mute of channel `n` (1-4) and returns whether it is
    /// now muted.
    pub fn toggle_channel(&mut self, n: usize) -> Option<bool> {
        let ch = n.checked_sub(1).and_then(|i| self.channels.get_mut(i))?;
        ch.muted = !ch.muted;
        debug!("Toggled channel {n} mute: {}", ch.muted);
        Some(ch.muted)
    }

    pub fn queued_frames(&self) -> usize {
        self.samples.len()
    }

    /// Removes and returns every queued stereo frame.
    pub fn drain_samples(&mut self) -> Vec<[i16; 2]> {
        self.samples.drain(..).collect()
    }

    fn powered(&self) -> bool {
        self.regs[usize::from(0xFF26 - REG_BASE)] & 0x80 != 0
    }

    fn reg(&self, addr: u16) -> u8 {
        self.regs[usize::from(addr - REG_BASE)]
    }

    fn read_mask(addr: u16) -> u8 {
        match addr {
            0xFF10 => 0x80,
            0xFF11 => 0x3F,
            0xFF12 => 0x00,
            0xFF13 => 0xFF,
            0xFF14 => 0xBF,
            0xFF16 => 0x3F,
            0xFF17 => 0x00,
            0xFF18 => 0xFF,
            0xFF19 => 0xBF,
            0xFF1A => 0x7F,
            0xFF1B => 0xFF,
            0xFF1C => 0x9F,
            0xFF1D => 0xFF,
            0xFF1E => 0xBF,
            0xFF20 => 0xFF,
            0xFF21 => 0x00,
            0xFF22 => 0x00,
            0xFF23 => 0xBF,
            0xFF24 => 0x00,
            0xFF25 => 0x00,
            0xFF26 => 0x70,
            _ => 0xFF,
        }
    }

    pub fn read(&self, addr: u16) -> u8 {
        match addr {
            0xFF30..=0xFF3F => self.wave_ram[usize::from(addr - 0xFF30)],
            0xFF26 => {
                let active = self
                    .channels
                    .iter()
                    .enumerate()
                    .filter(|(_, ch)| ch.is_playing())
                    .fold(0u8, |acc, (i, _)| acc | (1 << i));
                (self.reg(0xFF26) & 0x80) | 0x70 | active
            }
            REG_BASE..=0xFF25 => self.reg(addr) | Self::read_mask(addr),
            _ => 0xFF,
        }
    }

    pub fn write(&mut self, addr: u16, val: u8) {
        if let 0xFF30..=0xFF3F = addr {
            let i = usize::from(addr - 0xFF30);
            self.wave_ram[i] = val;
            self.wave_samples[i * 2] = val >> 4;
            self.wave_samples[i * 2 + 1] = val & 0x0F;
            return;
        }
        if !(REG_BASE..=0xFF26).contains(&addr) {
            return;
        }
        if addr == 0xFF26 {
            self.write_power(val);
            return;
        }
        if !self.powered() {
            return;
        }
        self.regs[usize::from(addr - REG_BASE)] = val;

        match addr {
            // Channel 1
            0xFF10 => self.channels[0].sweep = Sweep::from_register(val),
            0xFF11 => self.write_duty_length(0, val),
            0xFF12 => self.write_envelope(0, val),
            0xFF13 | 0xFF14 => self.write_square_frequency(0, 0xFF13, addr == 0xFF14),

            // Channel 2
            0xFF16 => self.write_duty_length(1, val),
            0xFF17 => self.write_envelope(1, val),
            0xFF18 | 0xFF19 => self.write_square_frequency(1, 0xFF18, addr == 0xFF19),

            // Channel 3
            0xFF1A => {
                let ch = &mut self.channels[2];
                ch.dac_enabled = val & 0x80 != 0;
                if !ch.dac_enabled {
                    ch.stop();
                }
            }
            0xFF1B => self.channels[2].length = u16::from(val),
            0xFF1C => self.channels[2].amplitude = CHANNEL3_VOLUME[usize::from((val >> 5) & 0x03)],
            0xFF1D | 0xFF1E => {
                let freq = self.frequency_value(0xFF1D);
                let ch = &mut self.channels[2];
                ch.set_frequency(65_536.0 / (2048.0 - f64::from(freq)));
                let control = self.reg(0xFF1E);
                if addr == 0xFF1E && control & 0x80 != 0 {
                    let ch = &mut self.channels[2];
                    let duration = Self::duration(control, 256 - u32::from(ch.length));
                    ch.set_generator(Generator::Wave);
                    ch.trigger(duration);
                }
            }

            // Channel 4
            0xFF20 => self.channels[3].length = u16::from(val & 0x3F),
            0xFF21 => self.write_envelope(3, val),
            0xFF22 => {
                let shift = (val >> 4) as i32;
                let ratio = match val & 0x07 {
                    0 => 0.5,
                    r => f64::from(r),
                };
                let width7 = val & 0x08 != 0;
                let ch = &mut self.channels[3];
                ch.set_frequency(524_288.0 / ratio / 2f64.powi(shift + 1));
                if let Generator::Noise { lfsr, .. } = ch.generator() {
                    ch.set_generator(Generator::Noise { lfsr, width7 });
                }
            }
            0xFF23 => {
                if val & 0x80 != 0 {
                    let width7 = self.reg(0xFF22) & 0x08 != 0;
                    let ch = &mut self.channels[3];
                    let duration = Self::duration(val, 64 - u32::from(ch.length));
                    ch.set_generator(Generator::noise(width7));
                    ch.trigger(duration);
                }
            }

            0xFF24 => {
                self.left_volume = f32::from((val & 0x70) >> 4) / 7.0;
                self.right_volume = f32::from(val & 0x07) / 7.0;
            }
            0xFF25 => {
                for (i, ch) in self.channels.iter_mut().enumerate() {
                    ch.right = val & (1 << i) != 0;
                    ch.left = val & (1 << (i + 4)) != 0;
                }
            }
            _ => {}
        }
    }

    fn write_power(&mut self, val: u8) {
        let idx = usize::from(0xFF26 - REG_BASE);
        if val & 0x80 == 0 && self.powered() {
            self.regs = [0; REG_COUNT];
            for ch in &mut self.channels {
                ch.stop();
            }
            self.left_volume = 0.0;
            self.right_volume = 0.0;
        }
        self.regs[idx] = val & 0x80;
    }

    /// Length in samples for a trigger write, from the NRx4 value and the
    /// remaining length in 1/256 s units.
    fn duration(control: u8, length_units: u32) -> Playback {
        if control & 0x40 != 0 {
            Playback::Timed((length_units * SAMPLE_RATE / 256).max(1))
        } else {
            Playback::Indefinite
        }
    }

    /// 11-bit frequency value from an NRx3/NRx4 pair starting at `low`.
    fn frequency_value(&self, low: u16) -> u16 {
        (u16::from(self.reg(low + 1) & 0x07) << 8) | u16::from(self.reg(low))
    }

    fn write_duty_length(&mut self, idx: usize, val: u8) {
        let ch = &mut self.channels[idx];
        ch.set_generator(Generator::Square { duty: val >> 6 });
        ch.length = u16::from(val & 0x3F);
    }

    fn write_envelope(&mut self, idx: usize, val: u8) {
        let ch = &mut self.channels[idx];
        ch.envelope = Envelope::from_register(val);
        ch.dac_enabled = val & 0xF8 != 0;
        if !ch.dac_enabled {
            ch.stop();
        }
    }

    fn write_square_frequency(&mut self, idx: usize, low: u16, control_write: bool) {
        let freq = self.frequency_value(low);
        let control = self.reg(low + 1);
        let ch = &mut self.channels[idx];
        ch.set_frequency(131_072.0 / (2048.0 - f64::from(freq)));
        if control_write && control & 0x80 != 0 {
            let duration = Self::duration(control, 64 - u32::from(ch.length));
            ch.trigger(duration);
        }
    }

    /// Accumulate `cycles` CPU cycles (divided by the CPU speed multiplier)
    /// and emit a stereo frame for every sample period that elapsed.
    pub fn buffer(&mut self, cycles: u32, speed: u32) {
        if !self.sound_enabled {
            return;
        }
        self.tick_counter += f64::from(cycles) / f64::from(speed.max(1));
        while self.tick_counter >= CPU_TICKS_PER_SAMPLE {
            self.tick_counter -= CPU_TICKS_PER_SAMPLE;
            let frame = self.mix();
            self.push_frame(frame);
        }
    }

    fn mix(&mut self) -> [i16; 2] {
        let mut left = 0.0f32;
        let mut right = 0.0f32;
        for ch in &mut self.channels {
            let s = ch.sample(&self.wave_samples);
            if ch.left {
                left += s;
            }
            if ch.right {
                right += s;
            }
        }
        let scale = |v: f32, vol: f32| (v / 4.0 * vol * VOLUME_SCALE) as i16;
        [scale(left, self.left_volume), scale(right, self.right_volume)]
    }

    fn push_frame(&mut self, frame: [i16; 2]) {
        if self.samples.len() >= MAX_QUEUED_FRAMES {
            self.samples.pop_front();
        }
        self.samples.push_back(frame);
        if let Some(sink) = &self.sink {
            let _ = sink.try_send(frame);
        }
    }
}

impl Default for Apu {
    fn default() -> Self {
        Self::new(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn powered(sound: bool) -> Apu {
        let mut apu = Apu::new(sound);
        apu.write(0xFF26, 0x80);
        apu
    }

    #[test]
    fn unused_bits_read_high() {
        let mut apu = powered(false);
        apu.write(0xFF11, 0x80);
        assert_eq!(apu.read(0xFF11), 0xBF);
        apu.write(0xFF13, 0x12);
        assert_eq!(apu.read(0xFF13), 0xFF);
        assert_eq!(apu.read(0xFF15), 0xFF);
        assert_eq!(apu.read(0xFF26), 0xF0);
    }

    #[test]
    fn wave_ram_reads_raw_and_unpacks() {
        let mut apu = powered(false);
        apu.write(0xFF30, 0xA5);
        assert_eq!(apu.read(0xFF30), 0xA5);
        assert_eq!(&apu.wave_samples[..2], &[0x0A, 0x05]);
    }

    #[test]
    fn trigger_sets_status_bit() {
        let mut apu = powered(false);
        apu.write(0xFF17, 0xF0);
        apu.write(0xFF16, 0x80);
        apu.write(0xFF18, 0x00);
        apu.write(0xFF19, 0x87);
        assert_eq!(apu.read(0xFF26) & 0x0F, 0x02);
        let freq = apu.channel(2).map(Channel::frequency);
        assert_eq!(freq, Some(131_072.0 / (2048.0 - 1792.0)));
    }

    #[test]
    fn dac_off_stops_channel() {
        let mut apu = powered(false);
        apu.write(0xFF11, 0x80);
        apu.write(0xFF12, 0xF0);
        apu.write(0xFF14, 0x80);
        assert_eq!(apu.read(0xFF26) & 0x01, 0x01);
        apu.write(0xFF12, 0x00);
        assert_eq!(apu.read(0xFF26) & 0x01, 0x00);
    }

    #[test]
    fn power_off_clears_registers_and_blocks_writes() {
        let mut apu = powered(false);
        apu.write(0xFF24, 0x77);
        apu.write(0xFF26, 0x00);
        assert_eq!(apu.read(0xFF24), 0x00);
        apu.write(0xFF24, 0x77);
        assert_eq!(apu.read(0xFF24), 0x00);
        assert_eq!(apu.read(0xFF26), 0x70);
    }

    #[test]
    fn frame_of_cycles_yields_expected_sample_count() {
        let mut apu = powered(true);
        apu.buffer(CPU_CLOCK_HZ / 60, 1);
        assert_eq!(apu.queued_frames(), 734);
        apu.buffer(CPU_CLOCK_HZ / 60, 2);
        assert_eq!(apu.drain_samples().len(), 734 + 368);
        assert_eq!(apu.queued_frames(), 0);
    }

    #[test]
    fn muted_output_produces_no_samples() {
        let mut apu = powered(false);
        apu.buffer(CPU_CLOCK_HZ, 1);
        assert_eq!(apu.queued_frames(), 0);
    }

    #[test]
    fn queue_is_capped() {
        let mut apu = powered(true);
        apu.buffer(CPU_CLOCK_HZ, 1);
        assert_eq!(apu.queued_frames(), MAX_QUEUED_FRAMES);
    }

    #[test]
    fn sink_receives_frames_without_blocking() {
        let (tx, rx) = crossbeam_channel::bounded(4);
        let mut apu = powered(true);
        apu.attach_sink(tx);
        apu.buffer(CPU_CLOCK_HZ / 60, 1);
        assert_eq!(rx.len(), 4);
    }

    #[test]
    fn routing_and_master_volume() {
        let mut apu = powered(true);
        apu.write(0xFF24, 0x70);
        apu.write(0xFF25, 0x11);
        apu.write(0xFF12, 0xF0);
        apu.write(0xFF11, 0xC0);
        apu.write(0xFF14, 0x87);
        apu.buffer(CPU_CLOCK_HZ / 60, 1);
        let frames = apu.drain_samples();
        assert!(frames.iter().any(|f| f[0] != 0));
        assert!(frames.iter().all(|f| f[1] == 0));
    }

    #[test]
    fn toggle_channel_mutes() {
        let mut apu = Apu::new(false);
        assert_eq!(apu.toggle_channel(3), Some(true));
        assert_eq!(apu.toggle_channel(3), Some(false));
        assert_eq!(apu.toggle_channel(0), None);
        assert_eq!(apu.toggle_channel(5), None);
    }
}
