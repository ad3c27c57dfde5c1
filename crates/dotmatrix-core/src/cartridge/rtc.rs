use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub const RTC_CYCLES_PER_SECOND: u32 = 4_194_304;

const TRAILER_MAGIC: &[u8; 4] = b"RTC1";
const TRAILER_VERSION: u8 = 1;
pub const TRAILER_LEN: usize = 23;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RtcRegisters {
    pub seconds: u8,
    pub minutes: u8,
    pub hours: u8,
    /// 9-bit day counter.
    pub days: u16,
    pub halt: bool,
    pub carry: bool,
}

impl RtcRegisters {
    fn control_byte(&self) -> u8 {
        let mut out = ((self.days >> 8) as u8) & 0x01;
        if self.halt {
            out |= 0x40;
        }
        if self.carry {
            out |= 0x80;
        }
        out
    }
}

/// MBC3 real-time clock: a live register set driven by emulated cycles and a
/// latched copy that the game reads.
#[derive(Debug, Clone)]
pub struct Rtc {
    regs: RtcRegisters,
    latched: RtcRegisters,
    last_update: SystemTime,
    subsecond_cycles: u32,
}

impl Rtc {
    pub fn new(now: SystemTime) -> Self {
        let regs = RtcRegisters::default();
        Self {
            regs,
            latched: regs,
            last_update: now,
            subsecond_cycles: 0,
        }
    }

    pub fn registers(&self) -> RtcRegisters {
        self.regs
    }

    pub fn latch(&mut self) {
        self.latched = self.regs;
    }

    /// Reads one of the RTC registers selected through 0x08..=0x0C.
    pub fn read(&self, reg: u8) -> u8 {
        match reg {
            0x08 => self.latched.seconds & 0x3F,
            0x09 => self.latched.minutes & 0x3F,
            0x0A => self.latched.hours & 0x1F,
            0x0B => (self.latched.days & 0x00FF) as u8,
            0x0C => self.latched.control_byte(),
            _ => 0xFF,
        }
    }

    pub fn write(&mut self, reg: u8, value: u8) {
        match reg {
            0x08 => {
                self.regs.seconds = value & 0x3F;
                self.subsecond_cycles = 0;
            }
            0x09 => self.regs.minutes = value & 0x3F,
            0x0A => self.regs.hours = value & 0x1F,
            0x0B => self.regs.days = (self.regs.days & 0x0100) | u16::from(value),
            0x0C => {
                self.regs.days = (self.regs.days & 0x00FF) | (u16::from(value & 0x01) << 8);
                self.regs.halt = value & 0x40 != 0;
                self.regs.carry = value & 0x80 != 0;
            }
            _ => {}
        }
        self.latched = self.regs;
    }

    /// Advances the clock by emulated CPU cycles. Returns true when the
    /// seconds register changed.
    pub fn step(&mut self, cycles: u32) -> bool {
        if self.regs.halt {
            return false;
        }
        self.add_cycles(u64::from(cycles))
    }

    /// Catches the clock up with wall time elapsed since the last save.
    pub fn sync_wall(&mut self, now: SystemTime) {
        let elapsed = now.duration_since(self.last_update).unwrap_or_default();
        self.last_update = now;
        if self.regs.halt {
            return;
        }

        let per_sec = u128::from(RTC_CYCLES_PER_SECOND);
        let elapsed_cycles = u128::from(elapsed.as_secs())
            .saturating_mul(per_sec)
            .saturating_add(u128::from(elapsed.subsec_nanos()) * per_sec / 1_000_000_000);
        self.add_cycles(elapsed_cycles.min(u128::from(u64::MAX)) as u64);
    }

    fn add_cycles(&mut self, cycles: u64) -> bool {
        let mut seconds = cycles / u64::from(RTC_CYCLES_PER_SECOND);
        let rem = (cycles % u64::from(RTC_CYCLES_PER_SECOND)) as u32;

        let mut sub = self.subsecond_cycles + rem;
        if sub >= RTC_CYCLES_PER_SECOND {
            sub -= RTC_CYCLES_PER_SECOND;
            seconds += 1;
        }
        self.subsecond_cycles = sub;

        if seconds > 0 {
            self.advance_seconds(seconds);
            true
        } else {
            false
        }
    }

    fn advance_seconds(&mut self, mut seconds: u64) {
        while seconds > 0 {
            let until_minute = self.seconds_until_minute_tick();
            if seconds < until_minute {
                self.regs.seconds = ((u64::from(self.regs.seconds) + seconds) & 0x3F) as u8;
                return;
            }
            seconds -= until_minute;
            self.regs.seconds = 0;
            self.minute_tick();
        }
    }

    // Out-of-range values written by the game count up to 63 and wrap to 0
    // before reaching 60 again.
    fn seconds_until_minute_tick(&self) -> u64 {
        let sec = u64::from(self.regs.seconds);
        if sec <= 59 { 60 - sec } else { (64 - sec) + 60 }
    }

    fn minute_tick(&mut self) {
        if self.regs.minutes == 59 {
            self.regs.minutes = 0;
            self.hour_tick();
        } else {
            self.regs.minutes = (self.regs.minutes + 1) & 0x3F;
        }
    }

    fn hour_tick(&mut self) {
        if self.regs.hours == 23 {
            self.regs.hours = 0;
            self.day_tick();
        } else {
            self.regs.hours = (self.regs.hours + 1) & 0x1F;
        }
    }

    fn day_tick(&mut self) {
        if self.regs.days >= 0x01FF {
            self.regs.days = 0;
            self.regs.carry = true;
        } else {
            self.regs.days += 1;
        }
    }

    pub fn serialize(&self, now: SystemTime) -> Vec<u8> {
        let mut data = Vec::with_capacity(TRAILER_LEN);
        data.extend_from_slice(TRAILER_MAGIC);
        data.push(TRAILER_VERSION);

        let saved = now.duration_since(UNIX_EPOCH).unwrap_or_default().as_secs();
        data.extend_from_slice(&saved.to_le_bytes());

        let nanos = (u128::from(self.subsecond_cycles) * 1_000_000_000
            / u128::from(RTC_CYCLES_PER_SECOND))
        .min(u128::from(u32::MAX)) as u32;
        data.extend_from_slice(&nanos.to_le_bytes());
        data.push(self.regs.seconds & 0x3F);
        data.push(self.regs.minutes & 0x3F);
        data.push(self.regs.hours & 0x1F);
        data.extend_from_slice(&(self.regs.days & 0x01FF).to_le_bytes());

        let mut flags = 0u8;
        if self.regs.halt {
            flags |= 0x01;
        }
        if self.regs.carry {
            flags |= 0x02;
        }
        data.push(flags);
        data
    }

    /// Restores the clock from a save trailer. Returns false when the bytes are
    /// not a trailer this version understands.
    pub fn deserialize(&mut self, data: &[u8]) -> bool {
        if data.len() < TRAILER_LEN || &data[..4] != TRAILER_MAGIC || data[4] != TRAILER_VERSION {
            return false;
        }
        let (Ok(secs), Ok(nanos)) = (
            <[u8; 8]>::try_from(&data[5..13]),
            <[u8; 4]>::try_from(&data[13..17]),
        ) else {
            return false;
        };
        let secs = u64::from_le_bytes(secs);
        let nanos = u32::from_le_bytes(nanos).min(999_999_999);

        self.last_update = UNIX_EPOCH + Duration::from_secs(secs);
        self.subsecond_cycles = (u128::from(nanos) * u128::from(RTC_CYCLES_PER_SECOND)
            / 1_000_000_000)
            .min(u128::from(RTC_CYCLES_PER_SECOND - 1)) as u32;
        self.regs.seconds = data[17] & 0x3F;
        self.regs.minutes = data[18] & 0x3F;
        self.regs.hours = data[19] & 0x1F;
        self.regs.days = u16::from_le_bytes([data[20], data[21]]) & 0x01FF;
        self.regs.halt = data[22] & 0x01 != 0;
        self.regs.carry = data[22] & 0x02 != 0;
        self.latched = self.regs;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rtc() -> Rtc {
        Rtc::new(UNIX_EPOCH)
    }

    #[test]
    fn one_second_of_cycles_ticks_seconds() {
        let mut rtc = rtc();
        assert!(!rtc.step(RTC_CYCLES_PER_SECOND - 1));
        assert_eq!(rtc.registers().seconds, 0);
        assert!(rtc.step(1));
        assert_eq!(rtc.registers().seconds, 1);
    }

    #[test]
    fn rollover_cascades_to_days_and_carry() {
        let mut rtc = rtc();
        rtc.write(0x08, 59);
        rtc.write(0x09, 59);
        rtc.write(0x0A, 23);
        rtc.write(0x0B, 0xFF);
        rtc.write(0x0C, 0x01);
        rtc.step(RTC_CYCLES_PER_SECOND);
        let regs = rtc.registers();
        assert_eq!((regs.seconds, regs.minutes, regs.hours, regs.days), (0, 0, 0, 0));
        assert!(regs.carry);
    }

    #[test]
    fn halted_clock_does_not_advance() {
        let mut rtc = rtc();
        rtc.write(0x0C, 0x40);
        rtc.step(RTC_CYCLES_PER_SECOND * 3);
        assert_eq!(rtc.registers().seconds, 0);
    }

    #[test]
    fn reads_come_from_latched_copy() {
        let mut rtc = rtc();
        rtc.latch();
        rtc.step(RTC_CYCLES_PER_SECOND * 5);
        assert_eq!(rtc.read(0x08), 0);
        rtc.latch();
        assert_eq!(rtc.read(0x08), 5);
    }

    #[test]
    fn invalid_seconds_wrap_through_63() {
        let mut rtc = rtc();
        rtc.write(0x08, 62);
        rtc.step(RTC_CYCLES_PER_SECOND * 2);
        assert_eq!(rtc.registers().seconds, 0);
        assert_eq!(rtc.registers().minutes, 0);
    }

    #[test]
    fn trailer_restores_registers_and_catches_up() {
        let mut rtc = rtc();
        rtc.write(0x08, 10);
        rtc.write(0x09, 20);
        let saved_at = UNIX_EPOCH + Duration::from_secs(1_000);
        let trailer = rtc.serialize(saved_at);
        assert_eq!(trailer.len(), TRAILER_LEN);

        let mut restored = Rtc::new(UNIX_EPOCH);
        assert!(restored.deserialize(&trailer));
        restored.sync_wall(saved_at + Duration::from_secs(65));
        let regs = restored.registers();
        assert_eq!(regs.seconds, 15);
        assert_eq!(regs.minutes, 21);
    }

    #[test]
    fn garbage_trailer_is_rejected() {
        let mut rtc = rtc();
        assert!(!rtc.deserialize(b"nope"));
        assert!(!rtc.deserialize(&[0u8; TRAILER_LEN]));
    }
}
