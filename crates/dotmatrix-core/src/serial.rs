use crate::interrupts::{self, Interrupt};

/// Callback receiving each byte the running program sends over the link port.
pub type TransferCallback = Box<dyn FnMut(u8) + Send>;

/// Serial data (SB) and control (SC) registers.
///
/// No link partner is modelled: a transfer started with the internal clock
/// completes immediately, hands SB to the callback and records it, then
/// clears SC bit 7 and requests the serial interrupt.
pub struct Serial {
    sb: u8,
    sc: u8,
    pub(crate) out_buf: Vec<u8>,
    callback: Option<TransferCallback>,
}

impl Serial {
    pub fn new() -> Self {
        Self {
            sb: 0,
            sc: 0x7E,
            out_buf: Vec::new(),
            callback: None,
        }
    }

    pub fn set_callback(&mut self, callback: TransferCallback) {
        self.callback = Some(callback);
    }

    pub fn read(&self, addr: u16) -> u8 {
        match addr {
            0xFF01 => self.sb,
            0xFF02 => self.sc | 0x7E,
            _ => 0xFF,
        }
    }

    pub fn write(&mut self, addr: u16, val: u8, if_reg: &mut u8) {
        match addr {
            0xFF01 => self.sb = val,
            0xFF02 => {
                self.sc = val;
                if val == 0x81 {
                    let byte = self.sb;
                    self.out_buf.push(byte);
                    if let Some(cb) = self.callback.as_mut() {
                        cb(byte);
                    }
                    self.sc &= 0x7F;
                    interrupts::request(if_reg, Interrupt::Serial);
                }
            }
            _ => {}
        }
    }

    pub fn take_output(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.out_buf)
    }

    pub fn peek_output(&self) -> &[u8] {
        &self.out_buf
    }
}

impl Default for Serial {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Serial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Serial")
            .field("sb", &self.sb)
            .field("sc", &self.sc)
            .field("pending", &self.out_buf.len())
            .field("callback", &self.callback.is_some())
            .finish()
    }
}
