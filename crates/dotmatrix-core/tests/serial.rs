//! Integration tests for the serial port registers and transfer callback.

use std::sync::{Arc, Mutex};

use dotmatrix_core::interrupts::Interrupt;
use dotmatrix_core::mmu::Mmu;
use dotmatrix_core::serial::Serial;

#[test]
fn serial_sb_readable_writable() {
    let mut serial = Serial::new();
    let mut if_reg = 0;

    serial.write(0xFF01, 0x42, &mut if_reg);
    assert_eq!(serial.read(0xFF01), 0x42);

    serial.write(0xFF01, 0xAB, &mut if_reg);
    assert_eq!(serial.read(0xFF01), 0xAB);
    assert_eq!(if_reg, 0);
}

#[test]
fn serial_sc_masks_unused_bits() {
    let mut serial = Serial::new();
    let mut if_reg = 0;

    serial.write(0xFF02, 0x80, &mut if_reg);
    assert_eq!(serial.read(0xFF02), 0xFE);

    serial.write(0xFF02, 0x00, &mut if_reg);
    assert_eq!(serial.read(0xFF02), 0x7E);
}

#[test]
fn internal_clock_transfer_completes_immediately() {
    let mut serial = Serial::new();
    let mut if_reg = 0;

    serial.write(0xFF01, b'A', &mut if_reg);
    serial.write(0xFF02, 0x81, &mut if_reg);

    assert_eq!(serial.read(0xFF02) & 0x80, 0, "transfer flag still set");
    assert_eq!(serial.read(0xFF02), 0x7F);
    assert_eq!(if_reg, Interrupt::Serial.mask());
}

#[test]
fn external_clock_transfer_stays_pending() {
    let mut serial = Serial::new();
    let mut if_reg = 0;

    serial.write(0xFF01, b'!', &mut if_reg);
    serial.write(0xFF02, 0x80, &mut if_reg);

    assert_eq!(serial.read(0xFF02) & 0x80, 0x80);
    assert_eq!(if_reg, 0);
    assert!(serial.peek_output().is_empty());
}

#[test]
fn internal_clock_transfer_hands_byte_to_callback() {
    let received = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&received);
    let mut serial = Serial::new();
    let mut if_reg = 0;
    serial.set_callback(Box::new(move |b| sink.lock().unwrap().push(b)));

    for &b in b"ok" {
        serial.write(0xFF01, b, &mut if_reg);
        serial.write(0xFF02, 0x81, &mut if_reg);
    }
    // external clock does not start a transfer
    serial.write(0xFF01, b'!', &mut if_reg);
    serial.write(0xFF02, 0x80, &mut if_reg);

    assert_eq!(*received.lock().unwrap(), b"ok");
    assert_eq!(serial.peek_output(), b"ok");
    assert_eq!(serial.take_output(), b"ok");
    assert!(serial.peek_output().is_empty());
}

#[test]
fn transfers_route_through_the_memory_map() {
    let mut mmu = Mmu::default();
    mmu.if_reg = 0;
    mmu.write_byte(0xFF01, b'Z');
    mmu.write_byte(0xFF02, 0x81);

    assert_eq!(mmu.serial.take_output(), b"Z");
    assert_eq!(mmu.read_byte(0xFF01), b'Z');
    assert_eq!(mmu.read_byte(0xFF02) & 0x80, 0);
    assert_eq!(mmu.read_byte(0xFF0F), 0xE0 | Interrupt::Serial.mask());
}
