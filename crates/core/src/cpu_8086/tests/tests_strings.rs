//! Tests for string primitives and repeat prefixes

use super::{cpu_with_program, physical_address};
use crate::cpu_8086::registers::{AL, AX, CX, DI, SI};
use crate::cpu_8086::{ArrayMemory, Cpu8086, Width, FLAG_DF, FLAG_ZF};

fn write_bytes(cpu: &mut Cpu8086<ArrayMemory>, segment: u16, offset: u16, bytes: &[u8]) {
    for (i, &byte) in bytes.iter().enumerate() {
        cpu.write_byte(physical_address(segment, offset + i as u16), byte);
    }
}

fn set_indexes(cpu: &mut Cpu8086<ArrayMemory>, si: u16, di: u16) {
    cpu.regs.set_word_reg(SI, si as u32);
    cpu.regs.set_word_reg(DI, di as u32);
}

#[test]
fn test_movsb_single() {
    let mut cpu = cpu_with_program(&[0xA4]);
    write_bytes(&mut cpu, 0x1000, 0x0200, &[0x5A]);
    set_indexes(&mut cpu, 0x0200, 0x0300);

    cpu.step().unwrap();
    assert_eq!(cpu.peek_byte(physical_address(0x1000, 0x0300)), 0x5A);
    assert_eq!((cpu.regs.si(), cpu.regs.di()), (0x0201, 0x0301));
    assert_eq!(cpu.total_cycles(), 18);
}

#[test]
fn test_rep_movsb() {
    let mut cpu = cpu_with_program(&[0xF3, 0xA4]);
    write_bytes(&mut cpu, 0x1000, 0x0200, b"WXYZ");
    set_indexes(&mut cpu, 0x0200, 0x0300);
    cpu.regs.set_word_reg(CX, 4);

    assert!(cpu.step().unwrap());
    for (i, &byte) in b"WXYZ".iter().enumerate() {
        assert_eq!(cpu.peek_byte(physical_address(0x1000, 0x0300 + i as u16)), byte);
    }
    assert_eq!(cpu.regs.cx(), 0);
    assert_eq!((cpu.regs.si(), cpu.regs.di()), (0x0204, 0x0304));
    assert_eq!(cpu.regs.ip, 0x0102);
    assert_eq!(cpu.total_cycles(), 9 + 4 * 17);
}

#[test]
fn test_movsw_backwards() {
    // STD ; MOVSW
    let mut cpu = cpu_with_program(&[0xFD, 0xA5]);
    cpu.write(Width::Word, physical_address(0x1000, 0x0200), 0x1234)
        .unwrap();
    set_indexes(&mut cpu, 0x0200, 0x0300);

    cpu.step().unwrap();
    assert!(cpu.get_flag(FLAG_DF));
    cpu.step().unwrap();
    assert_eq!(cpu.peek_word(physical_address(0x1000, 0x0300)), 0x1234);
    assert_eq!((cpu.regs.si(), cpu.regs.di()), (0x01FE, 0x02FE));
}

#[test]
fn test_rep_stosw() {
    let mut cpu = cpu_with_program(&[0xF3, 0xAB]);
    cpu.regs.set_word_reg(AX, 0xABCD);
    cpu.regs.set_word_reg(CX, 3);
    set_indexes(&mut cpu, 0, 0x0400);

    cpu.step().unwrap();
    for i in 0..3 {
        assert_eq!(cpu.peek_word(physical_address(0x1000, 0x0400 + 2 * i)), 0xABCD);
    }
    assert_eq!(cpu.regs.di(), 0x0406);
    assert_eq!(cpu.regs.cx(), 0);
    assert_eq!(cpu.total_cycles(), 9 + 3 * 10);
    // Drained after every iteration and at the end of the step
    assert_eq!(cpu.timer_ticks(), 39 / 4);
    assert_eq!(cpu.clock(), 39 % 4);
}

#[test]
fn test_lodsb() {
    let mut cpu = cpu_with_program(&[0xAC]);
    write_bytes(&mut cpu, 0x1000, 0x0200, &[0x42]);
    set_indexes(&mut cpu, 0x0200, 0);

    cpu.step().unwrap();
    assert_eq!(cpu.regs.get_byte_reg(AL), 0x42);
    assert_eq!(cpu.regs.si(), 0x0201);
    assert_eq!(cpu.total_cycles(), 12);
}

#[test]
fn test_repe_cmpsb_stops_on_mismatch() {
    let mut cpu = cpu_with_program(&[0xF3, 0xA6]);
    write_bytes(&mut cpu, 0x1000, 0x0200, b"ABCD");
    write_bytes(&mut cpu, 0x1000, 0x0300, b"ABXD");
    set_indexes(&mut cpu, 0x0200, 0x0300);
    cpu.regs.set_word_reg(CX, 4);

    cpu.step().unwrap();
    assert_eq!(cpu.regs.cx(), 1);
    assert_eq!((cpu.regs.si(), cpu.regs.di()), (0x0203, 0x0303));
    assert!(!cpu.get_flag(FLAG_ZF));
    assert_eq!(cpu.total_cycles(), 9 + 3 * 22);
}

#[test]
fn test_repe_cmpsb_equal_runs_to_end() {
    let mut cpu = cpu_with_program(&[0xF3, 0xA6]);
    write_bytes(&mut cpu, 0x1000, 0x0200, b"SAME");
    write_bytes(&mut cpu, 0x1000, 0x0300, b"SAME");
    set_indexes(&mut cpu, 0x0200, 0x0300);
    cpu.regs.set_word_reg(CX, 4);

    cpu.step().unwrap();
    assert_eq!(cpu.regs.cx(), 0);
    assert!(cpu.get_flag(FLAG_ZF));
}

#[test]
fn test_repne_scasb_finds_byte() {
    let mut cpu = cpu_with_program(&[0xF2, 0xAE]);
    write_bytes(&mut cpu, 0x1000, 0x0300, b"ABCDEFGHIJ");
    set_indexes(&mut cpu, 0, 0x0300);
    cpu.regs.set_byte_reg(AL, b'C' as u32);
    cpu.regs.set_word_reg(CX, 10);

    cpu.step().unwrap();
    assert_eq!(cpu.regs.cx(), 7);
    assert_eq!(cpu.regs.di(), 0x0303);
    assert!(cpu.get_flag(FLAG_ZF));
}

#[test]
fn test_repne_cmpsb_stops_on_match() {
    let mut cpu = cpu_with_program(&[0xF2, 0xA6]);
    write_bytes(&mut cpu, 0x1000, 0x0200, b"ABCD");
    write_bytes(&mut cpu, 0x1000, 0x0300, b"XYCZ");
    set_indexes(&mut cpu, 0x0200, 0x0300);
    cpu.regs.set_word_reg(CX, 4);

    cpu.step().unwrap();
    assert_eq!(cpu.regs.cx(), 1);
    assert_eq!((cpu.regs.si(), cpu.regs.di()), (0x0203, 0x0303));
    assert!(cpu.get_flag(FLAG_ZF));
    assert_eq!(cpu.total_cycles(), 9 + 3 * 22);
}

#[test]
fn test_repe_scasb_stops_on_mismatch() {
    let mut cpu = cpu_with_program(&[0xF3, 0xAE]);
    write_bytes(&mut cpu, 0x1000, 0x0300, b"AAABAA");
    set_indexes(&mut cpu, 0, 0x0300);
    cpu.regs.set_byte_reg(AL, b'A' as u32);
    cpu.regs.set_word_reg(CX, 6);

    cpu.step().unwrap();
    assert_eq!(cpu.regs.cx(), 2);
    assert_eq!(cpu.regs.di(), 0x0304);
    assert!(!cpu.get_flag(FLAG_ZF));
    assert_eq!(cpu.total_cycles(), 9 + 4 * 15);
}

#[test]
fn test_rep_with_zero_count_does_nothing() {
    let mut cpu = cpu_with_program(&[0xF3, 0xA4]);
    write_bytes(&mut cpu, 0x1000, 0x0200, &[0x77]);
    set_indexes(&mut cpu, 0x0200, 0x0300);

    cpu.step().unwrap();
    assert_eq!(cpu.peek_byte(physical_address(0x1000, 0x0300)), 0x00);
    assert_eq!((cpu.regs.si(), cpu.regs.di()), (0x0200, 0x0300));
    assert_eq!(cpu.regs.ip, 0x0102);
    assert_eq!(cpu.total_cycles(), 9);
}

#[test]
fn test_segment_override_applies_to_source() {
    // ES: MOVSB
    let mut cpu = cpu_with_program(&[0x26, 0xA4]);
    cpu.segs.es = 0x2000;
    write_bytes(&mut cpu, 0x2000, 0x0200, &[0x99]);
    write_bytes(&mut cpu, 0x1000, 0x0200, &[0x11]);
    set_indexes(&mut cpu, 0x0200, 0x0300);

    cpu.step().unwrap();
    assert_eq!(cpu.peek_byte(physical_address(0x2000, 0x0300)), 0x99);
    assert_eq!(cpu.total_cycles(), 2 + 18);
}

#[test]
fn test_scas_destination_ignores_override() {
    // CS: SCASB with CS != ES
    let mut cpu = cpu_with_program(&[0x2E, 0xAE]);
    cpu.segs.es = 0x3000;
    write_bytes(&mut cpu, 0x3000, 0x0300, &[0x44]);
    set_indexes(&mut cpu, 0, 0x0300);
    cpu.regs.set_byte_reg(AL, 0x44);

    cpu.step().unwrap();
    assert!(cpu.get_flag(FLAG_ZF));
}

#[test]
fn test_repeat_prefix_ignored_on_other_instructions() {
    // REP INC AX
    let mut cpu = cpu_with_program(&[0xF3, 0x40]);
    cpu.regs.set_word_reg(CX, 5);

    cpu.step().unwrap();
    assert_eq!(cpu.regs.ax(), 1);
    assert_eq!(cpu.regs.cx(), 5);
    assert_eq!(cpu.total_cycles(), 9 + 2);
}
