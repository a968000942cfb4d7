//! Tests for byte-wide operations
//!
//! Register aliasing, ALU forms, shifts and the F6 unary group

use super::{cpu_with_program, physical_address};
use crate::cpu_8086::registers::{AH, AL, AX, BL, BX, CL, CX, DH};
use crate::cpu_8086::{Width, FLAG_CF, FLAG_OF, FLAG_SF, FLAG_ZF};

#[test]
fn test_byte_register_aliasing() {
    // MOV AH, 0x12 ; MOV AL, 0x34
    let mut cpu = cpu_with_program(&[0xB4, 0x12, 0xB0, 0x34]);
    cpu.step().unwrap();
    cpu.step().unwrap();
    assert_eq!(cpu.regs.ax(), 0x1234);
    assert_eq!(cpu.regs.get_byte_reg(AH), 0x12);
    assert_eq!(cpu.regs.get_byte_reg(AL), 0x34);
}

#[test]
fn test_half_write_masks_value() {
    let mut cpu = cpu_with_program(&[]);
    cpu.regs.set_word_reg(AX, 0xAB00);
    cpu.regs.set_byte_reg(AL, 0x1FF);
    assert_eq!(cpu.regs.ax(), 0xABFF);

    let addr = physical_address(0x1000, 0x0200);
    cpu.write(Width::Word, addr, 0x1111).unwrap();
    cpu.write(Width::Byte, addr, 0x1FF).unwrap();
    assert_eq!(cpu.peek_byte(addr), 0xFF);
    assert_eq!(cpu.peek_byte(addr + 1), 0x11);
}

#[test]
fn test_mov_byte_register_to_memory() {
    // MOV [BX], DH
    let mut cpu = cpu_with_program(&[0x88, 0x37]);
    cpu.regs.set_word_reg(BX, 0x0200);
    cpu.regs.set_byte_reg(DH, 0x5A);

    cpu.step().unwrap();
    assert_eq!(cpu.peek_byte(physical_address(0x1000, 0x0200)), 0x5A);
}

#[test]
fn test_alu_memory_destination() {
    // SUB [BX], AL
    let mut cpu = cpu_with_program(&[0x28, 0x07]);
    let addr = physical_address(0x1000, 0x0300);
    cpu.write_byte(addr, 0x10);
    cpu.regs.set_word_reg(BX, 0x0300);
    cpu.regs.set_byte_reg(AL, 0x11);

    cpu.step().unwrap();
    assert_eq!(cpu.peek_byte(addr), 0xFF);
    assert!(cpu.get_flag(FLAG_CF));
    assert!(cpu.get_flag(FLAG_SF));
}

#[test]
fn test_alu_register_destination_from_memory() {
    // OR AL, [BX]
    let mut cpu = cpu_with_program(&[0x0A, 0x07]);
    cpu.write_byte(physical_address(0x1000, 0x0300), 0x0F);
    cpu.regs.set_word_reg(BX, 0x0300);
    cpu.regs.set_byte_reg(AL, 0xF0);

    cpu.step().unwrap();
    assert_eq!(cpu.regs.get_byte_reg(AL), 0xFF);
}

#[test]
fn test_group_immediate_byte() {
    // CMP BL, 0x42 ; XOR BL, 0xFF (80 /7, 80 /6)
    let mut cpu = cpu_with_program(&[0x80, 0xFB, 0x42, 0x80, 0xF3, 0xFF]);
    cpu.regs.set_byte_reg(BL, 0x42);

    cpu.step().unwrap();
    assert!(cpu.get_flag(FLAG_ZF));
    assert_eq!(cpu.regs.get_byte_reg(BL), 0x42);

    cpu.step().unwrap();
    assert_eq!(cpu.regs.get_byte_reg(BL), 0xBD);
}

#[test]
fn test_xchg_byte() {
    // XCHG AL, BL
    let mut cpu = cpu_with_program(&[0x86, 0xC3]);
    cpu.regs.set_byte_reg(AL, 0x01);
    cpu.regs.set_byte_reg(BL, 0x02);

    cpu.step().unwrap();
    assert_eq!(cpu.regs.get_byte_reg(AL), 0x02);
    assert_eq!(cpu.regs.get_byte_reg(BL), 0x01);
}

#[test]
fn test_test_instruction() {
    // TEST AL, 0x80 ; TEST BL, 0x01 (F6 /0)
    let mut cpu = cpu_with_program(&[0xA8, 0x80, 0xF6, 0xC3, 0x01]);
    cpu.regs.set_byte_reg(AL, 0x7F);
    cpu.regs.set_byte_reg(BL, 0x03);

    cpu.step().unwrap();
    assert!(cpu.get_flag(FLAG_ZF));
    assert_eq!(cpu.regs.get_byte_reg(AL), 0x7F);

    cpu.step().unwrap();
    assert!(!cpu.get_flag(FLAG_ZF));
    assert_eq!(cpu.regs.ip, 0x0105);
}

#[test]
fn test_not_and_neg() {
    // NOT BL ; NEG BL
    let mut cpu = cpu_with_program(&[0xF6, 0xD3, 0xF6, 0xDB]);
    cpu.regs.set_byte_reg(BL, 0x0F);

    cpu.step().unwrap();
    assert_eq!(cpu.regs.get_byte_reg(BL), 0xF0);

    cpu.step().unwrap();
    assert_eq!(cpu.regs.get_byte_reg(BL), 0x10);
    assert!(cpu.get_flag(FLAG_CF));
}

#[test]
fn test_inc_dec_byte_memory() {
    // INC BYTE [BX] ; DEC BYTE [BX] ; DEC BYTE [BX]
    let mut cpu = cpu_with_program(&[0xFE, 0x07, 0xFE, 0x0F, 0xFE, 0x0F]);
    let addr = physical_address(0x1000, 0x0400);
    cpu.regs.set_word_reg(BX, 0x0400);
    cpu.write_byte(addr, 0xFF);

    cpu.step().unwrap();
    assert_eq!(cpu.peek_byte(addr), 0x00);
    assert!(cpu.get_flag(FLAG_ZF));
    cpu.step().unwrap();
    cpu.step().unwrap();
    assert_eq!(cpu.peek_byte(addr), 0xFE);
}

#[test]
fn test_mul_byte() {
    // MUL BL
    let mut cpu = cpu_with_program(&[0xF6, 0xE3]);
    cpu.regs.set_byte_reg(AL, 0x80);
    cpu.regs.set_byte_reg(BL, 0x02);

    cpu.step().unwrap();
    assert_eq!(cpu.regs.ax(), 0x0100);
    assert!(cpu.get_flag(FLAG_CF));
    assert!(cpu.get_flag(FLAG_OF));
    assert_eq!(cpu.total_cycles(), 70);
}

#[test]
fn test_imul_byte_fits() {
    // IMUL BL: -2 * 3
    let mut cpu = cpu_with_program(&[0xF6, 0xEB]);
    cpu.regs.set_byte_reg(AL, 0xFE);
    cpu.regs.set_byte_reg(BL, 0x03);

    cpu.step().unwrap();
    assert_eq!(cpu.regs.ax(), 0xFFFA);
    assert!(!cpu.get_flag(FLAG_CF));
    assert!(!cpu.get_flag(FLAG_OF));
}

#[test]
fn test_div_byte() {
    // DIV BL: 0x0107 / 0x10
    let mut cpu = cpu_with_program(&[0xF6, 0xF3]);
    cpu.regs.set_word_reg(AX, 0x0107);
    cpu.regs.set_byte_reg(BL, 0x10);

    cpu.step().unwrap();
    assert_eq!(cpu.regs.get_byte_reg(AL), 0x10);
    assert_eq!(cpu.regs.get_byte_reg(AH), 0x07);
    assert_eq!(cpu.total_cycles(), 80);
}

#[test]
fn test_idiv_byte_truncates_toward_zero() {
    // IDIV BL: -50 / 7
    let mut cpu = cpu_with_program(&[0xF6, 0xFB]);
    cpu.regs.set_word_reg(AX, (-50i16) as u16 as u32);
    cpu.regs.set_byte_reg(BL, 0x07);

    cpu.step().unwrap();
    assert_eq!(cpu.regs.get_byte_reg(AL), (-7i8) as u8);
    assert_eq!(cpu.regs.get_byte_reg(AH), (-1i8) as u8);
}

#[test]
fn test_shift_left_by_one() {
    // SHL AL, 1
    let mut cpu = cpu_with_program(&[0xD0, 0xE0]);
    cpu.regs.set_byte_reg(AL, 0x81);

    cpu.step().unwrap();
    assert_eq!(cpu.regs.get_byte_reg(AL), 0x02);
    assert!(cpu.get_flag(FLAG_CF));
    assert!(cpu.get_flag(FLAG_OF));
    assert_eq!(cpu.total_cycles(), 2);
}

#[test]
fn test_shift_right_by_cl() {
    // SHR AX, CL
    let mut cpu = cpu_with_program(&[0xD3, 0xE8]);
    cpu.regs.set_word_reg(AX, 0x1238);
    cpu.regs.set_byte_reg(CL, 4);

    cpu.step().unwrap();
    assert_eq!(cpu.regs.ax(), 0x0123);
    assert!(cpu.get_flag(FLAG_CF));
    assert_eq!(cpu.total_cycles(), 8 + 4 * 4);
}

#[test]
fn test_rotate_through_carry() {
    // RCL BL, 1 ; RCR BL, 1
    let mut cpu = cpu_with_program(&[0xD0, 0xD3, 0xD0, 0xDB]);
    cpu.regs.set_byte_reg(BL, 0x80);
    cpu.set_flag(FLAG_CF, true);

    cpu.step().unwrap();
    assert_eq!(cpu.regs.get_byte_reg(BL), 0x01);
    assert!(cpu.get_flag(FLAG_CF));

    cpu.step().unwrap();
    assert_eq!(cpu.regs.get_byte_reg(BL), 0x80);
    assert!(cpu.get_flag(FLAG_CF));
}

#[test]
fn test_shift_by_zero_keeps_flags() {
    // SAR AL, CL with CL = 0
    let mut cpu = cpu_with_program(&[0xD2, 0xF8]);
    cpu.regs.set_byte_reg(AL, 0x80);
    cpu.regs.set_word_reg(CX, 0);
    cpu.set_flag(FLAG_ZF, true);

    cpu.step().unwrap();
    assert_eq!(cpu.regs.get_byte_reg(AL), 0x80);
    assert!(cpu.get_flag(FLAG_ZF));
}
