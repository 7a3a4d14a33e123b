// This file is part of gbacore.
// Licensed under the MIT OR Apache-2.0 license. See LICENSE files in the project root.

//! THUMB (16-bit) instruction execution. THUMB instructions are decoded and
//! executed as their ARM-equivalent register effects; condition codes do not
//! apply except to the dedicated conditional branch class.

use bit_field::BitField;

use super::arm::{add_overflow, set_arithmetic_flags, set_logical_flags, sign_extend, sub_overflow};
use super::condition::Condition;
use super::registers::Flag;
use super::shifter::{self, ShiftKind};
use super::tables::{self, ThumbClass};
use super::{Cpu, CpuBus};

pub fn execute(cpu: &mut Cpu, bus: &mut dyn CpuBus, opcode: u16) {
    let class = tables::classify_thumb(&cpu.thumb_table, opcode);
    match class {
        ThumbClass::MoveShifted => move_shifted(cpu, opcode),
        ThumbClass::AddSubtract => add_subtract(cpu, opcode),
        ThumbClass::MoveCmpAddSubImmediate => move_cmp_add_sub_immediate(cpu, opcode),
        ThumbClass::AluOperation => alu_operation(cpu, opcode),
        ThumbClass::HiRegisterBx => hi_register_bx(cpu, opcode),
        ThumbClass::PcRelativeLoad => pc_relative_load(cpu, bus, opcode),
        ThumbClass::LoadStoreRegisterOffset => load_store_register_offset(cpu, bus, opcode),
        ThumbClass::LoadStoreSignExtended => load_store_sign_extended(cpu, bus, opcode),
        ThumbClass::LoadStoreImmediateOffset => load_store_immediate_offset(cpu, bus, opcode),
        ThumbClass::LoadStoreHalfword => load_store_halfword(cpu, bus, opcode),
        ThumbClass::SpRelativeLoadStore => sp_relative_load_store(cpu, bus, opcode),
        ThumbClass::LoadAddress => load_address(cpu, opcode),
        ThumbClass::AddOffsetToSp => add_offset_to_sp(cpu, opcode),
        ThumbClass::PushPop => push_pop(cpu, bus, opcode),
        ThumbClass::MultipleLoadStore => multiple_load_store(cpu, bus, opcode),
        ThumbClass::ConditionalBranch => conditional_branch(cpu, opcode),
        ThumbClass::SoftwareInterrupt => cpu.software_interrupt(),
        ThumbClass::UnconditionalBranch => unconditional_branch(cpu, opcode),
        ThumbClass::LongBranchLink => long_branch_link(cpu, opcode),
        ThumbClass::Undefined => cpu.undefined_instruction(u32::from(opcode)),
    }
}

fn rd(opcode: u16) -> usize {
    (opcode & 0x7) as usize
}
fn rs(opcode: u16) -> usize {
    ((opcode >> 3) & 0x7) as usize
}

fn move_shifted(cpu: &mut Cpu, opcode: u16) {
    let kind = match (opcode >> 11) & 0x3 {
        0 => ShiftKind::Lsl,
        1 => ShiftKind::Lsr,
        _ => ShiftKind::Asr,
    };
    let amount = u32::from((opcode >> 6) & 0x1f);
    let value = cpu.regs.get(rs(opcode));
    let shifted = shifter::shift_immediate(kind, value, amount, cpu.regs.flag(Flag::C));
    cpu.regs.set(rd(opcode), shifted.value);
    set_logical_flags(cpu, shifted.value, shifted.carry, true);
}

fn add_subtract(cpu: &mut Cpu, opcode: u16) {
    let immediate = opcode.get_bit(10);
    let subtract = opcode.get_bit(9);
    let rn_or_imm = u32::from((opcode >> 6) & 0x7);
    let operand = cpu.regs.get(rs(opcode));
    let value = if immediate {
        rn_or_imm
    } else {
        cpu.regs.get(rn_or_imm as usize)
    };
    let result = if subtract {
        operand.wrapping_sub(value)
    } else {
        operand.wrapping_add(value)
    };
    cpu.regs.set(rd(opcode), result);
    if subtract {
        set_arithmetic_flags(
            cpu,
            u64::from(result),
            operand >= value,
            sub_overflow(operand, value, result),
            true,
        );
    } else {
        let wide = u64::from(operand) + u64::from(value);
        set_arithmetic_flags(cpu, wide, wide > 0xffff_ffff, add_overflow(operand, value, result), true);
    }
}

fn move_cmp_add_sub_immediate(cpu: &mut Cpu, opcode: u16) {
    let op = (opcode >> 11) & 0x3;
    let rd_index = ((opcode >> 8) & 0x7) as usize;
    let imm = u32::from(opcode & 0xff);
    let current = cpu.regs.get(rd_index);
    match op {
        0 => {
            cpu.regs.set(rd_index, imm);
            set_logical_flags(cpu, imm, cpu.regs.flag(Flag::C), true);
        }
        1 => {
            let result = current.wrapping_sub(imm);
            set_arithmetic_flags(
                cpu,
                u64::from(result),
                current >= imm,
                sub_overflow(current, imm, result),
                true,
            );
        }
        2 => {
            let wide = u64::from(current) + u64::from(imm);
            let result = current.wrapping_add(imm);
            cpu.regs.set(rd_index, result);
            set_arithmetic_flags(cpu, wide, wide > 0xffff_ffff, add_overflow(current, imm, result), true);
        }
        _ => {
            let result = current.wrapping_sub(imm);
            cpu.regs.set(rd_index, result);
            set_arithmetic_flags(
                cpu,
                u64::from(result),
                current >= imm,
                sub_overflow(current, imm, result),
                true,
            );
        }
    }
}

fn alu_operation(cpu: &mut Cpu, opcode: u16) {
    let op = (opcode >> 6) & 0xf;
    let src = cpu.regs.get(rs(opcode));
    let dst = cpu.regs.get(rd(opcode));
    let carry_in = cpu.regs.flag(Flag::C);
    match op {
        0x0 => {
            let r = dst & src;
            cpu.regs.set(rd(opcode), r);
            set_logical_flags(cpu, r, carry_in, true);
        }
        0x1 => {
            let r = dst ^ src;
            cpu.regs.set(rd(opcode), r);
            set_logical_flags(cpu, r, carry_in, true);
        }
        0x2 => {
            let shifted = shifter::shift_register(ShiftKind::Lsl, dst, src & 0xff, carry_in);
            cpu.regs.set(rd(opcode), shifted.value);
            set_logical_flags(cpu, shifted.value, shifted.carry, true);
        }
        0x3 => {
            let shifted = shifter::shift_register(ShiftKind::Lsr, dst, src & 0xff, carry_in);
            cpu.regs.set(rd(opcode), shifted.value);
            set_logical_flags(cpu, shifted.value, shifted.carry, true);
        }
        0x4 => {
            let shifted = shifter::shift_register(ShiftKind::Asr, dst, src & 0xff, carry_in);
            cpu.regs.set(rd(opcode), shifted.value);
            set_logical_flags(cpu, shifted.value, shifted.carry, true);
        }
        0x5 => {
            let wide = u64::from(dst) + u64::from(src) + u64::from(carry_in);
            let result = dst.wrapping_add(src).wrapping_add(u32::from(carry_in));
            cpu.regs.set(rd(opcode), result);
            set_arithmetic_flags(cpu, wide, wide > 0xffff_ffff, add_overflow(dst, src, result), true);
        }
        0x6 => {
            let borrow = 1 - u32::from(carry_in);
            let result = dst.wrapping_sub(src).wrapping_sub(borrow);
            cpu.regs.set(rd(opcode), result);
            set_arithmetic_flags(
                cpu,
                u64::from(result),
                u64::from(dst) >= u64::from(src) + u64::from(borrow),
                sub_overflow(dst, src, result),
                true,
            );
        }
        0x7 => {
            let shifted = shifter::shift_register(ShiftKind::Ror, dst, src & 0xff, carry_in);
            cpu.regs.set(rd(opcode), shifted.value);
            set_logical_flags(cpu, shifted.value, shifted.carry, true);
        }
        0x8 => {
            let r = dst & src;
            set_logical_flags(cpu, r, carry_in, true);
        }
        0x9 => {
            let result = 0u32.wrapping_sub(src);
            cpu.regs.set(rd(opcode), result);
            set_arithmetic_flags(cpu, u64::from(result), src == 0, sub_overflow(0, src, result), true);
        }
        0xa => {
            let result = dst.wrapping_sub(src);
            set_arithmetic_flags(cpu, u64::from(result), dst >= src, sub_overflow(dst, src, result), true);
        }
        0xb => {
            let wide = u64::from(dst) + u64::from(src);
            let result = dst.wrapping_add(src);
            set_arithmetic_flags(cpu, wide, wide > 0xffff_ffff, add_overflow(dst, src, result), true);
        }
        0xc => {
            let r = dst | src;
            cpu.regs.set(rd(opcode), r);
            set_logical_flags(cpu, r, carry_in, true);
        }
        0xd => {
            let r = dst.wrapping_mul(src);
            cpu.regs.set(rd(opcode), r);
            set_logical_flags(cpu, r, carry_in, true);
        }
        0xe => {
            let r = dst & !src;
            cpu.regs.set(rd(opcode), r);
            set_logical_flags(cpu, r, carry_in, true);
        }
        _ => {
            let r = !src;
            cpu.regs.set(rd(opcode), r);
            set_logical_flags(cpu, r, carry_in, true);
        }
    }
}

fn hi_register_bx(cpu: &mut Cpu, opcode: u16) {
    let op = (opcode >> 8) & 0x3;
    let rd_index = rd(opcode) | (usize::from(opcode.get_bit(7)) << 3);
    let rs_index = rs(opcode) | (usize::from(opcode.get_bit(6)) << 3);
    let src = cpu.regs.get(rs_index);
    match op {
        0 => {
            let dst = cpu.regs.get(rd_index);
            cpu.regs.set(rd_index, dst.wrapping_add(src));
        }
        1 => {
            let dst = cpu.regs.get(rd_index);
            let result = dst.wrapping_sub(src);
            set_arithmetic_flags(cpu, u64::from(result), dst >= src, sub_overflow(dst, src, result), true);
        }
        2 => {
            cpu.regs.set(rd_index, src);
        }
        _ => {
            let thumb = src & 1 != 0;
            let mut cpsr = cpu.regs.cpsr();
            cpsr.set_bit(Flag::T.bit(), thumb);
            cpu.regs.set_cpsr(cpsr);
            cpu.regs.set(15, src & !1);
        }
    }
}

fn pc_relative_load(cpu: &mut Cpu, bus: &mut dyn CpuBus, opcode: u16) {
    let rd_index = ((opcode >> 8) & 0x7) as usize;
    let imm = u32::from(opcode & 0xff) << 2;
    let base = (cpu.regs.pc() & !3).wrapping_add(4);
    let value = bus.read32(base.wrapping_add(imm));
    cpu.regs.set(rd_index, value);
}

fn load_store_register_offset(cpu: &mut Cpu, bus: &mut dyn CpuBus, opcode: u16) {
    let load = opcode.get_bit(11);
    let byte = opcode.get_bit(10);
    let ro = ((opcode >> 6) & 0x7) as usize;
    let rb = rs(opcode);
    let addr = cpu.regs.get(rb).wrapping_add(cpu.regs.get(ro));
    if load {
        let value = if byte {
            u32::from(bus.read8(addr))
        } else {
            bus.read32(addr & !3).rotate_right((addr & 3) * 8)
        };
        cpu.regs.set(rd(opcode), value);
    } else {
        let value = cpu.regs.get(rd(opcode));
        if byte {
            bus.write8(addr, value as u8);
        } else {
            bus.write32(addr & !3, value);
        }
    }
}

fn load_store_sign_extended(cpu: &mut Cpu, bus: &mut dyn CpuBus, opcode: u16) {
    let h = opcode.get_bit(11);
    let sign = opcode.get_bit(10);
    let ro = ((opcode >> 6) & 0x7) as usize;
    let rb = rs(opcode);
    let addr = cpu.regs.get(rb).wrapping_add(cpu.regs.get(ro));
    let value = match (sign, h) {
        (false, false) => {
            bus.write16(addr & !1, cpu.regs.get(rd(opcode)) as u16);
            return;
        }
        (false, true) => u32::from(bus.read16(addr & !1)),
        (true, false) => sign_extend(u32::from(bus.read8(addr)), 8) as u32,
        (true, true) => sign_extend(u32::from(bus.read16(addr & !1)), 16) as u32,
    };
    cpu.regs.set(rd(opcode), value);
}

fn load_store_immediate_offset(cpu: &mut Cpu, bus: &mut dyn CpuBus, opcode: u16) {
    let byte = opcode.get_bit(12);
    let load = opcode.get_bit(11);
    let imm = u32::from((opcode >> 6) & 0x1f);
    let rb = rs(opcode);
    let offset = if byte { imm } else { imm << 2 };
    let addr = cpu.regs.get(rb).wrapping_add(offset);
    if load {
        let value = if byte {
            u32::from(bus.read8(addr))
        } else {
            bus.read32(addr & !3).rotate_right((addr & 3) * 8)
        };
        cpu.regs.set(rd(opcode), value);
    } else {
        let value = cpu.regs.get(rd(opcode));
        if byte {
            bus.write8(addr, value as u8);
        } else {
            bus.write32(addr & !3, value);
        }
    }
}

fn load_store_halfword(cpu: &mut Cpu, bus: &mut dyn CpuBus, opcode: u16) {
    let load = opcode.get_bit(11);
    let imm = u32::from((opcode >> 6) & 0x1f) << 1;
    let rb = rs(opcode);
    let addr = cpu.regs.get(rb).wrapping_add(imm);
    if load {
        let value = u32::from(bus.read16(addr & !1));
        cpu.regs.set(rd(opcode), value);
    } else {
        bus.write16(addr & !1, cpu.regs.get(rd(opcode)) as u16);
    }
}

fn sp_relative_load_store(cpu: &mut Cpu, bus: &mut dyn CpuBus, opcode: u16) {
    let load = opcode.get_bit(11);
    let rd_index = ((opcode >> 8) & 0x7) as usize;
    let imm = u32::from(opcode & 0xff) << 2;
    let addr = cpu.regs.get(13).wrapping_add(imm);
    if load {
        let value = bus.read32(addr & !3).rotate_right((addr & 3) * 8);
        cpu.regs.set(rd_index, value);
    } else {
        bus.write32(addr & !3, cpu.regs.get(rd_index));
    }
}

fn load_address(cpu: &mut Cpu, opcode: u16) {
    let use_sp = opcode.get_bit(11);
    let rd_index = ((opcode >> 8) & 0x7) as usize;
    let imm = u32::from(opcode & 0xff) << 2;
    let base = if use_sp {
        cpu.regs.get(13)
    } else {
        cpu.regs.pc() & !3
    };
    cpu.regs.set(rd_index, base.wrapping_add(imm));
}

fn add_offset_to_sp(cpu: &mut Cpu, opcode: u16) {
    let negative = opcode.get_bit(7);
    let imm = u32::from(opcode & 0x7f) << 2;
    let sp = cpu.regs.get(13);
    cpu.regs.set(13, if negative { sp.wrapping_sub(imm) } else { sp.wrapping_add(imm) });
}

fn push_pop(cpu: &mut Cpu, bus: &mut dyn CpuBus, opcode: u16) {
    let load = opcode.get_bit(11);
    let store_lr_or_load_pc = opcode.get_bit(8);
    let list = opcode & 0xff;
    if load {
        let mut addr = cpu.regs.get(13);
        for i in 0..8u32 {
            if list.get_bit(i as usize) {
                let value = bus.read32(addr & !3).rotate_right((addr & 3) * 8);
                cpu.regs.set(i as usize, value);
                addr = addr.wrapping_add(4);
            }
        }
        if store_lr_or_load_pc {
            let value = bus.read32(addr & !3);
            cpu.regs.set(15, value & !1);
            addr = addr.wrapping_add(4);
        }
        cpu.regs.set(13, addr);
    } else {
        let count = list.count_ones() + u32::from(store_lr_or_load_pc);
        let mut addr = cpu.regs.get(13).wrapping_sub(count * 4);
        cpu.regs.set(13, addr);
        for i in 0..8u32 {
            if list.get_bit(i as usize) {
                bus.write32(addr & !3, cpu.regs.get(i as usize));
                addr = addr.wrapping_add(4);
            }
        }
        if store_lr_or_load_pc {
            bus.write32(addr & !3, cpu.regs.get(14));
        }
    }
}

fn multiple_load_store(cpu: &mut Cpu, bus: &mut dyn CpuBus, opcode: u16) {
    let load = opcode.get_bit(11);
    let rb = rs(opcode);
    let list = opcode & 0xff;
    let mut addr = cpu.regs.get(rb);
    for i in 0..8u32 {
        if list.get_bit(i as usize) {
            if load {
                let value = bus.read32(addr & !3).rotate_right((addr & 3) * 8);
                cpu.regs.set(i as usize, value);
            } else {
                bus.write32(addr & !3, cpu.regs.get(i as usize));
            }
            addr = addr.wrapping_add(4);
        }
    }
    cpu.regs.set(rb, addr);
}

fn conditional_branch(cpu: &mut Cpu, opcode: u16) {
    let cond = Condition::decode(u32::from((opcode >> 8) & 0xf));
    let n = cpu.regs.flag(Flag::N);
    let z = cpu.regs.flag(Flag::Z);
    let c = cpu.regs.flag(Flag::C);
    let v = cpu.regs.flag(Flag::V);
    if !cond.passes(n, z, c, v) {
        return;
    }
    let offset = sign_extend(u32::from(opcode & 0xff), 8) << 1;
    let pc = cpu.regs.pc();
    cpu.regs.set(15, pc.wrapping_add(4).wrapping_add(offset as u32));
}

fn unconditional_branch(cpu: &mut Cpu, opcode: u16) {
    let offset = sign_extend(u32::from(opcode & 0x7ff), 11) << 1;
    let pc = cpu.regs.pc();
    cpu.regs.set(15, pc.wrapping_add(4).wrapping_add(offset as u32));
}

fn long_branch_link(cpu: &mut Cpu, opcode: u16) {
    let high = !opcode.get_bit(11);
    let offset = u32::from(opcode & 0x7ff);
    let pc = cpu.regs.pc();
    if high {
        let extended = sign_extend(offset, 11) << 12;
        cpu.regs.set(14, pc.wrapping_add(4).wrapping_add(extended as u32));
    } else {
        let lr = cpu.regs.get(14);
        let next_instruction = pc.wrapping_add(2);
        cpu.regs.set(15, lr.wrapping_add(offset << 1));
        cpu.regs.set(14, next_instruction | 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::Cpu;

    struct TestBus {
        mem: Vec<u8>,
    }

    impl TestBus {
        fn new() -> Self {
            Self { mem: vec![0; 0x1000] }
        }
    }

    impl CpuBus for TestBus {
        fn read8(&mut self, addr: u32) -> u8 {
            self.mem[addr as usize % self.mem.len()]
        }
        fn read16(&mut self, addr: u32) -> u16 {
            u16::from(self.read8(addr)) | (u16::from(self.read8(addr + 1)) << 8)
        }
        fn read32(&mut self, addr: u32) -> u32 {
            u32::from(self.read16(addr)) | (u32::from(self.read16(addr + 2)) << 16)
        }
        fn write8(&mut self, addr: u32, value: u8) {
            let len = self.mem.len();
            self.mem[addr as usize % len] = value;
        }
        fn write16(&mut self, addr: u32, value: u16) {
            self.write8(addr, value as u8);
            self.write8(addr + 1, (value >> 8) as u8);
        }
        fn write32(&mut self, addr: u32, value: u32) {
            self.write16(addr, value as u16);
            self.write16(addr + 2, (value >> 16) as u16);
        }
    }

    #[test]
    fn move_immediate_sets_register_and_flags() {
        let mut cpu = Cpu::new();
        let mut bus = TestBus::new();
        // MOV r0, #0: 001 00 000 00000000
        execute(&mut cpu, &mut bus, 0x2000);
        assert_eq!(0, cpu.regs.get(0));
        assert!(cpu.regs.flag(Flag::Z));
    }

    #[test]
    fn add_subtract_register_form() {
        let mut cpu = Cpu::new();
        let mut bus = TestBus::new();
        cpu.regs.set(1, 10);
        cpu.regs.set(2, 3);
        // SUB r0, r1, r2: 0001 1 1 010 001 000
        execute(&mut cpu, &mut bus, 0x1a88);
        assert_eq!(7, cpu.regs.get(0));
    }

    #[test]
    fn unconditional_branch_sets_pc() {
        let mut cpu = Cpu::new();
        let mut bus = TestBus::new();
        cpu.regs.set(15, 0x1000);
        execute(&mut cpu, &mut bus, 0xe001);
        assert_eq!(0x1000 + 4 + 2, cpu.regs.pc());
    }
}
