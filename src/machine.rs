use crate::error::Fault;
use crate::instruction::{Condition, Instruction, Register};
use crate::memory::Memory;
use crate::registers::Registers;
use crate::sign_extend::SignExtend;
use crate::trap_vector::TrapVector;
use log::{debug, error, trace};
use std::io::{self, Write};

/// Entry point for every user program: a property of the LC-3 architecture,
/// independent of whatever origin a given image was assembled at.
pub const PC_START: u16 = 0x3000;

/// One of the three disjoint condition-code bits, encoded so `BR`'s nzp
/// field can be tested against it with a bitwise AND.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionCode {
    P = 1,
    Z = 1 << 1,
    N = 1 << 2,
}

/// How a run of the fetch-decode-execute loop ended.
#[derive(Debug, PartialEq, Eq)]
pub enum Stop {
    /// The `HALT` trap was executed.
    Halted,
    /// The host asked the machine to stop (e.g. an interrupt signal).
    Interrupted,
}

/// Owns the full architectural state: memory, the register file, the
/// program counter, and the condition code. All per-opcode handlers take it
/// by exclusive reference; there is no module-level mutable state anywhere
/// in the engine.
pub struct Machine {
    pub memory: Memory,
    registers: Registers,
    pub pc: u16,
    pub condition: ConditionCode,
}

impl Machine {
    pub fn new(memory: Memory) -> Self {
        Self {
            memory,
            registers: Registers::new(),
            pc: PC_START,
            condition: ConditionCode::Z,
        }
    }

    /// Runs the fetch-decode-execute loop until `HALT`, a fault, or
    /// `should_stop` reports an interrupt between instructions.
    pub fn run(&mut self, mut should_stop: impl FnMut() -> bool) -> Result<Stop, Fault> {
        loop {
            if should_stop() {
                return Ok(Stop::Interrupted);
            }

            match self.step()? {
                Some(stop) => return Ok(stop),
                None => continue,
            }
        }
    }

    /// Fetches and executes a single instruction. Returns `Some(Stop::Halted)`
    /// once `HALT` has run, `None` otherwise.
    pub fn step(&mut self) -> Result<Option<Stop>, Fault> {
        let fetch_pc = self.pc;
        let raw = self.memory.read(self.pc);
        self.pc = self.pc.wrapping_add(1);

        let instruction = Instruction::decode(raw);
        trace!("pc={:#06x} raw={:#06x} {:?}", fetch_pc, raw, instruction);

        self.execute(fetch_pc, instruction)
    }

    fn update_flags(&mut self, register: Register) {
        let value = self.registers.read(register);
        self.condition = if value == 0 {
            ConditionCode::Z
        } else if (value >> 15) == 1 {
            ConditionCode::N
        } else {
            ConditionCode::P
        };
    }

    fn execute(
        &mut self,
        fetch_pc: u16,
        instruction: Instruction,
    ) -> Result<Option<Stop>, Fault> {
        match instruction {
            // BR: test the condition codes selected by bits [11:9] against
            // the last-written sign; if any selected bit is set, branch to
            // the incremented PC plus the sign-extended PCoffset9.
            Instruction::BR(condition, pc_offset) => {
                if branch_taken(&condition, self.condition) {
                    self.pc = self.pc.wrapping_add(pc_offset.sign_extend(9));
                }
            }

            // ADD (register mode): DR <- SR1 + SR2.
            Instruction::ADD(dr, sr1, sr2) => {
                let value = self
                    .registers
                    .read(sr1)
                    .wrapping_add(self.registers.read(sr2));
                self.registers.write(dr, value);
                self.update_flags(dr);
            }
            // ADD (immediate mode): DR <- SR1 + sext(imm5).
            Instruction::ADDIMM(dr, sr1, imm5) => {
                let value = self
                    .registers
                    .read(sr1)
                    .wrapping_add(imm5.sign_extend(5));
                self.registers.write(dr, value);
                self.update_flags(dr);
            }

            // LD: DR <- mem[incremented PC + sext(PCoffset9)].
            Instruction::LD(dr, pc_offset) => {
                let address = self.pc.wrapping_add(pc_offset.sign_extend(9));
                let value = self.memory.read(address);
                self.registers.write(dr, value);
                self.update_flags(dr);
            }

            // ST: mem[incremented PC + sext(PCoffset9)] <- SR.
            Instruction::ST(sr, pc_offset) => {
                let address = self.pc.wrapping_add(pc_offset.sign_extend(9));
                self.memory.write(address, self.registers.read(sr));
            }

            // JSR: R7 <- incremented PC; PC <- incremented PC + sext(PCoffset11).
            Instruction::JSR(pc_offset) => {
                let link = self.pc;
                self.pc = self.pc.wrapping_add(pc_offset.sign_extend(11));
                self.registers.write(Register::R7, link);
            }
            // JSRR: R7 <- incremented PC; PC <- BaseR.
            Instruction::JSRR(base_r) => {
                let link = self.pc;
                self.pc = self.registers.read(base_r);
                self.registers.write(Register::R7, link);
            }

            // AND (register mode): DR <- SR1 & SR2.
            Instruction::AND(dr, sr1, sr2) => {
                let value = self.registers.read(sr1) & self.registers.read(sr2);
                self.registers.write(dr, value);
                self.update_flags(dr);
            }
            // AND (immediate mode): DR <- SR1 & sext(imm5).
            Instruction::ANDIMM(dr, sr1, imm5) => {
                let value = self.registers.read(sr1) & imm5.sign_extend(5);
                self.registers.write(dr, value);
                self.update_flags(dr);
            }

            // LDR: DR <- mem[BaseR + sext(offset6)].
            Instruction::LDR(dr, base_r, offset) => {
                let address = self.registers.read(base_r).wrapping_add(offset.sign_extend(6));
                let value = self.memory.read(address);
                self.registers.write(dr, value);
                self.update_flags(dr);
            }

            // STR: mem[BaseR + sext(offset6)] <- SR.
            Instruction::STR(sr, base_r, offset) => {
                let address = self.registers.read(base_r).wrapping_add(offset.sign_extend(6));
                self.memory.write(address, self.registers.read(sr));
            }

            // RTI: only valid in privileged (supervisor) mode, which this
            // core never enters, so executing it is always a fault.
            Instruction::Rti => return Err(Fault::Rti { pc: fetch_pc }),

            // NOT: DR <- !SR.
            Instruction::NOT(dr, sr) => {
                self.registers.write(dr, !self.registers.read(sr));
                self.update_flags(dr);
            }

            // LDI: DR <- mem[mem[incremented PC + sext(PCoffset9)]].
            Instruction::LDI(dr, pc_offset) => {
                let pointer = self.memory.read(self.pc.wrapping_add(pc_offset.sign_extend(9)));
                let value = self.memory.read(pointer);
                self.registers.write(dr, value);
                self.update_flags(dr);
            }

            // STI: mem[mem[incremented PC + sext(PCoffset9)]] <- SR.
            Instruction::STI(sr, pc_offset) => {
                let pointer = self.memory.read(self.pc.wrapping_add(pc_offset.sign_extend(9)));
                self.memory.write(pointer, self.registers.read(sr));
            }

            // JMP / RET: PC <- BaseR. RET is the special case BaseR == R7.
            Instruction::JMP(base_r) => {
                self.pc = self.registers.read(base_r);
            }

            Instruction::Reserved => return Err(Fault::ReservedOpcode { pc: fetch_pc }),

            // LEA: DR <- incremented PC + sext(PCoffset9). No memory access.
            Instruction::LEA(dr, pc_offset) => {
                let address = self.pc.wrapping_add(pc_offset.sign_extend(9));
                self.registers.write(dr, address);
            }

            Instruction::TRAP(trap_vector) => {
                let link = self.pc;
                self.registers.write(Register::R7, link);

                match trap_vector {
                    Ok(vector) => {
                        debug!("trap {:?} at pc={:#06x}", vector, fetch_pc);
                        if self.trap(vector) {
                            return Ok(Some(Stop::Halted));
                        }
                    }
                    Err(vector) => {
                        return Err(Fault::UnknownTrapVector {
                            pc: fetch_pc,
                            vector,
                        })
                    }
                }
            }
        }

        Ok(None)
    }

    /// Services a decoded trap vector. Returns true iff the machine should
    /// stop running (only `HALT` does).
    fn trap(&mut self, vector: TrapVector) -> bool {
        match vector {
            // GETC: read one byte from the keyboard, no echo, into R0.
            TrapVector::Getc => {
                let byte = self.memory.input_mut().read_byte();
                self.registers.write(Register::R0, byte);
                self.update_flags(Register::R0);
            }

            // OUT: write R0's low byte to the console and flush.
            TrapVector::Out => {
                print!("{}", self.registers.read(Register::R0) as u8 as char);
                flush_stdout();
            }

            // PUTS: print the low byte of each word from the address in R0
            // until a zero word is hit.
            TrapVector::Puts => {
                let mut address = self.registers.read(Register::R0);
                loop {
                    let word = self.memory.read(address);
                    if word == 0 {
                        break;
                    }
                    print!("{}", word as u8 as char);
                    address = address.wrapping_add(1);
                }
                flush_stdout();
            }

            // IN: prompt, then read and echo one byte into R0.
            TrapVector::In => {
                print!("Enter a character: ");
                flush_stdout();
                let byte = self.memory.input_mut().read_byte();
                print!("{}", byte as u8 as char);
                flush_stdout();
                self.registers.write(Register::R0, byte);
                self.update_flags(Register::R0);
            }

            // PUTSP: like PUTS, but two characters per word, low byte
            // first, then the high byte if it's non-zero. Only a full zero
            // word ends the string.
            TrapVector::Putsp => {
                let mut address = self.registers.read(Register::R0);
                loop {
                    let word = self.memory.read(address);
                    if word == 0 {
                        break;
                    }

                    let low = (word & 0xff) as u8;
                    print!("{}", low as char);

                    let high = (word >> 8) as u8;
                    if high != 0 {
                        print!("{}", high as char);
                    }

                    address = address.wrapping_add(1);
                }
                flush_stdout();
            }

            TrapVector::Halt => {
                println!("HALT");
                flush_stdout();
                return true;
            }
        }

        false
    }

    #[cfg(test)]
    pub(crate) fn registers_for_test(&self) -> &Registers {
        &self.registers
    }
}

fn branch_taken(requested: &Condition, current: ConditionCode) -> bool {
    (requested.n && current == ConditionCode::N)
        || (requested.z && current == ConditionCode::Z)
        || (requested.p && current == ConditionCode::P)
}

fn flush_stdout() {
    if let Err(e) = io::stdout().flush() {
        error!("failed to flush stdout: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::Instruction::*;
    use crate::instruction::Register::*;
    use crate::terminal::test_support::FakeInput;

    fn new_machine() -> Machine {
        Machine::new(Memory::new(Box::new(FakeInput::default())))
    }

    fn reg(machine: &Machine, register: crate::instruction::Register) -> u16 {
        machine.registers_for_test().read(register)
    }

    #[test]
    fn add_immediate_sets_positive_flag() {
        let mut machine = new_machine();
        machine.execute(0x3000, ADDIMM(R0, R0, 0)).unwrap(); // R0 <- 0
        machine.execute(0x3000, ADDIMM(R0, R0, 7)).unwrap(); // R0 <- 7
        machine.execute(0x3000, ADDIMM(R0, R0, 0b11110)).unwrap(); // R0 <- R0 + (-2)

        assert_eq!(reg(&machine, R0), 5);
        assert_eq!(machine.condition, ConditionCode::P);
    }

    #[test]
    fn add_register_mode() {
        let mut machine = new_machine();
        machine.execute(0x3000, ADDIMM(R1, R1, 3)).unwrap();
        machine.execute(0x3000, ADDIMM(R2, R2, 2)).unwrap();
        machine.execute(0x3000, ADD(R0, R1, R2)).unwrap();

        assert_eq!(reg(&machine, R0), 5);
    }

    #[test]
    fn br_zero_skips_when_condition_not_met() {
        let mut machine = new_machine();
        machine.pc = PC_START;
        machine.execute(0x3000, ADDIMM(R0, R0, 0)).unwrap(); // R0 <- 0, COND = Z
        let pc_before = machine.pc;

        machine
            .execute(
                0x3001,
                BR(
                    Condition {
                        n: false,
                        z: false,
                        p: false,
                    },
                    5,
                ),
            )
            .unwrap();

        assert_eq!(machine.pc, pc_before);
    }

    #[test]
    fn br_zero_branches_when_condition_met() {
        let mut machine = new_machine();
        machine.pc = 0x3001;
        machine.execute(0x3000, ADDIMM(R0, R0, 0)).unwrap(); // COND = Z

        machine
            .execute(
                0x3001,
                BR(
                    Condition {
                        n: false,
                        z: true,
                        p: false,
                    },
                    5,
                ),
            )
            .unwrap();

        assert_eq!(machine.pc, 0x3001u16.wrapping_add(5));
    }

    #[test]
    fn ldi_is_ld_through_a_pointer() {
        let mut machine = new_machine();
        machine.memory.write(0x3010, 0x4000);
        machine.memory.write(0x4000, 0x1234);
        machine.pc = 0x3001;

        machine.execute(0x3000, LDI(R1, 15)).unwrap();

        assert_eq!(reg(&machine, R1), 0x1234);
        assert_eq!(machine.condition, ConditionCode::P);
    }

    #[test]
    fn jsr_then_jmp_r7_returns() {
        let mut machine = new_machine();
        machine.pc = 0x3001;

        machine.execute(0x3000, JSR(2)).unwrap();
        assert_eq!(reg(&machine, R7), 0x3001);
        assert_eq!(machine.pc, 0x3003);

        machine.execute(0x3003, ADDIMM(R2, R2, 4)).unwrap();
        machine.execute(0x3004, JMP(R7)).unwrap();

        assert_eq!(machine.pc, 0x3001);
        assert_eq!(reg(&machine, R2), 4);
    }

    #[test]
    fn not_complements_bits() {
        let mut machine = new_machine();
        machine.execute(0x3000, ADDIMM(R2, R2, 0b01111)).unwrap(); // R2 <- 15
        machine.execute(0x3000, ADDIMM(R2, R2, 0b01111)).unwrap(); // R2 <- 30
        machine.execute(0x3000, NOT(R1, R2)).unwrap();

        assert_eq!(reg(&machine, R1), !30u16);
    }

    #[test]
    fn reserved_opcode_is_a_fault() {
        let mut machine = new_machine();
        let err = machine.execute(0x3000, Reserved).unwrap_err();
        assert!(matches!(err, Fault::ReservedOpcode { pc: 0x3000 }));
    }

    #[test]
    fn rti_outside_privileged_mode_is_a_fault() {
        let mut machine = new_machine();
        let err = machine.execute(0x3000, Rti).unwrap_err();
        assert!(matches!(err, Fault::Rti { pc: 0x3000 }));
    }

    #[test]
    fn unknown_trap_vector_is_a_fault() {
        let mut machine = new_machine();
        let err = machine.execute(0x3000, TRAP(Err(0xaa))).unwrap_err();
        assert!(matches!(
            err,
            Fault::UnknownTrapVector {
                pc: 0x3000,
                vector: 0xaa
            }
        ));
    }

    #[test]
    fn halt_trap_stops_the_loop() {
        let mut machine = new_machine();
        let stop = machine.execute(0x3000, TRAP(Ok(TrapVector::Halt))).unwrap();
        assert_eq!(stop, Some(Stop::Halted));
    }

    #[test]
    fn getc_then_out_echoes_the_byte() {
        let mut machine = Machine::new(Memory::new(Box::new(FakeInput::with_bytes(b"A"))));
        machine.execute(0x3000, TRAP(Ok(TrapVector::Getc))).unwrap();

        assert_eq!(reg(&machine, R0), u16::from(b'A'));
    }

    #[test]
    fn step_through_a_full_halt_program() {
        // AND R0,R0,#0 ; BRz +1 ; ADD R0,R0,#1 ; HALT
        let mut machine = new_machine();
        machine.memory.write(0x3000, 0b0101_000_000_1_00000); // AND R0,R0,#0
        machine.memory.write(0x3001, 0b0000_010_000000001); // BRz +1
        machine.memory.write(0x3002, 0b0001_000_000_1_00001); // ADD R0,R0,#1
        machine.memory.write(0x3003, 0b1111_0000_0010_0101); // TRAP HALT

        let stop = machine.run(|| false).unwrap();

        assert_eq!(stop, Stop::Halted);
        assert_eq!(reg(&machine, R0), 0);
    }
}
