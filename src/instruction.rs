use crate::trap_vector::TrapVector;

/// These instruction types don't map directly to the 4-bit opcodes.
/// Some have been split into multiple enum variants for better ergonomics:
/// `ADD`/`AND` each decode to either their register-mode or immediate-mode
/// variant up front, rather than branching on the immediate flag again at
/// execution time. All offset/immediate fields are carried unextended;
/// `execute` sign-extends them at the point of use, same as the ISA
/// reference does.
#[derive(Debug)]
pub enum Instruction {
    BR(Condition, u16),
    ADD(Register, Register, Register),
    ADDIMM(Register, Register, u16),
    LD(Register, u16),
    ST(Register, u16),
    JSR(u16),
    JSRR(Register),
    AND(Register, Register, Register),
    ANDIMM(Register, Register, u16),
    LDR(Register, Register, u16),
    STR(Register, Register, u16),
    Rti,
    NOT(Register, Register),
    LDI(Register, u16),
    STI(Register, u16),
    JMP(Register),
    Reserved,
    LEA(Register, u16),
    TRAP(Result<TrapVector, u8>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Register {
    R0 = 0,
    R1 = 1,
    R2 = 2,
    R3 = 3,
    R4 = 4,
    R5 = 5,
    R6 = 6,
    R7 = 7,
}

impl Register {
    fn from(n: u16) -> Register {
        match n {
            0 => Register::R0,
            1 => Register::R1,
            2 => Register::R2,
            3 => Register::R3,
            4 => Register::R4,
            5 => Register::R5,
            6 => Register::R6,
            7 => Register::R7,
            _ => unreachable!("register field is only ever 3 bits wide"),
        }
    }
}

/// The nzp bits of a `BR` instruction, tested against the condition register.
#[derive(Debug, Clone, Copy)]
pub struct Condition {
    pub n: bool,
    pub z: bool,
    pub p: bool,
}

impl Instruction {
    /// Decodes a 16-bit instruction word, dispatching on bits [15:12].
    pub fn decode(instruction: u16) -> Self {
        let value = instruction >> 12;

        match value {
            0x00 => {
                let n = ((instruction >> 11) & 0x1) == 1;
                let z = ((instruction >> 10) & 0x1) == 1;
                let p = ((instruction >> 9) & 0x1) == 1;
                let pc_offset = instruction & 0x1ff;

                Instruction::BR(Condition { n, z, p }, pc_offset)
            }

            0x01 => {
                let r0 = Register::from((instruction >> 9) & 0x7);
                let r1 = Register::from((instruction >> 6) & 0x7);
                let r2 = Register::from(instruction & 0x7);
                let immediate_flag = ((instruction >> 5) & 0x1) == 0x1;
                let immediate_value = instruction & 0x1f;

                if immediate_flag {
                    Instruction::ADDIMM(r0, r1, immediate_value)
                } else {
                    Instruction::ADD(r0, r1, r2)
                }
            }

            0x02 => {
                let r0 = Register::from((instruction >> 9) & 0x7);
                let pc_offset = instruction & 0x1ff;

                Instruction::LD(r0, pc_offset)
            }

            0x03 => {
                let r0 = Register::from((instruction >> 9) & 0x7);
                let pc_offset = instruction & 0x1ff;

                Instruction::ST(r0, pc_offset)
            }

            0x04 => {
                let use_pc_offset = ((instruction >> 11) & 1) == 1;
                let r0 = Register::from((instruction >> 6) & 0x7);
                let pc_offset = instruction & 0x7ff;

                if use_pc_offset {
                    Instruction::JSR(pc_offset)
                } else {
                    Instruction::JSRR(r0)
                }
            }

            0x05 => {
                let immediate_flag = ((instruction >> 5) & 1) == 1;
                let immediate_value = instruction & 0x1f;

                let r0 = Register::from((instruction >> 9) & 0x7);
                let r1 = Register::from((instruction >> 6) & 0x7);
                let r2 = Register::from(instruction & 0x7);

                if immediate_flag {
                    Instruction::ANDIMM(r0, r1, immediate_value)
                } else {
                    Instruction::AND(r0, r1, r2)
                }
            }

            0x06 => {
                let r0 = Register::from((instruction >> 9) & 0x7);
                let r1 = Register::from((instruction >> 6) & 0x7);
                let offset = instruction & 0x3f;

                Instruction::LDR(r0, r1, offset)
            }

            0x07 => {
                let sr = Register::from((instruction >> 9) & 0x7);
                let base_r = Register::from((instruction >> 6) & 0x7);
                let offset = instruction & 0x3f;

                Instruction::STR(sr, base_r, offset)
            }

            0x08 => Instruction::Rti,

            0x09 => {
                let r0 = Register::from((instruction >> 9) & 0x7);
                let r1 = Register::from((instruction >> 6) & 0x7);

                Instruction::NOT(r0, r1)
            }

            0x0a => {
                let dr = Register::from((instruction >> 9) & 0x7);
                let pc_offset = instruction & 0x1ff;

                Instruction::LDI(dr, pc_offset)
            }

            0x0b => {
                let r0 = Register::from((instruction >> 9) & 0x7);
                let pc_offset = instruction & 0x1ff;

                Instruction::STI(r0, pc_offset)
            }

            0x0c => {
                let r0 = Register::from((instruction >> 6) & 0x7);

                Instruction::JMP(r0)
            }

            0x0d => Instruction::Reserved,

            0x0e => {
                let r0 = Register::from((instruction >> 9) & 0x7);
                let pc_offset = instruction & 0x1ff;

                Instruction::LEA(r0, pc_offset)
            }

            0x0f => Instruction::TRAP(TrapVector::decode(instruction)),

            _ => unreachable!("opcode field is only ever 4 bits wide: {}", value),
        }
    }
}
