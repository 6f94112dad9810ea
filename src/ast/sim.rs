//! The bytecode-level instruction ([`SimInstr`]).
//!
//! A [`SimInstr`] is what the simulator executes and what the assembler encodes.
//! It converts to a 16-bit word with [`SimInstr::encode`] and back with [`SimInstr::decode`].
//!
//! ```text
//!  15 12 11  9 8   6 5         0
//! +-----+-----+-----+-----------+
//! | op  |  x  |  y  |     z     |
//! +-----+-----+-----+-----------+
//! ```

use super::{CondCode, IOffset, ImmOrReg, Reg, TrapVect8};
use crate::sim::SimErr;

/// An instruction of the 14 defined opcodes.
///
/// Opcodes 8 (`RTI`) and 13 are reserved and do not have a variant.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
#[allow(clippy::upper_case_acronyms)]
pub enum SimInstr {
    #[allow(missing_docs)]
    BR(CondCode, IOffset<9>),
    #[allow(missing_docs)]
    ADD(Reg, Reg, ImmOrReg<5>),
    #[allow(missing_docs)]
    LD(Reg, IOffset<9>),
    #[allow(missing_docs)]
    ST(Reg, IOffset<9>),
    /// `JSR` with a 9-bit PC-relative offset (`R7` receives the return address).
    JSR(IOffset<9>),
    #[allow(missing_docs)]
    AND(Reg, Reg, ImmOrReg<5>),
    #[allow(missing_docs)]
    LDR(Reg, Reg, IOffset<6>),
    #[allow(missing_docs)]
    STR(Reg, Reg, IOffset<6>),
    #[allow(missing_docs)]
    NOT(Reg, Reg),
    #[allow(missing_docs)]
    LDI(Reg, IOffset<9>),
    #[allow(missing_docs)]
    STI(Reg, IOffset<9>),
    /// `JMP` (`RET` is `JMP R7`).
    JMP(Reg),
    #[allow(missing_docs)]
    LEA(Reg, IOffset<9>),
    #[allow(missing_docs)]
    TRAP(TrapVect8),
}

impl SimInstr {
    /// Gets the opcode of this instruction (the top 4 bits of its encoding).
    pub fn opcode(&self) -> u8 {
        match self {
            SimInstr::BR(_, _)     => 0b0000,
            SimInstr::ADD(_, _, _) => 0b0001,
            SimInstr::LD(_, _)     => 0b0010,
            SimInstr::ST(_, _)     => 0b0011,
            SimInstr::JSR(_)       => 0b0100,
            SimInstr::AND(_, _, _) => 0b0101,
            SimInstr::LDR(_, _, _) => 0b0110,
            SimInstr::STR(_, _, _) => 0b0111,
            SimInstr::NOT(_, _)    => 0b1001,
            SimInstr::LDI(_, _)    => 0b1010,
            SimInstr::STI(_, _)    => 0b1011,
            SimInstr::JMP(_)       => 0b1100,
            SimInstr::LEA(_, _)    => 0b1110,
            SimInstr::TRAP(_)      => 0b1111,
        }
    }

    /// Encodes this instruction as a 16-bit word.
    ///
    /// Fields the engine ignores are filled in canonically:
    /// `NOT` sets its low six bits, and `JSR` sets bit 11.
    ///
    /// ```
    /// use lc3_forth::ast::sim::SimInstr;
    /// use lc3_forth::ast::{IOffset, TrapVect8};
    /// use lc3_forth::ast::reg_consts::{R1, R2};
    ///
    /// assert_eq!(SimInstr::ADD(R2, R2, 1.into()).encode(), 0x14A1);
    /// assert_eq!(SimInstr::NOT(R2, R2).encode(), 0x94BF);
    /// assert_eq!(SimInstr::LD(R1, IOffset::new_trunc(1)).encode(), 0x2201);
    /// assert_eq!(SimInstr::TRAP(TrapVect8::new_trunc(0x25)).encode(), 0xF025);
    /// ```
    pub fn encode(&self) -> u16 {
        let op = u16::from(self.opcode()) << 12;
        let x = |r: &Reg| u16::from(r.reg_no()) << 9;
        let y = |r: &Reg| u16::from(r.reg_no()) << 6;
        let z = |ir: &ImmOrReg<5>| match ir {
            ImmOrReg::Imm(imm) => 0x20 | imm.bits(),
            ImmOrReg::Reg(r)   => u16::from(r.reg_no()),
        };

        op | match self {
            SimInstr::BR(cc, off)       => u16::from(cc & 0b111) << 9 | off.bits(),
            SimInstr::ADD(dr, sr1, sr2) => x(dr) | y(sr1) | z(sr2),
            SimInstr::LD(dr, off)       => x(dr) | off.bits(),
            SimInstr::ST(sr, off)       => x(sr) | off.bits(),
            SimInstr::JSR(off)          => 0x0800 | off.bits(),
            SimInstr::AND(dr, sr1, sr2) => x(dr) | y(sr1) | z(sr2),
            SimInstr::LDR(dr, br, off)  => x(dr) | y(br) | off.bits(),
            SimInstr::STR(sr, br, off)  => x(sr) | y(br) | off.bits(),
            SimInstr::NOT(dr, sr)       => x(dr) | y(sr) | 0x3F,
            SimInstr::LDI(dr, off)      => x(dr) | off.bits(),
            SimInstr::STI(sr, off)      => x(sr) | off.bits(),
            SimInstr::JMP(br)           => y(br),
            SimInstr::LEA(dr, off)      => x(dr) | off.bits(),
            SimInstr::TRAP(vect)        => vect.bits(),
        }
    }

    /// Decodes a 16-bit word into an instruction.
    ///
    /// Bits that the engine does not look at are ignored,
    /// so every word with a defined opcode decodes successfully.
    /// Words with a reserved opcode (8 or 13) raise [`SimErr::IllegalOpcode`].
    pub fn decode(word: u16) -> Result<Self, SimErr> {
        let x = Reg::from_bits(word >> 9);
        let y = Reg::from_bits(word >> 6);
        let off9 = IOffset::new_trunc(word as i16);
        let off6 = IOffset::new_trunc(word as i16);
        let z = match word & 0x20 != 0 {
            true  => ImmOrReg::Imm(IOffset::new_trunc(word as i16)),
            false => ImmOrReg::Reg(Reg::from_bits(word)),
        };

        let instr = match word >> 12 {
            0b0000 => SimInstr::BR(((word >> 9) & 0b111) as u8, off9),
            0b0001 => SimInstr::ADD(x, y, z),
            0b0010 => SimInstr::LD(x, off9),
            0b0011 => SimInstr::ST(x, off9),
            0b0100 => SimInstr::JSR(off9),
            0b0101 => SimInstr::AND(x, y, z),
            0b0110 => SimInstr::LDR(x, y, off6),
            0b0111 => SimInstr::STR(x, y, off6),
            0b1001 => SimInstr::NOT(x, y),
            0b1010 => SimInstr::LDI(x, off9),
            0b1011 => SimInstr::STI(x, off9),
            0b1100 => SimInstr::JMP(y),
            0b1110 => SimInstr::LEA(x, off9),
            0b1111 => SimInstr::TRAP(TrapVect8::new_trunc(word & 0xFF)),
            _ => return Err(SimErr::IllegalOpcode(word)),
        };

        Ok(instr)
    }
}

impl std::fmt::Display for SimInstr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SimInstr::BR(cc, off) => {
                f.write_str("BR")?;
                if cc & 0b100 != 0 { f.write_str("n")?; }
                if cc & 0b010 != 0 { f.write_str("z")?; }
                if cc & 0b001 != 0 { f.write_str("p")?; }
                if *cc == 0 { f.write_str(" (nop)")?; }
                write!(f, " {off}")
            },
            SimInstr::ADD(dr, sr1, sr2) => write!(f, "ADD {dr}, {sr1}, {sr2}"),
            SimInstr::LD(dr, off)       => write!(f, "LD {dr}, {off}"),
            SimInstr::ST(sr, off)       => write!(f, "ST {sr}, {off}"),
            SimInstr::JSR(off)          => write!(f, "JSR {off}"),
            SimInstr::AND(dr, sr1, sr2) => write!(f, "AND {dr}, {sr1}, {sr2}"),
            SimInstr::LDR(dr, br, off)  => write!(f, "LDR {dr}, {br}, {off}"),
            SimInstr::STR(sr, br, off)  => write!(f, "STR {sr}, {br}, {off}"),
            SimInstr::NOT(dr, sr)       => write!(f, "NOT {dr}, {sr}"),
            SimInstr::LDI(dr, off)      => write!(f, "LDI {dr}, {off}"),
            SimInstr::STI(sr, off)      => write!(f, "STI {sr}, {off}"),
            SimInstr::JMP(br) if br.reg_no() == 7 => f.write_str("RET"),
            SimInstr::JMP(br)           => write!(f, "JMP {br}"),
            SimInstr::LEA(dr, off)      => write!(f, "LEA {dr}, {off}"),
            SimInstr::TRAP(vect) => match vect.get() {
                0x20 => f.write_str("GETC"),
                0x21 => f.write_str("OUT"),
                0x25 => f.write_str("HALT"),
                _    => write!(f, "TRAP {vect:X}"),
            },
        }
    }
}
