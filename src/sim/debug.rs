//! Utilities to debug simulation.
//!
//! The key type here is [`Breakpoint`], which can be appended to the [`Simulator`]'s
//! breakpoint field to cause the simulator to break.
use std::fmt::Write;

use crate::ast::Reg;
use crate::ast::sim::SimInstr;

use super::Simulator;

/// Common breakpoints.
#[derive(PartialEq, Eq, Hash)]
pub enum Breakpoint {
    /// Break when the PC is equal to the given value.
    PC(u16),

    /// Break when the register's value passes the comparator.
    Reg {
        /// Register to check.
        reg: Reg,
        /// Predicate to break against.
        value: Comparator
    },
    /// Break when the cell's value passes the comparator.
    Mem {
        /// Address to check.
        addr: u16,
        /// Predicate to break against.
        value: Comparator
    },
    /// Break when the next instruction is a `TRAP` with the given vector.
    ///
    /// The break happens before the trap executes.
    /// Vectors with no defined routine (e.g., `x00`) execute as no-ops,
    /// which makes them usable as tracing hooks.
    Trap(u8),
}

impl Breakpoint where Breakpoint: Send + Sync { /* assert Breakpoint is send/sync */ }

impl Breakpoint {
    /// Checks if a break should occur.
    pub fn check(&self, sim: &Simulator) -> bool {
        match self {
            Breakpoint::PC(expected) => expected == &sim.pc,
            Breakpoint::Reg { reg, value: cmp } => cmp.check(sim.reg_file[*reg]),
            Breakpoint::Mem { addr, value: cmp } => cmp.check(sim.mem[*addr]),
            Breakpoint::Trap(vect) => matches!(
                SimInstr::decode(sim.mem[sim.pc]),
                Ok(SimInstr::TRAP(v)) if v.get() == u16::from(*vect)
            ),
        }
    }

    fn fmt_bp(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::PC(expected) => {
                write!(f, "PC == x{expected:04X}")?;
            },
            Self::Reg { reg, value } => {
                write!(f, "{reg} ")?;
                value.fmt_cmp(f)?;
            },
            Self::Mem { addr, value } => {
                write!(f, "mem[x{addr:04X}] ")?;
                value.fmt_cmp(f)?;
            },
            Self::Trap(vect) => {
                write!(f, "TRAP x{vect:02X}")?;
            },
        }
        Ok(())
    }
}
impl std::fmt::Debug for Breakpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Breakpoint(")?;
        self.fmt_bp(f)?;
        f.write_char(')')
    }
}
/// A predicate on a register or memory cell.
#[derive(PartialEq, Eq, Hash, Debug)]
pub enum Comparator {
    /// Never passes.
    Never,
    /// Passes if the value is less than the operand.
    Lt(u16),
    /// Passes if the value is equal to the operand.
    Eq(u16),
    /// Passes if the value is at most the operand.
    Le(u16),
    /// Passes if the value is greater than the operand.
    Gt(u16),
    /// Passes if the value differs from the operand.
    Ne(u16),
    /// Passes if the value is at least the operand.
    Ge(u16),
    /// Always passes.
    Always
}
impl Comparator {
    /// Checks if a value passes the comparator.
    pub fn check(&self, value: u16) -> bool {
        match *self {
            Comparator::Never  => false,
            Comparator::Lt(r)  => value < r,
            Comparator::Eq(r)  => value == r,
            Comparator::Le(r)  => value <= r,
            Comparator::Gt(r)  => value > r,
            Comparator::Ne(r)  => value != r,
            Comparator::Ge(r)  => value >= r,
            Comparator::Always => true,
        }
    }

    fn fmt_cmp(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Comparator::Never  => f.write_str("never"),
            Comparator::Lt(r)  => write!(f, "< {r}"),
            Comparator::Eq(r)  => write!(f, "== {r}"),
            Comparator::Le(r)  => write!(f, "<= {r}"),
            Comparator::Gt(r)  => write!(f, "> {r}"),
            Comparator::Ne(r)  => write!(f, "!= {r}"),
            Comparator::Ge(r)  => write!(f, ">= {r}"),
            Comparator::Always => f.write_str("always"),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::reg_consts::R2;
    use crate::sim::Simulator;

    use super::{Breakpoint, Comparator};

    #[test]
    fn test_check() {
        let mut sim = Simulator::default();
        sim.mem[0x3000] = 0xF000; // TRAP x00
        sim.mem[0x4000] = 12;
        sim.reg_file[R2] = 0xFFFF;

        assert!(Breakpoint::PC(0x3000).check(&sim));
        assert!(Breakpoint::Trap(0x00).check(&sim));
        assert!(!Breakpoint::Trap(0x25).check(&sim));
        assert!(Breakpoint::Mem { addr: 0x4000, value: Comparator::Ge(12) }.check(&sim));
        assert!(!Breakpoint::Mem { addr: 0x4000, value: Comparator::Lt(12) }.check(&sim));
        assert!(Breakpoint::Reg { reg: R2, value: Comparator::Gt(0x7FFF) }.check(&sim));
        assert!(!Breakpoint::Reg { reg: R2, value: Comparator::Never }.check(&sim));

        sim.mem[0x3000] = 0xD000;
        assert!(!Breakpoint::Trap(0x00).check(&sim));
    }

    #[test]
    fn test_debug_format() {
        assert_eq!(format!("{:?}", Breakpoint::Trap(0x0F)), "Breakpoint(TRAP x0F)");
        assert_eq!(
            format!("{:?}", Breakpoint::Mem { addr: 0x4100, value: Comparator::Ne(3) }),
            "Breakpoint(mem[x4100] != 3)"
        );
    }
}
