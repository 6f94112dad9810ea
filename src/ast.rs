//! Operand types shared by the assembler, the simulator and the disassembler.
//!
//! The instruction type itself lives in [`sim::SimInstr`], which can be
//! encoded into (and decoded from) a 16-bit instruction word.

pub mod sim;

use std::fmt::Write as _;
use std::num::TryFromIntError;
use offset_base::OffsetBacking;

/// A register. Must be between 0 and 7.
///
/// A `Reg` is obtained from [`reg_consts`] or via [`Reg::try_from`].
///
/// The Forth runtime reserves three registers for its virtual machine:
/// `R4` is the instruction pointer, `R5` the data stack pointer
/// and `R6` the return stack pointer.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub struct Reg(pub(crate) u8);

/// Register constants!
pub mod reg_consts {
    use super::Reg;

    /// The 0th register in the register file.
    pub const R0: Reg = Reg(0);
    /// The 1st register in the register file.
    pub const R1: Reg = Reg(1);
    /// The 2nd register in the register file.
    pub const R2: Reg = Reg(2);
    /// The 3rd register in the register file.
    pub const R3: Reg = Reg(3);
    /// The 4th register in the register file.
    pub const R4: Reg = Reg(4);
    /// The 5th register in the register file.
    pub const R5: Reg = Reg(5);
    /// The 6th register in the register file.
    pub const R6: Reg = Reg(6);
    /// The 7th register in the register file (the link register).
    pub const R7: Reg = Reg(7);
}
impl Reg {
    /// Gets the register number of this [`Reg`]. This is always between 0 and 7.
    pub fn reg_no(self) -> u8 {
        self.0
    }

    /// Creates a register from the low 3 bits of a value.
    pub(crate) fn from_bits(bits: u16) -> Self {
        Reg((bits & 0b111) as u8)
    }
}
impl std::fmt::Display for Reg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "R{}", self.0)
    }
}
impl From<Reg> for usize {
    // Used for indexing the reg file.
    fn from(value: Reg) -> Self {
        usize::from(value.0)
    }
}
impl TryFrom<u8> for Reg {
    type Error = TryFromIntError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0..=7 => Ok(Reg(value)),
            // there's no public constructor for TryFromIntError
            _     => u8::try_from(256).map(|_| unreachable!("should've been TryFromIntError")),
        }
    }
}

/// A condition code mask (used for `BR`), must be between 0 and 7.
///
/// | instruction   | code (bin) |
/// |---------------|------------|
/// | `NOP`         | `000`      |
/// | `BRn`         | `100`      |
/// | `BRz`         | `010`      |
/// | `BRnz`        | `110`      |
/// | `BRp`         | `001`      |
/// | `BRnp`        | `101`      |
/// | `BRzp`        | `011`      |
/// | `BR`, `BRnzp` | `111`      |
pub type CondCode = u8;

/// A signed offset or a signed immediate value of `N` bits.
///
/// `IOffset<5>` is the `imm5` operand of `ADD`/`AND`,
/// `IOffset<6>` the base+offset operand of `LDR`/`STR`,
/// and `IOffset<9>` every PC-relative operand.
pub type IOffset<const N: u32> = Offset<i16, N>;
/// An unsigned 8-bit trap vector (used for `TRAP`).
pub type TrapVect8 = Offset<u16, 8>;

/// Either an immediate value or a register (the second source of `ADD` and `AND`).
///
/// Any `i32` converts into the immediate variant by keeping its low `N` bits,
/// so `0x10` used as an `imm5` becomes `-16`:
/// ```
/// use lc3_forth::ast::{ImmOrReg, IOffset};
/// use lc3_forth::ast::reg_consts::R3;
///
/// assert_eq!(ImmOrReg::<5>::from(0x10), ImmOrReg::Imm(IOffset::new_trunc(-16)));
/// assert_eq!(ImmOrReg::<5>::from(R3), ImmOrReg::Reg(R3));
/// ```
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum ImmOrReg<const N: u32> {
    #[allow(missing_docs)]
    Imm(IOffset<N>),
    #[allow(missing_docs)]
    Reg(Reg)
}
impl<const N: u32> std::fmt::Display for ImmOrReg<N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImmOrReg::Imm(imm) => std::fmt::Display::fmt(imm, f),
            ImmOrReg::Reg(reg) => std::fmt::Display::fmt(reg, f),
        }
    }
}
impl<const N: u32> From<Reg> for ImmOrReg<N> {
    fn from(value: Reg) -> Self {
        ImmOrReg::Reg(value)
    }
}
impl<const N: u32> From<i32> for ImmOrReg<N> {
    /// Masks the value down to an `N`-bit immediate.
    fn from(value: i32) -> Self {
        ImmOrReg::Imm(IOffset::new_trunc(value as i16))
    }
}

/// A value representing an offset or an immediate value.
///
/// The signedness of this offset is the signedness of the `OFF` backing:
/// - `Offset<i16, _>`: signed offset (also aliased as [`IOffset`])
/// - `Offset<u16, _>`: unsigned offset
///
/// `N` indicates the bit size of the field this value is encoded into.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub struct Offset<OFF, const N: u32>(OFF);

impl<OFF: std::fmt::Display, const N: u32> std::fmt::Display for Offset<OFF, N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_char('#')?;
        std::fmt::Display::fmt(&self.0, f)
    }
}
impl<OFF: std::fmt::UpperHex, const N: u32> std::fmt::UpperHex for Offset<OFF, N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_char('x')?;
        std::fmt::UpperHex::fmt(&self.0, f)
    }
}

/// The errors that can result from calling [`Offset::new`].
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum OffsetNewErr {
    /// The provided offset cannot fit an unsigned integer of the given bitsize.
    CannotFitUnsigned(u32),
    /// The provided offset cannot fit a signed integer of the given bitsize.
    CannotFitSigned(u32)
}

impl std::fmt::Display for OffsetNewErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OffsetNewErr::CannotFitUnsigned(n) => write!(f, "value is too big for unsigned {n}-bit integer"),
            OffsetNewErr::CannotFitSigned(n) => write!(f, "value is too big for signed {n}-bit integer"),
        }
    }
}
impl std::error::Error for OffsetNewErr {}
impl crate::err::Error for OffsetNewErr {
    fn help(&self) -> Option<std::borrow::Cow<str>> {
        use std::borrow::Cow;

        let range = match self {
            OffsetNewErr::CannotFitUnsigned(n) => Cow::from(format!("the range for an unsigned {n}-bit integer is [0, {}]", (1 << n) - 1)),
            OffsetNewErr::CannotFitSigned(n) => Cow::from(format!("the range for a signed {n}-bit integer is [{}, {}]", (-1) << (n - 1), (1 << (n - 1)) - 1)),
        };

        Some(range)
    }
}

mod offset_base {
    use super::OffsetNewErr;

    /// Any type that could store a value for [`Offset`].
    ///
    /// [`Offset`]: super::Offset
    pub trait OffsetBacking: Copy + Eq {
        /// How many bits are contained within this backing.
        const BITS: u32;

        /// Truncates the given value to the provided `bit_size`,
        /// sign-extending signed backings and zero-extending unsigned ones.
        fn truncate(self, bit_size: u32) -> Self;

        /// The error raised when a value does not survive truncation.
        fn does_not_fit_error(bit_size: u32) -> OffsetNewErr;
    }

    macro_rules! impl_offset_backing_for_ints {
        ($($Int:ty: $Err:ident),*) => {
            $(
                impl OffsetBacking for $Int {
                    const BITS: u32 = Self::BITS;

                    fn truncate(self, bit_size: u32) -> Self {
                        (self << (Self::BITS - bit_size)) >> (Self::BITS - bit_size)
                    }

                    fn does_not_fit_error(bit_size: u32) -> OffsetNewErr {
                        OffsetNewErr::$Err(bit_size)
                    }
                }
            )*
        }
    }
    impl_offset_backing_for_ints! {
        u16: CannotFitUnsigned,
        i16: CannotFitSigned
    }
}

impl<OFF: OffsetBacking, const N: u32> Offset<OFF, N> {
    /// Creates a new offset value.
    /// This must fit within `N` bits of the representation, otherwise an error is raised.
    ///
    /// ```
    /// # use lc3_forth::ast::Offset;
    /// #
    /// assert!(Offset::<i16, 9>::new(-256).is_ok());
    /// assert!(Offset::<i16, 9>::new(255).is_ok());
    /// assert!(Offset::<i16, 9>::new(256).is_err());
    /// assert!(Offset::<u16, 8>::new(0x25).is_ok());
    /// assert!(Offset::<u16, 8>::new(0x125).is_err());
    /// ```
    ///
    /// # Panics
    ///
    /// This will panic if `N` is larger than the offset backing.
    pub fn new(n: OFF) -> Result<Self, OffsetNewErr> {
        assert!(N <= OFF::BITS, "bit size {N} exceeds size of backing ({})", OFF::BITS);
        match n == n.truncate(N) {
            true  => Ok(Offset(n)),
            false => Err(OFF::does_not_fit_error(N)),
        }
    }

    /// Creates a new offset by keeping the low `N` bits of the integer
    /// and extending them (sign-extension for signed backings).
    ///
    /// This is the masking behavior of the assembler: out-of-range values
    /// wrap instead of raising an error.
    ///
    /// ```
    /// # use lc3_forth::ast::Offset;
    /// #
    /// assert_eq!(Offset::<i16, 9>::new_trunc(255).get(), 255);
    /// assert_eq!(Offset::<i16, 9>::new_trunc(256).get(), -256);
    /// assert_eq!(Offset::<i16, 9>::new_trunc(300).get(), -212);
    /// assert_eq!(Offset::<i16, 5>::new_trunc(-5).get(), -5);
    /// assert_eq!(Offset::<u16, 8>::new_trunc(0x125).get(), 0x25);
    /// ```
    ///
    /// # Panics
    ///
    /// This will panic if `N` is larger than the offset backing.
    pub fn new_trunc(n: OFF) -> Self {
        assert!(N <= OFF::BITS, "bit size {N} exceeds size of backing ({})", OFF::BITS);
        Self(n.truncate(N))
    }

    /// Gets the value of the offset.
    pub fn get(&self) -> OFF {
        self.0
    }
}

impl<const N: u32> Offset<i16, N> {
    /// The raw `N`-bit field as it appears inside an instruction word.
    pub fn bits(&self) -> u16 {
        (self.0 as u16) & ((1 << N) - 1)
    }
}
impl<const N: u32> Offset<u16, N> {
    /// The raw `N`-bit field as it appears inside an instruction word.
    pub fn bits(&self) -> u16 {
        self.0
    }
}
