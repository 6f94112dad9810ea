//! The memory layout of the Forth runtime.
//!
//! The layout is configuration: the runtime's code reads every address
//! it needs from a constant pool assembled from a [`Layout`],
//! so the regions can be moved around as long as they do not overlap.

/// Where each region of the Forth runtime lives in memory.
///
/// The default layout is:
///
/// | Region          | Start   | Size (cells) |
/// |-----------------|---------|--------------|
/// | code            | `x3000` | (assembled)  |
/// | TIB             | `x4000` | 256          |
/// | `>in`           | `x4100` | 1            |
/// | `latest`        | `x4101` | 1            |
/// | `state`         | `x4102` | 1            |
/// | `here`          | `x4103` | 1            |
/// | data stack      | `x5000` | 4096         |
/// | return stack    | `x6000` | 4096         |
/// | dictionary      | `x7000` | to `xFFFF`   |
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub struct Layout {
    /// Where the runtime's code is assembled (and where execution starts).
    pub origin: u16,
    /// The terminal input buffer.
    pub tib: u16,
    /// The size of the terminal input buffer.
    ///
    /// A line holds at most `tib_len - 1` characters (the last cell is the terminator).
    pub tib_len: u16,
    /// The `>in` cell (address of the next unparsed character in the TIB).
    pub toin: u16,
    /// The `latest` cell (address of the newest dictionary entry).
    pub latest: u16,
    /// The `state` cell (0 = interpreting, 1 = compiling).
    pub state: u16,
    /// The `here` cell (address of the next free dictionary cell).
    pub here: u16,
    /// The base of the data stack.
    pub sp0: u16,
    /// The base of the return stack.
    pub rp0: u16,
    /// The number of cells in each stack.
    pub stack_len: u16,
    /// The start of the user dictionary (which extends to the end of memory).
    pub dict: u16,
}
impl Default for Layout {
    fn default() -> Self {
        Self {
            origin: 0x3000,
            tib: 0x4000,
            tib_len: 0x100,
            toin: 0x4100,
            latest: 0x4101,
            state: 0x4102,
            here: 0x4103,
            sp0: 0x5000,
            rp0: 0x6000,
            stack_len: 0x1000,
            dict: 0x7000,
        }
    }
}

/// Errors from validating a [`Layout`].
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum LayoutErr {
    /// Two regions share at least one cell.
    Overlap(&'static str, &'static str),
    /// A region runs past the end of memory.
    OutOfBounds(&'static str),
    /// The TIB cannot hold a character and its terminator.
    TibTooSmall,
}
impl std::fmt::Display for LayoutErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LayoutErr::Overlap(a, b)   => write!(f, "{a} overlaps {b}"),
            LayoutErr::OutOfBounds(r)  => write!(f, "{r} runs past the end of memory"),
            LayoutErr::TibTooSmall     => f.write_str("terminal input buffer is too small"),
        }
    }
}
impl std::error::Error for LayoutErr {}
impl crate::err::Error for LayoutErr {
    fn help(&self) -> Option<std::borrow::Cow<str>> {
        match self {
            LayoutErr::Overlap(_, _)  => Some("move one of the regions so they occupy disjoint cells".into()),
            LayoutErr::OutOfBounds(_) => Some("regions cannot wrap around from xFFFF to x0000".into()),
            LayoutErr::TibTooSmall    => Some("the TIB needs at least 2 cells".into()),
        }
    }
}

impl Layout {
    /// All of the regions of this layout (besides code), as `[start, end)` ranges.
    fn regions(&self) -> [(&'static str, u32, u32); 8] {
        let cell = |addr: u16| (u32::from(addr), u32::from(addr) + 1);
        let span = |addr: u16, len: u16| (u32::from(addr), u32::from(addr) + u32::from(len));

        let named = |name, (start, end)| (name, start, end);
        [
            named("TIB", span(self.tib, self.tib_len)),
            named(">in", cell(self.toin)),
            named("latest", cell(self.latest)),
            named("state", cell(self.state)),
            named("here", cell(self.here)),
            named("data stack", span(self.sp0, self.stack_len)),
            named("return stack", span(self.rp0, self.stack_len)),
            named("dictionary", (u32::from(self.dict), 1 << 16)),
        ]
    }

    /// Checks that no two regions overlap, given the number of cells of assembled code.
    ///
    /// ```
    /// use lc3_forth::forth::layout::{Layout, LayoutErr};
    ///
    /// assert_eq!(Layout::default().validate(0x200), Ok(()));
    ///
    /// let layout = Layout { tib: 0x3100, ..Default::default() };
    /// assert_eq!(layout.validate(0x200), Err(LayoutErr::Overlap("code", "TIB")));
    /// ```
    pub fn validate(&self, code_len: usize) -> Result<(), LayoutErr> {
        if self.tib_len < 2 {
            return Err(LayoutErr::TibTooSmall);
        }

        let code = ("code", u32::from(self.origin), u32::from(self.origin) + code_len as u32);
        let regions: Vec<_> = std::iter::once(code).chain(self.regions()).collect();

        for &(name, _, end) in &regions {
            if end > 1 << 16 {
                return Err(LayoutErr::OutOfBounds(name));
            }
        }
        for (i, &(a, a_start, a_end)) in regions.iter().enumerate() {
            for &(b, b_start, b_end) in &regions[i + 1..] {
                if a_start < b_end && b_start < a_end {
                    return Err(LayoutErr::Overlap(a, b));
                }
            }
        }
        Ok(())
    }

    /// The cell holding the last character a line can have.
    ///
    /// Reads stop here, so the terminator always fits.
    pub(crate) fn tib_limit(&self) -> u16 {
        self.tib.wrapping_add(self.tib_len).wrapping_sub(1)
    }
}
