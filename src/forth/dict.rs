//! A read-only view of the Forth dictionary in simulator memory.
//!
//! The dictionary is a singly linked list of headers living in memory:
//!
//! ```text
//! addr+0       link (address of the previous header, 0 ends the list)
//! addr+1       name length (bits 0-3) | immediate flag (bit 4)
//! addr+2..     one cell per name character
//! addr+2+len   body (the execution token points here)
//! ```
//!
//! A body is either machine code (a primitive) or a colon definition:
//! the prologue `LD R1, #1; JMP R1; .fill docol` followed by execution tokens,
//! the last of which is the execution token of `exit`.

use crate::sim::mem::Mem;

use super::runtime::{F_IMMEDIATE, LEN_MASK, PROLOGUE_JMP, PROLOGUE_LD};

/// Walks past this many entries are assumed to be in a corrupted (cyclic) list.
const MAX_ENTRIES: usize = 1 << 15;

/// A dictionary entry.
#[derive(Debug, PartialEq, Eq, Hash, Clone)]
pub struct Entry {
    /// The address of the header (the link cell).
    pub addr: u16,
    /// The address of the previous header (0 if this is the oldest entry).
    pub link: u16,
    /// The name of the word.
    pub name: String,
    /// Whether the word executes while compiling.
    pub immediate: bool,
    /// The execution token (the address of the body).
    pub xt: u16,
}

/// The body of a dictionary entry.
#[derive(Debug, PartialEq, Eq, Hash, Clone)]
pub enum Body {
    /// Machine code starting at the given address.
    Primitive(u16),
    /// A colon definition: the execution tokens it runs, in order.
    ///
    /// A complete definition ends with the execution token of `exit`.
    Threaded(Vec<u16>),
}

/// A view of the dictionary, starting at some head entry.
#[derive(Clone, Copy)]
pub struct Dictionary<'m> {
    mem: &'m Mem,
    latest: u16,
    here: u16,
    docol: u16,
    exit: u16,
}
impl<'m> Dictionary<'m> {
    /// Creates a view of the dictionary.
    ///
    /// - `latest` is the newest header,
    /// - `here` bounds the body of colon definitions,
    /// - `docol` and `exit` are the runtime addresses used to decode colon definitions.
    pub fn new(mem: &'m Mem, latest: u16, here: u16, docol: u16, exit: u16) -> Self {
        Self { mem, latest, here, docol, exit }
    }

    /// Reads the entry whose header is at the given address.
    pub fn entry_at(&self, addr: u16) -> Entry {
        let len_cell = self.mem[addr.wrapping_add(1)];
        let len = len_cell & LEN_MASK;
        let name = self.mem.read_block(addr.wrapping_add(2), len)
            .into_iter()
            .map(|c| char::from(c as u8))
            .collect();

        Entry {
            addr,
            link: self.mem[addr],
            name,
            immediate: len_cell & F_IMMEDIATE != 0,
            xt: addr.wrapping_add(2).wrapping_add(len),
        }
    }

    /// Iterates over the entries, newest first (the order words are searched in).
    pub fn iter(&self) -> impl Iterator<Item=Entry> + 'm {
        let this = *self;
        let mut addr = self.latest;

        std::iter::from_fn(move || {
            if addr == 0 { return None; }
            let entry = this.entry_at(addr);
            addr = entry.link;
            Some(entry)
        }).take(MAX_ENTRIES)
    }

    /// Finds a word by name, the same way the outer interpreter does
    /// (so newer definitions shadow older ones).
    pub fn find(&self, name: &str) -> Option<Entry> {
        self.iter().find(|e| e.name == name)
    }

    /// Finds the word with the given execution token.
    pub fn find_xt(&self, xt: u16) -> Option<Entry> {
        self.iter().find(|e| e.xt == xt)
    }

    /// The names of every word, newest first (shadowed words included).
    pub fn names(&self) -> Vec<String> {
        self.iter().map(|e| e.name).collect()
    }

    /// Decodes the body of an entry.
    ///
    /// A colon definition is read until the execution token of `exit`
    /// or until `here` (for a definition still being compiled).
    pub fn body(&self, entry: &Entry) -> Body {
        let prologue = [PROLOGUE_LD, PROLOGUE_JMP, self.docol];
        if self.mem.read_block(entry.xt, 3) != prologue {
            return Body::Primitive(entry.xt);
        }

        let mut xts = vec![];
        let mut addr = entry.xt.wrapping_add(3);
        while addr < self.here {
            let xt = self.mem[addr];
            xts.push(xt);
            if xt == self.exit { break; }
            addr += 1;
        }
        Body::Threaded(xts)
    }

    /// Renders a colon definition as source (e.g., `: inc 1 + ;`).
    ///
    /// Returns `None` for primitives.
    pub fn decompile(&self, entry: &Entry) -> Option<String> {
        let Body::Threaded(xts) = self.body(entry) else { return None };

        let mut src = format!(": {}", entry.name);
        for xt in xts {
            if xt == self.exit {
                src.push_str(" ;");
                break;
            }
            match self.find_xt(xt) {
                Some(e) => { src.push(' '); src.push_str(&e.name); },
                None => src.push_str(&format!(" x{xt:04X}")),
            }
        }
        Some(src)
    }
}
impl std::fmt::Debug for Dictionary<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.iter().map(|e| e.name))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use crate::sim::mem::Mem;

    use super::{Body, Dictionary};

    const DOCOL: u16 = 0x3050;
    const EXIT: u16 = 0x3060;

    /// Writes a header, returning the execution token.
    fn header(mem: &mut Mem, addr: u16, link: u16, name: &str, flags: u16) -> u16 {
        mem[addr] = link;
        mem[addr + 1] = name.len() as u16 | flags;
        let chars: Vec<_> = name.bytes().map(u16::from).collect();
        mem.copy_block(addr + 2, &chars);
        addr + 2 + name.len() as u16
    }

    #[test]
    fn test_walk_and_shadow() {
        let mut mem = Mem::new(&mut 0u16);
        let dup1 = header(&mut mem, 0x7000, 0, "dup", 0);
        let semi = header(&mut mem, 0x7010, 0x7000, ";", 0x10);
        let dup2 = header(&mut mem, 0x7020, 0x7010, "dup", 0);

        let dict = Dictionary::new(&mem, 0x7020, 0x7030, DOCOL, EXIT);
        assert_eq!(dict.names(), ["dup", ";", "dup"]);

        // newest wins
        assert_eq!(dict.find("dup").map(|e| e.xt), Some(dup2));
        // the older one is only reachable through the links
        let older = dict.iter().filter(|e| e.name == "dup").nth(1).unwrap();
        assert_eq!(older.xt, dup1);
        assert_eq!(older.link, 0);

        let semi_entry = dict.find(";").unwrap();
        assert!(semi_entry.immediate);
        assert_eq!(semi_entry.xt, semi);
        assert_eq!(dict.find("DUP"), None);
    }

    #[test]
    fn test_bodies() {
        let mut mem = Mem::new(&mut 0u16);
        let one = header(&mut mem, 0x7000, 0, "1", 0);
        mem[one] = 0x5020;
        let plus = header(&mut mem, 0x7010, 0x7000, "+", 0);
        let inc = header(&mut mem, 0x7020, 0x7010, "inc", 0);
        mem.copy_block(inc, &[0x2201, 0xC040, DOCOL, one, plus, EXIT, 0xBEEF]);
        let half = header(&mut mem, 0x7030, 0x7020, "half", 0);
        mem.copy_block(half, &[0x2201, 0xC040, DOCOL, inc]);
        let here = half + 4;

        let dict = Dictionary::new(&mem, 0x7030, here, DOCOL, EXIT);
        let inc_entry = dict.find("inc").unwrap();
        assert_eq!(dict.body(&inc_entry), Body::Threaded(vec![one, plus, EXIT]));
        assert_eq!(dict.body(&dict.find("1").unwrap()), Body::Primitive(one));

        // unterminated: stops at here
        let half_entry = dict.find("half").unwrap();
        assert_eq!(dict.body(&half_entry), Body::Threaded(vec![inc]));

        assert_eq!(dict.decompile(&inc_entry).as_deref(), Some(": inc 1 + ;"));
        assert_eq!(dict.decompile(&half_entry).as_deref(), Some(": half inc"));
        assert_eq!(dict.decompile(&dict.find("+").unwrap()), None);
    }

    #[test]
    fn test_cyclic_links_terminate() {
        let mut mem = Mem::new(&mut 0u16);
        header(&mut mem, 0x7000, 0x7000, "loop", 0);
        let dict = Dictionary::new(&mem, 0x7000, 0x7010, DOCOL, EXIT);
        assert_eq!(dict.find("missing"), None);
    }
}
