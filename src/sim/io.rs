//! IO handling for the console traps.
//!
//! The interface for IO devices is defined with the [`IODevice`] trait.
//! This is exposed to the simulator with the [`SimIO`] enum.
//!
//! `GETC` (`TRAP x20`) reads one byte through [`IODevice::read_byte`]
//! and `OUT` (`TRAP x21`) writes one byte through [`IODevice::write_byte`].
//!
//! Besides those two key items, this module also includes:
//! - [`EmptyIO`]: An `IODevice` with no input that discards its output.
//! - [`BufferedIO`]: An `IODevice` holding a buffered implementation for IO.
//! - [`BiChannelIO`]: An `IODevice` holding a threaded/channel implementation for IO.

use std::collections::VecDeque;
use std::sync::{Arc, PoisonError, RwLock, RwLockWriteGuard};
use std::thread::JoinHandle;

use crossbeam_channel as cbc;

/// A byte-oriented console device.
pub trait IODevice: Send {
    /// Reads the next input byte.
    ///
    /// This returns `None` once the input is exhausted
    /// (how the simulator reacts to this is configured by [`EofBehavior`]).
    ///
    /// [`EofBehavior`]: super::EofBehavior
    fn read_byte(&mut self) -> Option<u8>;

    /// Writes a byte of output.
    ///
    /// The byte should be visible (flushed) once this returns.
    fn write_byte(&mut self, byte: u8);

    /// Tries to close this IO device.
    ///
    /// The device should not be used after this point.
    fn close(&mut self) {}
}
impl dyn IODevice {} // assert IODevice is dyn safe

/// No IO. There is never any input, and any output is discarded.
pub struct EmptyIO;
impl IODevice for EmptyIO {
    fn read_byte(&mut self) -> Option<u8> {
        None
    }

    fn write_byte(&mut self, _byte: u8) {}
}

/// IO that reads from an input buffer and writes to an output buffer.
///
/// The buffers are shared: cloning a `BufferedIO` gives another handle to the same buffers,
/// so one handle can be given to the simulator while another is kept to feed input and inspect output.
/// The buffers can be accessed in code via [`BufferedIO::get_input`] and [`BufferedIO::get_output`].
///
/// Reading from an empty input buffer counts as end of input.
///
/// ```
/// use lc3_forth::sim::io::{BufferedIO, IODevice};
///
/// let io = BufferedIO::new();
/// let mut sim_side = io.clone();
///
/// io.push_input(b"hi");
/// assert_eq!(sim_side.read_byte(), Some(b'h'));
/// sim_side.write_byte(b'!');
/// assert_eq!(io.take_output(), b"!");
/// ```
#[derive(Clone)]
pub struct BufferedIO {
    input: Arc<RwLock<VecDeque<u8>>>,
    output: Arc<RwLock<Vec<u8>>>
}
impl BufferedIO {
    /// Creates a new BufferedIO.
    pub fn new() -> Self {
        Self { input: Default::default(), output: Default::default() }
    }
    /// Creates a new BufferedIO from already defined buffers.
    pub fn with_bufs(input: Arc<RwLock<VecDeque<u8>>>, output: Arc<RwLock<Vec<u8>>>) -> Self {
        Self { input, output }
    }

    // A poisoned buffer is still a perfectly usable buffer of bytes.
    fn input(&self) -> RwLockWriteGuard<'_, VecDeque<u8>> {
        self.input.write().unwrap_or_else(PoisonError::into_inner)
    }
    fn output(&self) -> RwLockWriteGuard<'_, Vec<u8>> {
        self.output.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Gets a reference to the input buffer.
    pub fn get_input(&self) -> &Arc<RwLock<VecDeque<u8>>> {
        &self.input
    }
    /// Gets a reference to the output buffer.
    pub fn get_output(&self) -> &Arc<RwLock<Vec<u8>>> {
        &self.output
    }

    /// Appends bytes to the end of the input.
    pub fn push_input(&self, bytes: &[u8]) {
        self.input().extend(bytes);
    }
    /// The number of input bytes not yet read.
    pub fn pending_input(&self) -> usize {
        self.input().len()
    }
    /// Removes and returns everything written so far.
    pub fn take_output(&self) -> Vec<u8> {
        std::mem::take(&mut *self.output())
    }
}
impl Default for BufferedIO {
    fn default() -> Self {
        Self::new()
    }
}
impl IODevice for BufferedIO {
    fn read_byte(&mut self) -> Option<u8> {
        self.input().pop_front()
    }

    fn write_byte(&mut self, byte: u8) {
        self.output().push(byte);
    }
}

/// A helper struct for [`BiChannelIO::new`],
/// indicating the channel is closed and no more reads/writes will come from it.
#[derive(Clone, Copy, Default, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct Stop;

/// An IO that reads from one channel and writes to another.
///
/// A reader thread moves bytes from the reader function into a channel,
/// and `GETC` blocks on that channel until a byte is ready
/// (or reports end of input once the reader has stopped and the channel is drained).
///
/// A writer thread moves bytes written by `OUT` from a channel to the writer function.
pub struct BiChannelIO {
    read_data:    cbc::Receiver<u8>,
    #[allow(unused)]
    read_handler: JoinHandle<()>,

    write_data:    Option<cbc::Sender<u8>>,
    write_handler: Option<JoinHandle<()>>
}
impl BiChannelIO {
    /// Creates a new bi-channel IO device with the given reader and writer.
    ///
    /// This calls the reader function every time the IO input receives a byte.
    /// The reader function should block until a byte is ready, or return Stop
    /// if there are no more bytes to read.
    ///
    /// This calls the writer function every time a byte needs to be written to the
    /// IO output.
    ///
    /// This uses threads to read and write from input and output. As such,
    /// the reader may be called ahead of the simulator actually requesting a byte
    /// (by at most one byte, the capacity of the channel).
    pub fn new(
        mut reader: impl FnMut() -> Result<u8, Stop> + Send + 'static,
        mut writer: impl FnMut(u8) -> Result<(), Stop> + Send + 'static
    ) -> Self {
        let (read_tx, read_rx) = cbc::bounded(1);
        let (write_tx, write_rx) = cbc::bounded(1);

        // Reader thread:
        let read_handler = std::thread::spawn(move || loop {
            let Ok(byte) = reader() else { return };
            let Ok(()) = read_tx.send(byte) else { return };
        });

        // Writer thread:
        let write_handler = std::thread::spawn(move || {
            for byte in write_rx {
                let Ok(()) = writer(byte) else { return };
            }
        });

        Self {
            read_data: read_rx,
            read_handler,
            write_data: Some(write_tx),
            write_handler: Some(write_handler)
        }
    }

    /// Creates a bi-channel IO device with stdin being the read data and stdout being the write data.
    ///
    /// Note that due to how stdin works in terminals, data is only sent once a new line is typed.
    /// Additionally, this flushes stdout every time a byte is written.
    pub fn stdio() -> Self {
        use std::io::{self, Read, Write};

        Self::new(
            || {
                let mut byte = [0];
                match io::stdin().read(&mut byte) {
                    Ok(1) => Ok(byte[0]),
                    // 0 bytes read = EOF
                    _ => Err(Stop),
                }
            },
            |byte| {
                let mut stdout = io::stdout().lock();
                stdout.write_all(&[byte])
                    .and_then(|()| stdout.flush())
                    .map_err(|_| Stop)
            }
        )
    }
}

impl IODevice for BiChannelIO {
    fn read_byte(&mut self) -> Option<u8> {
        // Err only occurs once the reader has stopped and the channel is empty.
        self.read_data.recv().ok()
    }

    fn write_byte(&mut self, byte: u8) {
        if let Some(tx) = &self.write_data {
            // the writer thread stopped, nowhere for the byte to go
            let _ = tx.send(byte);
        }
    }

    fn close(&mut self) {
        // Drop the channel, so that the writer thread finishes
        // once it has written everything already sent.
        self.write_data.take();

        // We're not going to wait for the read handler
        // because it can hang on reading, which prevents it from seeing
        // the channel is disconnected.
        if let Some(handle) = self.write_handler.take() {
            let _ = handle.join();
        }
    }
}

/// All the variants of IO accepted by the Simulator.
#[derive(Default)]
pub enum SimIO {
    /// No IO. This corresponds to the implementation of [`EmptyIO`].
    #[default]
    Empty,
    /// A buffered implementation. See [`BufferedIO`].
    Buffered(BufferedIO),
    /// A bi-channel IO implementation. See [`BiChannelIO`].
    BiChannel(BiChannelIO),
    /// A custom IO implementation.
    Custom(Box<dyn IODevice>)
}
impl std::fmt::Debug for SimIO {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self {
            SimIO::Empty        => "Empty",
            SimIO::Buffered(_)  => "Buffered",
            SimIO::BiChannel(_) => "BiChannel",
            SimIO::Custom(_)    => "Custom",
        };
        f.debug_tuple("SimIO")
            .field(&kind)
            .finish()
    }
}
impl From<EmptyIO> for SimIO {
    fn from(_value: EmptyIO) -> Self {
        SimIO::Empty
    }
}
impl From<BufferedIO> for SimIO {
    fn from(value: BufferedIO) -> Self {
        SimIO::Buffered(value)
    }
}
impl From<BiChannelIO> for SimIO {
    fn from(value: BiChannelIO) -> Self {
        SimIO::BiChannel(value)
    }
}
impl From<Box<dyn IODevice>> for SimIO {
    fn from(value: Box<dyn IODevice>) -> Self {
        SimIO::Custom(value)
    }
}
impl IODevice for SimIO {
    fn read_byte(&mut self) -> Option<u8> {
        match self {
            SimIO::Empty => EmptyIO.read_byte(),
            SimIO::Buffered(io) => io.read_byte(),
            SimIO::BiChannel(io) => io.read_byte(),
            SimIO::Custom(io) => io.read_byte(),
        }
    }

    fn write_byte(&mut self, byte: u8) {
        match self {
            SimIO::Empty => EmptyIO.write_byte(byte),
            SimIO::Buffered(io) => io.write_byte(byte),
            SimIO::BiChannel(io) => io.write_byte(byte),
            SimIO::Custom(io) => io.write_byte(byte),
        }
    }

    fn close(&mut self) {
        match self {
            SimIO::Empty => EmptyIO.close(),
            SimIO::Buffered(io) => io.close(),
            SimIO::BiChannel(io) => io.close(),
            SimIO::Custom(io) => io.close(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex, RwLock};

    use super::{BiChannelIO, BufferedIO, EmptyIO, IODevice, SimIO, Stop};

    #[test]
    fn test_empty() {
        let mut io = SimIO::from(EmptyIO);
        assert_eq!(io.read_byte(), None);
        io.write_byte(b'x');
        assert_eq!(io.read_byte(), None);
    }

    #[test]
    fn test_buffered_shares_buffers() {
        let io = BufferedIO::new();
        let mut sim_io = SimIO::from(io.clone());

        io.push_input(b"ab");
        assert_eq!(io.pending_input(), 2);
        assert_eq!(sim_io.read_byte(), Some(b'a'));
        assert_eq!(sim_io.read_byte(), Some(b'b'));
        assert_eq!(sim_io.read_byte(), None);

        // more input after exhaustion is picked up
        io.push_input(b"c");
        assert_eq!(sim_io.read_byte(), Some(b'c'));

        sim_io.write_byte(b'o');
        sim_io.write_byte(b'k');
        assert_eq!(io.take_output(), b"ok");
        assert!(io.take_output().is_empty());
    }

    #[test]
    fn test_buffered_with_bufs() {
        let input = Arc::new(RwLock::new(VecDeque::from(b"x".to_vec())));
        let output = Arc::new(RwLock::new(vec![]));
        let mut io = BufferedIO::with_bufs(Arc::clone(&input), Arc::clone(&output));
        assert!(Arc::ptr_eq(io.get_input(), &input));
        assert!(Arc::ptr_eq(io.get_output(), &output));

        assert_eq!(io.read_byte(), Some(b'x'));
        io.get_input().write().unwrap().push_back(b'y');
        assert_eq!(io.read_byte(), Some(b'y'));

        io.write_byte(b'z');
        assert_eq!(*output.read().unwrap(), b"z");
        assert_eq!(*io.get_output().read().unwrap(), b"z");
    }

    #[test]
    fn test_bichannel() {
        let mut input = b"hey".to_vec().into_iter();
        let output = Arc::new(Mutex::new(vec![]));

        let out = Arc::clone(&output);
        let mut io = BiChannelIO::new(
            move || input.next().ok_or(Stop),
            move |byte| {
                out.lock().unwrap().push(byte);
                Ok(())
            }
        );

        assert_eq!(io.read_byte(), Some(b'h'));
        assert_eq!(io.read_byte(), Some(b'e'));
        assert_eq!(io.read_byte(), Some(b'y'));
        assert_eq!(io.read_byte(), None);

        io.write_byte(b'1');
        io.write_byte(b'2');
        io.close();
        assert_eq!(*output.lock().unwrap(), b"12");
    }
}
