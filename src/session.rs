use std::{
    env,
    ffi::OsString,
    net::{SocketAddr, TcpStream, ToSocketAddrs},
};

use bstr::{BStr, BString};

use crate::{
    device::{Device, DeviceHandle},
    frame::FrameReader,
    image::{Image, ImageBuilder},
    result::{Result, SaneError},
    wire::{Opcode, WireReader, WireWriter, Word},
};

/// TCP port saned listens on by default.
pub const DEFAULT_PORT: u16 = 6566;

const CLIENT_VERSION: (u8, u8, u16) = (1, 0, 3);

/// Byte order of the pixel data announced by a START reply. Only
/// 16-bit samples are affected; the daemon sends them in its native
/// order and marks little endian with `0x1234`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataByteOrder {
    LittleEndian,
    BigEndian,
}

impl DataByteOrder {
    pub(crate) fn from_word(word: Word) -> Self {
        match word.to_i32() {
            0x1234 => Self::LittleEndian,
            _ => Self::BigEndian,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    /// Username announced to the daemon during the handshake. Falls
    /// back to the OS user name from the environment.
    pub username: Option<BString>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Initialized,
    DeviceOpen,
}

/// A conversation with a saned daemon over one control connection.
///
/// Constructing a session performs the handshake, so an existing
/// session is always initialized; opening a device moves it into the
/// device-open state until the device is closed again. Operations
/// called in the wrong state fail with [`SaneError::IllegalState`].
pub struct Session {
    reader: WireReader<TcpStream>,
    writer: WireWriter<TcpStream>,
    peer: SocketAddr,
    server_version: Word,
    state: State,
    exited: bool,
}

impl Session {
    /// Connects to a daemon and performs the INIT handshake.
    pub fn connect<A: ToSocketAddrs>(addr: A) -> Result<Self> {
        Self::connect_with(addr, SessionOptions::default())
    }

    pub fn connect_with<A: ToSocketAddrs>(addr: A, options: SessionOptions) -> Result<Self> {
        let stream = TcpStream::connect(addr)?;
        let peer = stream.peer_addr()?;

        log::debug!("Connected to {peer}");

        let mut session = Session {
            reader: WireReader::new(stream.try_clone()?),
            writer: WireWriter::new(stream),
            peer,
            server_version: Word::from_i32(0),
            state: State::Initialized,
            exited: false,
        };

        let username = resolve_username(&options);
        session.init(BStr::new(&username))?;

        Ok(session)
    }

    fn init(&mut self, username: &BStr) -> Result<()> {
        let (major, minor, build) = CLIENT_VERSION;
        log::trace!("Send init: version {major}.{minor}.{build}, username '{username}'");

        self.writer.write_opcode(Opcode::Init)?;
        self.writer.write_word(Word::from_version(major, minor, build))?;
        self.writer.write_string(username)?;

        // The reply carries the daemon's version and a status word the
        // protocol does not require to be checked.
        self.server_version = self.reader.read_word()?;
        let status = self.reader.read_word()?;

        let (major, minor, build) = self.server_version.version_parts();
        log::debug!(
            "Daemon speaks version {major}.{minor}.{build} (init status {})",
            status.to_i32()
        );

        Ok(())
    }

    /// Protocol version announced by the daemon during the handshake.
    pub fn server_version(&self) -> (u8, u8, u16) {
        self.server_version.version_parts()
    }

    pub fn list_devices(&mut self) -> Result<Vec<Device>> {
        self.expect_state(State::Initialized, "list_devices")?;

        log::trace!("Send get_devices");
        self.writer.write_opcode(Opcode::GetDevices)?;

        self.reader.read_status()?;
        let devices = self.reader.read_device_list()?;

        log::debug!("Daemon advertises {} device(s)", devices.len());

        Ok(devices)
    }

    pub fn find_device_by_name<N: AsRef<[u8]>>(&mut self, name: N) -> Result<Option<Device>> {
        let name = name.as_ref();
        let devices = self.list_devices()?;

        Ok(devices.into_iter().find(|device| device.name == name))
    }

    pub fn open_device<N: AsRef<[u8]>>(&mut self, name: N) -> Result<DeviceHandle> {
        self.expect_state(State::Initialized, "open_device")?;

        let name = name.as_ref();
        log::trace!("Send open('{}')", BStr::new(name));

        self.writer.write_opcode(Opcode::Open)?;
        self.writer.write_string(name)?;

        let status = self.reader.read_status()?;
        let handle = self.reader.read_word()?;
        let resource = self.reader.read_string()?;

        if !resource.is_empty() {
            return Err(SaneError::AuthRequired(resource));
        }

        log::debug!("Opened device '{}'", BStr::new(name));

        self.state = State::DeviceOpen;
        Ok(DeviceHandle::new(status, handle, resource))
    }

    /// Runs one scan and assembles its frames into an image. May be
    /// called repeatedly while the device stays open.
    pub fn acquire_image(&mut self, handle: &DeviceHandle) -> Result<Image> {
        self.expect_state(State::DeviceOpen, "acquire_image")?;

        let mut builder = ImageBuilder::new();

        loop {
            let (port, byte_order) = self.start_frame(handle)?;

            // The daemon serves the pixel data on a fresh connection.
            let data = TcpStream::connect((self.peer.ip(), port))?;
            log::trace!("Data connection to {}:{port} established", self.peer.ip());

            log::trace!("Send get_parameters({})", handle.word().to_i32());
            self.writer.write_opcode(Opcode::GetParameters)?;
            self.writer.write_word(handle.word())?;

            self.reader.read_status()?;
            let parameters = self.reader.read_parameters()?;
            log::debug!("Frame parameters: {parameters}");

            let mut frame = FrameReader::new(data, parameters).read_frame()?;

            if parameters.depth == 16 && byte_order == DataByteOrder::LittleEndian {
                frame.swap_sample_bytes();
            }

            builder.add_frame(frame)?;

            if parameters.last_frame {
                break;
            }
        }

        builder.build()
    }

    fn start_frame(&mut self, handle: &DeviceHandle) -> Result<(u16, DataByteOrder)> {
        log::trace!("Send start({})", handle.word().to_i32());
        self.writer.write_opcode(Opcode::Start)?;
        self.writer.write_word(handle.word())?;

        self.reader.read_status()?;
        let port = self.reader.read_i32()?;
        let byte_order = DataByteOrder::from_word(self.reader.read_word()?);
        let resource = self.reader.read_string()?;

        if !resource.is_empty() {
            return Err(SaneError::AuthRequired(resource));
        }

        let port =
            u16::try_from(port).map_err(|_| SaneError::InvalidArgument("data port out of range"))?;

        log::trace!("Frame announced on port {port}, data byte order {byte_order:?}");

        Ok((port, byte_order))
    }

    pub fn close_device(&mut self, handle: DeviceHandle) -> Result<()> {
        self.expect_state(State::DeviceOpen, "close_device")?;

        log::trace!("Send close({})", handle.word().to_i32());
        self.writer.write_opcode(Opcode::Close)?;
        self.writer.write_word(handle.word())?;

        // The reply is a dummy word with no defined meaning; reading
        // it without error is the whole acknowledgement.
        self.reader.read_word()?;

        self.state = State::Initialized;
        Ok(())
    }

    /// Ends the conversation and drops the control connection.
    pub fn close(mut self) -> Result<()> {
        self.send_exit()
    }

    fn send_exit(&mut self) -> Result<()> {
        if self.exited {
            return Ok(());
        }
        self.exited = true;

        log::trace!("Send exit");
        self.writer.write_opcode(Opcode::Exit)
    }

    fn expect_state(&self, expected: State, operation: &'static str) -> Result<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(SaneError::IllegalState(operation))
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        let _ = self.send_exit();
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("peer", &self.peer)
            .field("state", &self.state)
            .finish()
    }
}

fn resolve_username(options: &SessionOptions) -> BString {
    if let Some(username) = &options.username {
        return username.clone();
    }

    env::var_os("USER")
        .or_else(|| env::var_os("USERNAME"))
        .map(os_string_into_bytes)
        .unwrap_or_else(|| BString::from(""))
}

// OS user names are not guaranteed to be Unicode; keep the raw bytes
// where the platform exposes them.
#[cfg(unix)]
fn os_string_into_bytes(name: OsString) -> BString {
    use std::os::unix::ffi::OsStringExt;

    BString::from(name.into_vec())
}

#[cfg(not(unix))]
fn os_string_into_bytes(name: OsString) -> BString {
    BString::from(name.to_string_lossy().into_owned().into_bytes())
}
