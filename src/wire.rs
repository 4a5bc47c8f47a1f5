//! Control-channel codec.
//!
//! Everything the daemon exchanges on the control connection is built
//! out of 4-byte big-endian words:
//!
//! ```text
//! word    ┌──────────────────────┐
//!         │ i32, big endian      │
//!         └──────────────────────┘
//! string  ┌──────────┬───────────────────┬─────┐
//!         │ word L   │ L-1 bytes of text │ NUL │   L = 0 means "absent"
//!         └──────────┴───────────────────┴─────┘
//! array   ┌──────────┬────────────────────────────────┐
//!         │ word C   │ C-1 × (pointer word, element)  │   C ≤ 1 means empty
//!         └──────────┴────────────────────────────────┘
//! ```
//!
//! The empty string is asymmetric on purpose: the writer emits a lone
//! NUL with no length prefix, the reader accepts a zero length word.

use std::io::{Read, Write};

use bstr::BString;

use crate::{
    device::Device,
    parameters::Parameters,
    result::{check_status, truncated_on_eof, Result, SaneError},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Word([u8; 4]);

impl Word {
    pub const SIZE: usize = 4;

    pub fn from_bytes(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }

    pub fn from_i32(value: i32) -> Self {
        Self(value.to_be_bytes())
    }

    pub fn from_version(major: u8, minor: u8, build: u16) -> Self {
        let packed = ((major as u32) << 24) | ((minor as u32) << 16) | (build as u32);
        Self(packed.to_be_bytes())
    }

    pub fn to_i32(self) -> i32 {
        i32::from_be_bytes(self.0)
    }

    pub fn version_parts(self) -> (u8, u8, u16) {
        let packed = u32::from_be_bytes(self.0);
        ((packed >> 24) as u8, (packed >> 16) as u8, packed as u16)
    }

    pub fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }

    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        let mut bytes = [0u8; Self::SIZE];
        reader.read_exact(&mut bytes).map_err(truncated_on_eof)?;
        Ok(Self(bytes))
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum Opcode {
    Init = 0,
    GetDevices = 1,
    Open = 2,
    Close = 3,
    GetParameters = 6,
    Start = 7,
    Exit = 10,
}

pub struct WireReader<R> {
    inner: R,
}

impl<R: Read> WireReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    pub fn read_word(&mut self) -> Result<Word> {
        Word::read_from(&mut self.inner)
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(self.read_word()?.to_i32())
    }

    /// Reads a status word, failing unless the server reported success.
    pub fn read_status(&mut self) -> Result<Word> {
        let word = self.read_word()?;
        check_status(word.to_i32())?;
        Ok(word)
    }

    pub fn read_string(&mut self) -> Result<BString> {
        let length = self.read_i32()?;

        if length < 0 {
            return Err(SaneError::InvalidArgument("negative string length"));
        }
        if length == 0 {
            return Ok(BString::from(""));
        }

        let mut bytes = vec![0u8; length as usize];
        self.inner.read_exact(&mut bytes).map_err(truncated_on_eof)?;

        // The final byte is the NUL terminator.
        bytes.pop();
        Ok(BString::from(bytes))
    }

    pub fn read_device(&mut self) -> Result<Device> {
        Ok(Device {
            name: self.read_string()?,
            vendor: self.read_string()?,
            model: self.read_string()?,
            ty: self.read_string()?,
        })
    }

    /// Decodes the device array of a GET_DEVICES reply (count word,
    /// pointer-prefixed elements, trailing null terminator). A null
    /// pointer ends the list early.
    pub fn read_device_list(&mut self) -> Result<Vec<Device>> {
        let count = self.read_i32()?;
        if count <= 1 {
            return Ok(Vec::new());
        }

        let mut devices = Vec::new();
        for _ in 0..count - 1 {
            if self.read_i32()? == 0 {
                return Ok(devices);
            }
            devices.push(self.read_device()?);
        }

        // Trailing word closing the array.
        self.read_word()?;

        Ok(devices)
    }

    pub fn read_parameters(&mut self) -> Result<Parameters> {
        Parameters::from_words(
            self.read_i32()?,
            self.read_i32()?,
            self.read_i32()?,
            self.read_i32()?,
            self.read_i32()?,
            self.read_i32()?,
        )
    }
}

pub struct WireWriter<W> {
    inner: W,
}

impl<W: Write> WireWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub fn write_word(&mut self, word: Word) -> Result<()> {
        self.inner.write_all(word.as_bytes())?;
        Ok(())
    }

    pub fn write_i32(&mut self, value: i32) -> Result<()> {
        self.write_word(Word::from_i32(value))
    }

    pub(crate) fn write_opcode(&mut self, opcode: Opcode) -> Result<()> {
        log::trace!("Send opcode {opcode:?}");
        self.write_i32(opcode as i32)
    }

    pub fn write_string<B: AsRef<[u8]>>(&mut self, text: B) -> Result<()> {
        let text = text.as_ref();

        if text.contains(&0) {
            return Err(SaneError::InvalidArgument("string contains a NUL byte"));
        }

        if !text.is_empty() {
            let length = i32::try_from(text.len() + 1)
                .map_err(|_| SaneError::InvalidArgument("string too long"))?;
            self.write_i32(length)?;
            self.inner.write_all(text)?;
        }

        self.inner.write_all(&[0])?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.inner.flush()?;
        Ok(())
    }
}

impl<R> WireReader<R> {
    pub fn get_ref(&self) -> &R {
        &self.inner
    }
}

impl<W> WireWriter<W> {
    pub fn get_ref(&self) -> &W {
        &self.inner
    }
}
