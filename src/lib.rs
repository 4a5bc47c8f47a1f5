//! Client for the SANE network scanning protocol.
//!
//! Speaks to a remote `saned` daemon over TCP: enumerates scanners,
//! opens one, acquires the frames of a scan and assembles them into a
//! single raster image.
//!
//! ```no_run
//! use remote_sane::{Session, DEFAULT_PORT};
//!
//! fn main() -> remote_sane::Result<()> {
//!     let mut session = Session::connect(("192.168.0.10", DEFAULT_PORT))?;
//!
//!     for device in session.list_devices()? {
//!         println!("{device}");
//!     }
//!
//!     let handle = session.open_device("pixma:MF4400")?;
//!     let image = session.acquire_image(&handle)?;
//!     println!("Scanned {}x{} at depth {}", image.width(), image.height(), image.depth());
//!
//!     session.close_device(handle)?;
//!     session.close()
//! }
//! ```

mod device;
mod frame;
mod image;
mod parameters;
mod raster;
mod result;
mod session;
mod wire;

pub use device::{Device, DeviceHandle};
pub use frame::{Frame, FrameReader};
pub use image::{Image, ImageBuilder};
pub use parameters::{FrameFormat, Parameters};
pub use raster::{ColorKind, Raster, RasterLayout};
pub use result::{status_name, Result, SaneError};
pub use session::{DataByteOrder, Session, SessionOptions, DEFAULT_PORT};
pub use wire::{Word, WireReader, WireWriter};
