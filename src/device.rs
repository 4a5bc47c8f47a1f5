use bstr::{BStr, BString};

use crate::wire::Word;

/// A scanner advertised by the daemon. `name` is the stable identifier
/// used to open the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    pub name: BString,
    pub vendor: BString,
    pub model: BString,
    pub ty: BString,
}

impl std::fmt::Display for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "'{name}' (vendor '{vendor}', model '{model}', type '{ty}')",
            name = self.name,
            vendor = self.vendor,
            model = self.model,
            ty = self.ty,
        )
    }
}

/// Token identifying a device opened on a session. The daemon expects
/// the opaque handle word back in every device-scoped request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceHandle {
    status: Word,
    handle: Word,
    resource: BString,
}

impl DeviceHandle {
    pub(crate) fn new(status: Word, handle: Word, resource: BString) -> Self {
        Self {
            status,
            handle,
            resource,
        }
    }

    pub fn status(&self) -> Word {
        self.status
    }

    pub fn word(&self) -> Word {
        self.handle
    }

    pub fn resource(&self) -> &BStr {
        BStr::new(&self.resource)
    }

    pub fn authorization_required(&self) -> bool {
        !self.resource.is_empty()
    }
}
