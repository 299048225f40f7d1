pub mod cns;
pub mod errors;
pub mod transport;
pub mod util;

pub use errors::{Error, Result};

/// A command APDU, built once per pipeline step and never mutated.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct APDU {
    /// Class- and instruction bytes. The instruction depends on the application,
    /// the class on the application and context (eg. secure messaging).
    pub cla: u8,
    pub ins: u8,

    /// Arguments to the command. Some commands use these, others just use data.
    pub p1: u8,
    pub p2: u8,

    /// Command data. The Lc length byte is derived from it during serialization.
    pub data: Vec<u8>,

    /// Expected response length, if any. 0x00 means "reader-default length".
    pub le: Option<u8>,
}

impl APDU {
    pub fn new<D: Into<Vec<u8>>>(cla: u8, ins: u8, p1: u8, p2: u8, data: D) -> Self {
        Self {
            cla,
            ins,
            p1,
            p2,
            data: data.into(),
            le: None,
        }
    }

    pub fn expect(mut self, le: u8) -> Self {
        self.le = Some(le);
        self
    }

    /// Serializes to `CLA INS P1 P2 [Lc data] [Le]`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = vec![self.cla, self.ins, self.p1, self.p2];
        if !self.data.is_empty() {
            buf.push(self.data.len() as u8);
            buf.extend_from_slice(&self.data);
        }
        if let Some(le) = self.le {
            buf.push(le);
        }
        buf
    }
}

/// A response APDU: payload plus the trailing status word.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Response data, without the status word.
    pub data: Vec<u8>,
    /// Status word; (0x90, 0x00) is success.
    pub sw1: u8,
    pub sw2: u8,
}

impl Response {
    pub fn new<D: Into<Vec<u8>>>(data: D, sw1: u8, sw2: u8) -> Self {
        Self {
            data: data.into(),
            sw1,
            sw2,
        }
    }

    /// The guaranteed-failing response a transport fault collapses into.
    /// (0x00, 0x00) is not a valid ISO 7816 status word, so every success
    /// check downstream rejects it.
    pub fn sentinel() -> Self {
        Self::new(vec![], 0x00, 0x00)
    }

    pub fn is_success(&self) -> bool {
        (self.sw1, self.sw2) == (0x90, 0x00)
    }

    pub fn status(&self) -> Status {
        Status::from(self.sw1, self.sw2)
    }
}

/// The status words this pipeline acts on. Everything it doesn't know how to
/// handle falls through as Unknown and is treated as a hard failure by the
/// call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// 0x9000: OK.
    Ok,

    /// 0x6Cxx: Wrong length; retry the last command with Le=xx.
    ///
    /// This is a "procedure byte" dealing with the fact that the length of a
    /// response can't always be known ahead of time.
    RetryWithLe(u8),

    /// 0x6700: Wrong length, and the card won't say which length it wanted.
    WrongLength,

    /// Anything else; a hard failure for the step that saw it.
    Unknown(u8, u8),
}

impl Status {
    pub fn from(sw1: u8, sw2: u8) -> Self {
        match (sw1, sw2) {
            (0x90, 0x00) => Self::Ok,
            (0x6C, xx) => Self::RetryWithLe(xx),
            (0x67, 0x00) => Self::WrongLength,
            (x, y) => Self::Unknown(x, y),
        }
    }
}
