//! Interfaces to TS-CNS health/services cards.
//!
//! The TS-CNS exposes the holder's personal data in a plain Elementary File
//! under the ISO 7816 file hierarchy, reachable with nothing but SELECTs and
//! a READ BINARY. No authentication is involved; the interesting part is the
//! fixed length-prefixed record layout, handled in [`personal`].

pub mod personal;

pub use personal::PersonalData;

use crate::errors::{Error, Result};
use crate::transport::Transport;
use crate::{APDU, Status};
use tracing::{debug, trace_span};

/// Master File, the root of the card's file hierarchy.
pub const MF: [u8; 2] = [0x3F, 0x00];
/// Dedicated File holding the citizen data tree.
pub const DF_CNS: [u8; 2] = [0x11, 0x00];
/// Elementary File with the personal-data record.
pub const EF_PERSONAL: [u8; 2] = [0x11, 0x02];

/// SELECT by two-byte file identifier.
pub fn select(file_id: [u8; 2]) -> APDU {
    APDU::new(0x00, 0xA4, 0x00, 0x00, file_id.to_vec())
}

/// READ BINARY from offset 0. Le 0x00 asks for the reader-default length.
pub fn read_binary(le: u8) -> APDU {
    APDU::new(0x00, 0xB0, 0x00, 0x00, vec![]).expect(le)
}

/// Which SELECT of the fixed sequence a failure happened at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    MasterFile,
    DedicatedFile,
    ElementaryFile,
}

impl Stage {
    fn file_id(&self) -> [u8; 2] {
        match self {
            Self::MasterFile => MF,
            Self::DedicatedFile => DF_CNS,
            Self::ElementaryFile => EF_PERSONAL,
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MasterFile => write!(f, "MF"),
            Self::DedicatedFile => write!(f, "DF"),
            Self::ElementaryFile => write!(f, "EF"),
        }
    }
}

/// Walks the card down to the personal-data EF: SELECT MF, then the CNS DF,
/// then the EF, in that order. The first SELECT that doesn't come back with
/// 90 00 aborts the walk; a failed SELECT is not recoverable by repetition,
/// so there are no retries here.
pub fn select_personal_file<T: Transport>(transport: &mut T) -> Result<()> {
    let span = trace_span!("select_personal_file");
    let _enter = span.enter();

    for stage in [Stage::MasterFile, Stage::DedicatedFile, Stage::ElementaryFile] {
        let rsp = transport.transmit(&select(stage.file_id()));
        if !rsp.is_success() {
            return Err(Error::Select {
                stage,
                sw1: rsp.sw1,
                sw2: rsp.sw2,
            });
        }
        debug!(%stage, "selected");
    }
    Ok(())
}

/// Reads the currently selected EF with READ BINARY, following the two
/// wrong-length conventions:
///
/// - `6C nn`: the card names the correct length; retry once with Le = nn.
/// - `67 00`: the card won't name one; retry once with Le = 0xFF, the
///   largest single-block length, as a best effort.
///
/// At most one retry is ever issued. A card that fails twice in a row is a
/// hard read failure, not something to loop on.
pub fn read_personal_file<T: Transport>(transport: &mut T) -> Result<Vec<u8>> {
    let span = trace_span!("read_personal_file");
    let _enter = span.enter();

    let rsp = transport.transmit(&read_binary(0x00));
    let rsp = match rsp.status() {
        Status::Ok => rsp,
        Status::RetryWithLe(le) => {
            debug!(le, "wrong length, retrying with corrected Le");
            transport.transmit(&read_binary(le))
        }
        Status::WrongLength => {
            debug!("wrong length, unspecified; retrying with Le=0xFF");
            transport.transmit(&read_binary(0xFF))
        }
        Status::Unknown(sw1, sw2) => return Err(Error::Read { sw1, sw2 }),
    };

    if !rsp.is_success() {
        return Err(Error::Read {
            sw1: rsp.sw1,
            sw2: rsp.sw2,
        });
    }
    debug!(len = rsp.data.len(), "read personal-data record");
    Ok(rsp.data)
}

/// The whole pipeline: three SELECTs, one READ BINARY (plus its possible
/// corrective retry), one decode. Any stage failing short-circuits; nothing
/// downstream of a failure runs.
pub fn read_personal_data<T: Transport>(transport: &mut T) -> Result<PersonalData> {
    select_personal_file(transport)?;
    let record = read_personal_file(transport)?;
    personal::decode(&record)
}
