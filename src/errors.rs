use crate::cns::personal::{DecodeCause, Field};
use crate::cns::Stage;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// A SELECT in the MF → DF → EF sequence came back without 90 00.
    /// Later stages were never attempted.
    #[error("SELECT {stage} failed: SW1=0x{sw1:02X} SW2=0x{sw2:02X}")]
    Select { stage: Stage, sw1: u8, sw2: u8 },

    /// READ BINARY still failing after the (at most one) corrective retry.
    #[error("READ BINARY failed: SW1=0x{sw1:02X} SW2=0x{sw2:02X}")]
    Read { sw1: u8, sw2: u8 },

    /// The record couldn't be decoded. The whole decode is invalidated; no
    /// partially filled record is ever returned.
    #[error("couldn't decode {field}: {cause}")]
    Decode { field: Field, cause: DecodeCause },
}
