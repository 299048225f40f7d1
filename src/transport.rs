//! The byte-level seam between the pipeline and the card reader.
//!
//! Everything above this module talks in [`APDU`]/[`Response`] pairs and uses
//! one uniform success check; transport-level faults (no card, reader I/O
//! errors) never surface as a second error channel. They collapse into
//! [`Response::sentinel`], which fails that check at every call site, and the
//! underlying cause is recorded on the log sink instead.

use crate::{APDU, Response};
use tracing::{trace, trace_span, warn};

/// Sends one command APDU and returns whatever the card answered.
pub trait Transport {
    fn transmit(&mut self, req: &APDU) -> Response;
}

/// A [`Transport`] over a PC/SC card handle.
///
/// Owns the `pcsc::Card` for the whole pipeline run; dropping the transport
/// disconnects the card on every exit path, decode failures included.
pub struct Pcsc {
    card: pcsc::Card,
    trace: bool,
}

impl Pcsc {
    /// `trace` governs whether raw TX/RX bytes are emitted at trace level.
    /// It is an explicit switch rather than ambient global state.
    pub fn new(card: pcsc::Card, trace: bool) -> Self {
        Self { card, trace }
    }
}

impl Transport for Pcsc {
    fn transmit(&mut self, req: &APDU) -> Response {
        let span = trace_span!("transmit");
        let _enter = span.enter();

        let raw = req.to_bytes();
        if self.trace {
            trace!(req = %hex::encode_upper(&raw), ">> TX");
        }

        let mut rbuf = [0; pcsc::MAX_BUFFER_SIZE];
        let rsp = match self.card.transmit(&raw, &mut rbuf) {
            Ok(rsp) => rsp,
            Err(err) => {
                warn!(%err, "transmit failed, substituting sentinel response");
                return Response::sentinel();
            }
        };
        if self.trace {
            trace!(rsp = %hex::encode_upper(rsp), "<< RX");
        }

        // A response shorter than the two status bytes means the reader is
        // misbehaving; treat it like any other transport fault.
        let l = match rsp.len().checked_sub(2) {
            Some(l) => l,
            None => {
                warn!(len = rsp.len(), "response too short for a status word");
                return Response::sentinel();
            }
        };
        Response::new(&rsp[..l], rsp[l], rsp[l + 1])
    }
}
