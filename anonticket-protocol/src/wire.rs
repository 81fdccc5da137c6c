//! The wire format: ordered lists of byte strings.
//!
//! Every protocol message travels as a list of exactly two byte strings, a label naming the
//! message type and the bincode encoding of its body. [`encode_list`] and [`decode_list`] round-trip
//! any list exactly, including the empty list and zero-length elements.

use crate::Error;
use bincode::Options;
use serde::{de::DeserializeOwned, Serialize};

/// Upper bound on the size of one encoded message.
pub const MAX_MESSAGE_BYTES: u64 = 1 << 24;

fn options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_limit(MAX_MESSAGE_BYTES)
        .reject_trailing_bytes()
}

/// Encode an ordered list of byte strings.
pub fn encode_list(items: &[Vec<u8>]) -> Result<Vec<u8>, Error> {
    options()
        .serialize(items)
        .map_err(|e| Error::Format(e.to_string()))
}

/// Decode an ordered list of byte strings.
pub fn decode_list(bytes: &[u8]) -> Result<Vec<Vec<u8>>, Error> {
    options()
        .deserialize(bytes)
        .map_err(|e| Error::Format(e.to_string()))
}

/// Encode a labelled message.
pub fn seal<T: Serialize>(label: &str, body: &T) -> Result<Vec<u8>, Error> {
    let body = options()
        .serialize(body)
        .map_err(|e| Error::Format(e.to_string()))?;
    encode_list(&[label.as_bytes().to_vec(), body])
}

/// Decode a message, failing unless it carries `label` and exactly one body.
pub fn open<T: DeserializeOwned>(label: &str, bytes: &[u8]) -> Result<T, Error> {
    let items = decode_list(bytes)?;
    match items.as_slice() {
        [found, body] if found.as_slice() == label.as_bytes() => options()
            .deserialize(body)
            .map_err(|e| Error::Format(format!("{}: {}", label, e))),
        [found, _] => Err(Error::Format(format!(
            "expected a {:?} message, got {:?}",
            label,
            String::from_utf8_lossy(found)
        ))),
        _ => Err(Error::Format(format!(
            "expected 2 elements in a {:?} message, got {}",
            label,
            items.len()
        ))),
    }
}

/// An empty acknowledgement, returned by steps that complete a phase.
pub fn acknowledgement() -> Result<Vec<u8>, Error> {
    encode_list(&[])
}

/// Message labels.
pub mod label {
    /// [`RegistrationRequest`](crate::registration::RegistrationRequest)
    pub const REGISTRATION_REQUEST: &str = "registration-request";
    /// [`CredentialResponse`](crate::registration::CredentialResponse)
    pub const CREDENTIAL_RESPONSE: &str = "credential-response";
    /// [`Enrollment`](crate::authority::Enrollment)
    pub const ENROLLMENT: &str = "enrollment";
    /// [`TicketRequest`](crate::user::TicketRequest)
    pub const TICKET_REQUEST: &str = "ticket-request";
    /// [`TicketIssued`](crate::issuer::TicketIssued)
    pub const TICKET_ISSUED: &str = "ticket-issued";
    /// [`ValidationRequest`](crate::verifier::ValidationRequest)
    pub const VALIDATION_REQUEST: &str = "validation-request";
    /// [`Presentation`](crate::user::Presentation)
    pub const PRESENTATION: &str = "presentation";
    /// [`ValidationOutcome`](crate::ValidationOutcome)
    pub const VALIDATION_OUTCOME: &str = "validation-outcome";
    /// [`ReKeyRequest`](crate::delegation::ReKeyRequest)
    pub const REKEY_REQUEST: &str = "rekey-request";
    /// [`ReKey`](crate::delegation::ReKey)
    pub const REKEY: &str = "rekey";
    /// [`Ticket`](crate::ticket::Ticket)
    pub const TICKET: &str = "ticket";
    /// [`TraceRecord`](crate::central_verifier::TraceRecord)
    pub const TRACE_RECORD: &str = "trace-record";
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn lists_round_trip() {
        let cases: Vec<Vec<Vec<u8>>> = vec![
            vec![],
            vec![vec![]],
            vec![vec![], vec![], vec![]],
            vec![b"ticket".to_vec(), vec![], vec![0u8; 300], vec![0xff]],
        ];
        for case in cases {
            assert_eq!(decode_list(&encode_list(&case).unwrap()).unwrap(), case);
        }
    }

    #[test]
    fn list_encoding_is_stable() {
        let encoded = encode_list(&[vec![1, 2], vec![]]).unwrap();
        assert_eq!(hex::encode(encoded), "0202010200");
    }

    #[test]
    fn truncated_and_padded_lists_are_rejected() {
        let mut encoded = encode_list(&[vec![1, 2, 3]]).unwrap();
        assert!(decode_list(&encoded[..encoded.len() - 1]).is_err());
        encoded.push(0);
        assert!(matches!(decode_list(&encoded), Err(Error::Format(_))));
    }

    #[test]
    fn messages_check_label_and_count() {
        let sealed = seal(label::TICKET, &42u64).unwrap();
        assert_eq!(open::<u64>(label::TICKET, &sealed).unwrap(), 42);
        assert!(matches!(
            open::<u64>(label::PRESENTATION, &sealed),
            Err(Error::Format(_))
        ));

        let three = encode_list(&[label::TICKET.as_bytes().to_vec(), vec![42], vec![]]).unwrap();
        assert!(matches!(open::<u64>(label::TICKET, &three), Err(Error::Format(_))));
        assert!(matches!(
            open::<u64>(label::TICKET, &acknowledgement().unwrap()),
            Err(Error::Format(_))
        ));
    }
}
