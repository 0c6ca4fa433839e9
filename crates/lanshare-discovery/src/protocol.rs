//! Announcement wire format
//!
//! An announcement is a single text datagram:
//!
//! ```text
//! PEER:<sender address>:<service port>
//! ```
//!
//! Decoding is lenient about the bytes it does not need: invalid UTF-8 is
//! replaced, and anything after the digits of the port field is ignored.
//! It is strict about the tag and the presence of all three fields.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Literal tag every announcement starts with
pub const ANNOUNCEMENT_TAG: &str = "PEER";

/// Field delimiter
pub const FIELD_DELIMITER: char = ':';

/// Receive buffer size; announcements are far smaller
pub const MAX_DATAGRAM_SIZE: usize = 1024;

/// Presence announcement broadcast by every node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Announcement {
    /// Address the sender claims for itself
    pub address: String,

    /// HTTP port the sender serves its catalog on
    pub service_port: u16,
}

/// Reasons a datagram is not a valid announcement
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("datagram does not start with the 'PEER:' tag")]
    MissingTag,

    #[error("announcement is missing the {0} field")]
    MissingField(&'static str),

    #[error("invalid service port '{0}'")]
    InvalidPort(String),
}

impl Announcement {
    pub fn new(address: impl Into<String>, service_port: u16) -> Self {
        Self {
            address: address.into(),
            service_port,
        }
    }

    /// Serializes the announcement into its datagram payload
    pub fn encode(&self) -> Vec<u8> {
        self.to_string().into_bytes()
    }

    /// Parses a received datagram.
    pub fn decode(datagram: &[u8]) -> Result<Self, ProtocolError> {
        // Invalid byte sequences are dropped, not replaced
        let text: String = datagram.utf8_chunks().map(|chunk| chunk.valid()).collect();

        let body = text
            .strip_prefix(ANNOUNCEMENT_TAG)
            .and_then(|rest| rest.strip_prefix(FIELD_DELIMITER))
            .ok_or(ProtocolError::MissingTag)?;

        let mut fields = body.splitn(2, FIELD_DELIMITER);
        let address = match fields.next() {
            Some(address) if !address.is_empty() => address,
            _ => return Err(ProtocolError::MissingField("address")),
        };

        let port_field = fields.next().ok_or(ProtocolError::MissingField("port"))?;

        // Trailing payload after the port digits is tolerated
        let digits_end = port_field
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(port_field.len());
        let digits = &port_field[..digits_end];
        if digits.is_empty() {
            return Err(ProtocolError::MissingField("port"));
        }

        let service_port = digits
            .parse::<u16>()
            .ok()
            .filter(|port| *port != 0)
            .ok_or_else(|| ProtocolError::InvalidPort(digits.to_string()))?;

        Ok(Self {
            address: address.to_string(),
            service_port,
        })
    }
}

impl fmt::Display for Announcement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{ANNOUNCEMENT_TAG}{FIELD_DELIMITER}{}{FIELD_DELIMITER}{}",
            self.address, self.service_port
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode() {
        let announcement = Announcement::new("192.168.1.20", 8000);
        assert_eq!(announcement.encode(), b"PEER:192.168.1.20:8000".to_vec());
    }

    #[test]
    fn test_decode_valid() {
        let announcement = Announcement::decode(b"PEER:192.168.1.20:8000").unwrap();
        assert_eq!(announcement.address, "192.168.1.20");
        assert_eq!(announcement.service_port, 8000);
    }

    #[test]
    fn test_decode_tolerates_trailing_payload() {
        let announcement = Announcement::decode(b"PEER:10.0.0.7:8080\n\0\0junk:more").unwrap();
        assert_eq!(announcement, Announcement::new("10.0.0.7", 8080));

        let with_extra_field = Announcement::decode(b"PEER:10.0.0.7:8080:v2").unwrap();
        assert_eq!(with_extra_field.service_port, 8080);
    }

    #[test]
    fn test_decode_lenient_utf8() {
        let mut datagram = b"PEER:10.0.0.7:8000".to_vec();
        datagram.extend_from_slice(&[0xff, 0xfe, 0xfd]);
        let announcement = Announcement::decode(&datagram).unwrap();
        assert_eq!(announcement.address, "10.0.0.7");
    }

    #[test]
    fn test_decode_drops_invalid_bytes_inside_fields() {
        let announcement = Announcement::decode(b"PEER:10.0.0.\xff7:80\xfe00").unwrap();
        assert_eq!(announcement.address, "10.0.0.7");
        assert_eq!(announcement.service_port, 8000);
    }

    #[test]
    fn test_decode_rejects_wrong_tag() {
        assert_eq!(
            Announcement::decode(b"HELLO:10.0.0.7:8000"),
            Err(ProtocolError::MissingTag)
        );
        assert_eq!(
            Announcement::decode(b"peer:10.0.0.7:8000"),
            Err(ProtocolError::MissingTag)
        );
        assert_eq!(
            Announcement::decode(b"PEERS:10.0.0.7:8000"),
            Err(ProtocolError::MissingTag)
        );
        assert_eq!(Announcement::decode(b""), Err(ProtocolError::MissingTag));
        assert_eq!(Announcement::decode(b"PEER"), Err(ProtocolError::MissingTag));
    }

    #[test]
    fn test_decode_rejects_missing_fields() {
        assert_eq!(
            Announcement::decode(b"PEER:"),
            Err(ProtocolError::MissingField("address"))
        );
        assert_eq!(
            Announcement::decode(b"PEER::8000"),
            Err(ProtocolError::MissingField("address"))
        );
        assert_eq!(
            Announcement::decode(b"PEER:10.0.0.7"),
            Err(ProtocolError::MissingField("port"))
        );
        assert_eq!(
            Announcement::decode(b"PEER:10.0.0.7:"),
            Err(ProtocolError::MissingField("port"))
        );
        assert_eq!(
            Announcement::decode(b"PEER:10.0.0.7:http"),
            Err(ProtocolError::MissingField("port"))
        );
    }

    #[test]
    fn test_decode_rejects_out_of_range_port() {
        assert_eq!(
            Announcement::decode(b"PEER:10.0.0.7:70000"),
            Err(ProtocolError::InvalidPort("70000".to_string()))
        );
        assert_eq!(
            Announcement::decode(b"PEER:10.0.0.7:0"),
            Err(ProtocolError::InvalidPort("0".to_string()))
        );
    }

    #[test]
    fn test_display_matches_encode() {
        let announcement = Announcement::new("node-b", 9000);
        assert_eq!(announcement.to_string().as_bytes(), announcement.encode());
    }
}
