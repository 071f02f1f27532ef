//! Server side of the `/live` JSON text framing.

use jcr_schemas::{ClientMessage, ServerMessage};

pub fn encode_server(msg: &ServerMessage) -> Result<String, serde_json::Error> {
    serde_json::to_string(msg)
}

pub fn decode_client(text: &str) -> Result<ClientMessage, serde_json::Error> {
    serde_json::from_str(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use jcr_schemas::{BarKind, OrderId};

    #[test]
    fn client_frames_decode() {
        assert_eq!(
            decode_client(r#"{"type":"subscribe","bar":"drinks"}"#).unwrap(),
            ClientMessage::Subscribe {
                bar: BarKind::Drinks
            }
        );
        assert_eq!(
            decode_client(r#"{"type":"request_complete","order_id":3}"#).unwrap(),
            ClientMessage::RequestComplete {
                order_id: OrderId(3)
            }
        );
        assert!(decode_client(r#"{"type":"request_complete"}"#).is_err());
    }

    #[test]
    fn open_status_frame_encodes() {
        let s = encode_server(&ServerMessage::OpenStatusChanged { open: true }).unwrap();
        assert_eq!(s, r#"{"type":"open_status_changed","open":true}"#);
    }
}
