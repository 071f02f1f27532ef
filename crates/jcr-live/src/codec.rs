//! JSON text framing for live channel messages.

use jcr_schemas::{ClientMessage, ServerMessage};

use crate::ChannelError;

pub fn encode_client(msg: &ClientMessage) -> Result<String, ChannelError> {
    serde_json::to_string(msg).map_err(|e| ChannelError::Decode(e.to_string()))
}

pub fn decode_server(text: &str) -> Result<ServerMessage, ChannelError> {
    serde_json::from_str(text).map_err(|e| ChannelError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use jcr_schemas::OrderId;

    #[test]
    fn unknown_frame_type_is_a_decode_error() {
        let err = decode_server(r#"{"type":"price_update","price":3}"#).unwrap_err();
        assert!(matches!(err, ChannelError::Decode(_)));
    }

    #[test]
    fn client_requests_encode_as_tagged_frames() {
        let s = encode_client(&ClientMessage::RequestSetOpen { open: false }).unwrap();
        assert_eq!(s, r#"{"type":"request_set_open","open":false}"#);
        let s = encode_client(&ClientMessage::RequestComplete {
            order_id: OrderId(3),
        })
        .unwrap();
        assert_eq!(s, r#"{"type":"request_complete","order_id":3}"#);
    }
}
