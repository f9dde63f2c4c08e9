/// NetBIOS session framing over blocking streams.
pub mod message_stream;
