use bytes::Bytes;

/// Topic = request path without its leading separator, verbatim
pub type Topic = String;

/// Opaque request body handed from a publisher to a consumer
pub type Payload = Bytes;
