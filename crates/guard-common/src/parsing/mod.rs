pub mod packet;

pub use packet::{
    IpProto, L4Header, Layer, Malformed, ParseError, UnknownProtocol, Unsupported, parse_l4,
};
