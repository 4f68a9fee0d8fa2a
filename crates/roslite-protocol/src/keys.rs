//! Integer tags used as map keys and request kinds on the wire.
//!
//! Keys are scoped per message family, so the same number means
//! different things in a discovery request and a registrar request.

/// Request kind key, common to every request family.
pub const REQUEST: u8 = 1;

// Discovery request keys.
pub const CHANNEL: u8 = 2;
pub const SERVICE: u8 = 3;
pub const INTERFACE: u8 = 4;
pub const PID: u8 = 5;

// Discovery request kinds.
pub const LOOKUP_CHANNEL: u8 = 1;
pub const LOOKUP_SERVICE: u8 = 2;

// Discovery response keys.
pub const PUB: u8 = 1;
pub const SUB: u8 = 2;
pub const REQ: u8 = 3;
pub const REP: u8 = 4;

// Registrar request/response keys.
pub const KEY: u8 = 2;
pub const VALUE: u8 = 3;

// Registrar request kinds.
pub const SET: u8 = 1;
pub const GET: u8 = 2;
