//! Token values, wire codecs, and minting.

mod claims;
mod codec;
mod factory;
mod model;

pub use claims::Claims;
pub use codec::{AccessTokenCodec, RefreshTokenCodec};
pub use factory::{TokenFactory, REFRESH_AUTHORITY, SIGNOUT_AUTHORITY};
pub use model::{TokenKind, TokenModel};
