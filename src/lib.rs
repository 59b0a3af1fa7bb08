pub mod directory;
pub mod grants;
pub mod issuer;
pub mod keypair;
pub mod probe;
pub mod resolver;
pub mod token;
pub mod verifier;

pub use k256;
