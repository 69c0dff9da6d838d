//! Token models shared by the token manager, the stores, and the prescription issuer.

pub mod token;

pub use token::{record::*, secret::*};
