//! Remote lookup module for the user directory endpoint

mod client;
mod traits;

pub use client::{HttpLookupClient, SeedUser, DEFAULT_BASE_URL};
pub use traits::RemoteLookup;

#[cfg(test)]
pub use traits::MockRemoteLookup;
