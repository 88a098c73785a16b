pub mod init;
pub mod label;
pub mod reindex;
pub mod status;
pub mod task;
pub mod user;

use std::io::Read;

use serde::de::DeserializeOwned;

use crate::error::Result;

/// Parse a JSON request body given inline, or from stdin when `data` is `-`.
pub fn read_payload<T: DeserializeOwned>(data: &str) -> Result<T> {
    if data == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        return Ok(serde_json::from_str(&buf)?);
    }
    Ok(serde_json::from_str(data)?)
}
