// SPDX-FileCopyrightText: © 2023 Technical University of Munich, Chair of Connected Mobility
// SPDX-FileCopyrightText: © 2023 Claudio Cicconetti <c.cicconetti@iit.cnr.it>
// SPDX-License-Identifier: MIT

/// Base path shared by all coordinator endpoints consumed by agents.
pub const SERVER_BASIC_PATH_PREFIX: &str = "/api/v1/client/";

/// Status code the coordinator uses for a successful response envelope.
pub const SUC_CODE: u16 = 200;

/// Uniform response envelope returned by every coordinator endpoint.
#[derive(Debug, serde::Deserialize)]
pub struct ServerResponse<DataType> {
    pub status_code: u16,
    #[serde(default)]
    pub status_msg: String,
    pub data: Option<DataType>,
}

impl<DataType> ServerResponse<DataType> {
    /// Unwrap the payload, surfacing a non-success status as an error
    /// carrying the coordinator's own message.
    pub fn into_data(self) -> anyhow::Result<DataType> {
        if self.status_code != SUC_CODE {
            anyhow::bail!("server replied status_code {}: {}", self.status_code, self.status_msg);
        }
        match self.data {
            Some(data) => Ok(data),
            None => Err(anyhow::anyhow!("server response carries no data")),
        }
    }

    /// Like `into_data` but for endpoints that acknowledge without a payload.
    pub fn into_ack(self) -> anyhow::Result<()> {
        if self.status_code != SUC_CODE {
            anyhow::bail!("server replied status_code {}: {}", self.status_code, self.status_msg);
        }
        Ok(())
    }
}
