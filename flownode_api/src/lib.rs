// SPDX-FileCopyrightText: © 2023 Technical University of Munich, Chair of Connected Mobility
// SPDX-FileCopyrightText: © 2023 Claudio Cicconetti <c.cicconetti@iit.cnr.it>
// SPDX-License-Identifier: MIT

pub mod common;
pub mod coordinator;
pub mod function;
pub mod function_run;
#[cfg(feature = "http_impl")]
pub mod http_impl;
