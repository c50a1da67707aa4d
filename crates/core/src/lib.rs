// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Core types for the on-demand reverse-proxy supervisor.
//!
//! Handler configuration, upstream address classification, detector override
//! decoding and merging, child environment assembly, and the request-scoped
//! expansion seam consumed by the host.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod config;
pub mod duration;
pub mod env;
pub mod expand;
pub mod overrides;
pub mod upstream;

pub use config::{ConfigError, HandlerConfig, DEFAULT_IDLE_TIMEOUT};
pub use expand::{derive_key, Expander, Verbatim};
pub use overrides::{DetectorOverrides, LaunchPlan, PlanError};
pub use upstream::{Upstream, UpstreamError};
