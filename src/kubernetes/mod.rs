// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Kubernetes utilities for CRD discovery and envelope tracking.

pub mod crd;
pub mod envelopes;

pub use crd::{crd_exists, require_crds, wait_for_crd};
pub use envelopes::EnvelopeTracker;
