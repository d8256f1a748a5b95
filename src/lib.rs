// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
pub mod annotator;
pub mod auth;
pub mod cache;
pub mod config;
pub mod constants;
pub mod controller;
pub mod error;
pub mod kubernetes;
pub mod mapper;
pub mod mutate;
pub mod options;
pub mod reconciler;
pub mod render;
pub mod types;
pub mod values;

#[cfg(test)]
pub(crate) mod test_utils;
