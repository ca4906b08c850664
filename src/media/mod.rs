// SPDX-License-Identifier: GPL-3.0-only

//! Pixel encoding helpers

pub mod codec;

pub use codec::Codec;
