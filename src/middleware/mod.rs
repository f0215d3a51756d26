// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Middleware modules (authentication, security, etc.).

pub mod auth;
pub mod security;
pub mod webshop;

pub use auth::{require_admin, require_auth, AuthUser};
pub use webshop::{require_webshop_key, Webshop};
